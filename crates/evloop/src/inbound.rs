//! Blocking MPSC inbound queue and the thread-safe posting handle.

#[cfg(not(feature = "std"))]
use alloc::collections::VecDeque;
#[cfg(feature = "std")]
use std::collections::VecDeque;

use core::sync::atomic::{AtomicBool, Ordering};

use log::warn;

#[cfg(feature = "std")]
use ctxhub_core::sync::Condvar;
use ctxhub_core::sync::{Arc, Mutex};
use ctxhub_core::{Event, FreeHook, HubError, HubResult, SystemCallback};
use ctxhub_pool::{EventHandle, EventPool};

/// One item handed from a producer thread to the event loop.
#[derive(Debug)]
pub enum Inbound {
    /// A pooled event awaiting fan-out.
    Event(EventHandle),
    /// A deferred platform completion awaiting dispatch on the loop thread.
    Callback(SystemCallback),
}

/// Bounded MPSC queue feeding the event loop.
///
/// `push` may be called from any thread and wakes the loop; the two pop
/// flavors may only be called from the loop thread (single consumer).
pub struct InboundQueue {
    queue: Mutex<VecDeque<Inbound>>,
    capacity: usize,
    stopped: AtomicBool,
    #[cfg(feature = "std")]
    ready: Condvar,
}

impl InboundQueue {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            stopped: AtomicBool::new(false),
            #[cfg(feature = "std")]
            ready: Condvar::new(),
        })
    }

    /// Enqueues an item, waking the loop thread if it is blocked.
    pub fn push(&self, item: Inbound) -> HubResult<()> {
        if self.is_stopped() {
            return Err(HubError::Stopped);
        }
        {
            let mut queue = self.queue.lock();
            if queue.len() >= self.capacity {
                return Err(HubError::QueueFull);
            }
            queue.push_back(item);
        }
        #[cfg(feature = "std")]
        self.ready.notify_one();
        Ok(())
    }

    /// Non-blocking pop, used while nanoapps still have pending work.
    pub fn try_pop(&self) -> Option<Inbound> {
        self.queue.lock().pop_front()
    }

    /// Blocking pop; returns `None` once a stop request has been observed.
    ///
    /// This is the only blocking point in the runtime: the loop parks here
    /// when no nanoapp has pending events and the queue is empty.
    pub fn pop_blocking(&self) -> Option<Inbound> {
        #[cfg(feature = "std")]
        {
            let mut queue = self.queue.lock();
            loop {
                if let Some(item) = queue.pop_front() {
                    return Some(item);
                }
                if self.is_stopped() {
                    return None;
                }
                self.ready.wait(&mut queue);
            }
        }
        #[cfg(not(feature = "std"))]
        {
            loop {
                if let Some(item) = self.try_pop() {
                    return Some(item);
                }
                if self.is_stopped() {
                    return None;
                }
                core::hint::spin_loop();
            }
        }
    }

    /// Requests loop shutdown from any thread.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        #[cfg(feature = "std")]
        self.ready.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

/// Clone-able handle for posting events and deferred callbacks from any
/// thread — the only interface platform drivers get to the loop.
#[derive(Clone)]
pub struct EventPoster {
    pool: Arc<EventPool>,
    queue: Arc<InboundQueue>,
}

impl EventPoster {
    pub(crate) fn new(pool: Arc<EventPool>, queue: Arc<InboundQueue>) -> Self {
        Self { pool, queue }
    }

    /// Posts an event; exhaustion and shutdown are recoverable (the post is
    /// dropped, the free hook still runs).
    pub fn post_event(&self, event: Event) -> HubResult<()> {
        self.post_event_with_hook(event, None)
    }

    pub fn post_event_with_hook(&self, event: Event, hook: Option<FreeHook>) -> HubResult<()> {
        let event_type = event.event_type();
        let handle = match self.pool.allocate(event, hook) {
            Ok(handle) => handle,
            Err(err) => {
                warn!("dropping {event_type}: {err}");
                return Err(err);
            }
        };
        if let Err(err) = self.queue.push(Inbound::Event(handle)) {
            warn!("dropping {event_type}: {err}");
            // Never delivered; releasing the slot runs the free hook.
            drop(self.pool.discard(handle));
            return Err(err);
        }
        Ok(())
    }

    /// Posts an event on a path where dropping it would corrupt
    /// nanoapp-visible state. Allocation failure here is a fatal process
    /// error by contract.
    pub fn post_event_or_die(&self, event: Event) {
        if let Err(err) = self.post_event(event) {
            panic!("fatal event post failure: {err}");
        }
    }

    /// Hands a deferred platform completion to the loop thread.
    pub fn post_callback(&self, callback: SystemCallback) -> HubResult<()> {
        self.queue.push(Inbound::Callback(callback))
    }
}
