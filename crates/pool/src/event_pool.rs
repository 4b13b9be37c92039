//! Event pool with delivery reference counting.

use ctxhub_core::event::{Event, FreeHook};
use ctxhub_core::{HubResult, SlotHandle};

use crate::slot::{PoolStats, SlotPool};

/// Handle to a pooled event.
pub type EventHandle = SlotHandle;

struct PooledEvent {
    event: Event,
    free_hook: Option<FreeHook>,
    /// Outstanding deliveries. Zero means no nanoapp currently references
    /// the event; only the routing pass may hold it in that state.
    remaining: u32,
}

/// An event whose pool slot has been released.
///
/// Dropping this value runs the producer's free hook — exactly once, because
/// the slot release that produced it is generation-checked.
pub struct ReleasedEvent {
    event: Event,
    free_hook: Option<FreeHook>,
}

impl ReleasedEvent {
    pub fn event(&self) -> &Event {
        &self.event
    }
}

impl Drop for ReleasedEvent {
    fn drop(&mut self) {
        if let Some(hook) = self.free_hook.take() {
            hook();
        }
    }
}

/// Fixed-capacity pool of in-flight events.
///
/// Allocation is thread-safe (event posts arrive from platform callback
/// threads as well as the loop thread). Reference-count mutation is the
/// event loop's business alone: only the loop thread fans out, delivers, and
/// releases, so a zero count can never race with a concurrent delivery.
pub struct EventPool {
    slots: SlotPool<PooledEvent>,
}

impl EventPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: SlotPool::new(capacity),
        }
    }

    /// Allocates a slot for an event about to enter the inbound queue.
    ///
    /// The delivery count starts at zero; the routing pass sets it before
    /// any nanoapp can observe the event.
    pub fn allocate(&self, event: Event, free_hook: Option<FreeHook>) -> HubResult<EventHandle> {
        self.slots.insert(PooledEvent {
            event,
            free_hook,
            remaining: 0,
        })
    }

    /// Clones the envelope out of the slot (payload is shared, so cheap).
    pub fn event(&self, handle: EventHandle) -> HubResult<Event> {
        self.slots.with_mut(handle, |pooled| pooled.event.clone())
    }

    /// Records `count` additional pending deliveries.
    pub fn add_pending(&self, handle: EventHandle, count: u32) -> HubResult<()> {
        self.slots.with_mut(handle, |pooled| {
            pooled.remaining += count;
        })
    }

    /// Marks one delivery complete.
    ///
    /// Returns the released event once the last recipient is done; the free
    /// hook runs when the returned value drops, outside the pool lock.
    pub fn finish_delivery(&self, handle: EventHandle) -> HubResult<Option<ReleasedEvent>> {
        let last = self.slots.with_mut(handle, |pooled| {
            assert!(pooled.remaining > 0, "finish_delivery without a pending delivery");
            pooled.remaining -= 1;
            pooled.remaining == 0
        })?;
        if !last {
            return Ok(None);
        }
        self.release(handle).map(Some)
    }

    /// Releases an event that no recipient ever referenced (unroutable).
    pub fn discard(&self, handle: EventHandle) -> HubResult<ReleasedEvent> {
        self.slots.with_mut(handle, |pooled| {
            assert_eq!(pooled.remaining, 0, "discard of an event with pending deliveries");
        })?;
        self.release(handle)
    }

    fn release(&self, handle: EventHandle) -> HubResult<ReleasedEvent> {
        let pooled = self.slots.take(handle)?;
        Ok(ReleasedEvent {
            event: pooled.event,
            free_hook: pooled.free_hook,
        })
    }

    pub fn stats(&self) -> PoolStats {
        self.slots.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctxhub_core::sync::Arc;
    use ctxhub_core::{EventType, InstanceId};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_hook(counter: &Arc<AtomicUsize>) -> FreeHook {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn test_event() -> Event {
        Event::empty(EventType::FIRST_USER, InstanceId::SYSTEM, InstanceId::new(1))
    }

    #[test]
    fn free_hook_runs_after_last_delivery() {
        let pool = EventPool::new(4);
        let frees = Arc::new(AtomicUsize::new(0));
        let handle = pool
            .allocate(test_event(), Some(counting_hook(&frees)))
            .unwrap();
        pool.add_pending(handle, 2).unwrap();

        assert!(pool.finish_delivery(handle).unwrap().is_none());
        assert_eq!(frees.load(Ordering::SeqCst), 0);

        let released = pool.finish_delivery(handle).unwrap();
        assert!(released.is_some());
        drop(released);
        assert_eq!(frees.load(Ordering::SeqCst), 1);
        assert_eq!(pool.stats().used, 0);
    }

    #[test]
    fn unroutable_event_is_discarded_and_freed() {
        let pool = EventPool::new(4);
        let frees = Arc::new(AtomicUsize::new(0));
        let handle = pool
            .allocate(test_event(), Some(counting_hook(&frees)))
            .unwrap();
        drop(pool.discard(handle).unwrap());
        assert_eq!(frees.load(Ordering::SeqCst), 1);
        // The handle is dead afterwards.
        assert!(pool.event(handle).is_err());
    }

    #[test]
    #[should_panic(expected = "finish_delivery without a pending delivery")]
    fn finishing_with_no_pending_delivery_is_a_bug() {
        let pool = EventPool::new(1);
        let handle = pool.allocate(test_event(), None).unwrap();
        let _ = pool.finish_delivery(handle);
    }
}
