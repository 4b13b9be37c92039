//! Per-nanoapp bookkeeping: identity, subscriptions, private event queue.

#[cfg(not(feature = "std"))]
use alloc::collections::{BTreeSet, VecDeque};
#[cfg(feature = "std")]
use std::collections::{BTreeSet, VecDeque};

use ctxhub_core::{AppId, EventType, InstanceId};
use ctxhub_pool::EventHandle;

/// The event loop's record of one running nanoapp.
///
/// Owned exclusively by the event loop once started; the registration set is
/// only ever mutated from the loop thread (a nanoapp touches it solely from
/// its own running context).
pub struct Nanoapp {
    app_id: AppId,
    instance_id: InstanceId,
    subscriptions: BTreeSet<EventType>,
    queue: VecDeque<EventHandle>,
}

impl Nanoapp {
    pub fn new(app_id: AppId, instance_id: InstanceId) -> Self {
        Self {
            app_id,
            instance_id,
            subscriptions: BTreeSet::new(),
            queue: VecDeque::new(),
        }
    }

    pub fn app_id(&self) -> AppId {
        self.app_id
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    /// Idempotent subscribe; reports whether the set actually changed.
    pub fn register_for_broadcast(&mut self, event_type: EventType) -> bool {
        self.subscriptions.insert(event_type)
    }

    /// Idempotent unsubscribe; reports whether the set actually changed.
    pub fn unregister_for_broadcast(&mut self, event_type: EventType) -> bool {
        self.subscriptions.remove(&event_type)
    }

    pub fn is_registered_for(&self, event_type: EventType) -> bool {
        self.subscriptions.contains(&event_type)
    }

    pub fn has_pending_event(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn pending_event_count(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn enqueue_event(&mut self, handle: EventHandle) {
        self.queue.push_back(handle);
    }

    /// Pops the next queued event.
    ///
    /// # Panics
    ///
    /// Callers must check [`Self::has_pending_event`] first; popping an
    /// empty queue is a bug in the scheduler, not a runtime condition.
    pub(crate) fn process_next_event(&mut self) -> EventHandle {
        self.queue
            .pop_front()
            .expect("process_next_event on an empty queue")
    }

    pub(crate) fn drain_queue(&mut self) -> VecDeque<EventHandle> {
        core::mem::take(&mut self.queue)
    }
}
