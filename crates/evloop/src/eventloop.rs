//! Scheduler state: app registry, instance-id allocation, fan-out, and
//! delivery bookkeeping.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use log::{debug, warn};

use ctxhub_core::sync::Arc;
use ctxhub_core::{
    AppId, Event, FreeHook, HubError, HubResult, InstanceId, SystemCallback,
};
use ctxhub_pool::{EventHandle, EventPool, PoolStats};

use crate::inbound::{EventPoster, InboundQueue};
use crate::nanoapp::Nanoapp;

/// Clone-able handle that makes the loop's blocking `run` return.
#[derive(Clone)]
pub struct StopHandle {
    queue: Arc<InboundQueue>,
}

impl StopHandle {
    /// Observable from any thread; the loop finishes its current iteration
    /// and returns.
    pub fn stop(&self) {
        self.queue.stop();
    }
}

/// The event loop's data plane.
///
/// Owns the nanoapp records, the shared event pool, and the inbound queue.
/// All lookups over the app list are linear scans: nanoapp counts are tens,
/// not thousands, and the list is touched on every dispatch, so a flat
/// `Vec` beats a map here. The driving `run` loop lives in `ctxhub-system`,
/// which combines this state with the nanoapp handler objects.
pub struct EventLoop {
    apps: Vec<Nanoapp>,
    pool: Arc<EventPool>,
    inbound: Arc<InboundQueue>,
    current: Option<InstanceId>,
    last_instance_id: u32,
}

impl EventLoop {
    pub fn new(event_capacity: usize, queue_capacity: usize) -> Self {
        Self {
            apps: Vec::new(),
            pool: Arc::new(EventPool::new(event_capacity)),
            inbound: InboundQueue::new(queue_capacity),
            current: None,
            last_instance_id: InstanceId::SYSTEM.raw(),
        }
    }

    pub fn inbound(&self) -> Arc<InboundQueue> {
        Arc::clone(&self.inbound)
    }

    /// Thread-safe posting handle for platform drivers and the host link.
    pub fn poster(&self) -> EventPoster {
        EventPoster::new(Arc::clone(&self.pool), Arc::clone(&self.inbound))
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            queue: Arc::clone(&self.inbound),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.inbound.is_stopped()
    }

    // ---- posting convenience (loop thread or any other) ----

    pub fn post_event(&self, event: Event) -> HubResult<()> {
        self.poster().post_event(event)
    }

    pub fn post_event_with_hook(&self, event: Event, hook: Option<FreeHook>) -> HubResult<()> {
        self.poster().post_event_with_hook(event, hook)
    }

    pub fn post_event_or_die(&self, event: Event) {
        self.poster().post_event_or_die(event);
    }

    pub fn post_callback(&self, callback: SystemCallback) -> HubResult<()> {
        self.poster().post_callback(callback)
    }

    // ---- nanoapp lifecycle ----

    /// Creates the bookkeeping record for a starting nanoapp and issues its
    /// instance id.
    pub fn create_nanoapp(&mut self, app_id: AppId) -> HubResult<InstanceId> {
        if self.instance_id_for_app(app_id).is_some() {
            return Err(HubError::InvalidArgument("app id is already running"));
        }
        let instance_id = self.next_instance_id();
        debug!("starting {app_id} as {instance_id}");
        self.apps.push(Nanoapp::new(app_id, instance_id));
        Ok(instance_id)
    }

    /// Removes a nanoapp record. Events still queued for it are never
    /// delivered, but their delivery bookkeeping completes so each is still
    /// freed exactly once.
    pub fn remove_nanoapp(&mut self, instance_id: InstanceId) -> HubResult<AppId> {
        let index = self
            .apps
            .iter()
            .position(|app| app.instance_id() == instance_id)
            .ok_or(HubError::AppNotFound(instance_id))?;
        let mut app = self.apps.remove(index);
        let app_id = app.app_id();
        for handle in app.drain_queue() {
            drop(self.pool.finish_delivery(handle));
        }
        debug!("stopped {app_id} ({instance_id})");
        Ok(app_id)
    }

    /// Issues the next free instance id: last issued plus one, skipping the
    /// reserved sentinels and any id still live. Never reuses a live id.
    fn next_instance_id(&mut self) -> InstanceId {
        loop {
            self.last_instance_id = self.last_instance_id.wrapping_add(1);
            let candidate = InstanceId::new(self.last_instance_id);
            if candidate.is_reserved() {
                continue;
            }
            if self.nanoapp(candidate).is_none() {
                return candidate;
            }
        }
    }

    // ---- lookups (documented O(n), see struct docs) ----

    pub fn nanoapp(&self, instance_id: InstanceId) -> Option<&Nanoapp> {
        self.apps.iter().find(|app| app.instance_id() == instance_id)
    }

    fn nanoapp_mut(&mut self, instance_id: InstanceId) -> Option<&mut Nanoapp> {
        self.apps
            .iter_mut()
            .find(|app| app.instance_id() == instance_id)
    }

    pub fn instance_id_for_app(&self, app_id: AppId) -> Option<InstanceId> {
        self.apps
            .iter()
            .find(|app| app.app_id() == app_id)
            .map(Nanoapp::instance_id)
    }

    pub fn app_count(&self) -> usize {
        self.apps.len()
    }

    // ---- broadcast registration ----

    /// Idempotent; returns whether the subscription set actually changed.
    pub fn register_for_broadcast(
        &mut self,
        instance_id: InstanceId,
        event_type: ctxhub_core::EventType,
    ) -> HubResult<bool> {
        self.nanoapp_mut(instance_id)
            .map(|app| app.register_for_broadcast(event_type))
            .ok_or(HubError::AppNotFound(instance_id))
    }

    pub fn unregister_for_broadcast(
        &mut self,
        instance_id: InstanceId,
        event_type: ctxhub_core::EventType,
    ) -> HubResult<bool> {
        self.nanoapp_mut(instance_id)
            .map(|app| app.unregister_for_broadcast(event_type))
            .ok_or(HubError::AppNotFound(instance_id))
    }

    // ---- delivery machinery ----

    /// Fans one inbound event out to every matching nanoapp's private queue.
    ///
    /// The app list is snapshotted by running to completion on the loop
    /// thread: apps added or removed by a later dispatch never retroactively
    /// join this pass. An event nobody matched is freed immediately — a
    /// dropped event, not an error.
    pub fn distribute(&mut self, handle: EventHandle) -> HubResult<()> {
        let event = self.pool.event(handle)?;
        let recipients: Vec<InstanceId> = self
            .apps
            .iter()
            .filter(|app| {
                if event.is_broadcast() {
                    app.is_registered_for(event.event_type())
                } else {
                    event.target() == app.instance_id()
                }
            })
            .map(Nanoapp::instance_id)
            .collect();

        if recipients.is_empty() {
            warn!(
                "dropping unroutable {} from {} to {}",
                event.event_type(),
                event.sender(),
                event.target()
            );
            drop(self.pool.discard(handle)?);
            return Ok(());
        }

        self.pool.add_pending(handle, recipients.len() as u32)?;
        for instance_id in recipients {
            if let Some(app) = self.nanoapp_mut(instance_id) {
                app.enqueue_event(handle);
            }
        }
        Ok(())
    }

    /// Snapshot of apps with pending events, in registration order, for one
    /// round-robin pass.
    pub fn pending_apps(&self) -> Vec<InstanceId> {
        self.apps
            .iter()
            .filter(|app| app.has_pending_event())
            .map(Nanoapp::instance_id)
            .collect()
    }

    /// Whether any app still holds undelivered events (decides if the next
    /// inbound pop may block).
    pub fn any_pending(&self) -> bool {
        self.apps.iter().any(Nanoapp::has_pending_event)
    }

    /// Pops the next event queued for `instance_id` for dispatch.
    pub fn pop_event_for(&mut self, instance_id: InstanceId) -> HubResult<(EventHandle, Event)> {
        let app = self
            .nanoapp_mut(instance_id)
            .ok_or(HubError::AppNotFound(instance_id))?;
        let handle = app.process_next_event();
        let event = self.pool.event(handle)?;
        Ok((handle, event))
    }

    /// Marks one delivery of `handle` complete; frees the event (and runs
    /// its free hook) if this was the last recipient.
    pub fn finish_delivery(&mut self, handle: EventHandle) {
        match self.pool.finish_delivery(handle) {
            Ok(released) => drop(released),
            Err(err) => warn!("finish_delivery on {handle}: {err}"),
        }
    }

    // ---- execution context ----

    pub fn set_current(&mut self, instance_id: Option<InstanceId>) {
        self.current = instance_id;
    }

    /// Instance id of the nanoapp currently executing, if any.
    pub fn current(&self) -> Option<InstanceId> {
        self.current
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }
}
