//! The hub context object and its run loop.

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, collections::BTreeMap, sync::Arc, vec::Vec};
#[cfg(feature = "std")]
use std::collections::BTreeMap;
#[cfg(feature = "std")]
use std::sync::Arc;

use log::{debug, info, warn};

use ctxhub_core::{
    AppId, HubError, HubResult, InstanceId, SystemCallback,
};
use ctxhub_evloop::{EventLoop, EventPoster, Inbound, StopHandle};
use ctxhub_host::{HostCommsManager, HostLink};
use ctxhub_pool::PoolStats;
use ctxhub_req::{
    AudioPal, AudioRequestManager, BlePal, BleRequestManager, GnssPal, GnssRequestManager,
    WifiPal, WifiRequestManager, WwanPal, WwanRequestManager,
};
use ctxhub_timer::{Clock, SystemTimer, TimerPool};

use crate::api::{HubApi, Nanoapp};
use crate::config::HubConfig;

/// Platform bindings injected at startup, one implementation per target.
pub struct Platform {
    pub ble: Box<dyn BlePal>,
    pub gnss: Box<dyn GnssPal>,
    pub wifi: Box<dyn WifiPal>,
    pub wwan: Box<dyn WwanPal>,
    pub audio: Box<dyn AudioPal>,
    pub host_link: Box<dyn HostLink>,
    pub timer: Box<dyn SystemTimer>,
    pub clock: Arc<dyn Clock>,
}

/// The explicit process-wide runtime context.
///
/// Owns the event loop, the timer pool, the resource managers, host comms,
/// and the nanoapp handler objects. There are no globals; tests construct
/// as many isolated hubs as they like.
pub struct Hub {
    ev: EventLoop,
    timers: TimerPool,
    clock: Arc<dyn Clock>,
    ble: BleRequestManager,
    gnss: GnssRequestManager,
    wifi: WifiRequestManager,
    wwan: WwanRequestManager,
    audio: AudioRequestManager,
    host: HostCommsManager,
    handlers: BTreeMap<InstanceId, Box<dyn Nanoapp>>,
}

impl Hub {
    pub fn new(config: HubConfig, platform: Platform) -> Self {
        Self {
            ev: EventLoop::new(config.event_pool_capacity, config.inbound_queue_depth),
            timers: TimerPool::new(platform.timer, config.timer_capacity),
            clock: platform.clock,
            ble: BleRequestManager::new(platform.ble),
            gnss: GnssRequestManager::new(platform.gnss),
            wifi: WifiRequestManager::new(platform.wifi),
            wwan: WwanRequestManager::new(platform.wwan),
            audio: AudioRequestManager::new(platform.audio),
            host: HostCommsManager::new(
                platform.host_link,
                config.host_message_pool_size,
                config.max_host_message_size,
            ),
            handlers: BTreeMap::new(),
        }
    }

    /// Thread-safe posting handle for platform drivers and the host link.
    pub fn poster(&self) -> EventPoster {
        self.ev.poster()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.ev.stop_handle()
    }

    pub fn event_pool_stats(&self) -> PoolStats {
        self.ev.pool_stats()
    }

    pub fn host_pool_stats(&self) -> PoolStats {
        self.host.outbound_stats()
    }

    pub fn app_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn instance_id_for_app(&self, app_id: AppId) -> Option<InstanceId> {
        self.ev.instance_id_for_app(app_id)
    }

    // ---- lifecycle ----

    /// Starts a nanoapp: issues its instance id, runs `on_start` in its
    /// context, and registers the handler for event delivery.
    ///
    /// An `on_start` returning `false` rolls everything back, including any
    /// resource requests or timers it made before failing.
    pub fn start_nanoapp(&mut self, mut app: Box<dyn Nanoapp>) -> HubResult<InstanceId> {
        let app_id = app.app_id();
        let instance_id = self.ev.create_nanoapp(app_id)?;

        self.ev.set_current(Some(instance_id));
        let started = app.on_start(&mut self.api(instance_id, app_id));
        self.ev.set_current(None);

        if !started {
            warn!("{app_id} failed to start");
            self.sweep(instance_id);
            self.ev.remove_nanoapp(instance_id)?;
            return Err(HubError::StartFailed);
        }
        info!("{app_id} started as {instance_id}");
        self.handlers.insert(instance_id, app);
        Ok(instance_id)
    }

    /// Stops a nanoapp: runs `on_stop`, sweeps its outstanding resource
    /// requests and timers, and frees its undelivered events.
    pub fn stop_nanoapp(&mut self, instance_id: InstanceId) -> HubResult<()> {
        let mut app = self
            .handlers
            .remove(&instance_id)
            .ok_or(HubError::AppNotFound(instance_id))?;
        let app_id = app.app_id();

        self.ev.set_current(Some(instance_id));
        app.on_stop(&mut self.api(instance_id, app_id));
        self.ev.set_current(None);

        self.sweep(instance_id);
        self.ev.remove_nanoapp(instance_id)?;
        info!("{app_id} stopped");
        Ok(())
    }

    /// Disables everything a departing nanoapp left behind. A request caught
    /// mid-transition resolves later; its async result is then unroutable
    /// and dropped.
    fn sweep(&mut self, instance_id: InstanceId) {
        self.ble.disable_for(&mut self.ev, instance_id);
        self.gnss.disable_for(&mut self.ev, instance_id);
        self.wifi.disable_for(&mut self.ev, instance_id);
        self.wwan.disable_for(&mut self.ev, instance_id);
        self.audio.disable_for(&mut self.ev, instance_id);
        self.timers.cancel_all_for(instance_id);
    }

    // ---- run loop ----

    /// Drives the hub until a stop request is observed.
    ///
    /// The inbound pop blocks only when the previous pass left no nanoapp
    /// with pending events; otherwise the loop alternates non-blocking pops
    /// with round-robin delivery passes.
    pub fn run(&mut self) {
        info!("hub running");
        while !self.ev.is_stopped() {
            let item = if self.ev.any_pending() {
                self.ev.inbound().try_pop()
            } else {
                match self.ev.inbound().pop_blocking() {
                    Some(item) => Some(item),
                    None => break,
                }
            };
            if let Some(item) = item {
                self.handle_inbound(item);
            }
            self.deliver_pass();
        }
        info!("hub stopped");
    }

    /// Drains the inbound queue and every pending event without blocking.
    /// The workhorse of tests and single-threaded embeddings.
    pub fn run_until_idle(&mut self) {
        loop {
            while let Some(item) = self.ev.inbound().try_pop() {
                self.handle_inbound(item);
            }
            if !self.ev.any_pending() {
                if self.ev.inbound().is_empty() {
                    break;
                }
                continue;
            }
            while self.ev.any_pending() {
                self.deliver_pass();
            }
        }
    }

    fn handle_inbound(&mut self, item: Inbound) {
        match item {
            Inbound::Event(handle) => {
                if let Err(err) = self.ev.distribute(handle) {
                    warn!("fan-out failed: {err}");
                }
            }
            Inbound::Callback(callback) => self.dispatch_callback(callback),
        }
    }

    /// Routes one deferred platform completion to its handler, on the loop
    /// thread.
    pub fn dispatch_callback(&mut self, callback: SystemCallback) {
        debug!("dispatching {callback:?}");
        match callback {
            SystemCallback::TimerExpired => {
                self.timers.handle_expired(self.clock.now(), &mut self.ev);
            }
            SystemCallback::BleScanResponse { error } => {
                self.ble.handle_scan_response(&mut self.ev, error);
            }
            SystemCallback::GnssSessionResponse { error } => {
                self.gnss.handle_session_response(&mut self.ev, error);
            }
            SystemCallback::WifiScanResponse { error } => {
                self.wifi.handle_monitor_response(&mut self.ev, error);
            }
            SystemCallback::WwanResponse { error } => {
                self.wwan.handle_response(&mut self.ev, error);
            }
            SystemCallback::AudioResponse { error } => {
                self.audio.handle_source_response(&mut self.ev, error);
            }
            SystemCallback::HostMessageDelivered { handle, error } => {
                self.host.handle_delivered(handle, error);
            }
        }
    }

    /// Delivers a host-originated message to one nanoapp or to every
    /// nanoapp registered for host messages.
    pub fn deliver_host_message(
        &self,
        target: InstanceId,
        message_type: u32,
        host_endpoint: u16,
        data: Vec<u8>,
    ) {
        self.host
            .deliver_host_message(&self.ev, target, message_type, host_endpoint, data);
    }

    /// One round-robin pass: at most one event per nanoapp, snapshotted so
    /// apps started or stopped mid-pass never join it retroactively.
    fn deliver_pass(&mut self) {
        for instance_id in self.ev.pending_apps() {
            self.deliver_one(instance_id);
        }
    }

    fn deliver_one(&mut self, instance_id: InstanceId) {
        let (handle, event) = match self.ev.pop_event_for(instance_id) {
            Ok(popped) => popped,
            Err(err) => {
                warn!("delivery to {instance_id} failed: {err}");
                return;
            }
        };
        // The handler leaves the map while it runs so it can be handed a
        // mutable view of everything else.
        if let Some(mut app) = self.handlers.remove(&instance_id) {
            let app_id = app.app_id();
            self.ev.set_current(Some(instance_id));
            app.on_event(&mut self.api(instance_id, app_id), &event);
            self.ev.set_current(None);
            self.handlers.insert(instance_id, app);
        }
        self.ev.finish_delivery(handle);
    }

    fn api(&mut self, instance_id: InstanceId, app_id: AppId) -> HubApi<'_> {
        HubApi {
            instance_id,
            app_id,
            ev: &mut self.ev,
            timers: &mut self.timers,
            clock: &self.clock,
            ble: &mut self.ble,
            gnss: &mut self.gnss,
            wifi: &mut self.wifi,
            wwan: &mut self.wwan,
            audio: &mut self.audio,
            host: &mut self.host,
        }
    }
}
