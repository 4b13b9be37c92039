//! The nanoapp trait and the API surface handed to running nanoapps.

#[cfg(not(feature = "std"))]
use alloc::{sync::Arc, vec::Vec};
#[cfg(feature = "std")]
use std::sync::Arc;

use ctxhub_core::{
    AppId, AudioCapabilities, BleCapabilities, BleFilterCapabilities, DynPayload, Event,
    EventType, FreeHook, GnssCapabilities, HubResult, InstanceId, Nanoseconds, TimerHandle,
    WifiCapabilities, WwanCapabilities,
};
use ctxhub_evloop::EventLoop;
use ctxhub_host::HostCommsManager;
use ctxhub_req::{
    AudioRequestManager, BleRequestManager, BleScanFilter, BleScanMode, GnssRequestManager,
    WifiRequestManager, WwanRequestManager,
};
use ctxhub_timer::{Clock, TimerPool};

/// A nanoapp's behavior, driven cooperatively by the hub.
///
/// Handlers run to completion on the loop thread, one at a time; the
/// [`HubApi`] argument is the only way a nanoapp reaches the runtime.
pub trait Nanoapp: Send {
    /// Stable identity of this nanoapp across loads.
    fn app_id(&self) -> AppId;

    /// Called once when the nanoapp is started. Returning `false` aborts the
    /// start and rolls back everything the nanoapp requested from within.
    fn on_start(&mut self, api: &mut HubApi<'_>) -> bool;

    /// Called for every event delivered to this nanoapp.
    fn on_event(&mut self, api: &mut HubApi<'_>, event: &Event);

    /// Called once when the nanoapp is being stopped. Outstanding resource
    /// requests and timers are swept by the hub afterwards.
    fn on_stop(&mut self, _api: &mut HubApi<'_>) {}
}

/// The runtime API surface for the currently executing nanoapp.
///
/// Resource calls follow the async-request contract: a synchronous `false`
/// means no async-result event will ever follow; `true` means exactly one
/// will.
pub struct HubApi<'h> {
    pub(crate) instance_id: InstanceId,
    pub(crate) app_id: AppId,
    pub(crate) ev: &'h mut EventLoop,
    pub(crate) timers: &'h mut TimerPool,
    pub(crate) clock: &'h Arc<dyn Clock>,
    pub(crate) ble: &'h mut BleRequestManager,
    pub(crate) gnss: &'h mut GnssRequestManager,
    pub(crate) wifi: &'h mut WifiRequestManager,
    pub(crate) wwan: &'h mut WwanRequestManager,
    pub(crate) audio: &'h mut AudioRequestManager,
    pub(crate) host: &'h mut HostCommsManager,
}

impl HubApi<'_> {
    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    pub fn app_id(&self) -> AppId {
        self.app_id
    }

    pub fn now(&self) -> Nanoseconds {
        self.clock.now()
    }

    // ---- events ----

    /// Posts an event with this nanoapp as the sender.
    pub fn post_event(
        &mut self,
        event_type: EventType,
        target: InstanceId,
        payload: DynPayload,
    ) -> HubResult<()> {
        self.ev
            .post_event(Event::new(event_type, self.instance_id, target, payload))
    }

    pub fn register_for_broadcast(&mut self, event_type: EventType) -> HubResult<bool> {
        self.ev.register_for_broadcast(self.instance_id, event_type)
    }

    pub fn unregister_for_broadcast(&mut self, event_type: EventType) -> HubResult<bool> {
        self.ev.unregister_for_broadcast(self.instance_id, event_type)
    }

    // ---- timers ----

    pub fn set_timer(
        &mut self,
        duration: Nanoseconds,
        cookie: u64,
        one_shot: bool,
    ) -> HubResult<TimerHandle> {
        self.timers
            .set_timer(self.instance_id, self.clock.now(), duration, cookie, one_shot)
    }

    pub fn cancel_timer(&mut self, handle: TimerHandle) -> bool {
        self.timers.cancel(self.instance_id, handle)
    }

    // ---- BLE ----

    pub fn ble_capabilities(&self) -> BleCapabilities {
        self.ble.capabilities()
    }

    pub fn ble_filter_capabilities(&self) -> BleFilterCapabilities {
        self.ble.filter_capabilities()
    }

    pub fn ble_start_scan(
        &mut self,
        mode: BleScanMode,
        report_delay_ms: u32,
        filters: Vec<BleScanFilter>,
        cookie: u64,
    ) -> bool {
        self.ble
            .start_scan(self.ev, self.instance_id, mode, report_delay_ms, filters, cookie)
    }

    pub fn ble_stop_scan(&mut self, cookie: u64) -> bool {
        self.ble.stop_scan(self.ev, self.instance_id, cookie)
    }

    // ---- GNSS ----

    pub fn gnss_capabilities(&self) -> GnssCapabilities {
        self.gnss.capabilities()
    }

    pub fn gnss_location_session_start(&mut self, min_interval_ms: u32, cookie: u64) -> bool {
        self.gnss
            .start_location_session(self.ev, self.instance_id, min_interval_ms, cookie)
    }

    pub fn gnss_location_session_stop(&mut self, cookie: u64) -> bool {
        self.gnss.stop_location_session(self.ev, self.instance_id, cookie)
    }

    // ---- Wi-Fi ----

    pub fn wifi_capabilities(&self) -> WifiCapabilities {
        self.wifi.capabilities()
    }

    pub fn wifi_start_scan_monitor(&mut self, scan_interval_ms: u32, cookie: u64) -> bool {
        self.wifi
            .start_scan_monitor(self.ev, self.instance_id, scan_interval_ms, cookie)
    }

    pub fn wifi_stop_scan_monitor(&mut self, cookie: u64) -> bool {
        self.wifi.stop_scan_monitor(self.ev, self.instance_id, cookie)
    }

    // ---- WWAN ----

    pub fn wwan_capabilities(&self) -> WwanCapabilities {
        self.wwan.capabilities()
    }

    pub fn wwan_start_cell_info(&mut self, cookie: u64) -> bool {
        self.wwan.start_cell_info(self.ev, self.instance_id, cookie)
    }

    pub fn wwan_stop_cell_info(&mut self, cookie: u64) -> bool {
        self.wwan.stop_cell_info(self.ev, self.instance_id, cookie)
    }

    // ---- audio ----

    pub fn audio_capabilities(&self) -> AudioCapabilities {
        self.audio.capabilities()
    }

    pub fn audio_start_source(&mut self, buffer_duration_ms: u32, cookie: u64) -> bool {
        self.audio
            .start_source(self.ev, self.instance_id, buffer_duration_ms, cookie)
    }

    pub fn audio_stop_source(&mut self, cookie: u64) -> bool {
        self.audio.stop_source(self.ev, self.instance_id, cookie)
    }

    // ---- host ----

    pub fn send_message_to_host(
        &mut self,
        data: Vec<u8>,
        message_type: u32,
        host_endpoint: u16,
        free_hook: Option<FreeHook>,
    ) -> bool {
        self.host.send_message_to_host(
            self.app_id,
            self.instance_id,
            data,
            message_type,
            host_endpoint,
            free_hook,
        )
    }
}
