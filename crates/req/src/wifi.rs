//! Wi-Fi scan-monitor requests and manager.

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, vec::Vec};

use ctxhub_core::{AsyncError, EventType, InstanceId, RequestType, WifiCapabilities};
use ctxhub_evloop::EventLoop;

use crate::manager::ResourceManager;
use crate::request::Request;

/// One nanoapp's scan-monitor request; the platform gets the minimum scan
/// interval across requesters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WifiRequest {
    enabled: bool,
    pub scan_interval_ms: u32,
}

impl WifiRequest {
    pub fn enabled(scan_interval_ms: u32) -> Self {
        Self {
            enabled: true,
            scan_interval_ms,
        }
    }
}

impl Request for WifiRequest {
    fn disabled() -> Self {
        Self {
            enabled: false,
            scan_interval_ms: u32::MAX,
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn merge_from(&mut self, other: &Self) -> bool {
        let mut changed = false;
        if other.enabled && !self.enabled {
            self.enabled = true;
            changed = true;
        }
        if other.scan_interval_ms < self.scan_interval_ms {
            self.scan_interval_ms = other.scan_interval_ms;
            changed = true;
        }
        changed
    }
}

/// Broadcast payload of [`EventType::WIFI_SCAN_RESULT`] events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiScanResult {
    pub ssid: Vec<u8>,
    pub rssi: i8,
    pub frequency_mhz: u32,
}

/// Platform abstraction for the Wi-Fi subsystem.
pub trait WifiPal: Send {
    fn capabilities(&self) -> WifiCapabilities;
    fn start_scan_monitor(&mut self, request: &WifiRequest) -> bool;
    fn stop_scan_monitor(&mut self) -> bool;
}

pub struct WifiRequestManager {
    pal: Box<dyn WifiPal>,
    inner: ResourceManager<WifiRequest>,
}

impl WifiRequestManager {
    pub fn new(pal: Box<dyn WifiPal>) -> Self {
        Self {
            pal,
            inner: ResourceManager::new(
                RequestType::Wifi,
                EventType::WIFI_ASYNC_RESULT,
                EventType::WIFI_SCAN_RESULT,
            ),
        }
    }

    pub fn capabilities(&self) -> WifiCapabilities {
        self.pal.capabilities()
    }

    pub fn start_scan_monitor(
        &mut self,
        ev: &mut EventLoop,
        owner: InstanceId,
        scan_interval_ms: u32,
        cookie: u64,
    ) -> bool {
        let pal = &mut self.pal;
        self.inner.configure(
            ev,
            owner,
            WifiRequest::enabled(scan_interval_ms),
            cookie,
            |r| Self::apply(pal, r),
        )
    }

    pub fn stop_scan_monitor(&mut self, ev: &mut EventLoop, owner: InstanceId, cookie: u64) -> bool {
        let pal = &mut self.pal;
        self.inner
            .configure(ev, owner, WifiRequest::disabled(), cookie, |r| {
                Self::apply(pal, r)
            })
    }

    pub fn handle_monitor_response(&mut self, ev: &mut EventLoop, error: AsyncError) {
        let pal = &mut self.pal;
        self.inner
            .handle_response(ev, error, |r| Self::apply(pal, r));
    }

    pub fn handle_scan_result(&self, ev: &EventLoop, report: WifiScanResult) {
        self.inner.post_report(ev, report);
    }

    pub fn disable_for(&mut self, ev: &mut EventLoop, owner: InstanceId) {
        let pal = &mut self.pal;
        self.inner.disable_for(ev, owner, |r| Self::apply(pal, r));
    }

    pub fn inner(&self) -> &ResourceManager<WifiRequest> {
        &self.inner
    }

    fn apply(pal: &mut Box<dyn WifiPal>, request: &WifiRequest) -> bool {
        if request.is_enabled() {
            pal.start_scan_monitor(request)
        } else {
            pal.stop_scan_monitor()
        }
    }
}
