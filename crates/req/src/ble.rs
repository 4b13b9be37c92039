//! BLE scan requests, the scan-filter model, and the BLE request manager.

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, vec::Vec};

use log::warn;

use ctxhub_core::{
    AsyncError, BleCapabilities, BleFilterCapabilities, EventType, InstanceId, RequestType,
};
use ctxhub_evloop::EventLoop;

use crate::manager::ResourceManager;
use crate::request::Request;

/// Scan duty-cycle modes, ordered from least to most aggressive. Merging
/// keeps the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BleScanMode {
    Background,
    ActiveBackground,
    Foreground,
}

/// Hardware scan-filter kinds and their exact payload lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BleFilterKind {
    ServiceDataUuid16,
    ServiceDataUuid32,
    ServiceDataUuid128,
    Rssi,
}

impl BleFilterKind {
    /// Byte length the filter payload must have, exactly.
    pub const fn expected_len(self) -> usize {
        match self {
            Self::ServiceDataUuid16 => 2,
            Self::ServiceDataUuid32 => 4,
            Self::ServiceDataUuid128 => 16,
            Self::Rssi => 1,
        }
    }
}

/// One hardware scan filter entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BleScanFilter {
    pub kind: BleFilterKind,
    pub data: Vec<u8>,
}

impl BleScanFilter {
    pub fn new(kind: BleFilterKind, data: Vec<u8>) -> Self {
        Self { kind, data }
    }

    /// A length/kind mismatch is rejected before any state mutation.
    pub fn is_valid(&self) -> bool {
        self.data.len() == self.kind.expected_len()
    }
}

/// One nanoapp's BLE scan request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BleRequest {
    enabled: bool,
    pub mode: BleScanMode,
    /// Batching delay; the platform gets the minimum across requesters.
    pub report_delay_ms: u32,
    /// Filters are additive: the platform scans for the union.
    pub filters: Vec<BleScanFilter>,
}

impl BleRequest {
    pub fn enabled(mode: BleScanMode, report_delay_ms: u32, filters: Vec<BleScanFilter>) -> Self {
        Self {
            enabled: true,
            mode,
            report_delay_ms,
            filters,
        }
    }
}

impl Request for BleRequest {
    fn disabled() -> Self {
        Self {
            enabled: false,
            mode: BleScanMode::Background,
            report_delay_ms: u32::MAX,
            filters: Vec::new(),
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
        if other.mode > self.mode {
            self.mode = other.mode;
            changed = true;
        }
        if other.report_delay_ms < self.report_delay_ms {
            self.report_delay_ms = other.report_delay_ms;
            changed = true;
        }
        for filter in &other.filters {
            if !self.filters.contains(filter) {
                self.filters.push(filter.clone());
                changed = true;
            }
        }
        changed
    }
}

/// Broadcast payload of [`EventType::BLE_ADVERTISEMENT`] events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BleAdvertisement {
    pub address: [u8; 6],
    pub rssi: i8,
    pub data: Vec<u8>,
}

/// Platform abstraction for the BLE subsystem.
///
/// `start_scan`/`stop_scan` accept or reject synchronously; the transition
/// resolves later via `SystemCallback::BleScanResponse` posted from the
/// PAL's own thread.
pub trait BlePal: Send {
    fn capabilities(&self) -> BleCapabilities;
    fn filter_capabilities(&self) -> BleFilterCapabilities;
    fn start_scan(&mut self, request: &BleRequest) -> bool;
    fn stop_scan(&mut self) -> bool;
}

pub struct BleRequestManager {
    pal: Box<dyn BlePal>,
    inner: ResourceManager<BleRequest>,
}

impl BleRequestManager {
    pub fn new(pal: Box<dyn BlePal>) -> Self {
        Self {
            pal,
            inner: ResourceManager::new(
                RequestType::Ble,
                EventType::BLE_ASYNC_RESULT,
                EventType::BLE_ADVERTISEMENT,
            ),
        }
    }

    /// Capability queries need no permission grant and never touch the
    /// request state.
    pub fn capabilities(&self) -> BleCapabilities {
        self.pal.capabilities()
    }

    pub fn filter_capabilities(&self) -> BleFilterCapabilities {
        self.pal.filter_capabilities()
    }

    pub fn start_scan(
        &mut self,
        ev: &mut EventLoop,
        owner: InstanceId,
        mode: BleScanMode,
        report_delay_ms: u32,
        filters: Vec<BleScanFilter>,
        cookie: u64,
    ) -> bool {
        for filter in &filters {
            if !filter.is_valid() {
                warn!(
                    "ble: rejecting {:?} filter with {} bytes (expected {})",
                    filter.kind,
                    filter.data.len(),
                    filter.kind.expected_len()
                );
                return false;
            }
        }
        let request = BleRequest::enabled(mode, report_delay_ms, filters);
        let pal = &mut self.pal;
        self.inner
            .configure(ev, owner, request, cookie, |r| Self::apply(pal, r))
    }

    pub fn stop_scan(&mut self, ev: &mut EventLoop, owner: InstanceId, cookie: u64) -> bool {
        let pal = &mut self.pal;
        self.inner
            .configure(ev, owner, BleRequest::disabled(), cookie, |r| {
                Self::apply(pal, r)
            })
    }

    /// Deferred PAL completion, dispatched on the loop thread.
    pub fn handle_scan_response(&mut self, ev: &mut EventLoop, error: AsyncError) {
        let pal = &mut self.pal;
        self.inner
            .handle_response(ev, error, |r| Self::apply(pal, r));
    }

    /// Fan-out of one advertisement report to every subscribed nanoapp.
    pub fn handle_advertisement(&self, ev: &EventLoop, report: BleAdvertisement) {
        self.inner.post_report(ev, report);
    }

    /// Sweep for a stopping nanoapp.
    pub fn disable_for(&mut self, ev: &mut EventLoop, owner: InstanceId) {
        let pal = &mut self.pal;
        self.inner.disable_for(ev, owner, |r| Self::apply(pal, r));
    }

    pub fn inner(&self) -> &ResourceManager<BleRequest> {
        &self.inner
    }

    fn apply(pal: &mut Box<dyn BlePal>, request: &BleRequest) -> bool {
        if request.is_enabled() {
            pal.start_scan(request)
        } else {
            pal.stop_scan()
        }
    }
}
