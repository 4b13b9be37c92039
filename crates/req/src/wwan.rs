//! WWAN cell-info requests and manager.

#[cfg(not(feature = "std"))]
use alloc::boxed::Box;

use ctxhub_core::{AsyncError, EventType, InstanceId, RequestType, WwanCapabilities};
use ctxhub_evloop::EventLoop;

use crate::manager::ResourceManager;
use crate::request::Request;

/// WWAN carries no tunable attributes; a request is just on or off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WwanRequest {
    enabled: bool,
}

impl WwanRequest {
    pub fn enabled() -> Self {
        Self { enabled: true }
    }
}

impl Request for WwanRequest {
    fn disabled() -> Self {
        Self { enabled: false }
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn merge_from(&mut self, other: &Self) -> bool {
        if other.enabled && !self.enabled {
            self.enabled = true;
            return true;
        }
        false
    }
}

/// Broadcast payload of [`EventType::WWAN_CELL_INFO`] events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WwanCellInfo {
    pub cell_id: u32,
    pub signal_strength_dbm: i32,
}

/// Platform abstraction for the WWAN subsystem.
pub trait WwanPal: Send {
    fn capabilities(&self) -> WwanCapabilities;
    fn start_cell_info(&mut self) -> bool;
    fn stop_cell_info(&mut self) -> bool;
}

pub struct WwanRequestManager {
    pal: Box<dyn WwanPal>,
    inner: ResourceManager<WwanRequest>,
}

impl WwanRequestManager {
    pub fn new(pal: Box<dyn WwanPal>) -> Self {
        Self {
            pal,
            inner: ResourceManager::new(
                RequestType::Wwan,
                EventType::WWAN_ASYNC_RESULT,
                EventType::WWAN_CELL_INFO,
            ),
        }
    }

    pub fn capabilities(&self) -> WwanCapabilities {
        self.pal.capabilities()
    }

    pub fn start_cell_info(&mut self, ev: &mut EventLoop, owner: InstanceId, cookie: u64) -> bool {
        let pal = &mut self.pal;
        self.inner
            .configure(ev, owner, WwanRequest::enabled(), cookie, |r| {
                Self::apply(pal, r)
            })
    }

    pub fn stop_cell_info(&mut self, ev: &mut EventLoop, owner: InstanceId, cookie: u64) -> bool {
        let pal = &mut self.pal;
        self.inner
            .configure(ev, owner, WwanRequest::disabled(), cookie, |r| {
                Self::apply(pal, r)
            })
    }

    pub fn handle_response(&mut self, ev: &mut EventLoop, error: AsyncError) {
        let pal = &mut self.pal;
        self.inner
            .handle_response(ev, error, |r| Self::apply(pal, r));
    }

    pub fn handle_cell_info(&self, ev: &EventLoop, report: WwanCellInfo) {
        self.inner.post_report(ev, report);
    }

    pub fn disable_for(&mut self, ev: &mut EventLoop, owner: InstanceId) {
        let pal = &mut self.pal;
        self.inner.disable_for(ev, owner, |r| Self::apply(pal, r));
    }

    pub fn inner(&self) -> &ResourceManager<WwanRequest> {
        &self.inner
    }

    fn apply(pal: &mut Box<dyn WwanPal>, request: &WwanRequest) -> bool {
        if request.is_enabled() {
            pal.start_cell_info()
        } else {
            pal.stop_cell_info()
        }
    }
}
