//! GNSS location-session requests and manager.

#[cfg(not(feature = "std"))]
use alloc::boxed::Box;

use ctxhub_core::{
    AsyncError, EventType, GnssCapabilities, InstanceId, Nanoseconds, RequestType,
};
use ctxhub_evloop::EventLoop;

use crate::manager::ResourceManager;
use crate::request::Request;

/// One nanoapp's location-session request.
///
/// `min_interval_ms` is the longest report interval the nanoapp tolerates;
/// the platform gets the minimum across requesters. The disabled identity
/// carries an unbounded interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GnssRequest {
    enabled: bool,
    pub min_interval_ms: u32,
}

impl GnssRequest {
    pub fn enabled(min_interval_ms: u32) -> Self {
        Self {
            enabled: true,
            min_interval_ms,
        }
    }
}

impl Request for GnssRequest {
    fn disabled() -> Self {
        Self {
            enabled: false,
            min_interval_ms: u32::MAX,
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
        if other.min_interval_ms < self.min_interval_ms {
            self.min_interval_ms = other.min_interval_ms;
            changed = true;
        }
        changed
    }
}

/// Broadcast payload of [`EventType::GNSS_LOCATION`] events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GnssLocation {
    pub latitude_deg_e7: i32,
    pub longitude_deg_e7: i32,
    pub accuracy_mm: u32,
    pub timestamp: Nanoseconds,
}

/// Platform abstraction for the GNSS subsystem.
pub trait GnssPal: Send {
    fn capabilities(&self) -> GnssCapabilities;
    fn start_location_session(&mut self, request: &GnssRequest) -> bool;
    fn stop_location_session(&mut self) -> bool;
}

pub struct GnssRequestManager {
    pal: Box<dyn GnssPal>,
    inner: ResourceManager<GnssRequest>,
}

impl GnssRequestManager {
    pub fn new(pal: Box<dyn GnssPal>) -> Self {
        Self {
            pal,
            inner: ResourceManager::new(
                RequestType::Gnss,
                EventType::GNSS_ASYNC_RESULT,
                EventType::GNSS_LOCATION,
            ),
        }
    }

    pub fn capabilities(&self) -> GnssCapabilities {
        self.pal.capabilities()
    }

    pub fn start_location_session(
        &mut self,
        ev: &mut EventLoop,
        owner: InstanceId,
        min_interval_ms: u32,
        cookie: u64,
    ) -> bool {
        let pal = &mut self.pal;
        self.inner.configure(
            ev,
            owner,
            GnssRequest::enabled(min_interval_ms),
            cookie,
            |r| Self::apply(pal, r),
        )
    }

    pub fn stop_location_session(
        &mut self,
        ev: &mut EventLoop,
        owner: InstanceId,
        cookie: u64,
    ) -> bool {
        let pal = &mut self.pal;
        self.inner
            .configure(ev, owner, GnssRequest::disabled(), cookie, |r| {
                Self::apply(pal, r)
            })
    }

    pub fn handle_session_response(&mut self, ev: &mut EventLoop, error: AsyncError) {
        let pal = &mut self.pal;
        self.inner
            .handle_response(ev, error, |r| Self::apply(pal, r));
    }

    pub fn handle_location(&self, ev: &EventLoop, report: GnssLocation) {
        self.inner.post_report(ev, report);
    }

    pub fn disable_for(&mut self, ev: &mut EventLoop, owner: InstanceId) {
        let pal = &mut self.pal;
        self.inner.disable_for(ev, owner, |r| Self::apply(pal, r));
    }

    pub fn inner(&self) -> &ResourceManager<GnssRequest> {
        &self.inner
    }

    fn apply(pal: &mut Box<dyn GnssPal>, request: &GnssRequest) -> bool {
        if request.is_enabled() {
            pal.start_location_session(request)
        } else {
            pal.stop_location_session()
        }
    }
}
