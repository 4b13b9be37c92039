//! Audio source requests and manager.

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, vec::Vec};

use ctxhub_core::{AudioCapabilities, AsyncError, EventType, InstanceId, RequestType};
use ctxhub_evloop::EventLoop;

use crate::manager::ResourceManager;
use crate::request::Request;

/// One nanoapp's audio-source request; the platform gets the minimum buffer
/// duration across requesters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioRequest {
    enabled: bool,
    pub buffer_duration_ms: u32,
}

impl AudioRequest {
    pub fn enabled(buffer_duration_ms: u32) -> Self {
        Self {
            enabled: true,
            buffer_duration_ms,
        }
    }
}

impl Request for AudioRequest {
    fn disabled() -> Self {
        Self {
            enabled: false,
            buffer_duration_ms: u32::MAX,
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
        if other.buffer_duration_ms < self.buffer_duration_ms {
            self.buffer_duration_ms = other.buffer_duration_ms;
            changed = true;
        }
        changed
    }
}

/// Broadcast payload of [`EventType::AUDIO_DATA`] events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDataBlock {
    pub sample_rate_hz: u32,
    pub samples: Vec<i16>,
}

/// Platform abstraction for the audio subsystem.
pub trait AudioPal: Send {
    fn capabilities(&self) -> AudioCapabilities;
    fn start_source(&mut self, request: &AudioRequest) -> bool;
    fn stop_source(&mut self) -> bool;
}

pub struct AudioRequestManager {
    pal: Box<dyn AudioPal>,
    inner: ResourceManager<AudioRequest>,
}

impl AudioRequestManager {
    pub fn new(pal: Box<dyn AudioPal>) -> Self {
        Self {
            pal,
            inner: ResourceManager::new(
                RequestType::Audio,
                EventType::AUDIO_ASYNC_RESULT,
                EventType::AUDIO_DATA,
            ),
        }
    }

    pub fn capabilities(&self) -> AudioCapabilities {
        self.pal.capabilities()
    }

    pub fn start_source(
        &mut self,
        ev: &mut EventLoop,
        owner: InstanceId,
        buffer_duration_ms: u32,
        cookie: u64,
    ) -> bool {
        let pal = &mut self.pal;
        self.inner.configure(
            ev,
            owner,
            AudioRequest::enabled(buffer_duration_ms),
            cookie,
            |r| Self::apply(pal, r),
        )
    }

    pub fn stop_source(&mut self, ev: &mut EventLoop, owner: InstanceId, cookie: u64) -> bool {
        let pal = &mut self.pal;
        self.inner
            .configure(ev, owner, AudioRequest::disabled(), cookie, |r| {
                Self::apply(pal, r)
            })
    }

    pub fn handle_source_response(&mut self, ev: &mut EventLoop, error: AsyncError) {
        let pal = &mut self.pal;
        self.inner
            .handle_response(ev, error, |r| Self::apply(pal, r));
    }

    pub fn handle_audio_data(&self, ev: &EventLoop, report: AudioDataBlock) {
        self.inner.post_report(ev, report);
    }

    pub fn disable_for(&mut self, ev: &mut EventLoop, owner: InstanceId) {
        let pal = &mut self.pal;
        self.inner.disable_for(ev, owner, |r| Self::apply(pal, r));
    }

    pub fn inner(&self) -> &ResourceManager<AudioRequest> {
        &self.inner
    }

    fn apply(pal: &mut Box<dyn AudioPal>, request: &AudioRequest) -> bool {
        if request.is_enabled() {
            pal.start_source(request)
        } else {
            pal.stop_source()
        }
    }
}
