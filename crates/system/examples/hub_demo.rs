//! Hosted hub demo: a heartbeat nanoapp driven by a real thread-backed
//! timer, with stub platform bindings that complete their transitions
//! through the inbound queue. Ctrl-C stops the hub.

use std::sync::{Arc, Mutex};

use ctxhub_core::{
    AppId, AsyncError, AsyncResult, AudioCapabilities, BleCapabilities, BleFilterCapabilities,
    Event, EventType, GnssCapabilities, Nanoseconds, SlotHandle, SystemCallback, TimerFired,
    WifiCapabilities, WwanCapabilities,
};
use ctxhub_evloop::EventPoster;
use ctxhub_host::{HostLink, HostMessage};
use ctxhub_req::{
    AudioPal, AudioRequest, BlePal, BleRequest, BleScanMode, GnssPal, GnssRequest, WifiPal,
    WifiRequest, WwanPal,
};
use ctxhub_system::{Hub, HubApi, HubConfig, Nanoapp, Platform};
use ctxhub_timer::{StdClock, ThreadTimer};

/// The poster only exists once the hub does, so the stubs receive it
/// through a shared late-bound slot.
#[derive(Clone, Default)]
struct PosterSlot(Arc<Mutex<Option<EventPoster>>>);

impl PosterSlot {
    fn bind(&self, poster: EventPoster) {
        *self.0.lock().unwrap() = Some(poster);
    }

    fn complete(&self, callback: SystemCallback) {
        if let Some(poster) = self.0.lock().unwrap().as_ref() {
            let _ = poster.post_callback(callback);
        }
    }
}

/// Platform stubs that accept every request and ack it right away.
#[derive(Clone)]
struct StubPal(PosterSlot);

impl BlePal for StubPal {
    fn capabilities(&self) -> BleCapabilities {
        BleCapabilities::SCAN
    }
    fn filter_capabilities(&self) -> BleFilterCapabilities {
        BleFilterCapabilities::RSSI
    }
    fn start_scan(&mut self, _request: &BleRequest) -> bool {
        self.0.complete(SystemCallback::BleScanResponse {
            error: AsyncError::None,
        });
        true
    }
    fn stop_scan(&mut self) -> bool {
        self.0.complete(SystemCallback::BleScanResponse {
            error: AsyncError::None,
        });
        true
    }
}

impl GnssPal for StubPal {
    fn capabilities(&self) -> GnssCapabilities {
        GnssCapabilities::empty()
    }
    fn start_location_session(&mut self, _request: &GnssRequest) -> bool {
        false
    }
    fn stop_location_session(&mut self) -> bool {
        false
    }
}

impl WifiPal for StubPal {
    fn capabilities(&self) -> WifiCapabilities {
        WifiCapabilities::empty()
    }
    fn start_scan_monitor(&mut self, _request: &WifiRequest) -> bool {
        false
    }
    fn stop_scan_monitor(&mut self) -> bool {
        false
    }
}

impl WwanPal for StubPal {
    fn capabilities(&self) -> WwanCapabilities {
        WwanCapabilities::empty()
    }
    fn start_cell_info(&mut self) -> bool {
        false
    }
    fn stop_cell_info(&mut self) -> bool {
        false
    }
}

impl AudioPal for StubPal {
    fn capabilities(&self) -> AudioCapabilities {
        AudioCapabilities::empty()
    }
    fn start_source(&mut self, _request: &AudioRequest) -> bool {
        false
    }
    fn stop_source(&mut self) -> bool {
        false
    }
}

/// Host link that prints outbound messages and completes them.
#[derive(Clone)]
struct StdoutLink(PosterSlot);

impl HostLink for StdoutLink {
    fn send(&mut self, handle: SlotHandle, message: &HostMessage) -> bool {
        println!(
            "[host] {} sent {} bytes to endpoint {:#06x}",
            message.app_id,
            message.data.len(),
            message.host_endpoint
        );
        self.0.complete(SystemCallback::HostMessageDelivered {
            handle,
            error: AsyncError::None,
        });
        true
    }
}

struct HeartbeatApp {
    beats: u64,
}

impl Nanoapp for HeartbeatApp {
    fn app_id(&self) -> AppId {
        AppId::new(0x0062_6561_7462_6561)
    }

    fn on_start(&mut self, api: &mut HubApi<'_>) -> bool {
        println!("[app] starting, ble caps: {:?}", api.ble_capabilities());
        api.set_timer(Nanoseconds::from_secs(1), 0, false).is_ok()
            && api.ble_start_scan(BleScanMode::Background, 0, vec![], 1)
    }

    fn on_event(&mut self, api: &mut HubApi<'_>, event: &Event) {
        match event.event_type() {
            EventType::TIMER => {
                if let Some(fired) = event.payload_as::<TimerFired>() {
                    self.beats += 1;
                    println!("[app] heartbeat {} (timer {})", self.beats, fired.handle);
                    api.send_message_to_host(self.beats.to_le_bytes().to_vec(), 1, 0x0010, None);
                }
            }
            EventType::BLE_ASYNC_RESULT => {
                if let Some(result) = event.payload_as::<AsyncResult>() {
                    println!("[app] ble scan transition: success={}", result.success);
                }
            }
            other => println!("[app] event {other}"),
        }
    }

    fn on_stop(&mut self, _api: &mut HubApi<'_>) {
        println!("[app] stopping after {} heartbeats", self.beats);
    }
}

fn main() {
    let slot = PosterSlot::default();
    let clock = Arc::new(StdClock::new());

    let mut hub = Hub::new(
        HubConfig::default(),
        Platform {
            ble: Box::new(StubPal(slot.clone())),
            gnss: Box::new(StubPal(slot.clone())),
            wifi: Box::new(StubPal(slot.clone())),
            wwan: Box::new(StubPal(slot.clone())),
            audio: Box::new(StubPal(slot.clone())),
            host_link: Box::new(StdoutLink(slot.clone())),
            timer: Box::new(deferred_timer(&slot, &clock)),
            clock,
        },
    );
    slot.bind(hub.poster());

    let stop = hub.stop_handle();
    ctrlc::set_handler(move || stop.stop()).expect("failed to install the Ctrl-C handler");

    let app = hub
        .start_nanoapp(Box::new(HeartbeatApp { beats: 0 }))
        .expect("heartbeat nanoapp failed to start");
    println!("[hub] running {app}, press Ctrl-C to stop");

    hub.run();
    let _ = hub.stop_nanoapp(app);
}

fn deferred_timer(slot: &PosterSlot, clock: &Arc<StdClock>) -> impl ctxhub_timer::SystemTimer {
    DeferredTimer {
        slot: slot.clone(),
        clock: Arc::clone(clock) as Arc<dyn ctxhub_timer::Clock>,
        inner: None,
    }
}

/// Thread timer whose poster arrives after hub construction; the real
/// [`ThreadTimer`] spawns on first arm, by which time the slot is bound.
struct DeferredTimer {
    slot: PosterSlot,
    clock: Arc<dyn ctxhub_timer::Clock>,
    inner: Option<ThreadTimer>,
}

impl ctxhub_timer::SystemTimer for DeferredTimer {
    fn arm(&mut self, deadline: Nanoseconds) {
        if self.inner.is_none() {
            let poster = self
                .slot
                .0
                .lock()
                .unwrap()
                .clone()
                .expect("timer armed before the poster was bound");
            self.inner = Some(ThreadTimer::new(poster, Arc::clone(&self.clock)));
        }
        if let Some(timer) = self.inner.as_mut() {
            timer.arm(deadline);
        }
    }

    fn cancel(&mut self) {
        if let Some(timer) = self.inner.as_mut() {
            timer.cancel();
        }
    }
}
