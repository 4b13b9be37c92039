use std::sync::{Arc, Mutex};

use ctxhub_core::{
    AppId, AsyncError, AsyncResult, BleCapabilities, BleFilterCapabilities, EventType,
    GnssCapabilities, InstanceId,
};
use ctxhub_evloop::{EventLoop, Inbound};

use crate::ble::{BleFilterKind, BlePal, BleRequest, BleRequestManager, BleScanFilter, BleScanMode};
use crate::gnss::{GnssPal, GnssRequest, GnssRequestManager};
use crate::request::{Request, RequestStatus};

#[derive(Debug, Clone, PartialEq)]
enum PalCall {
    BleStart(BleRequest),
    BleStop,
    GnssStart(GnssRequest),
    GnssStop,
}

#[derive(Clone)]
struct FakePal {
    calls: Arc<Mutex<Vec<PalCall>>>,
    accept: Arc<Mutex<bool>>,
}

impl FakePal {
    fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            accept: Arc::new(Mutex::new(true)),
        }
    }

    fn reject_next(&self) {
        *self.accept.lock().unwrap() = false;
    }

    fn record(&self, call: PalCall) -> bool {
        self.calls.lock().unwrap().push(call);
        std::mem::replace(&mut *self.accept.lock().unwrap(), true)
    }

    fn calls(&self) -> Vec<PalCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl BlePal for FakePal {
    fn capabilities(&self) -> BleCapabilities {
        BleCapabilities::SCAN
            | BleCapabilities::SCAN_RESULT_BATCHING
            | BleCapabilities::SCAN_FILTER_BEST_EFFORT
    }

    fn filter_capabilities(&self) -> BleFilterCapabilities {
        BleFilterCapabilities::RSSI | BleFilterCapabilities::SERVICE_DATA_UUID
    }

    fn start_scan(&mut self, request: &BleRequest) -> bool {
        self.record(PalCall::BleStart(request.clone()))
    }

    fn stop_scan(&mut self) -> bool {
        self.record(PalCall::BleStop)
    }
}

impl GnssPal for FakePal {
    fn capabilities(&self) -> GnssCapabilities {
        GnssCapabilities::LOCATION
    }

    fn start_location_session(&mut self, request: &GnssRequest) -> bool {
        self.record(PalCall::GnssStart(*request))
    }

    fn stop_location_session(&mut self) -> bool {
        self.record(PalCall::GnssStop)
    }
}

fn loop_with_apps(count: u64) -> (EventLoop, Vec<InstanceId>) {
    let mut ev = EventLoop::new(16, 16);
    let apps = (1..=count)
        .map(|id| ev.create_nanoapp(AppId::new(id)).unwrap())
        .collect();
    (ev, apps)
}

/// Drains the inbound queue and returns the async results delivered to `app`.
fn async_results_for(ev: &mut EventLoop, app: InstanceId) -> Vec<AsyncResult> {
    while let Some(item) = ev.inbound().try_pop() {
        match item {
            Inbound::Event(handle) => ev.distribute(handle).unwrap(),
            Inbound::Callback(cb) => panic!("unexpected callback {cb:?}"),
        }
    }
    let mut results = Vec::new();
    while ev.nanoapp(app).is_some_and(|a| a.has_pending_event()) {
        let (handle, event) = ev.pop_event_for(app).unwrap();
        if let Some(result) = event.payload_as::<AsyncResult>() {
            results.push(*result);
        }
        ev.finish_delivery(handle);
    }
    results
}

#[test]
fn merge_is_commutative_in_effect() {
    let a = BleRequest::enabled(
        BleScanMode::Background,
        100,
        vec![BleScanFilter::new(BleFilterKind::Rssi, vec![0x10])],
    );
    let b = BleRequest::enabled(
        BleScanMode::Foreground,
        50,
        vec![BleScanFilter::new(BleFilterKind::ServiceDataUuid16, vec![0xfe, 0x2c])],
    );

    let mut ab = BleRequest::disabled();
    ab.merge_from(&a);
    ab.merge_from(&b);
    let mut ba = BleRequest::disabled();
    ba.merge_from(&b);
    ba.merge_from(&a);

    assert_eq!(ab.mode, ba.mode);
    assert_eq!(ab.report_delay_ms, ba.report_delay_ms);
    assert_eq!(ab.filters.len(), 2);
    assert_eq!(ba.filters.len(), 2);
    for filter in &ab.filters {
        assert!(ba.filters.contains(filter));
    }
}

#[test]
fn gnss_merge_keeps_minimum_interval_either_order() {
    let a = GnssRequest::enabled(1000);
    let b = GnssRequest::enabled(500);

    let mut ab = GnssRequest::disabled();
    ab.merge_from(&a);
    ab.merge_from(&b);
    let mut ba = GnssRequest::disabled();
    ba.merge_from(&b);
    ba.merge_from(&a);

    assert_eq!(ab.min_interval_ms, 500);
    assert_eq!(ab, ba);
}

#[test]
fn capabilities_need_no_permission_grant() {
    let pal = FakePal::new();
    let mgr = BleRequestManager::new(Box::new(pal.clone()));
    assert_eq!(
        mgr.capabilities(),
        BleCapabilities::SCAN
            | BleCapabilities::SCAN_RESULT_BATCHING
            | BleCapabilities::SCAN_FILTER_BEST_EFFORT
    );
    assert_eq!(
        mgr.filter_capabilities(),
        BleFilterCapabilities::RSSI | BleFilterCapabilities::SERVICE_DATA_UUID
    );
    assert!(pal.calls().is_empty(), "capability queries are passive");
}

#[test]
fn malformed_filter_is_rejected_before_any_state_change() {
    let (mut ev, apps) = loop_with_apps(1);
    let pal = FakePal::new();
    let mut mgr = BleRequestManager::new(Box::new(pal.clone()));

    let bad = BleScanFilter::new(BleFilterKind::ServiceDataUuid16, vec![0xfe, 0x2c, 0x00]);
    assert!(!mgr.start_scan(&mut ev, apps[0], BleScanMode::Foreground, 0, vec![bad], 1));

    assert!(pal.calls().is_empty(), "no platform call");
    assert!(mgr.inner().multiplexer().is_empty(), "no multiplexer mutation");
    assert_eq!(async_results_for(&mut ev, apps[0]), Vec::new());
}

#[test]
fn accepted_request_resolves_with_exactly_one_async_result() {
    let (mut ev, apps) = loop_with_apps(1);
    let pal = FakePal::new();
    let mut mgr = BleRequestManager::new(Box::new(pal.clone()));

    assert!(mgr.start_scan(&mut ev, apps[0], BleScanMode::Background, 0, vec![], 7));
    assert!(mgr.inner().in_flight());
    assert_eq!(async_results_for(&mut ev, apps[0]), Vec::new());

    mgr.handle_scan_response(&mut ev, AsyncError::None);
    let results = async_results_for(&mut ev, apps[0]);
    assert_eq!(results.len(), 1);
    assert!(results[0].success);
    assert_eq!(results[0].cookie, 7);
    assert!(
        ev.nanoapp(apps[0]).unwrap().is_registered_for(EventType::BLE_ADVERTISEMENT),
        "subscribed to advertisements on success"
    );
}

#[test]
fn noop_request_never_calls_the_platform() {
    let (mut ev, apps) = loop_with_apps(2);
    let pal = FakePal::new();
    let mut mgr = BleRequestManager::new(Box::new(pal.clone()));

    assert!(mgr.start_scan(&mut ev, apps[0], BleScanMode::Foreground, 100, vec![], 1));
    mgr.handle_scan_response(&mut ev, AsyncError::None);
    assert_eq!(pal.calls().len(), 1);
    async_results_for(&mut ev, apps[0]);

    // A second nanoapp asking for a subset of the applied state.
    assert!(mgr.start_scan(&mut ev, apps[1], BleScanMode::Background, 100, vec![], 2));
    assert_eq!(pal.calls().len(), 1, "short-circuit, no platform call");
    let results = async_results_for(&mut ev, apps[1]);
    assert_eq!(results.len(), 1);
    assert!(results[0].success);
    assert!(ev.nanoapp(apps[1]).unwrap().is_registered_for(EventType::BLE_ADVERTISEMENT));
}

#[test]
fn rejection_rolls_the_multiplexer_back() {
    let (mut ev, apps) = loop_with_apps(1);
    let pal = FakePal::new();
    let mut mgr = BleRequestManager::new(Box::new(pal.clone()));

    pal.reject_next();
    assert!(!mgr.start_scan(&mut ev, apps[0], BleScanMode::Foreground, 0, vec![], 3));

    assert_eq!(pal.calls().len(), 1, "the one rejected call");
    assert!(mgr.inner().multiplexer().entry(apps[0]).is_none());
    assert!(!mgr.inner().in_flight());
    assert!(!ev.nanoapp(apps[0]).unwrap().is_registered_for(EventType::BLE_ADVERTISEMENT));
    assert_eq!(async_results_for(&mut ev, apps[0]), Vec::new());
}

#[test]
fn at_most_one_transition_in_flight() {
    let (mut ev, apps) = loop_with_apps(2);
    let pal = FakePal::new();
    let mut mgr = BleRequestManager::new(Box::new(pal.clone()));

    assert!(mgr.start_scan(&mut ev, apps[0], BleScanMode::Background, 0, vec![], 1));
    assert_eq!(pal.calls().len(), 1);

    // Second request queues behind the in-flight transition.
    assert!(mgr.start_scan(&mut ev, apps[1], BleScanMode::Foreground, 0, vec![], 2));
    assert_eq!(pal.calls().len(), 1, "no overlapping platform call");
    let mux = mgr.inner().multiplexer();
    assert_eq!(mux.owners_with_status(RequestStatus::PendingResp), vec![apps[0]]);
    assert_eq!(mux.owners_with_status(RequestStatus::PendingReq), vec![apps[1]]);

    // Resolving the first drains the queued transition, still one at a time.
    mgr.handle_scan_response(&mut ev, AsyncError::None);
    assert_eq!(pal.calls().len(), 2);
    let mux = mgr.inner().multiplexer();
    assert_eq!(mux.owners_with_status(RequestStatus::PendingResp), vec![apps[1]]);

    mgr.handle_scan_response(&mut ev, AsyncError::None);
    assert!(!mgr.inner().in_flight());
    assert_eq!(async_results_for(&mut ev, apps[0]).len(), 1);
    assert_eq!(async_results_for(&mut ev, apps[1]).len(), 1);
}

#[test]
fn re_request_while_in_flight_resolves_both_cookies() {
    let (mut ev, apps) = loop_with_apps(1);
    let pal = FakePal::new();
    let mut mgr = BleRequestManager::new(Box::new(pal.clone()));

    assert!(mgr.start_scan(&mut ev, apps[0], BleScanMode::Background, 0, vec![], 1));
    assert!(mgr.start_scan(&mut ev, apps[0], BleScanMode::Background, 0, vec![], 2));
    assert_eq!(pal.calls().len(), 1, "second request queues behind the first");

    mgr.handle_scan_response(&mut ev, AsyncError::None);
    let results = async_results_for(&mut ev, apps[0]);
    assert_eq!(
        results.iter().map(|r| r.cookie).collect::<Vec<_>>(),
        vec![1, 2],
        "both accepted requests resolve, oldest first"
    );
    assert!(results.iter().all(|r| r.success));
    assert!(!mgr.inner().in_flight());
}

#[test]
fn async_failure_discards_the_whole_transition() {
    let (mut ev, apps) = loop_with_apps(1);
    let pal = FakePal::new();
    let mut mgr = BleRequestManager::new(Box::new(pal.clone()));

    assert!(mgr.start_scan(&mut ev, apps[0], BleScanMode::Background, 0, vec![], 9));
    mgr.handle_scan_response(&mut ev, AsyncError::Rejected);

    let results = async_results_for(&mut ev, apps[0]);
    assert_eq!(results.len(), 1);
    assert!(!results[0].success);
    assert_eq!(results[0].error, AsyncError::Rejected);
    assert!(mgr.inner().multiplexer().is_empty(), "entries never took effect");
    assert!(!ev.nanoapp(apps[0]).unwrap().is_registered_for(EventType::BLE_ADVERTISEMENT));
}

#[test]
fn stop_without_prior_state_is_a_noop_success() {
    let (mut ev, apps) = loop_with_apps(1);
    let pal = FakePal::new();
    let mut mgr = BleRequestManager::new(Box::new(pal.clone()));

    assert!(mgr.stop_scan(&mut ev, apps[0], 4));
    assert!(pal.calls().is_empty());
    let results = async_results_for(&mut ev, apps[0]);
    assert_eq!(results.len(), 1);
    assert!(results[0].success);
    assert_eq!(results[0].cookie, 4);
}

#[test]
fn stopping_the_last_requester_transitions_the_platform_down() {
    let (mut ev, apps) = loop_with_apps(1);
    let pal = FakePal::new();
    let mut mgr = GnssRequestManager::new(Box::new(pal.clone()));

    assert!(mgr.start_location_session(&mut ev, apps[0], 500, 1));
    mgr.handle_session_response(&mut ev, AsyncError::None);
    async_results_for(&mut ev, apps[0]);

    assert!(mgr.stop_location_session(&mut ev, apps[0], 2));
    assert_eq!(
        pal.calls(),
        vec![PalCall::GnssStart(GnssRequest::enabled(500)), PalCall::GnssStop]
    );
    mgr.handle_session_response(&mut ev, AsyncError::None);
    let results = async_results_for(&mut ev, apps[0]);
    assert_eq!(results.len(), 1);
    assert!(results[0].success);
    assert!(mgr.inner().multiplexer().is_empty(), "disabled entries pruned");
    assert!(!ev.nanoapp(apps[0]).unwrap().is_registered_for(EventType::GNSS_LOCATION));
}

#[test]
fn sweep_on_unload_disables_the_platform() {
    let (mut ev, apps) = loop_with_apps(1);
    let pal = FakePal::new();
    let mut mgr = GnssRequestManager::new(Box::new(pal.clone()));

    assert!(mgr.start_location_session(&mut ev, apps[0], 1000, 1));
    mgr.handle_session_response(&mut ev, AsyncError::None);
    async_results_for(&mut ev, apps[0]);

    mgr.disable_for(&mut ev, apps[0]);
    assert!(mgr.inner().multiplexer().is_empty());
    assert_eq!(pal.calls().last(), Some(&PalCall::GnssStop));
    mgr.handle_session_response(&mut ev, AsyncError::None);
    assert_eq!(async_results_for(&mut ev, apps[0]), Vec::new());
    assert!(!mgr.inner().in_flight());
}

#[test]
fn gnss_priority_scenario_yields_the_minimum_interval() {
    let (mut ev, apps) = loop_with_apps(2);
    let pal = FakePal::new();
    let mut mgr = GnssRequestManager::new(Box::new(pal.clone()));

    assert!(mgr.start_location_session(&mut ev, apps[0], 1000, 1));
    mgr.handle_session_response(&mut ev, AsyncError::None);
    assert!(mgr.start_location_session(&mut ev, apps[1], 500, 2));
    mgr.handle_session_response(&mut ev, AsyncError::None);

    assert_eq!(
        pal.calls(),
        vec![
            PalCall::GnssStart(GnssRequest::enabled(1000)),
            PalCall::GnssStart(GnssRequest::enabled(500)),
        ]
    );
    assert_eq!(mgr.inner().applied().min_interval_ms, 500);
}
