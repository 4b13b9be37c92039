use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ctxhub_core::{AppId, AsyncError, EventType, FreeHook, InstanceId, SlotHandle};
use ctxhub_evloop::{EventLoop, Inbound};

use crate::{
    HostCommsManager, HostLink, HostMessage, HostMessageReceived, HOST_ENDPOINT_BROADCAST,
    HOST_ENDPOINT_UNSPECIFIED,
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct SentMessage {
    handle: SlotHandle,
    app_id: AppId,
    host_endpoint: u16,
    data: Vec<u8>,
}

#[derive(Clone)]
struct FakeLink {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    accept: Arc<Mutex<bool>>,
}

impl FakeLink {
    fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            accept: Arc::new(Mutex::new(true)),
        }
    }

    fn reject_next(&self) {
        *self.accept.lock().unwrap() = false;
    }

    fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }
}

impl HostLink for FakeLink {
    fn send(&mut self, handle: SlotHandle, message: &HostMessage) -> bool {
        self.sent.lock().unwrap().push(SentMessage {
            handle,
            app_id: message.app_id,
            host_endpoint: message.host_endpoint,
            data: message.data.clone(),
        });
        std::mem::replace(&mut *self.accept.lock().unwrap(), true)
    }
}

const APP: AppId = AppId(0x0123_4567_89ab_cdef);
const SENDER: InstanceId = InstanceId(1);

fn counting_hook(counter: &Arc<AtomicUsize>) -> Option<FreeHook> {
    let counter = Arc::clone(counter);
    Some(Box::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }))
}

fn manager(link: &FakeLink) -> HostCommsManager {
    HostCommsManager::new(Box::new(link.clone()), 4, 128)
}

#[test]
fn oversized_message_is_rejected_without_allocation() {
    let link = FakeLink::new();
    let mut mgr = manager(&link);
    let frees = Arc::new(AtomicUsize::new(0));

    let accepted = mgr.send_message_to_host(
        APP,
        SENDER,
        vec![0; 129],
        1,
        0x0010,
        counting_hook(&frees),
    );
    assert!(!accepted);
    assert!(link.sent().is_empty());
    assert_eq!(mgr.outbound_stats().used, 0);
    assert_eq!(frees.load(Ordering::SeqCst), 1, "ownership returned inline");
}

#[test]
fn unspecified_endpoint_is_rejected() {
    let link = FakeLink::new();
    let mut mgr = manager(&link);
    let frees = Arc::new(AtomicUsize::new(0));

    let accepted = mgr.send_message_to_host(
        APP,
        SENDER,
        vec![1, 2, 3],
        1,
        HOST_ENDPOINT_UNSPECIFIED,
        counting_hook(&frees),
    );
    assert!(!accepted);
    assert!(link.sent().is_empty());
    assert_eq!(frees.load(Ordering::SeqCst), 1);
}

#[test]
fn transport_rejection_releases_the_record_inline() {
    let link = FakeLink::new();
    let mut mgr = manager(&link);
    let frees = Arc::new(AtomicUsize::new(0));

    link.reject_next();
    let accepted =
        mgr.send_message_to_host(APP, SENDER, vec![1], 1, 0x0010, counting_hook(&frees));
    assert!(!accepted);
    assert_eq!(link.sent().len(), 1, "the transport did see the record");
    assert_eq!(mgr.outbound_stats().used, 0);
    assert_eq!(frees.load(Ordering::SeqCst), 1);
}

#[test]
fn accepted_message_is_released_on_completion() {
    let link = FakeLink::new();
    let mut mgr = manager(&link);
    let frees = Arc::new(AtomicUsize::new(0));

    let accepted = mgr.send_message_to_host(
        APP,
        SENDER,
        vec![0xca, 0xfe],
        7,
        HOST_ENDPOINT_BROADCAST,
        counting_hook(&frees),
    );
    assert!(accepted);
    let sent = link.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].app_id, APP, "record carries the sender's identity");
    assert_eq!(sent[0].data, vec![0xca, 0xfe]);
    assert_eq!(mgr.outbound_stats().used, 1);
    assert_eq!(frees.load(Ordering::SeqCst), 0, "transport still owns it");

    mgr.handle_delivered(sent[0].handle, AsyncError::None);
    assert_eq!(mgr.outbound_stats().used, 0);
    assert_eq!(frees.load(Ordering::SeqCst), 1);

    // A duplicate completion must not double-free.
    mgr.handle_delivered(sent[0].handle, AsyncError::None);
    assert_eq!(frees.load(Ordering::SeqCst), 1);
}

#[test]
fn failed_delivery_still_releases_exactly_once() {
    let link = FakeLink::new();
    let mut mgr = manager(&link);
    let frees = Arc::new(AtomicUsize::new(0));

    assert!(mgr.send_message_to_host(APP, SENDER, vec![9], 1, 0x0010, counting_hook(&frees)));
    let handle = link.sent()[0].handle;
    mgr.handle_delivered(handle, AsyncError::Timeout);
    assert_eq!(mgr.outbound_stats().used, 0);
    assert_eq!(frees.load(Ordering::SeqCst), 1);
}

#[test]
fn pool_exhaustion_rejects_and_runs_the_hook() {
    let link = FakeLink::new();
    let mut mgr = manager(&link);
    for _ in 0..4 {
        assert!(mgr.send_message_to_host(APP, SENDER, vec![0], 1, 0x0010, None));
    }
    let frees = Arc::new(AtomicUsize::new(0));
    let accepted =
        mgr.send_message_to_host(APP, SENDER, vec![0], 1, 0x0010, counting_hook(&frees));
    assert!(!accepted);
    assert_eq!(mgr.outbound_stats().failed_allocs, 1);
    assert_eq!(frees.load(Ordering::SeqCst), 1);
}

#[test]
fn inbound_host_message_reaches_the_target() {
    let mut ev = EventLoop::new(8, 8);
    let app = ev.create_nanoapp(AppId::new(1)).unwrap();
    let link = FakeLink::new();
    let mgr = manager(&link);

    mgr.deliver_host_message(&ev, app, 42, 0x0020, vec![1, 2]);
    match ev.inbound().try_pop() {
        Some(Inbound::Event(handle)) => ev.distribute(handle).unwrap(),
        other => panic!("expected an event, got {other:?}"),
    }
    let (handle, event) = ev.pop_event_for(app).unwrap();
    assert_eq!(event.event_type(), EventType::HOST_MESSAGE);
    let received = event.payload_as::<HostMessageReceived>().unwrap();
    assert_eq!(received.message_type, 42);
    assert_eq!(received.data, vec![1, 2]);
    ev.finish_delivery(handle);
}

#[test]
fn broadcast_host_message_reaches_registered_apps_only() {
    let mut ev = EventLoop::new(8, 8);
    let a = ev.create_nanoapp(AppId::new(1)).unwrap();
    let b = ev.create_nanoapp(AppId::new(2)).unwrap();
    ev.register_for_broadcast(a, EventType::HOST_MESSAGE).unwrap();
    let link = FakeLink::new();
    let mgr = manager(&link);

    mgr.deliver_host_message(&ev, InstanceId::BROADCAST, 1, 0x0020, vec![]);
    match ev.inbound().try_pop() {
        Some(Inbound::Event(handle)) => ev.distribute(handle).unwrap(),
        other => panic!("expected an event, got {other:?}"),
    }
    assert!(ev.nanoapp(a).unwrap().has_pending_event());
    assert!(!ev.nanoapp(b).unwrap().has_pending_event());
    let (handle, _) = ev.pop_event_for(a).unwrap();
    ev.finish_delivery(handle);
}
