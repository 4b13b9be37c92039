use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ctxhub_core::{AppId, Event, EventType, FreeHook, HubError, InstanceId};

use crate::inbound::Inbound;
use crate::EventLoop;

const USER_EVENT: EventType = EventType::FIRST_USER;

fn counting_hook(counter: &Arc<AtomicUsize>) -> Option<FreeHook> {
    let counter = Arc::clone(counter);
    Some(Box::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }))
}

fn pump_one(ev: &mut EventLoop) {
    match ev.inbound().try_pop() {
        Some(Inbound::Event(handle)) => ev.distribute(handle).unwrap(),
        other => panic!("expected a queued event, got {other:?}"),
    }
}

#[test]
fn broadcast_reaches_only_registered_apps() {
    let mut ev = EventLoop::new(8, 8);
    let a = ev.create_nanoapp(AppId::new(1)).unwrap();
    let b = ev.create_nanoapp(AppId::new(2)).unwrap();
    assert!(ev.register_for_broadcast(a, USER_EVENT).unwrap());

    let frees = Arc::new(AtomicUsize::new(0));
    ev.post_event_with_hook(
        Event::system(USER_EVENT, InstanceId::BROADCAST, Arc::new(())),
        counting_hook(&frees),
    )
    .unwrap();
    pump_one(&mut ev);

    assert!(ev.nanoapp(a).unwrap().has_pending_event());
    assert!(!ev.nanoapp(b).unwrap().has_pending_event());

    let (handle, event) = ev.pop_event_for(a).unwrap();
    assert_eq!(event.event_type(), USER_EVENT);
    ev.finish_delivery(handle);
    assert_eq!(frees.load(Ordering::SeqCst), 1);
    assert_eq!(ev.pool_stats().used, 0);
}

#[test]
fn event_freed_once_after_every_recipient() {
    let mut ev = EventLoop::new(8, 8);
    let a = ev.create_nanoapp(AppId::new(1)).unwrap();
    let b = ev.create_nanoapp(AppId::new(2)).unwrap();
    ev.register_for_broadcast(a, USER_EVENT).unwrap();
    ev.register_for_broadcast(b, USER_EVENT).unwrap();

    let frees = Arc::new(AtomicUsize::new(0));
    ev.post_event_with_hook(
        Event::system(USER_EVENT, InstanceId::BROADCAST, Arc::new(())),
        counting_hook(&frees),
    )
    .unwrap();
    pump_one(&mut ev);

    let (handle, _) = ev.pop_event_for(a).unwrap();
    ev.finish_delivery(handle);
    assert_eq!(frees.load(Ordering::SeqCst), 0, "b still holds a reference");

    let (handle, _) = ev.pop_event_for(b).unwrap();
    ev.finish_delivery(handle);
    assert_eq!(frees.load(Ordering::SeqCst), 1);
}

#[test]
fn unroutable_event_is_dropped_and_freed() {
    let mut ev = EventLoop::new(8, 8);
    ev.create_nanoapp(AppId::new(1)).unwrap();

    let frees = Arc::new(AtomicUsize::new(0));
    ev.post_event_with_hook(
        Event::system(USER_EVENT, InstanceId::new(99), Arc::new(())),
        counting_hook(&frees),
    )
    .unwrap();
    pump_one(&mut ev);

    assert!(!ev.any_pending());
    assert_eq!(frees.load(Ordering::SeqCst), 1);
    assert_eq!(ev.pool_stats().used, 0);
}

#[test]
fn targeted_delivery_preserves_post_order() {
    let mut ev = EventLoop::new(8, 8);
    let a = ev.create_nanoapp(AppId::new(1)).unwrap();

    for value in 0u16..3 {
        ev.post_event(Event::system(
            EventType::new(EventType::FIRST_USER.raw() + value),
            a,
            Arc::new(()),
        ))
        .unwrap();
    }
    for _ in 0..3 {
        pump_one(&mut ev);
    }

    for value in 0u16..3 {
        let (handle, event) = ev.pop_event_for(a).unwrap();
        assert_eq!(event.event_type().raw(), EventType::FIRST_USER.raw() + value);
        ev.finish_delivery(handle);
    }
    assert!(!ev.any_pending());
}

#[test]
fn instance_ids_are_unique_and_skip_reserved() {
    let mut ev = EventLoop::new(4, 4);
    let a = ev.create_nanoapp(AppId::new(1)).unwrap();
    let b = ev.create_nanoapp(AppId::new(2)).unwrap();
    assert_ne!(a, b);
    assert!(!a.is_reserved());
    assert!(!b.is_reserved());

    // A live id is never reissued, even after others stop.
    ev.remove_nanoapp(a).unwrap();
    let c = ev.create_nanoapp(AppId::new(3)).unwrap();
    assert_ne!(c, b);
}

#[test]
fn duplicate_app_id_is_rejected() {
    let mut ev = EventLoop::new(4, 4);
    ev.create_nanoapp(AppId::new(7)).unwrap();
    assert_eq!(
        ev.create_nanoapp(AppId::new(7)),
        Err(HubError::InvalidArgument("app id is already running"))
    );
}

#[test]
fn removing_an_app_frees_its_queued_events() {
    let mut ev = EventLoop::new(8, 8);
    let a = ev.create_nanoapp(AppId::new(1)).unwrap();

    let frees = Arc::new(AtomicUsize::new(0));
    ev.post_event_with_hook(
        Event::system(USER_EVENT, a, Arc::new(())),
        counting_hook(&frees),
    )
    .unwrap();
    pump_one(&mut ev);
    assert!(ev.nanoapp(a).unwrap().has_pending_event());

    ev.remove_nanoapp(a).unwrap();
    assert_eq!(frees.load(Ordering::SeqCst), 1);
    assert_eq!(ev.pool_stats().used, 0);
}

#[test]
fn queue_full_drops_the_post_and_runs_the_hook() {
    let ev = EventLoop::new(8, 1);
    let frees = Arc::new(AtomicUsize::new(0));
    ev.post_event(Event::system(USER_EVENT, InstanceId::new(1), Arc::new(())))
        .unwrap();
    let result = ev.post_event_with_hook(
        Event::system(USER_EVENT, InstanceId::new(1), Arc::new(())),
        counting_hook(&frees),
    );
    assert_eq!(result, Err(HubError::QueueFull));
    assert_eq!(frees.load(Ordering::SeqCst), 1);
}

#[test]
fn stopped_queue_rejects_posts_and_unblocks_pop() {
    let ev = EventLoop::new(4, 4);
    let inbound = ev.inbound();
    let stop = ev.stop_handle();

    let waiter = std::thread::spawn(move || inbound.pop_blocking());
    stop.stop();
    assert!(waiter.join().unwrap().is_none());

    assert_eq!(
        ev.post_event(Event::system(USER_EVENT, InstanceId::new(1), Arc::new(()))),
        Err(HubError::Stopped)
    );
}

#[test]
fn registration_is_idempotent() {
    let mut ev = EventLoop::new(4, 4);
    let a = ev.create_nanoapp(AppId::new(1)).unwrap();
    assert!(ev.register_for_broadcast(a, USER_EVENT).unwrap());
    assert!(!ev.register_for_broadcast(a, USER_EVENT).unwrap());
    assert!(ev.unregister_for_broadcast(a, USER_EVENT).unwrap());
    assert!(!ev.unregister_for_broadcast(a, USER_EVENT).unwrap());
}
