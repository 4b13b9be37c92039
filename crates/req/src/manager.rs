//! The resource-agnostic request state machine.

#[cfg(not(feature = "std"))]
use alloc::{sync::Arc, vec::Vec};
#[cfg(feature = "std")]
use std::sync::Arc;

use log::{debug, warn};

use ctxhub_core::{
    AsyncError, AsyncResult, Event, EventType, InstanceId, RequestType,
};
use ctxhub_evloop::EventLoop;

use crate::request::{Request, RequestMultiplexer, RequestStatus};

/// Drives one resource through `NO_REQUESTS -> PENDING_REQ -> PENDING_RESP ->
/// APPLIED` with at most one platform transition in flight.
///
/// The manager never talks to a PAL directly; the typed wrapper passes an
/// `apply` closure that issues the single platform call for a maximal
/// request and reports synchronous acceptance. Asynchronous completions
/// arrive later through [`ResourceManager::handle_response`], on the loop
/// thread only.
pub struct ResourceManager<R: Request> {
    mux: RequestMultiplexer<R>,
    request_type: RequestType,
    /// Targeted per-request resolution event.
    async_event: EventType,
    /// Broadcast report event recipients subscribe to.
    report_event: EventType,
    /// Maximal request the platform last acked.
    applied: R,
    /// Maximal request sent to the platform, not yet acked.
    in_flight: Option<R>,
    /// Cookies of `PendingResp` entries overwritten by a newer request from
    /// the same owner. Part of the in-flight transition, so their promised
    /// async results resolve with its outcome.
    displaced: Vec<(InstanceId, u64)>,
}

impl<R: Request> ResourceManager<R> {
    pub fn new(request_type: RequestType, async_event: EventType, report_event: EventType) -> Self {
        Self {
            mux: RequestMultiplexer::new(),
            request_type,
            async_event,
            report_event,
            applied: R::disabled(),
            in_flight: None,
            displaced: Vec::new(),
        }
    }

    /// Nanoapp-facing entry point: records `owner`'s request and, when
    /// possible, issues the platform transition realizing the new maximal
    /// state.
    ///
    /// Returns the synchronous accept/reject result. `true` guarantees
    /// exactly one async-result event will follow; `false` guarantees none
    /// will. Validation belongs to the typed wrapper and must happen before
    /// this call.
    pub fn configure(
        &mut self,
        ev: &mut EventLoop,
        owner: InstanceId,
        request: R,
        cookie: u64,
        mut apply: impl FnMut(&R) -> bool,
    ) -> bool {
        // A stop with no prior state needs no platform interaction, but the
        // accepted-request contract still owes exactly one async result.
        if !request.is_enabled() && self.mux.entry(owner).is_none() {
            let _ = ev.unregister_for_broadcast(owner, self.report_event);
            self.post_result(ev, owner, AsyncError::None, cookie);
            return true;
        }

        let prior = self.mux.upsert(owner, request, cookie);
        if let Some(entry) = prior.as_ref() {
            if entry.status == RequestStatus::PendingResp {
                // The overwritten request already went to the platform; its
                // result is owed when that transition resolves.
                self.displaced.push((owner, entry.cookie));
            }
        }

        if self.in_flight.is_some() {
            // Queued behind the in-flight transition; resolved by the drain
            // in handle_response.
            debug!("{}: queueing request from {owner}", self.request_type);
            return true;
        }

        let maximal = self.mux.maximal();
        if maximal == self.applied {
            // The platform is already in the desired state.
            self.resolve_short_circuit(ev, owner);
            return true;
        }

        if apply(&maximal) {
            self.mux.promote_pending();
            self.in_flight = Some(maximal);
            true
        } else {
            warn!("{}: platform rejected transition for {owner}", self.request_type);
            // A previously applied, still enabled request keeps its broadcast
            // subscription through the rollback.
            let keep_subscription = prior.as_ref().map_or(false, |entry| {
                entry.status == RequestStatus::Applied && entry.request.is_enabled()
            });
            self.mux.restore(owner, prior);
            if !keep_subscription {
                let _ = ev.unregister_for_broadcast(owner, self.report_event);
            }
            false
        }
    }

    /// Resolves the in-flight transition; loop thread only.
    ///
    /// Every `PendingResp` entry receives exactly one async-result event, as
    /// does every request overwritten while in flight (with its original
    /// cookie). On
    /// success they become `Applied` and their broadcast subscriptions are
    /// synchronized; on failure they are discarded wholesale (the transition
    /// never took effect). Queued `PendingReq` entries then drain, one
    /// platform transition at a time.
    pub fn handle_response(
        &mut self,
        ev: &mut EventLoop,
        error: AsyncError,
        mut apply: impl FnMut(&R) -> bool,
    ) {
        let Some(sent) = self.in_flight.take() else {
            warn!("{}: response with no transition in flight", self.request_type);
            return;
        };

        for (owner, cookie) in core::mem::take(&mut self.displaced) {
            self.post_result(ev, owner, error, cookie);
        }

        for owner in self.mux.owners_with_status(RequestStatus::PendingResp) {
            let cookie = self.mux.entry(owner).map_or(0, |entry| entry.cookie);
            self.post_result(ev, owner, error, cookie);
            if error.is_success() {
                self.mux.set_status(owner, RequestStatus::Applied);
                self.sync_subscription(ev, owner);
            } else {
                self.mux.remove(owner);
                let _ = ev.unregister_for_broadcast(owner, self.report_event);
            }
        }

        if error.is_success() {
            self.applied = sent;
        }
        self.mux.prune();
        self.drain(ev, &mut apply);
    }

    /// Removes every trace of a stopping nanoapp and, if that changes the
    /// maximal request, transitions the platform down to it.
    ///
    /// An entry caught in `PendingResp` cannot be removed (the in-flight
    /// transition must resolve first); it is flipped to disabled in place,
    /// so resolution prunes it and the drain brings the platform down. Its
    /// async-result event is unroutable by then and dropped.
    pub fn disable_for(
        &mut self,
        ev: &mut EventLoop,
        owner: InstanceId,
        mut apply: impl FnMut(&R) -> bool,
    ) {
        match self.mux.entry(owner).map(|entry| entry.status) {
            None => return,
            Some(RequestStatus::PendingResp) => {
                if let Some(entry) = self.mux.entry_mut(owner) {
                    entry.request = R::disabled();
                }
                return;
            }
            Some(_) => {}
        }
        self.mux.remove(owner);
        let _ = ev.unregister_for_broadcast(owner, self.report_event);
        debug!("{}: swept request state for {owner}", self.request_type);
        if self.in_flight.is_none() {
            let maximal = self.mux.maximal();
            if maximal != self.applied && apply(&maximal) {
                self.in_flight = Some(maximal);
            }
        }
    }

    /// Broadcasts one platform report to every subscribed nanoapp. Reports
    /// are droppable under pressure (soft policy).
    pub fn post_report<T: core::any::Any + Send + Sync>(&self, ev: &EventLoop, report: T) {
        if ev
            .post_event(Event::system(
                self.report_event,
                InstanceId::BROADCAST,
                Arc::new(report),
            ))
            .is_err()
        {
            debug!("{}: report dropped", self.request_type);
        }
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn applied(&self) -> &R {
        &self.applied
    }

    pub fn multiplexer(&self) -> &RequestMultiplexer<R> {
        &self.mux
    }

    /// One queued transition at a time until the platform accepts one, the
    /// queue empties, or a rejection clears the remaining requesters.
    fn drain(&mut self, ev: &mut EventLoop, apply: &mut impl FnMut(&R) -> bool) {
        while self.mux.any_with_status(RequestStatus::PendingReq) {
            let maximal = self.mux.maximal();
            if maximal == self.applied {
                for owner in self.mux.owners_with_status(RequestStatus::PendingReq) {
                    self.resolve_short_circuit(ev, owner);
                }
                continue;
            }
            if apply(&maximal) {
                self.mux.promote_pending();
                self.in_flight = Some(maximal);
                return;
            }
            // Synchronous rejection of a queued transition: the owners were
            // already promised an async result, so fail them that way.
            warn!("{}: platform rejected queued transition", self.request_type);
            for owner in self.mux.owners_with_status(RequestStatus::PendingReq) {
                let cookie = self.mux.entry(owner).map_or(0, |entry| entry.cookie);
                self.post_result(ev, owner, AsyncError::Rejected, cookie);
                self.mux.remove(owner);
                let _ = ev.unregister_for_broadcast(owner, self.report_event);
            }
        }
        // A sweep may have lowered the maximal request without leaving a
        // queued entry behind; the platform still has to follow it down.
        let maximal = self.mux.maximal();
        if maximal != self.applied && apply(&maximal) {
            self.in_flight = Some(maximal);
        }
    }

    /// Success without a platform call: the desired state is already live.
    fn resolve_short_circuit(&mut self, ev: &mut EventLoop, owner: InstanceId) {
        let cookie = self.mux.entry(owner).map_or(0, |entry| entry.cookie);
        self.mux.set_status(owner, RequestStatus::Applied);
        self.sync_subscription(ev, owner);
        self.post_result(ev, owner, AsyncError::None, cookie);
        self.mux.prune();
    }

    /// Registers or unregisters `owner` for the report broadcast according
    /// to whether its individual request is enabled.
    fn sync_subscription(&mut self, ev: &mut EventLoop, owner: InstanceId) {
        let enabled = self
            .mux
            .entry(owner)
            .map_or(false, |entry| entry.request.is_enabled());
        let _ = if enabled {
            ev.register_for_broadcast(owner, self.report_event)
        } else {
            ev.unregister_for_broadcast(owner, self.report_event)
        };
    }

    /// Async-result events use the hard allocation policy: the owner may be
    /// blocking on this resolution.
    fn post_result(&self, ev: &EventLoop, owner: InstanceId, error: AsyncError, cookie: u64) {
        ev.post_event_or_die(Event::system(
            self.async_event,
            owner,
            Arc::new(AsyncResult::new(self.request_type, error, cookie)),
        ));
    }
}
