//! The timer request pool.

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, sync::Arc, vec::Vec};
#[cfg(feature = "std")]
use std::sync::Arc;

use log::debug;

use ctxhub_core::event::TimerFired;
use ctxhub_core::{Event, EventType, HubError, HubResult, InstanceId, Nanoseconds, TimerHandle};
use ctxhub_evloop::EventLoop;

/// The one hardware/OS timer the pool multiplexes onto.
///
/// Implementations track a single absolute deadline; reaching it must result
/// in a `SystemCallback::TimerExpired` on the inbound queue. Re-arming
/// replaces the previous deadline.
pub trait SystemTimer: Send {
    fn arm(&mut self, deadline: Nanoseconds);
    fn cancel(&mut self);
}

/// Monotonic time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> Nanoseconds;
}

struct TimerRequest {
    owner: InstanceId,
    handle: TimerHandle,
    expiration: Nanoseconds,
    duration: Nanoseconds,
    one_shot: bool,
    cookie: u64,
    /// Registration order, the tie-break when two deadlines are identical.
    seq: u64,
}

/// Tracks outstanding delayed-callback requests keyed by handle.
///
/// The pending list is a flat vector scanned for the minimum deadline on
/// demand; request counts are small and the recompute keeps the armed
/// deadline from drifting out of sync with the list.
pub struct TimerPool {
    timer: Box<dyn SystemTimer>,
    pending: Vec<TimerRequest>,
    capacity: usize,
    armed: Option<Nanoseconds>,
    last_handle: u32,
    next_seq: u64,
}

impl TimerPool {
    pub fn new(timer: Box<dyn SystemTimer>, capacity: usize) -> Self {
        Self {
            timer,
            pending: Vec::with_capacity(capacity),
            capacity,
            armed: None,
            last_handle: TimerHandle::INVALID.raw(),
            next_seq: 0,
        }
    }

    /// Arms a new timer for `owner`.
    ///
    /// If the new deadline is sooner than the currently armed one, the
    /// system timer is re-armed for it; the previously soonest request
    /// simply stays queued.
    pub fn set_timer(
        &mut self,
        owner: InstanceId,
        now: Nanoseconds,
        duration: Nanoseconds,
        cookie: u64,
        one_shot: bool,
    ) -> HubResult<TimerHandle> {
        if self.pending.len() >= self.capacity {
            return Err(HubError::PoolExhausted);
        }
        // A periodic request with zero period would expire forever in a
        // single drain pass.
        if !one_shot && duration == Nanoseconds::ZERO {
            return Err(HubError::InvalidArgument("periodic timer with zero duration"));
        }
        let handle = self.next_handle();
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(TimerRequest {
            owner,
            handle,
            expiration: now + duration,
            duration,
            one_shot,
            cookie,
            seq,
        });
        self.rearm();
        Ok(handle)
    }

    /// Cancels a pending request by handle.
    ///
    /// Only the owning nanoapp may cancel its timers. Canceling the request
    /// the system timer is currently armed for triggers a rearm.
    pub fn cancel(&mut self, owner: InstanceId, handle: TimerHandle) -> bool {
        let Some(index) = self
            .pending
            .iter()
            .position(|req| req.handle == handle && req.owner == owner)
        else {
            return false;
        };
        self.pending.remove(index);
        self.rearm();
        true
    }

    /// Cancels every request owned by a stopping nanoapp.
    pub fn cancel_all_for(&mut self, owner: InstanceId) -> usize {
        let before = self.pending.len();
        self.pending.retain(|req| req.owner != owner);
        let removed = before - self.pending.len();
        if removed > 0 {
            self.rearm();
        }
        removed
    }

    /// Fires every expired request, in (deadline, registration) order.
    ///
    /// One-shot requests are removed; periodic requests re-arm for
    /// `firing_time + duration` (their scheduled expiration, not `now`, so
    /// periods do not drift). Posting the timer event is on the hard
    /// failure policy: the owner may be blocking on it.
    pub fn handle_expired(&mut self, now: Nanoseconds, ev: &mut EventLoop) {
        loop {
            let Some(index) = self.soonest_index() else {
                break;
            };
            if self.pending[index].expiration > now {
                break;
            }
            let req = self.pending.remove(index);
            debug!("timer {} fired for {}", req.handle, req.owner);
            ev.post_event_or_die(Event::system(
                EventType::TIMER,
                req.owner,
                Arc::new(TimerFired {
                    handle: req.handle,
                    cookie: req.cookie,
                }),
            ));
            if !req.one_shot {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.pending.push(TimerRequest {
                    expiration: req.expiration + req.duration,
                    seq,
                    ..req
                });
            }
        }
        self.rearm();
    }

    pub fn has_pending(&self, handle: TimerHandle) -> bool {
        self.pending.iter().any(|req| req.handle == handle)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Deadline the system timer is currently armed for, if any.
    pub fn armed_deadline(&self) -> Option<Nanoseconds> {
        self.armed
    }

    fn soonest_index(&self) -> Option<usize> {
        self.pending
            .iter()
            .enumerate()
            .min_by_key(|(_, req)| (req.expiration, req.seq))
            .map(|(index, _)| index)
    }

    /// Re-synchronizes the system timer with the soonest pending deadline.
    fn rearm(&mut self) {
        match self.soonest_index() {
            Some(index) => {
                let deadline = self.pending[index].expiration;
                if self.armed != Some(deadline) {
                    self.timer.arm(deadline);
                    self.armed = Some(deadline);
                }
            }
            None => {
                if self.armed.take().is_some() {
                    self.timer.cancel();
                }
            }
        }
    }

    /// Issues the next handle: last issued plus one, skipping the invalid
    /// sentinel and any handle still pending. Matches the public
    /// resource-handle ABI (`u32`, zero invalid).
    fn next_handle(&mut self) -> TimerHandle {
        loop {
            self.last_handle = self.last_handle.wrapping_add(1);
            let candidate = TimerHandle::new(self.last_handle);
            if candidate.is_valid() && !self.has_pending(candidate) {
                return candidate;
            }
        }
    }
}
