//! The `Request` trait and the per-resource multiplexer.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use core::fmt::Debug;

use ctxhub_core::InstanceId;

/// A per-nanoapp resource request that can be folded into a maximal one.
pub trait Request: Clone + PartialEq + Debug {
    /// The identity of the fold: no nanoapp wants the resource.
    fn disabled() -> Self;

    fn is_enabled(&self) -> bool;

    /// Folds `other` into `self`, keeping the most permissive combination of
    /// every attribute (maximum mode, minimum interval, union of filters).
    /// Returns whether `self` actually changed. The fold is commutative in
    /// effect: merging any set of requests yields the same maximal request
    /// regardless of order.
    fn merge_from(&mut self, other: &Self) -> bool;
}

/// Where a nanoapp's entry stands relative to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    /// Wanted but not yet part of a platform call.
    PendingReq,
    /// Part of the in-flight platform transition, awaiting the async ack.
    PendingResp,
    /// Acked by the platform and live.
    Applied,
}

#[derive(Debug, Clone)]
pub struct RequestEntry<R> {
    pub owner: InstanceId,
    pub request: R,
    pub status: RequestStatus,
    /// Opaque value echoed back in the owner's async-result event.
    pub cookie: u64,
}

/// The set of per-nanoapp entries for one resource.
///
/// At most one entry per nanoapp; at most one *status* may be
/// [`RequestStatus::PendingResp`] across the whole set at any time (the
/// single in-flight transition invariant, enforced by [`ResourceManager`]
/// (crate::ResourceManager)).
#[derive(Debug, Default)]
pub struct RequestMultiplexer<R: Request> {
    entries: Vec<RequestEntry<R>>,
}

impl<R: Request> RequestMultiplexer<R> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn entry(&self, owner: InstanceId) -> Option<&RequestEntry<R>> {
        self.entries.iter().find(|entry| entry.owner == owner)
    }

    pub fn entry_mut(&mut self, owner: InstanceId) -> Option<&mut RequestEntry<R>> {
        self.entries.iter_mut().find(|entry| entry.owner == owner)
    }

    /// Replaces `owner`'s entry (or inserts one), returning the previous
    /// entry so a rejected transition can be rolled back.
    pub fn upsert(
        &mut self,
        owner: InstanceId,
        request: R,
        cookie: u64,
    ) -> Option<RequestEntry<R>> {
        let fresh = RequestEntry {
            owner,
            request,
            status: RequestStatus::PendingReq,
            cookie,
        };
        match self.entries.iter_mut().find(|entry| entry.owner == owner) {
            Some(entry) => Some(core::mem::replace(entry, fresh)),
            None => {
                self.entries.push(fresh);
                None
            }
        }
    }

    /// Undoes an `upsert`: restores the previous entry, or removes the fresh
    /// one if there was none.
    pub fn restore(&mut self, owner: InstanceId, prior: Option<RequestEntry<R>>) {
        match prior {
            Some(prior) => {
                if let Some(entry) = self.entry_mut(owner) {
                    *entry = prior;
                }
            }
            None => {
                self.remove(owner);
            }
        }
    }

    pub fn remove(&mut self, owner: InstanceId) -> Option<RequestEntry<R>> {
        let index = self.entries.iter().position(|entry| entry.owner == owner)?;
        Some(self.entries.remove(index))
    }

    /// The maximal request across all enabled entries, recomputed on demand
    /// by folding [`Request::merge_from`] from the disabled identity.
    pub fn maximal(&self) -> R {
        let mut maximal = R::disabled();
        for entry in &self.entries {
            if entry.request.is_enabled() {
                maximal.merge_from(&entry.request);
            }
        }
        maximal
    }

    pub fn any_with_status(&self, status: RequestStatus) -> bool {
        self.entries.iter().any(|entry| entry.status == status)
    }

    pub fn owners_with_status(&self, status: RequestStatus) -> Vec<InstanceId> {
        self.entries
            .iter()
            .filter(|entry| entry.status == status)
            .map(|entry| entry.owner)
            .collect()
    }

    pub fn set_status(&mut self, owner: InstanceId, status: RequestStatus) {
        if let Some(entry) = self.entry_mut(owner) {
            entry.status = status;
        }
    }

    /// Promotes every `PendingReq` entry into the in-flight transition.
    pub fn promote_pending(&mut self) {
        for entry in &mut self.entries {
            if entry.status == RequestStatus::PendingReq {
                entry.status = RequestStatus::PendingResp;
            }
        }
    }

    /// Drops applied entries that are disabled; once acked they carry no
    /// further meaning.
    pub fn prune(&mut self) {
        self.entries.retain(|entry| {
            entry.status != RequestStatus::Applied || entry.request.is_enabled()
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
