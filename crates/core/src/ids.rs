//! Identifier newtypes shared across the runtime.
//!
//! All of these are part of the public nanoapp-facing ABI and must keep their
//! representations stable: instance ids and timer handles are `u32`, app ids
//! are `u64`.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stable cross-reload identity of a nanoapp binary.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AppId(pub u64);

impl AppId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "app:{:#018x}", self.0)
    }
}

/// Process-unique identity of a *running* nanoapp.
///
/// Issued by the event loop when a nanoapp starts and never reissued while
/// the original holder is still live. Two values are reserved and never
/// handed to nanoapps: [`InstanceId::SYSTEM`] identifies the framework
/// itself as an event sender, and [`InstanceId::BROADCAST`] is the fan-out
/// target for broadcast events.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(pub u32);

impl InstanceId {
    /// The framework itself, used as the sender of system events.
    pub const SYSTEM: InstanceId = InstanceId(0);
    /// Target meaning "every nanoapp registered for this event type".
    pub const BROADCAST: InstanceId = InstanceId(u32::MAX);

    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Whether this id may never be issued to a nanoapp.
    pub const fn is_reserved(self) -> bool {
        self.0 == Self::SYSTEM.0 || self.0 == Self::BROADCAST.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::SYSTEM => write!(f, "inst:system"),
            Self::BROADCAST => write!(f, "inst:broadcast"),
            Self(id) => write!(f, "inst:{id}"),
        }
    }
}

/// Handle for an outstanding timer request.
///
/// Part of the public resource-handle ABI: zero is reserved as "invalid" and
/// live handles are never reused.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle(pub u32);

impl TimerHandle {
    /// Reserved sentinel, returned by no successful `set_timer` call.
    pub const INVALID: TimerHandle = TimerHandle(0);

    pub const fn new(handle: u32) -> Self {
        Self(handle)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer:{}", self.0)
    }
}

/// Generation-checked reference to a slot in a fixed-capacity pool.
///
/// The generation counter detects use of a handle whose slot has since been
/// released and reallocated; pool operations report such handles as
/// [`HubError::StaleHandle`](crate::HubError::StaleHandle) rather than
/// touching the wrong entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotHandle {
    pub index: u32,
    pub generation: u32,
}

impl SlotHandle {
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

impl fmt::Display for SlotHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot:{}.{}", self.index, self.generation)
    }
}
