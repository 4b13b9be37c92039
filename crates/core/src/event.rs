//! Event envelope and well-known payload types.
//!
//! The runtime models events as small envelopes carrying a 16-bit type, the
//! sender and target instance ids, and a type-erased shared payload. Payload
//! ownership follows the pool: the envelope is cheap to clone (the payload is
//! behind an `Arc`), while the *free hook* supplied at post time is stored in
//! the event pool slot and runs exactly once, after the last intended
//! recipient has processed the event or when the event is dropped as
//! unroutable.

use core::any::Any;
use core::fmt;

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, sync::Arc};
#[cfg(feature = "std")]
use std::sync::Arc;

use crate::ids::InstanceId;

/// Flat 16-bit event type namespace.
///
/// Values below [`EventType::FIRST_USER`] are reserved for the framework;
/// everything at or above it is nanoapp-defined.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventType(pub u16);

impl EventType {
    /// A timer armed through the timer pool has fired.
    pub const TIMER: EventType = EventType(0x0010);

    /// Resolution of an asynchronous BLE scan transition.
    pub const BLE_ASYNC_RESULT: EventType = EventType(0x0100);
    /// Broadcast BLE advertisement report.
    pub const BLE_ADVERTISEMENT: EventType = EventType(0x0101);

    /// Resolution of an asynchronous GNSS session transition.
    pub const GNSS_ASYNC_RESULT: EventType = EventType(0x0110);
    /// Broadcast GNSS location report.
    pub const GNSS_LOCATION: EventType = EventType(0x0111);

    /// Resolution of an asynchronous Wi-Fi monitor transition.
    pub const WIFI_ASYNC_RESULT: EventType = EventType(0x0120);
    /// Broadcast Wi-Fi scan result.
    pub const WIFI_SCAN_RESULT: EventType = EventType(0x0121);

    /// Resolution of an asynchronous WWAN transition.
    pub const WWAN_ASYNC_RESULT: EventType = EventType(0x0130);
    /// Broadcast WWAN cell info report.
    pub const WWAN_CELL_INFO: EventType = EventType(0x0131);

    /// Resolution of an asynchronous audio transition.
    pub const AUDIO_ASYNC_RESULT: EventType = EventType(0x0140);
    /// Broadcast audio data availability report.
    pub const AUDIO_DATA: EventType = EventType(0x0141);

    /// A message from the host processor addressed to one or all nanoapps.
    pub const HOST_MESSAGE: EventType = EventType(0x0200);

    /// First event type available for nanoapp-defined events.
    pub const FIRST_USER: EventType = EventType(0x8000);

    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Whether this type belongs to the reserved framework range.
    pub const fn is_system(self) -> bool {
        self.0 < Self::FIRST_USER.0
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "evt({:#06x})", self.0)
    }
}

/// Type-erased shared event payload.
pub type DynPayload = Arc<dyn Any + Send + Sync>;

/// Deferred cleanup action supplied by the event producer.
///
/// Runs exactly once, on the event-loop thread, when the event's pool slot
/// is released.
pub type FreeHook = Box<dyn FnOnce() + Send>;

/// An event envelope.
///
/// Immutable after construction. Cloning shares the payload; the free hook is
/// not part of the envelope (it lives in the pool slot, so that the
/// exactly-once free guarantee is enforced by slot release).
#[derive(Clone)]
pub struct Event {
    event_type: EventType,
    sender: InstanceId,
    target: InstanceId,
    payload: DynPayload,
}

impl Event {
    pub fn new(
        event_type: EventType,
        sender: InstanceId,
        target: InstanceId,
        payload: DynPayload,
    ) -> Self {
        Self {
            event_type,
            sender,
            target,
            payload,
        }
    }

    /// Event originated by the framework itself.
    pub fn system(event_type: EventType, target: InstanceId, payload: DynPayload) -> Self {
        Self::new(event_type, InstanceId::SYSTEM, target, payload)
    }

    /// Event with no payload data.
    pub fn empty(event_type: EventType, sender: InstanceId, target: InstanceId) -> Self {
        Self::new(event_type, sender, target, Arc::new(()))
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn sender(&self) -> InstanceId {
        self.sender
    }

    pub fn target(&self) -> InstanceId {
        self.target
    }

    pub fn is_broadcast(&self) -> bool {
        self.target == InstanceId::BROADCAST
    }

    pub fn payload(&self) -> &DynPayload {
        &self.payload
    }

    /// Downcast the payload to a concrete report type.
    pub fn payload_as<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("event_type", &self.event_type)
            .field("sender", &self.sender)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// Payload of [`EventType::TIMER`] events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    /// Handle returned by the original `set_timer` call.
    pub handle: crate::ids::TimerHandle,
    /// Opaque value supplied by the requesting nanoapp.
    pub cookie: u64,
}
