//! # ctxhub-core
//!
//! Core types and primitives for the ctxhub nanoapp runtime: identifiers,
//! the event envelope, time newtypes, resource capability masks, the deferred
//! system-callback union, and the error taxonomy shared by every other crate
//! in the workspace.
//!
//! ## Module Overview
//! - [`ids`]      – Nanoapp, instance, timer, and pool-slot identifiers.
//! - [`event`]    – Event envelope and well-known payload types.
//! - [`time`]     – Monotonic time newtypes.
//! - [`caps`]     – Per-resource capability bitmasks.
//! - [`callback`] – Typed deferred-callback union for cross-thread handoff.
//! - [`sync`]     – Locking primitives for `std` and `lock-free` builds.
//!
//! The crate keeps modules loosely coupled so that higher layers (event loop,
//! request managers, host link) can depend only on what they use.

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod callback;
pub mod caps;
pub mod event;
pub mod ids;
pub mod sync;
pub mod time;

pub use callback::{AsyncError, AsyncResult, RequestType, SystemCallback};
pub use caps::{
    AudioCapabilities, BleCapabilities, BleFilterCapabilities, GnssCapabilities,
    WifiCapabilities, WwanCapabilities,
};
pub use event::{DynPayload, Event, EventType, FreeHook, TimerFired};
pub use ids::{AppId, InstanceId, SlotHandle, TimerHandle};
pub use time::Nanoseconds;

/// Runtime version, part of the hub debug-dump surface.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result type used throughout the ctxhub runtime.
pub type HubResult<T> = Result<T, HubError>;

/// Error taxonomy for recoverable runtime conditions.
///
/// Caller-contract violations (popping an empty queue, a stale generation
/// that can only come from a double free) are *not* represented here; those
/// are bugs and abort via panic, per the runtime error-handling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    /// A fixed-capacity pool has no free slot. Exhaustion is a first-class
    /// return value, never a growth trigger.
    #[error("fixed-capacity pool exhausted")]
    PoolExhausted,
    /// The inbound cross-thread queue is at capacity.
    #[error("inbound queue full")]
    QueueFull,
    /// No nanoapp is registered under the given instance id.
    #[error("no nanoapp with instance id {0}")]
    AppNotFound(InstanceId),
    /// A pool handle refers to a slot that was already released.
    #[error("stale pool handle")]
    StaleHandle,
    /// A request was rejected before any state mutation.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// The platform abstraction layer declined the request synchronously.
    #[error("platform rejected the request")]
    PlatformRejected,
    /// The nanoapp's start entry point returned failure.
    #[error("nanoapp start entry point failed")]
    StartFailed,
    /// The event loop has observed a stop request.
    #[error("runtime is stopped")]
    Stopped,
}
