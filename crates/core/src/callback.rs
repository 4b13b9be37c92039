//! Typed deferred-callback union for cross-thread handoff.
//!
//! Platform drivers complete asynchronous operations on their own threads.
//! They must never touch event-loop or request-manager state directly;
//! instead they push a [`SystemCallback`] through the inbound queue and the
//! event loop dispatches it on its own thread. The union carries typed
//! payloads only — no pointer punning of small values through opaque slots.

use core::fmt;

use crate::ids::SlotHandle;

/// Which resource subsystem an asynchronous result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestType {
    Ble,
    Gnss,
    Wifi,
    Wwan,
    Audio,
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ble => "ble",
            Self::Gnss => "gnss",
            Self::Wifi => "wifi",
            Self::Wwan => "wwan",
            Self::Audio => "audio",
        };
        f.write_str(name)
    }
}

/// Error codes attached to asynchronous results.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum AsyncError {
    /// The operation completed successfully.
    #[default]
    None,
    /// The platform declined the request.
    Rejected,
    /// The platform is temporarily unable to service the request.
    Busy,
    /// The platform did not answer within its deadline.
    Timeout,
    /// The requesting nanoapp was unloaded before resolution.
    AppDisabled,
}

impl AsyncError {
    pub const fn is_success(self) -> bool {
        matches!(self, AsyncError::None)
    }
}

impl fmt::Display for AsyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Rejected => "rejected",
            Self::Busy => "busy",
            Self::Timeout => "timeout",
            Self::AppDisabled => "app-disabled",
        };
        f.write_str(name)
    }
}

/// Payload of the per-resource `*_ASYNC_RESULT` events.
///
/// A nanoapp that received a synchronous `true` from a resource request is
/// guaranteed exactly one of these, carrying the cookie it supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsyncResult {
    pub request_type: RequestType,
    pub success: bool,
    pub error: AsyncError,
    pub cookie: u64,
}

impl AsyncResult {
    pub fn new(request_type: RequestType, error: AsyncError, cookie: u64) -> Self {
        Self {
            request_type,
            success: error.is_success(),
            error,
            cookie,
        }
    }
}

/// Deferred completion handed from a platform thread to the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemCallback {
    /// The underlying system timer reached its armed deadline.
    TimerExpired,
    /// The BLE PAL resolved an in-flight scan transition.
    BleScanResponse { error: AsyncError },
    /// The GNSS PAL resolved an in-flight location-session transition.
    GnssSessionResponse { error: AsyncError },
    /// The Wi-Fi PAL resolved an in-flight scan-monitor transition.
    WifiScanResponse { error: AsyncError },
    /// The WWAN PAL resolved an in-flight cell-info transition.
    WwanResponse { error: AsyncError },
    /// The audio PAL resolved an in-flight source transition.
    AudioResponse { error: AsyncError },
    /// The host link finished (or failed) transmitting an outbound message.
    HostMessageDelivered { handle: SlotHandle, error: AsyncError },
}
