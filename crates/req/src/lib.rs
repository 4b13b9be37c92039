//! # ctxhub-req
//!
//! Request multiplexing for the shared hardware resources. Many nanoapps may
//! hold a request against the same resource (a BLE scan, a GNSS location
//! session, ...) but the platform abstraction layer supports exactly one
//! configuration at a time. Each manager folds the active requests into a
//! single maximal platform request and drives the PAL through a four-state
//! machine with at most one in-flight transition.
//!
//! The state machine itself is resource-agnostic and factored once as
//! [`ResourceManager`]; the typed managers supply validation, the PAL
//! binding, and the broadcast report fan-out.

#[cfg(not(feature = "std"))]
extern crate alloc;

mod manager;
mod request;

pub mod audio;
pub mod ble;
pub mod gnss;
pub mod wifi;
pub mod wwan;

#[cfg(test)]
mod tests;

pub use manager::ResourceManager;
pub use request::{Request, RequestMultiplexer, RequestStatus};

pub use audio::{AudioDataBlock, AudioPal, AudioRequest, AudioRequestManager};
pub use ble::{
    BleAdvertisement, BlePal, BleRequest, BleRequestManager, BleScanFilter, BleScanMode,
    BleFilterKind,
};
pub use gnss::{GnssLocation, GnssPal, GnssRequest, GnssRequestManager};
pub use wifi::{WifiPal, WifiRequest, WifiRequestManager, WifiScanResult};
pub use wwan::{WwanCellInfo, WwanPal, WwanRequest, WwanRequestManager};
