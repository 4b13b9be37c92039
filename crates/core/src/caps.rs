//! Per-resource capability bitmasks.
//!
//! Capabilities are reported by the platform abstraction layer at startup
//! and queried by nanoapps without any permission gate. The bit assignments
//! are part of the nanoapp-facing ABI.

use bitflags::bitflags;

bitflags! {
    /// BLE subsystem capabilities.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct BleCapabilities: u32 {
        const SCAN = 1 << 0;
        const SCAN_RESULT_BATCHING = 1 << 1;
        const SCAN_FILTER_BEST_EFFORT = 1 << 2;
    }
}

bitflags! {
    /// BLE scan-filter capabilities.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct BleFilterCapabilities: u32 {
        const RSSI = 1 << 0;
        const SERVICE_DATA_UUID = 1 << 1;
    }
}

bitflags! {
    /// GNSS subsystem capabilities.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct GnssCapabilities: u32 {
        const LOCATION = 1 << 0;
        const MEASUREMENTS = 1 << 1;
    }
}

bitflags! {
    /// Wi-Fi subsystem capabilities.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct WifiCapabilities: u32 {
        const SCAN_MONITORING = 1 << 0;
        const ON_DEMAND_SCAN = 1 << 1;
    }
}

bitflags! {
    /// WWAN subsystem capabilities.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct WwanCapabilities: u32 {
        const CELL_INFO = 1 << 0;
    }
}

bitflags! {
    /// Audio subsystem capabilities.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct AudioCapabilities: u32 {
        const MICROPHONE = 1 << 0;
    }
}
