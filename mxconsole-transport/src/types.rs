//! Common types for transport layer

use serde::Serialize;

use crate::device_registry::DeviceKind;

/// Device identification information
#[derive(Debug, Clone, Serialize)]
pub struct TransportDeviceInfo {
    /// USB Vendor ID
    pub vid: u16,
    /// USB Product ID
    pub pid: u16,
    /// Device kind resolved from the PID
    pub kind: DeviceKind,
    /// hidraw node or hidapi path
    pub device_path: String,
    /// Serial number if available
    pub serial: Option<String>,
    /// Product name if available
    pub product_name: Option<String>,
}

impl TransportDeviceInfo {
    /// Product name reported by the device, or the registry name
    pub fn display_name(&self) -> &str {
        self.product_name.as_deref().unwrap_or(self.kind.name())
    }
}

/// Events parsed from input reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeypadEvent {
    /// A key was pressed and released (0-based key index)
    ButtonActivated { key: u8 },
    /// Raw button state byte (1-9 = key held, 0 = none)
    ButtonState { state: u8 },
    /// Report too short to carry a button state
    Unknown(Vec<u8>),
}

/// Event plus receive time and the report it came from
#[derive(Debug, Clone, Serialize)]
pub struct TimestampedEvent {
    /// Seconds since the transport was opened
    pub timestamp: f64,
    pub event: KeypadEvent,
    /// Raw input report
    pub report: Vec<u8>,
}

impl TimestampedEvent {
    pub fn new(timestamp: f64, event: KeypadEvent, report: Vec<u8>) -> Self {
        Self {
            timestamp,
            event,
            report,
        }
    }
}

/// Discovered device that can be opened
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredDevice {
    /// Device information
    pub info: TransportDeviceInfo,
}
