//! Transport layer for Logitech MX Creative Console devices
//!
//! This crate covers everything between the keypad API and the hidraw node:
//!
//! - the [`Transport`] trait and its hidapi backend
//! - device discovery and the device/capability registry
//! - the LCD image-write packetizer and protocol constants
//! - input report parsing (button edge detection) on a reader thread
//! - a serialized write queue shared by concurrent producers
//! - a monitoring middleware that prints decoded traffic

pub mod device_registry;
pub mod error;
pub mod event_parser;
pub mod flow_control;
pub mod lcd;
pub mod printer;
pub mod protocol;
pub mod types;

mod discovery;
mod hid_raw;

pub use device_registry::{Capabilities, DeviceKind, KNOWN_DEVICES, VENDOR_ID};
pub use error::{ProtocolError, TransportError};
pub use event_parser::{parse_input_report, ButtonTracker};
pub use flow_control::SerializedWriter;
pub use lcd::{control_byte, packet_count, packetize, ControlByte, KeySlot, LcdPacket};
pub use printer::{DecodedReport, OutputFormat, PacketFilter, PrinterConfig, PrinterTransport};
pub use types::{DiscoveredDevice, KeypadEvent, TimestampedEvent, TransportDeviceInfo};

pub use discovery::{DeviceDiscovery, HidDiscovery};
pub use hid_raw::HidRawTransport;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;

/// The core transport trait - all backends implement this
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write one output report
    ///
    /// The first byte is the report ID. The call returns once the whole
    /// report was handed to the device.
    async fn write_report(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Wait for the next input event
    ///
    /// # Arguments
    /// * `timeout_ms` - Timeout in milliseconds
    ///
    /// # Returns
    /// `None` on timeout, `Some(event)` if a report arrived
    async fn read_event(&self, timeout_ms: u32) -> Result<Option<KeypadEvent>, TransportError>;

    /// Subscribe to input events via broadcast channel
    ///
    /// Events are pushed from a dedicated reader thread. Returns None if the
    /// transport has no input handle.
    fn subscribe_events(&self) -> Option<broadcast::Receiver<TimestampedEvent>> {
        None
    }

    /// Get device information
    fn device_info(&self) -> &TransportDeviceInfo;

    /// Check if transport is still connected
    async fn is_connected(&self) -> bool;

    /// Close the transport gracefully
    async fn close(&self) -> Result<(), TransportError>;
}

/// Type alias for a shared transport
pub type BoxedTransport = Arc<dyn Transport>;
