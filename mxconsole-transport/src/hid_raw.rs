//! hidraw transport for the USB keypad

use async_trait::async_trait;
use hidapi::HidDevice;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::TransportError;
use crate::event_parser::{EventReaderConfig, EventSubsystem};
use crate::types::{KeypadEvent, TimestampedEvent, TransportDeviceInfo};
use crate::Transport;

/// HID transport over a hidraw node
///
/// Writes go through one handle, input reports are read through a second
/// handle on the same node owned by the event reader thread. LCD uploads
/// therefore never block button input.
pub struct HidRawTransport {
    /// Output handle
    device: Mutex<HidDevice>,
    /// Device information
    info: TransportDeviceInfo,
    /// Input reader and broadcast channel
    events: EventSubsystem,
}

impl HidRawTransport {
    /// Create a transport from an output handle and optional input handle
    pub fn new(
        device: HidDevice,
        input_device: Option<HidDevice>,
        info: TransportDeviceInfo,
    ) -> Result<Self, TransportError> {
        let events = EventSubsystem::new(input_device, EventReaderConfig::usb())?;
        Ok(Self {
            device: Mutex::new(device),
            info,
            events,
        })
    }
}

#[async_trait]
impl Transport for HidRawTransport {
    async fn write_report(&self, data: &[u8]) -> Result<(), TransportError> {
        let device = self.device.lock();
        let written = device.write(data)?;
        if written < data.len() {
            return Err(TransportError::ShortWrite {
                written,
                expected: data.len(),
            });
        }
        debug!(
            "Wrote {} bytes: {:02X?}",
            written,
            &data[..data.len().min(8)]
        );
        Ok(())
    }

    async fn read_event(&self, timeout_ms: u32) -> Result<Option<KeypadEvent>, TransportError> {
        self.events.read_event(timeout_ms).await
    }

    fn subscribe_events(&self) -> Option<broadcast::Receiver<TimestampedEvent>> {
        self.events.subscribe()
    }

    fn device_info(&self) -> &TransportDeviceInfo {
        &self.info
    }

    async fn is_connected(&self) -> bool {
        let device = self.device.lock();
        device.get_product_string().is_ok()
    }

    async fn close(&self) -> Result<(), TransportError> {
        // HidDevice handles close on drop; the reader stops with the subsystem
        Ok(())
    }
}

impl Drop for HidRawTransport {
    fn drop(&mut self) {
        debug!(
            "HidRawTransport for {} dropped, signaling event reader shutdown",
            self.info.device_path
        );
    }
}
