//! High-level keypad interface for the MX Creative Console
//!
//! This crate provides the LCD and button API on top of any transport:
//! the startup handshake, per-key image uploads, solid colors, clearing,
//! button presses, and per-key animation playback.

pub mod animation;
pub mod error;
pub mod jpeg;
pub mod player;
pub mod settings;

pub use animation::{Animation, AnimationFrame};
pub use error::KeypadError;
pub use jpeg::{EncodeError, Rgb};
pub use player::{PlaybackScheduler, PlaybackState, PlaybackStatus};
pub use settings::{KeypadSettings, KeypadTimings};

// Re-export the event types so consumers don't need the transport crate
pub use mxconsole_transport::{KeySlot, KeypadEvent, TimestampedEvent};

use std::sync::Arc;
use std::time::Duration;

use mxconsole_transport::protocol::init;
use mxconsole_transport::{
    packetize, Capabilities, DeviceKind, SerializedWriter, Transport, TransportDeviceInfo,
};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::debug;

/// High-level keypad interface using any transport
///
/// All writes, including those from running animations, go through one
/// serialized queue so packets of different keys never interleave at the
/// report level.
pub struct KeypadInterface {
    writer: Arc<SerializedWriter>,
    settings: KeypadSettings,
    player: PlaybackScheduler,
}

impl KeypadInterface {
    /// Create a keypad interface
    ///
    /// Fails with [`KeypadError::NotSupported`] when the device has no LCD
    /// keys.
    pub fn new(transport: Arc<dyn Transport>, settings: KeypadSettings) -> Result<Self, KeypadError> {
        let kind = transport.device_info().kind;
        if !kind.has(Capabilities::LCD_KEYS) {
            return Err(KeypadError::NotSupported(format!(
                "{} has no LCD keys",
                kind.name()
            )));
        }

        let writer = Arc::new(SerializedWriter::new(transport)?);
        let player = PlaybackScheduler::new(Arc::clone(&writer), settings);
        Ok(Self {
            writer,
            settings,
            player,
        })
    }

    /// Get the underlying transport
    pub fn transport(&self) -> &Arc<dyn Transport> {
        self.writer.inner()
    }

    pub fn device_info(&self) -> &TransportDeviceInfo {
        self.writer.device_info()
    }

    pub fn kind(&self) -> DeviceKind {
        self.device_info().kind
    }

    pub fn settings(&self) -> &KeypadSettings {
        &self.settings
    }

    /// Animation scheduler bound to this keypad
    pub fn player(&self) -> &PlaybackScheduler {
        &self.player
    }

    /// Reports written since the interface was opened
    pub fn reports_written(&self) -> u64 {
        self.writer.reports_written()
    }

    // === LCD ===

    /// Send the startup handshake
    ///
    /// The keypad ignores image writes until it has seen both reports.
    pub async fn initialize(&self) -> Result<(), KeypadError> {
        for report in init::REPORTS {
            debug!("Handshake report {:02x}", report[init::SELECTOR_OFFSET]);
            self.writer.write(report.to_vec()).await?;
            tokio::time::sleep(self.settings.timings.init_report_delay()).await;
        }
        Ok(())
    }

    /// Show a JPEG image on a key
    ///
    /// Any animation running on the key is stopped first.
    pub async fn set_key_image(&self, key: KeySlot, jpeg: &[u8]) -> Result<(), KeypadError> {
        self.player.stop(key).await;
        self.write_image(key, jpeg).await
    }

    /// Encode RGBA pixels at tile size and show them on a key
    pub async fn set_key_rgba(&self, key: KeySlot, rgba: &[u8]) -> Result<(), KeypadError> {
        let size = u32::from(self.settings.tile_size);
        let data = jpeg::encode_rgba(rgba, size, size, self.settings.quality)?;
        self.set_key_image(key, &data).await
    }

    /// Fill a key with one color
    pub async fn set_key_color(&self, key: KeySlot, color: Rgb) -> Result<(), KeypadError> {
        let data = jpeg::solid_color(
            color,
            u32::from(self.settings.tile_size),
            self.settings.quality,
        )?;
        self.set_key_image(key, &data).await
    }

    /// Blank one key
    pub async fn clear_key(&self, key: KeySlot) -> Result<(), KeypadError> {
        self.set_key_color(key, Rgb::BLACK).await
    }

    /// Stop all playback and blank every key
    pub async fn clear_all(&self) -> Result<(), KeypadError> {
        self.player.stop_all().await;
        let data = jpeg::solid_color(
            Rgb::BLACK,
            u32::from(self.settings.tile_size),
            self.settings.quality,
        )?;
        for key in KeySlot::all() {
            self.write_image(key, &data).await?;
            tokio::time::sleep(self.settings.timings.key_clear_delay()).await;
        }
        Ok(())
    }

    async fn write_image(&self, key: KeySlot, jpeg: &[u8]) -> Result<(), KeypadError> {
        let packets = packetize(key, self.settings.tile_size, jpeg)?;
        debug!(
            "Key {}: {} byte image in {} packets",
            key,
            jpeg.len(),
            packets.len()
        );
        let pause = self.settings.timings.inter_packet_delay();
        for packet in packets {
            self.writer.write(packet.into_bytes()).await?;
            tokio::time::sleep(pause).await;
        }
        Ok(())
    }

    // === Buttons ===

    /// Wait for the next completed key press
    ///
    /// Returns `None` when `timeout` passes without one.
    pub async fn next_button_press(&self, timeout: Duration) -> Result<Option<KeySlot>, KeypadError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            let timeout_ms = u32::try_from(remaining.as_millis()).unwrap_or(u32::MAX).max(1);
            match self.transport().read_event(timeout_ms).await? {
                Some(KeypadEvent::ButtonActivated { key }) => return Ok(Some(KeySlot::new(key)?)),
                Some(_) => continue,
                None => return Ok(None),
            }
        }
    }

    /// Subscribe to input events pushed by the reader thread
    pub fn subscribe(&self) -> Option<broadcast::Receiver<TimestampedEvent>> {
        self.transport().subscribe_events()
    }
}
