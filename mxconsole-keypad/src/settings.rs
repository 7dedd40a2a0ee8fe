//! Tunable keypad settings

use std::time::Duration;

use mxconsole_transport::protocol::{lcd, timing};

/// Pauses between writes
///
/// The defaults were picked against real hardware; the device silently drops
/// data when fed faster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeypadTimings {
    /// Pause after each handshake report
    pub init_report_delay_ms: u64,
    /// Pause after each LCD packet
    pub inter_packet_delay_ms: u64,
    /// Pause between keys when clearing the whole pad
    pub key_clear_delay_ms: u64,
}

impl Default for KeypadTimings {
    fn default() -> Self {
        Self {
            init_report_delay_ms: timing::INIT_REPORT_DELAY_MS,
            inter_packet_delay_ms: timing::INTER_PACKET_DELAY_MS,
            key_clear_delay_ms: timing::KEY_CLEAR_DELAY_MS,
        }
    }
}

impl KeypadTimings {
    pub fn init_report_delay(&self) -> Duration {
        Duration::from_millis(self.init_report_delay_ms)
    }

    pub fn inter_packet_delay(&self) -> Duration {
        Duration::from_millis(self.inter_packet_delay_ms)
    }

    pub fn key_clear_delay(&self) -> Duration {
        Duration::from_millis(self.key_clear_delay_ms)
    }
}

/// Image and timing settings for a keypad session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeypadSettings {
    /// JPEG quality, 1-100
    pub quality: u8,
    /// Tile edge in pixels
    pub tile_size: u16,
    pub timings: KeypadTimings,
}

impl Default for KeypadSettings {
    fn default() -> Self {
        Self {
            quality: lcd::DEFAULT_QUALITY,
            tile_size: lcd::TILE_SIZE,
            timings: KeypadTimings::default(),
        }
    }
}
