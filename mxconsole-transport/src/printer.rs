//! PrinterTransport middleware for monitoring transport traffic
//!
//! Wraps any Transport and prints every outgoing report (decoded when it is
//! a handshake or LCD packet) and every input event read through it.
//!
//! # Example
//!
//! ```ignore
//! use mxconsole_transport::{HidDiscovery, PrinterConfig, PrinterTransport};
//!
//! let transport = HidDiscovery::new().open_first().await?;
//! let monitored = PrinterTransport::wrap(transport, PrinterConfig::default());
//! ```

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use crossterm::style::Stylize;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::lcd::{ControlByte, ImageHeader};
use crate::protocol::{init, lcd};
use crate::{KeypadEvent, TimestampedEvent, Transport, TransportDeviceInfo, TransportError};

/// Output format for the printer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Packet filter for selective display
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PacketFilter {
    #[default]
    All,
    Events,
    Writes,
}

impl FromStr for PacketFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" | "" => Ok(Self::All),
            "events" | "event" => Ok(Self::Events),
            "writes" | "write" | "out" => Ok(Self::Writes),
            _ => Err(format!("Unknown filter: {}", s)),
        }
    }
}

/// Capacity of the re-broadcast channel behind `subscribe_events`
const EVENT_FORWARD_CAPACITY: usize = 256;

/// Configuration for the PrinterTransport
#[derive(Debug, Clone, Default)]
pub struct PrinterConfig {
    /// Show raw hex dump alongside decoded output
    pub show_hex: bool,
    /// Filter for selective display
    pub filter: PacketFilter,
    /// Output format
    pub format: OutputFormat,
}

impl PrinterConfig {
    pub fn with_hex(mut self, show: bool) -> Self {
        self.show_hex = show;
        self
    }

    pub fn with_filter(mut self, filter: PacketFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }
}

/// Decoded view of an outgoing report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecodedReport {
    /// Session handshake report
    Handshake { selector: u8 },
    /// First packet of an image transfer
    ImageStart {
        key: Option<u8>,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        total_len: u16,
        part: u8,
        last: bool,
    },
    /// Continuation packet of an image transfer
    ImageContinuation { part: u8, last: bool },
    /// Anything else
    Unknown { len: usize },
}

/// Reverse the tile geometry to find which key a rectangle addresses
fn key_at(x: u16, y: u16, tile: u16) -> Option<u8> {
    let pitch = tile.checked_add(lcd::TILE_GAP)?;
    let dx = x.checked_sub(lcd::ORIGIN_X)?;
    let dy = y.checked_sub(lcd::ORIGIN_Y)?;
    if dx % pitch != 0 || dy % pitch != 0 {
        return None;
    }
    let (col, row) = (dx / pitch, dy / pitch);
    let cols = u16::from(lcd::GRID_COLS);
    if col >= cols || row * cols + col >= u16::from(lcd::KEY_COUNT) {
        return None;
    }
    Some((row * cols + col) as u8)
}

/// Decode an outgoing report
pub fn decode_report(data: &[u8]) -> DecodedReport {
    if init::is_handshake(data) {
        return DecodedReport::Handshake {
            selector: data[init::SELECTOR_OFFSET],
        };
    }

    if data.len() >= lcd::CONT_HEADER_SIZE && data[..4] == lcd::OPCODE {
        let control = ControlByte::from(data[4]);
        if control.first {
            if let Some(header) = ImageHeader::parse(data) {
                let (x, y) = header.position();
                let (width, height) = header.size();
                return DecodedReport::ImageStart {
                    key: key_at(x, y, width),
                    x,
                    y,
                    width,
                    height,
                    total_len: header.payload_len(),
                    part: control.index,
                    last: control.last,
                };
            }
        } else {
            return DecodedReport::ImageContinuation {
                part: control.index,
                last: control.last,
            };
        }
    }

    DecodedReport::Unknown { len: data.len() }
}

/// Transport middleware that prints all traffic
pub struct PrinterTransport {
    inner: Arc<dyn Transport>,
    config: PrinterConfig,
}

impl PrinterTransport {
    /// Wrap a transport with printing middleware
    pub fn wrap(transport: Arc<dyn Transport>, config: PrinterConfig) -> Arc<dyn Transport> {
        Arc::new(Self {
            inner: transport,
            config,
        })
    }

    fn should_show_writes(&self) -> bool {
        matches!(self.config.filter, PacketFilter::All | PacketFilter::Writes)
    }

    fn should_show_events(&self) -> bool {
        matches!(self.config.filter, PacketFilter::All | PacketFilter::Events)
    }

    fn print_write(&self, data: &[u8]) {
        if !self.should_show_writes() {
            return;
        }

        let decoded = decode_report(data);
        match self.config.format {
            OutputFormat::Json => {
                if let Ok(line) = serde_json::to_string(&decoded) {
                    eprintln!("{line}");
                }
            }
            OutputFormat::Text => match &decoded {
                DecodedReport::Unknown { len } => {
                    eprintln!(
                        "{} {}  {} bytes {}",
                        ">>>".cyan(),
                        "OUT".cyan().bold(),
                        len,
                        "UNKNOWN".red().bold()
                    );
                }
                _ => {
                    eprintln!("{} {}  {:?}", ">>>".cyan(), "OUT".cyan().bold(), decoded);
                }
            },
        }

        if self.config.show_hex {
            // Image packets are zero padded; trailing zeros are noise
            let end = data.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
            eprintln!("    {}  {:02x?}", "HEX".dim(), &data[..end.min(64)]);
        }
    }

    fn print_event(&self, event: &KeypadEvent) {
        if self.should_show_events() {
            print_event(&self.config, event);
        }
    }
}

fn print_event(config: &PrinterConfig, event: &KeypadEvent) {
    match config.format {
        OutputFormat::Json => {
            if let Ok(line) = serde_json::to_string(event) {
                eprintln!("{line}");
            }
        }
        OutputFormat::Text => {
            eprintln!("{} {}  {:?}", "<<<".yellow(), "EVT".yellow().bold(), event);
        }
    }
}

/// Print each event from `source` and re-broadcast it on `sink`
///
/// Ends when the source closes or the last subscriber of `sink` is gone.
async fn forward_events(
    mut source: broadcast::Receiver<TimestampedEvent>,
    sink: broadcast::Sender<TimestampedEvent>,
    config: PrinterConfig,
) {
    loop {
        match source.recv().await {
            Ok(event) => {
                print_event(&config, &event.event);
                if sink.send(event).is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Printer fell behind, {} events not shown", n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[async_trait]
impl Transport for PrinterTransport {
    async fn write_report(&self, data: &[u8]) -> Result<(), TransportError> {
        self.print_write(data);
        self.inner.write_report(data).await
    }

    async fn read_event(&self, timeout_ms: u32) -> Result<Option<KeypadEvent>, TransportError> {
        let event = self.inner.read_event(timeout_ms).await?;
        if let Some(ref e) = event {
            self.print_event(e);
        }
        Ok(event)
    }

    fn subscribe_events(&self) -> Option<broadcast::Receiver<TimestampedEvent>> {
        let source = self.inner.subscribe_events()?;
        if !self.should_show_events() {
            return Some(source);
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("No tokio runtime, subscribed events are not printed");
            return Some(source);
        };

        let (sink, rx) = broadcast::channel(EVENT_FORWARD_CAPACITY);
        runtime.spawn(forward_events(source, sink, self.config.clone()));
        Some(rx)
    }

    fn device_info(&self) -> &TransportDeviceInfo {
        self.inner.device_info()
    }

    async fn is_connected(&self) -> bool {
        self.inner.is_connected().await
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.inner.close().await
    }
}
