//! Input report parsing and the event reader thread
//!
//! The keypad reports the currently held key as a single state byte. A key
//! counts as activated when that byte drops from a key code back to zero, so
//! parsing needs the previous state. [`ButtonTracker`] holds it and is owned
//! by whoever reads the input endpoint (normally the reader thread).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hidapi::HidDevice;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::protocol::{input, REPORT_SIZE};
use crate::types::{KeypadEvent, TimestampedEvent};

/// Press/release edge detector for the button state byte
#[derive(Debug, Default, Clone)]
pub struct ButtonTracker {
    last_state: u8,
}

impl ButtonTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next state byte; returns the 0-based key on release
    pub fn update(&mut self, state: u8) -> Option<u8> {
        let previous = std::mem::replace(&mut self.last_state, state);
        let was_pressed = (1..=input::MAX_KEY_CODE).contains(&previous);
        (was_pressed && state == input::RELEASED).then(|| previous - 1)
    }

    /// Last state byte seen
    pub fn state(&self) -> u8 {
        self.last_state
    }
}

/// Parse one input report
///
/// Reports too short to carry a state byte leave the tracker untouched.
pub fn parse_input_report(tracker: &mut ButtonTracker, data: &[u8]) -> KeypadEvent {
    if data.len() < input::MIN_BUTTON_REPORT_LEN {
        return KeypadEvent::Unknown(data.to_vec());
    }
    let state = data[input::BUTTON_STATE_OFFSET];

    match tracker.update(state) {
        Some(key) => KeypadEvent::ButtonActivated { key },
        None => KeypadEvent::ButtonState { state },
    }
}

/// Broadcast channel capacity for input events
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Event reader thread plus the broadcast channel it feeds
pub struct EventSubsystem {
    /// Broadcast sender (None when no input device was available)
    event_tx: Option<broadcast::Sender<TimestampedEvent>>,
    /// Shutdown flag for the reader thread
    shutdown: Arc<AtomicBool>,
}

impl EventSubsystem {
    /// Create the subsystem, spawning a reader thread if `input_device` is given
    pub fn new(
        input_device: Option<HidDevice>,
        config: EventReaderConfig,
    ) -> Result<Self, TransportError> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let event_tx = match input_device {
            Some(input) => {
                let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
                let tx_clone = tx.clone();
                let shutdown_clone = shutdown.clone();

                std::thread::Builder::new()
                    .name(format!("{}-event-reader", config.name))
                    .spawn(move || {
                        run_event_reader_loop(input, tx_clone, shutdown_clone, config);
                    })
                    .map_err(|e| {
                        TransportError::Internal(format!("failed to spawn event reader: {e}"))
                    })?;

                Some(tx)
            }
            None => None,
        };

        Ok(Self { event_tx, shutdown })
    }

    /// Subsystem with no reader (write-only transports)
    pub fn disabled() -> Self {
        Self {
            event_tx: None,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Wait up to `timeout_ms` for the next event
    pub async fn read_event(&self, timeout_ms: u32) -> Result<Option<KeypadEvent>, TransportError> {
        let Some(tx) = &self.event_tx else {
            return Ok(None);
        };
        let mut rx = tx.subscribe();
        let deadline = tokio::time::Instant::now() + Duration::from_millis(u64::from(timeout_ms));
        loop {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Ok(timestamped)) => return Ok(Some(timestamped.event)),
                Ok(Err(broadcast::error::RecvError::Lagged(n))) => {
                    debug!("Event receiver lagged by {} events", n);
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => {
                    return Err(TransportError::Disconnected)
                }
                Err(_) => return Ok(None),
            }
        }
    }

    /// Subscribe to the event broadcast channel
    pub fn subscribe(&self) -> Option<broadcast::Receiver<TimestampedEvent>> {
        self.event_tx.as_ref().map(|tx| tx.subscribe())
    }

    pub fn is_running(&self) -> bool {
        self.event_tx.is_some() && !self.shutdown.load(Ordering::Relaxed)
    }
}

impl Drop for EventSubsystem {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

/// Configuration for the event reader loop
#[derive(Clone)]
pub struct EventReaderConfig {
    /// Read timeout in milliseconds (bounds shutdown latency when idle)
    pub read_timeout_ms: i32,
    /// Sleep duration on error before retrying
    pub error_sleep_ms: u64,
    /// Consecutive read errors before the reader gives up
    pub max_errors: u32,
    /// Name prefix for thread and log messages
    pub name: &'static str,
}

impl EventReaderConfig {
    /// Configuration for the USB keypad
    pub fn usb() -> Self {
        Self {
            read_timeout_ms: 10,
            error_sleep_ms: 100,
            max_errors: 50,
            name: "keypad",
        }
    }
}

/// Reader loop: HID input reports in, timestamped events out
///
/// Owns the [`ButtonTracker`] for the session. Runs until the shutdown flag
/// is set or the device keeps failing (unplugged).
pub fn run_event_reader_loop(
    input_device: HidDevice,
    tx: broadcast::Sender<TimestampedEvent>,
    shutdown: Arc<AtomicBool>,
    config: EventReaderConfig,
) {
    debug!("{} event reader thread started", config.name);
    let mut buf = [0u8; REPORT_SIZE];
    let mut tracker = ButtonTracker::new();
    let mut errors = 0u32;
    let start_time = Instant::now();

    while !shutdown.load(Ordering::Relaxed) {
        match input_device.read_timeout(&mut buf, config.read_timeout_ms) {
            Ok(len) if len > 0 => {
                errors = 0;
                let timestamp = start_time.elapsed().as_secs_f64();
                let report = &buf[..len];
                debug!(
                    "{} event reader got {} bytes at {:.3}s: {:02X?}",
                    config.name,
                    len,
                    timestamp,
                    &report[..len.min(8)]
                );
                let event = parse_input_report(&mut tracker, report);
                // No receivers is fine
                let _ = tx.send(TimestampedEvent::new(timestamp, event, report.to_vec()));
            }
            Ok(_) => {}
            Err(e) => {
                errors += 1;
                warn!("{} event reader error: {}", config.name, e);
                if errors >= config.max_errors {
                    warn!("{} event reader giving up after {} errors", config.name, errors);
                    break;
                }
                std::thread::sleep(Duration::from_millis(config.error_sleep_ms));
            }
        }
    }

    debug!("{} event reader thread exiting", config.name);
}
