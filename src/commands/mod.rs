//! Command handlers for the CLI application.
//!
//! This module organizes command handlers by category:
//! - `query`: device listing
//! - `lcd`: key images (play, image, color, clear)
//! - `input`: button and raw report monitors
//! - `utility`: config file commands

pub mod input;
pub mod lcd;
pub mod query;
pub mod utility;

use std::sync::Arc;

use mxconsole_driver::config::Config;
use mxconsole_keypad::{KeySlot, KeypadInterface, KeypadSettings};
use mxconsole_transport::{
    DeviceDiscovery, HidDiscovery, OutputFormat, PacketFilter, PrinterConfig, Transport,
};
use tokio::sync::watch;
use tracing::info;

/// Result type for command handlers
pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Everything a command needs to reach the device
pub struct DeviceContext {
    pub config: Config,
    /// `--device` wins over `[device].path`
    device_path: Option<String>,
    printer_config: Option<PrinterConfig>,
    pub json: bool,
}

impl DeviceContext {
    pub fn new(
        config: Config,
        device_path: Option<String>,
        printer_config: Option<PrinterConfig>,
        json: bool,
    ) -> Self {
        let device_path = device_path.or_else(|| config.device.path.clone());
        Self {
            config,
            device_path,
            printer_config,
            json,
        }
    }

    /// Discovery with configured extra PIDs and optional monitoring
    pub fn discovery(&self) -> HidDiscovery {
        let mut discovery = match &self.printer_config {
            Some(config) => HidDiscovery::with_printer_config(config.clone()),
            None => HidDiscovery::new(),
        };
        self.config.apply_to(&mut discovery);
        discovery
    }

    /// Open the configured device, or the first one found
    pub async fn open_transport(&self) -> Result<Arc<dyn Transport>, Box<dyn std::error::Error>> {
        let discovery = self.discovery();
        let transport = match &self.device_path {
            Some(path) => discovery.open_path(path, None).await?,
            None => {
                let devices = discovery.list_devices().await?;
                let device = devices
                    .first()
                    .ok_or("No MX Creative Console found (check permissions on /dev/hidraw*)")?;
                discovery.open_device(device).await?
            }
        };
        Ok(transport)
    }

    /// Open the keypad with configured settings and run the handshake
    pub async fn open_keypad(&self) -> Result<KeypadInterface, Box<dyn std::error::Error>> {
        self.open_keypad_with(self.config.keypad_settings()).await
    }

    pub async fn open_keypad_with(
        &self,
        settings: KeypadSettings,
    ) -> Result<KeypadInterface, Box<dyn std::error::Error>> {
        let transport = self.open_transport().await?;
        let pad = KeypadInterface::new(transport, settings)?;
        pad.initialize().await?;
        info!("Keypad ready: {}", pad.device_info().display_name());
        Ok(pad)
    }
}

/// Parse a key index (0-8)
pub fn parse_key(s: &str) -> Result<KeySlot, Box<dyn std::error::Error>> {
    let index: u8 = s
        .trim()
        .parse()
        .map_err(|_| format!("Invalid key {s:?}: expected 0-8"))?;
    Ok(KeySlot::new(index)?)
}

/// Keys from CLI indices; empty means all keys
pub fn keys_or_all(indices: &[u8]) -> Result<Vec<KeySlot>, Box<dyn std::error::Error>> {
    if indices.is_empty() {
        return Ok(KeySlot::all().collect());
    }
    let mut keys = indices
        .iter()
        .map(|&i| KeySlot::new(i))
        .collect::<Result<Vec<_>, _>>()?;
    keys.sort();
    keys.dedup();
    Ok(keys)
}

/// Setup Ctrl+C handler; the receiver flips to true on interrupt
pub fn setup_interrupt_handler() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    ctrlc::set_handler(move || {
        let _ = tx.send(true);
    })
    .ok();

    rx
}

/// Resolve once Ctrl+C was pressed
pub async fn interrupted(rx: &mut watch::Receiver<bool>) {
    // Err means the handler was never installed; wait forever like a missing signal
    if rx.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Create printer config from CLI flags
pub fn create_printer_config(
    monitor: bool,
    hex: bool,
    json: bool,
    filter: Option<&str>,
) -> Result<Option<PrinterConfig>, Box<dyn std::error::Error>> {
    if !monitor {
        return Ok(None);
    }

    let filter = match filter {
        Some(f) => std::str::FromStr::from_str(f)?,
        None => PacketFilter::All,
    };
    let format = if json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    Ok(Some(
        PrinterConfig::default()
            .with_hex(hex)
            .with_filter(filter)
            .with_format(format),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key() {
        assert_eq!(parse_key("4").unwrap().index(), 4);
        assert_eq!(parse_key(" 0 ").unwrap().index(), 0);
        assert!(parse_key("9").is_err());
        assert!(parse_key("x").is_err());
    }

    #[test]
    fn test_keys_or_all() {
        assert_eq!(keys_or_all(&[]).unwrap().len(), 9);
        let keys = keys_or_all(&[8, 0, 8]).unwrap();
        assert_eq!(keys.iter().map(|k| k.index()).collect::<Vec<_>>(), vec![0, 8]);
    }

    #[test]
    fn test_printer_config_only_when_monitoring() {
        assert!(create_printer_config(false, true, false, None)
            .unwrap()
            .is_none());
        let config = create_printer_config(true, true, true, Some("writes"))
            .unwrap()
            .unwrap();
        assert!(config.show_hex);
        assert_eq!(config.filter, PacketFilter::Writes);
        assert_eq!(config.format, OutputFormat::Json);
        assert!(create_printer_config(true, false, false, Some("bogus")).is_err());
    }

    #[test]
    fn test_cli_device_overrides_config() {
        let mut config = Config::default();
        config.device.path = Some("/dev/hidraw1".into());
        let ctx = DeviceContext::new(config.clone(), Some("/dev/hidraw7".into()), None, false);
        assert_eq!(ctx.device_path.as_deref(), Some("/dev/hidraw7"));
        let ctx = DeviceContext::new(config, None, None, false);
        assert_eq!(ctx.device_path.as_deref(), Some("/dev/hidraw1"));
    }
}
