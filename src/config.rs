//! Persistent driver configuration
//!
//! Stored as TOML under the user config directory. Every field has a
//! default, so a missing file or a partial file both load.

use std::path::{Path, PathBuf};

use mxconsole_keypad::{KeypadSettings, KeypadTimings};
use mxconsole_transport::protocol::{lcd, timing};
use mxconsole_transport::{DeviceKind, HidDiscovery};
use serde::{Deserialize, Serialize};

/// Which device to open
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Explicit hidraw path; skips discovery when set
    pub path: Option<String>,
    /// Extra Logitech PIDs to treat as LCD keypads
    pub extra_pids: Vec<u16>,
}

/// LCD image settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LcdConfig {
    /// JPEG quality, 1-100
    pub quality: u8,
    /// Key tile edge in pixels
    pub tile_size: u16,
}

impl Default for LcdConfig {
    fn default() -> Self {
        Self {
            quality: lcd::DEFAULT_QUALITY,
            tile_size: lcd::TILE_SIZE,
        }
    }
}

/// Pauses between device writes, in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub init_report_delay_ms: u64,
    pub inter_packet_delay_ms: u64,
    pub key_clear_delay_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            init_report_delay_ms: timing::INIT_REPORT_DELAY_MS,
            inter_packet_delay_ms: timing::INTER_PACKET_DELAY_MS,
            key_clear_delay_ms: timing::KEY_CLEAR_DELAY_MS,
        }
    }
}

/// Complete driver configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub device: DeviceConfig,
    pub lcd: LcdConfig,
    pub timing: TimingConfig,
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mxconsole")
            .join("config.toml")
    }

    /// Load config from a file, or return default if not found
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Keypad settings with quality clamped to the encoder's range
    pub fn keypad_settings(&self) -> KeypadSettings {
        KeypadSettings {
            quality: self.lcd.quality.clamp(1, 100),
            tile_size: self.lcd.tile_size,
            timings: KeypadTimings {
                init_report_delay_ms: self.timing.init_report_delay_ms,
                inter_packet_delay_ms: self.timing.inter_packet_delay_ms,
                key_clear_delay_ms: self.timing.key_clear_delay_ms,
            },
        }
    }

    /// Register the configured extra PIDs with a discovery instance
    pub fn apply_to(&self, discovery: &mut HidDiscovery) {
        for &pid in &self.device.extra_pids {
            discovery.add_device(pid, DeviceKind::MxKeypad);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_protocol() {
        let settings = Config::default().keypad_settings();
        assert_eq!(settings, KeypadSettings::default());
    }

    #[test]
    fn test_roundtrip() {
        let mut config = Config::default();
        config.device.extra_pids = vec![0xC355];
        config.lcd.quality = 70;
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
[timing]
inter_packet_delay_ms = 8

[device]
path = "/dev/hidraw3"
"#,
        )
        .unwrap();
        assert_eq!(config.timing.inter_packet_delay_ms, 8);
        assert_eq!(config.timing.key_clear_delay_ms, 100);
        assert_eq!(config.lcd, LcdConfig::default());
        assert_eq!(config.device.path.as_deref(), Some("/dev/hidraw3"));
    }

    #[test]
    fn test_quality_is_clamped() {
        let mut config = Config::default();
        config.lcd.quality = 0;
        assert_eq!(config.keypad_settings().quality, 1);
        config.lcd.quality = 200;
        assert_eq!(config.keypad_settings().quality, 100);
    }

    #[test]
    fn test_missing_file_loads_default() {
        let path = std::env::temp_dir().join("mxconsole-config-test-missing.toml");
        let _ = std::fs::remove_file(&path);
        assert_eq!(Config::load(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = std::env::temp_dir().join(format!("mxconsole-config-{}", std::process::id()));
        let path = dir.join("config.toml");
        let mut config = Config::default();
        config.timing.key_clear_delay_ms = 50;
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
