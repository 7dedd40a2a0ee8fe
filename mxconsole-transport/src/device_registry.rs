//! Device registry - device kind and capability detection by PID
//!
//! Every supported device shares the Logitech vendor ID. The product ID
//! selects a [`DeviceKind`], and the kind determines which [`Capabilities`]
//! the rest of the driver may use.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Logitech vendor ID
pub const VENDOR_ID: u16 = 0x046D;

/// Capability set of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const NONE: Self = Self(0);
    /// Per-key LCD displays
    pub const LCD_KEYS: Self = Self(1 << 0);
    /// Physical buttons reported on the input endpoint
    pub const BUTTONS: Self = Self(1 << 1);
    /// Rotary dial
    pub const DIAL: Self = Self(1 << 2);

    const NAMES: [(Self, &'static str); 3] = [
        (Self::LCD_KEYS, "lcd-keys"),
        (Self::BUTTONS, "buttons"),
        (Self::DIAL, "dial"),
    ];

    /// Check whether every capability in `other` is present
    pub const fn has(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }
}

impl std::ops::BitOr for Capabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(cap, _)| self.has(*cap))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join(","))
        }
    }
}

/// Kind of console device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// 3x3 keypad with an LCD behind every key
    MxKeypad,
    /// Dial pad (dial, roller and buttons, no LCD)
    MxDialpad,
}

impl DeviceKind {
    /// Human readable product name
    pub fn name(self) -> &'static str {
        match self {
            DeviceKind::MxKeypad => "MX Creative Keypad",
            DeviceKind::MxDialpad => "MX Creative Dialpad",
        }
    }

    pub fn capabilities(self) -> Capabilities {
        match self {
            DeviceKind::MxKeypad => Capabilities::LCD_KEYS | Capabilities::BUTTONS,
            DeviceKind::MxDialpad => Capabilities::DIAL | Capabilities::BUTTONS,
        }
    }

    /// Number of LCD keys (0 for devices without displays)
    pub fn key_count(self) -> u8 {
        match self {
            DeviceKind::MxKeypad => crate::protocol::lcd::KEY_COUNT,
            DeviceKind::MxDialpad => 0,
        }
    }

    pub fn has(self, cap: Capabilities) -> bool {
        self.capabilities().has(cap)
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Known product IDs
///
/// Additional PIDs (firmware revisions, receivers) can be supplied at runtime
/// through the discovery layer.
pub const KNOWN_DEVICES: &[(u16, DeviceKind)] = &[
    (0xC354, DeviceKind::MxKeypad), // MX Creative Keypad, USB
];

/// Look up the device kind for a PID
pub fn lookup(pid: u16) -> Option<DeviceKind> {
    KNOWN_DEVICES
        .iter()
        .find(|(known, _)| *known == pid)
        .map(|(_, kind)| *kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypad_capabilities() {
        let kind = DeviceKind::MxKeypad;
        assert!(kind.has(Capabilities::LCD_KEYS));
        assert!(kind.has(Capabilities::BUTTONS));
        assert!(!kind.has(Capabilities::DIAL));
        assert_eq!(kind.key_count(), 9);
    }

    #[test]
    fn test_dialpad_has_no_lcd() {
        let kind = DeviceKind::MxDialpad;
        assert!(!kind.has(Capabilities::LCD_KEYS));
        assert!(kind.has(Capabilities::DIAL | Capabilities::BUTTONS));
        assert_eq!(kind.key_count(), 0);
    }

    #[test]
    fn test_lookup() {
        assert_eq!(lookup(0xC354), Some(DeviceKind::MxKeypad));
        assert_eq!(lookup(0x0000), None);
    }

    #[test]
    fn test_capabilities_display() {
        assert_eq!(DeviceKind::MxKeypad.capabilities().to_string(), "lcd-keys,buttons");
        assert_eq!(Capabilities::NONE.to_string(), "none");
    }
}
