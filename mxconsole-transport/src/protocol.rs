//! Protocol constants for the MX Creative Console keypad
//!
//! Everything here was observed on the wire; the device publishes no
//! documentation for its vendor reports.

/// Input report buffer size
pub const REPORT_SIZE: usize = 256;

/// Vendor handshake written once per session before any LCD traffic
pub mod init {
    /// Length of each handshake report
    pub const REPORT_LEN: usize = 20;

    /// Byte that distinguishes the two handshake reports
    pub const SELECTOR_OFFSET: usize = 5;

    /// Report ID of the handshake reports
    pub const REPORT_ID: u8 = 0x11;

    const fn handshake(selector: u8) -> [u8; REPORT_LEN] {
        let mut report = [0u8; REPORT_LEN];
        report[0] = REPORT_ID;
        report[1] = 0xff;
        report[2] = 0x0b;
        report[3] = 0x3b;
        report[4] = 0x01;
        report[SELECTOR_OFFSET] = selector;
        report[6] = 0x03;
        report
    }

    /// Handshake reports, sent in order
    pub const REPORTS: [[u8; REPORT_LEN]; 2] = [handshake(0xa1), handshake(0xa2)];

    /// Check whether a report is one of the handshake reports
    pub fn is_handshake(data: &[u8]) -> bool {
        REPORTS.iter().any(|r| data.starts_with(r) && data.len() == REPORT_LEN)
    }
}

/// LCD image-write protocol
pub mod lcd {
    /// Opcode prefix shared by first and continuation packets
    pub const OPCODE: [u8; 4] = [0x14, 0xff, 0x02, 0x2b];

    /// Fixed bytes 5..=8 of the first packet
    pub const FIRST_FIXED: [u8; 4] = [0x01, 0x00, 0x01, 0x00];

    /// Maximum packet size including header
    pub const MAX_PACKET_SIZE: usize = 4095;

    /// Header size of the first packet
    pub const FIRST_HEADER_SIZE: usize = 20;

    /// Header size of continuation packets
    pub const CONT_HEADER_SIZE: usize = 5;

    /// Payload bytes carried by the first packet
    pub const FIRST_CAPACITY: usize = MAX_PACKET_SIZE - FIRST_HEADER_SIZE;

    /// Payload bytes carried by each continuation packet
    pub const CONT_CAPACITY: usize = MAX_PACKET_SIZE - CONT_HEADER_SIZE;

    /// Largest payload the 16-bit length field can describe
    pub const MAX_PAYLOAD: usize = u16::MAX as usize;

    /// Control byte bits
    pub mod control {
        /// Low 5 bits: 1-based part index
        pub const INDEX_MASK: u8 = 0b0001_1111;
        /// Always set
        pub const MARKER: u8 = 0b0010_0000;
        /// Set on the packet that exhausts the payload
        pub const LAST: u8 = 0b0100_0000;
        /// Set only on packet 1
        pub const FIRST: u8 = 0b1000_0000;
    }

    /// Number of LCD keys
    pub const KEY_COUNT: u8 = 9;
    /// Keys per row
    pub const GRID_COLS: u8 = 3;
    /// Default tile edge in pixels
    pub const TILE_SIZE: u16 = 118;
    /// Gap between tiles in pixels
    pub const TILE_GAP: u16 = 40;
    /// Canvas X of key 0
    pub const ORIGIN_X: u16 = 23;
    /// Canvas Y of key 0
    pub const ORIGIN_Y: u16 = 6;

    /// Default JPEG quality for key images
    pub const DEFAULT_QUALITY: u8 = 85;
}

/// Input report layout
pub mod input {
    /// Offset of the button state byte
    pub const BUTTON_STATE_OFFSET: usize = 6;
    /// Minimum report length that carries a button state
    pub const MIN_BUTTON_REPORT_LEN: usize = BUTTON_STATE_OFFSET + 1;
    /// State value meaning no key held
    pub const RELEASED: u8 = 0;
    /// Highest pressed-key code
    pub const MAX_KEY_CODE: u8 = 9;
}

/// Timing defaults (ms), tuned against real hardware
pub mod timing {
    /// Pause after each handshake report
    pub const INIT_REPORT_DELAY_MS: u64 = 10;
    /// Pause after each LCD packet
    pub const INTER_PACKET_DELAY_MS: u64 = 5;
    /// Pause between keys when clearing the whole pad
    pub const KEY_CLEAR_DELAY_MS: u64 = 100;
    /// Frame duration used when the container specifies none
    pub const DEFAULT_FRAME_MS: u32 = 100;
}
