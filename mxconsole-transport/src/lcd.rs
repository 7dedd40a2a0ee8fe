//! LCD image-write packets
//!
//! A key image is a JPEG blob that the device reassembles from a sequence of
//! fixed-size output reports. The first report carries a 20-byte header with
//! the destination rectangle and the total blob length; every following
//! report carries a 5-byte header. All reports are zero-padded to
//! [`MAX_PACKET_SIZE`](crate::protocol::lcd::MAX_PACKET_SIZE).
//!
//! ```text
//! first:        [14 ff 02 2b][ctl][01 00 01 00][X][Y][W][H][00][LEN] payload...
//! continuation: [14 ff 02 2b][ctl] payload...
//! ctl:          1 L 1 i i i i i   (F = first, L = last, i = part index)
//! ```

use std::fmt;
use std::ops::Range;

use zerocopy::byteorder::{BigEndian, U16};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::ProtocolError;
use crate::protocol::lcd::{self, control};

/// One of the nine LCD keys, row-major from the top-left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeySlot(u8);

impl KeySlot {
    /// Number of addressable keys
    pub const COUNT: u8 = lcd::KEY_COUNT;

    /// Create a key slot, rejecting indices outside 0..=8
    pub fn new(index: u8) -> Result<Self, ProtocolError> {
        if index < Self::COUNT {
            Ok(Self(index))
        } else {
            Err(ProtocolError::InvalidKey(index))
        }
    }

    /// All keys in index order
    pub fn all() -> impl Iterator<Item = KeySlot> {
        (0..Self::COUNT).map(KeySlot)
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn row(self) -> u8 {
        self.0 / lcd::GRID_COLS
    }

    pub fn col(self) -> u8 {
        self.0 % lcd::GRID_COLS
    }

    /// Top-left canvas position of this key's tile
    ///
    /// Fails when the position does not fit the 16-bit header fields.
    pub fn origin(self, tile_size: u16) -> Result<(u16, u16), ProtocolError> {
        let offset = |base: u16, cell: u8| {
            tile_size
                .checked_add(lcd::TILE_GAP)
                .and_then(|pitch| pitch.checked_mul(u16::from(cell)))
                .and_then(|d| d.checked_add(base))
                .ok_or(ProtocolError::TileTooLarge(tile_size))
        };
        Ok((
            offset(lcd::ORIGIN_X, self.col())?,
            offset(lcd::ORIGIN_Y, self.row())?,
        ))
    }
}

impl TryFrom<u8> for KeySlot {
    type Error = ProtocolError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Self::new(index)
    }
}

impl fmt::Display for KeySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Build the control byte for a packet
///
/// `index` is 1-based; only its low 5 bits are encoded.
pub fn control_byte(index: u8, first: bool, last: bool) -> u8 {
    let mut value = (index & control::INDEX_MASK) | control::MARKER;
    if first {
        value |= control::FIRST;
    }
    if last {
        value |= control::LAST;
    }
    value
}

/// Decoded control byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlByte {
    pub index: u8,
    pub first: bool,
    pub last: bool,
}

impl From<u8> for ControlByte {
    fn from(value: u8) -> Self {
        Self {
            index: value & control::INDEX_MASK,
            first: value & control::FIRST != 0,
            last: value & control::LAST != 0,
        }
    }
}

/// First-packet header, 20 bytes on the wire
#[derive(Debug, Clone, Copy, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct ImageHeader {
    opcode: [u8; 4],
    control: u8,
    fixed: [u8; 4],
    x: U16<BigEndian>,
    y: U16<BigEndian>,
    width: U16<BigEndian>,
    height: U16<BigEndian>,
    _reserved: u8,
    length: U16<BigEndian>,
}

impl ImageHeader {
    fn new(control: u8, origin: (u16, u16), tile_size: u16, length: u16) -> Self {
        Self {
            opcode: lcd::OPCODE,
            control,
            fixed: lcd::FIRST_FIXED,
            x: U16::new(origin.0),
            y: U16::new(origin.1),
            width: U16::new(tile_size),
            height: U16::new(tile_size),
            _reserved: 0,
            length: U16::new(length),
        }
    }

    /// Parse a header from the start of a report
    pub fn parse(data: &[u8]) -> Option<Self> {
        let (header, _) = Self::read_from_prefix(data).ok()?;
        (header.opcode == lcd::OPCODE).then_some(header)
    }

    pub fn control(&self) -> ControlByte {
        ControlByte::from(self.control)
    }

    pub fn position(&self) -> (u16, u16) {
        (self.x.get(), self.y.get())
    }

    pub fn size(&self) -> (u16, u16) {
        (self.width.get(), self.height.get())
    }

    pub fn payload_len(&self) -> u16 {
        self.length.get()
    }
}

/// One wire packet of an image transfer
#[derive(Debug, Clone)]
pub struct LcdPacket {
    buf: Vec<u8>,
    payload: Range<usize>,
}

impl LcdPacket {
    fn new(header: &[u8], payload: &[u8]) -> Self {
        let mut buf = vec![0u8; lcd::MAX_PACKET_SIZE];
        buf[..header.len()].copy_from_slice(header);
        let start = header.len();
        let end = start + payload.len();
        buf[start..end].copy_from_slice(payload);
        Self {
            buf,
            payload: start..end,
        }
    }

    /// Full zero-padded report as written to the device
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Payload slice carried by this packet
    pub fn payload(&self) -> &[u8] {
        &self.buf[self.payload.clone()]
    }

    pub fn header_len(&self) -> usize {
        self.payload.start
    }

    pub fn control(&self) -> ControlByte {
        ControlByte::from(self.buf[4])
    }

    pub fn is_first(&self) -> bool {
        self.control().first
    }

    pub fn is_last(&self) -> bool {
        self.control().last
    }
}

/// Number of packets needed for a payload of `len` bytes
pub fn packet_count(len: usize) -> usize {
    1 + len.saturating_sub(lcd::FIRST_CAPACITY).div_ceil(lcd::CONT_CAPACITY)
}

/// Split an encoded image into wire packets addressed at `key`
pub fn packetize(
    key: KeySlot,
    tile_size: u16,
    payload: &[u8],
) -> Result<Vec<LcdPacket>, ProtocolError> {
    if payload.len() > lcd::MAX_PAYLOAD {
        return Err(ProtocolError::PayloadTooLarge {
            len: payload.len(),
            max: lcd::MAX_PAYLOAD,
        });
    }

    let mut packets = Vec::with_capacity(packet_count(payload.len()));

    let first_len = payload.len().min(lcd::FIRST_CAPACITY);
    let (head, mut rest) = payload.split_at(first_len);
    let header = ImageHeader::new(
        control_byte(1, true, rest.is_empty()),
        key.origin(tile_size)?,
        tile_size,
        payload.len() as u16,
    );
    packets.push(LcdPacket::new(header.as_bytes(), head));

    let mut part: u8 = 2;
    while !rest.is_empty() {
        let take = rest.len().min(lcd::CONT_CAPACITY);
        let (chunk, tail) = rest.split_at(take);
        let mut header = [0u8; lcd::CONT_HEADER_SIZE];
        header[..4].copy_from_slice(&lcd::OPCODE);
        header[4] = control_byte(part, false, tail.is_empty());
        packets.push(LcdPacket::new(&header, chunk));
        rest = tail;
        part += 1;
    }

    Ok(packets)
}
