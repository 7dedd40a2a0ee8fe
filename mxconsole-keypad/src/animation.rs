//! Animation model shared by the decoder and the playback scheduler

use mxconsole_transport::protocol::lcd::TILE_SIZE;

use crate::error::KeypadError;

/// One frame at target resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationFrame {
    rgba: Vec<u8>,
    duration_ms: u32,
}

impl AnimationFrame {
    /// Create a frame; a zero duration is raised to 1 ms
    pub fn new(rgba: Vec<u8>, duration_ms: u32) -> Self {
        Self {
            rgba,
            duration_ms: duration_ms.max(1),
        }
    }

    /// RGBA pixels, row-major
    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    pub fn duration_ms(&self) -> u32 {
        self.duration_ms
    }
}

/// Immutable sequence of equally sized frames
///
/// Whether it loops is decided per key when playback starts.
#[derive(Debug, Clone)]
pub struct Animation {
    frames: Vec<AnimationFrame>,
    width: u32,
    height: u32,
}

impl Animation {
    /// Build an animation, checking every frame is `width`×`height` RGBA
    pub fn new(frames: Vec<AnimationFrame>, width: u32, height: u32) -> Result<Self, KeypadError> {
        if frames.is_empty() {
            return Err(KeypadError::InvalidParameter(
                "animation needs at least one frame".into(),
            ));
        }
        let expected = width as usize * height as usize * 4;
        if let Some((i, frame)) = frames
            .iter()
            .enumerate()
            .find(|(_, f)| f.rgba.len() != expected)
        {
            return Err(KeypadError::InvalidParameter(format!(
                "frame {} is {} bytes, expected {} for {}x{}",
                i,
                frame.rgba.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self {
            frames,
            width,
            height,
        })
    }

    pub fn frames(&self) -> &[AnimationFrame] {
        &self.frames
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Sum of all frame durations
    pub fn total_duration_ms(&self) -> u64 {
        self.frames.iter().map(|f| u64::from(f.duration_ms)).sum()
    }

    /// Whether the frames match the key tile size
    pub fn fits_tile(&self, tile_size: u16) -> bool {
        self.width == u32::from(tile_size) && self.height == u32::from(tile_size)
    }
}

/// Default frame edge for key animations
pub const DEFAULT_SIZE: u32 = TILE_SIZE as u32;
