// GIF decoding and key-tile rasterization
// Turns animated GIFs into fixed-size RGBA frames for the LCD keys

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use mxconsole_keypad::{Animation, AnimationFrame, KeypadError};
use mxconsole_transport::protocol::timing::DEFAULT_FRAME_MS;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from the GIF decoder
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Invalid GIF: {0}")]
    InvalidHeader(String),

    #[error("GIF contains no decodable frames")]
    EmptyAnimation,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid animation: {0}")]
    Animation(#[from] KeypadError),
}

impl From<gif::DecodingError> for DecodeError {
    fn from(e: gif::DecodingError) -> Self {
        match e {
            gif::DecodingError::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                DecodeError::InvalidHeader(format!("truncated header: {}", io))
            }
            gif::DecodingError::Io(io) => DecodeError::Io(io),
            other => DecodeError::InvalidHeader(other.to_string()),
        }
    }
}

/// One stored GIF frame, still in indexed color
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// Color indices, row-major, `width`×`height`
    pub indices: Vec<u8>,
    /// RGB triplets; the local table, or the global one when absent
    pub palette: Vec<u8>,
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
    /// Display time in milliseconds (never 0)
    pub delay_ms: u32,
}

impl DecodedFrame {
    /// RGB of a color index, if the table has it
    fn color(&self, index: u8) -> Option<[u8; 3]> {
        let i = usize::from(index) * 3;
        self.palette.get(i..i + 3).map(|c| [c[0], c[1], c[2]])
    }
}

/// Decoded container: canvas size plus frames in file order
#[derive(Debug, Clone)]
pub struct DecodedGif {
    pub width: u16,
    pub height: u16,
    pub frames: Vec<DecodedFrame>,
}

/// GIF delays are centiseconds; 0 means "unspecified"
fn frame_delay_ms(centis: u16) -> u32 {
    match u32::from(centis) * 10 {
        0 => DEFAULT_FRAME_MS,
        ms => ms,
    }
}

/// Parse every frame of a GIF stream
///
/// Frames without any color table are skipped. Once the header is read, a
/// frame that fails to decode ends decoding early and keeps what was read;
/// with nothing kept the result is [`DecodeError::EmptyAnimation`].
pub fn decode_frames<R: Read>(reader: R) -> Result<DecodedGif, DecodeError> {
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::Indexed);
    let mut decoder = options.read_info(reader)?;

    let width = decoder.width();
    let height = decoder.height();
    let global = decoder.global_palette().map(<[u8]>::to_vec);
    let mut frames = Vec::new();
    let mut index = 0usize;

    loop {
        let frame = match decoder.read_next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                warn!("GIF frame {} failed to decode, keeping {} frames: {}", index, frames.len(), e);
                break;
            }
        };

        let palette = match (&frame.palette, &global) {
            (Some(local), _) => local.clone(),
            (None, Some(global)) => global.clone(),
            (None, None) => {
                debug!("Skipping GIF frame {}: no color table", index);
                index += 1;
                continue;
            }
        };

        frames.push(DecodedFrame {
            indices: frame.buffer.to_vec(),
            palette,
            left: frame.left,
            top: frame.top,
            width: frame.width,
            height: frame.height,
            delay_ms: frame_delay_ms(frame.delay),
        });
        index += 1;
    }

    if frames.is_empty() {
        return Err(DecodeError::EmptyAnimation);
    }

    debug!(
        "Decoded {}x{} GIF: {} frames ({} skipped)",
        width,
        height,
        frames.len(),
        index - frames.len()
    );
    Ok(DecodedGif {
        width,
        height,
        frames,
    })
}

/// Nearest-neighbor scaler into a reused RGBA buffer
///
/// The buffer starts transparent black and is not cleared between frames,
/// so target pixels a frame cannot resolve keep the previous frame's color.
pub struct Rasterizer {
    width: u32,
    height: u32,
    buffer: Vec<u8>,
}

impl Rasterizer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            buffer: vec![0; width as usize * height as usize * 4],
        }
    }

    /// Scale one frame to the target size
    pub fn rasterize(&mut self, frame: &DecodedFrame) -> &[u8] {
        let src_w = usize::from(frame.width);
        let src_h = usize::from(frame.height);
        let (dst_w, dst_h) = (self.width as usize, self.height as usize);

        for y in 0..dst_h {
            let src_y = y * src_h / dst_h;
            for x in 0..dst_w {
                let src_x = x * src_w / dst_w;
                let Some(&index) = frame.indices.get(src_y * src_w + src_x) else {
                    continue;
                };
                let Some([r, g, b]) = frame.color(index) else {
                    continue;
                };
                let px = (y * dst_w + x) * 4;
                self.buffer[px..px + 4].copy_from_slice(&[r, g, b, 255]);
            }
        }

        &self.buffer
    }
}

/// Decode a GIF stream into a key animation of `width`×`height` frames
pub fn decode_animation<R: Read>(reader: R, width: u32, height: u32) -> Result<Animation, DecodeError> {
    let decoded = decode_frames(reader)?;
    let mut rasterizer = Rasterizer::new(width, height);

    let frames = decoded
        .frames
        .iter()
        .map(|frame| AnimationFrame::new(rasterizer.rasterize(frame).to_vec(), frame.delay_ms))
        .collect();

    Ok(Animation::new(frames, width, height)?)
}

/// Load a GIF file as a square key animation
pub fn load_gif<P: AsRef<Path>>(path: P, size: u32) -> Result<Animation, DecodeError> {
    let file = File::open(path.as_ref())?;
    decode_animation(BufReader::new(file), size, size)
}

/// Load a still image (PNG, JPEG, or a GIF's first frame) as tile RGBA
pub fn load_image<P: AsRef<Path>>(path: P, size: u32) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let path = path.as_ref();
    let is_gif = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gif"));

    if is_gif {
        let animation = load_gif(path, size)?;
        return Ok(animation.frames()[0].rgba().to_vec());
    }

    let img = image::open(path)?.to_rgba8();
    let (src_w, src_h) = img.dimensions();
    Ok(scale_rgba(img.as_raw(), src_w, src_h, size, size).into_owned())
}

/// Nearest-neighbor scale of an RGBA buffer, same sampling as [`Rasterizer`]
fn scale_rgba(src: &[u8], src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> Cow<'_, [u8]> {
    if (src_w, src_h) == (dst_w, dst_h) {
        return Cow::Borrowed(src);
    }
    let (src_w, src_h) = (src_w as usize, src_h as usize);
    let (dst_w, dst_h) = (dst_w as usize, dst_h as usize);
    let mut out = vec![0u8; dst_w * dst_h * 4];
    for y in 0..dst_h {
        let src_y = y * src_h / dst_h;
        for x in 0..dst_w {
            let src_x = x * src_w / dst_w;
            let s = (src_y * src_w + src_x) * 4;
            let d = (y * dst_w + x) * 4;
            if let Some(px) = src.get(s..s + 4) {
                out[d..d + 3].copy_from_slice(&px[..3]);
                out[d + 3] = 255;
            }
        }
    }
    Cow::Owned(out)
}

/// Hue in degrees to RGB at full saturation and value
fn hue_to_rgb(hue: f32) -> [u8; 3] {
    let h = hue.rem_euclid(360.0) / 60.0;
    let x = 1.0 - (h % 2.0 - 1.0).abs();
    let (r, g, b) = match h as u32 {
        0 => (1.0, x, 0.0),
        1 => (x, 1.0, 0.0),
        2 => (0.0, 1.0, x),
        3 => (0.0, x, 1.0),
        4 => (x, 0.0, 1.0),
        _ => (1.0, 0.0, x),
    };
    [(r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8]
}

/// Generate a rainbow sweep for testing without a GIF file
pub fn generate_test_animation(
    num_frames: usize,
    delay_ms: u32,
    size: u32,
) -> Result<Animation, KeypadError> {
    let num_frames = num_frames.max(1);
    let edge = size as usize;
    let frames = (0..num_frames)
        .map(|frame_idx| {
            let hue_offset = frame_idx as f32 / num_frames as f32 * 360.0;
            let mut rgba = Vec::with_capacity(edge * edge * 4);
            for _y in 0..edge {
                for x in 0..edge {
                    let [r, g, b] = hue_to_rgb(hue_offset + x as f32 * 360.0 / edge as f32);
                    rgba.extend_from_slice(&[r, g, b, 255]);
                }
            }
            AnimationFrame::new(rgba, delay_ms)
        })
        .collect();
    Animation::new(frames, size, size)
}

/// Print animation info
pub fn print_animation_info(anim: &Animation) {
    println!("Animation Info:");
    println!("  Dimensions: {}x{}", anim.width(), anim.height());
    println!("  Frames: {}", anim.frame_count());

    let total = anim.total_duration_ms();
    let avg = total as f32 / anim.frame_count().max(1) as f32;
    println!("  Avg frame delay: {avg:.1}ms");
    println!("  Total duration: {}ms ({:.1}s)", total, total as f32 / 1000.0);
}
