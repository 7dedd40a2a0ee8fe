// MX Creative Console driver - shared library
// GIF decoding for the LCD keys and persistent configuration

pub mod config;
pub mod gif;

pub use config::Config;
pub use gif::{decode_animation, load_gif, DecodeError};
