// CLI definitions using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mxconsole")]
#[command(author, version, about = "Logitech MX Creative Console LCD keypad driver")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable transport monitoring (prints every report written and event read)
    #[arg(long, global = true)]
    pub monitor: bool,

    /// Show raw hex dump alongside decoded output
    #[arg(long, global = true)]
    pub hex: bool,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Filter monitor output (all, events, writes)
    #[arg(long, global = true)]
    pub filter: Option<String>,

    /// Config file (default: ~/.config/mxconsole/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Open this hidraw node instead of discovering devices
    #[arg(long, global = true, value_name = "PATH")]
    pub device: Option<String>,

    /// Log level when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List connected consoles
    #[command(visible_alias = "ls")]
    List,

    // === LCD Commands ===
    /// Play a GIF on one or more keys until Ctrl+C
    #[command(visible_alias = "gif")]
    Play {
        /// GIF file
        #[arg(required_unless_present = "test")]
        file: Option<PathBuf>,
        /// Keys to play on, comma separated (default: all)
        #[arg(short, long, value_delimiter = ',', value_parser = clap::value_parser!(u8).range(0..9))]
        keys: Vec<u8>,
        /// Play once instead of looping
        #[arg(long)]
        once: bool,
        /// JPEG quality override (1-100)
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=100))]
        quality: Option<u8>,
        /// Play a generated rainbow of N frames instead of a file
        #[arg(long, value_name = "FRAMES")]
        test: Option<usize>,
        /// Frame delay for --test (ms)
        #[arg(long, default_value = "100")]
        delay: u32,
    },

    /// Show a still image (PNG, JPEG or first GIF frame) on a key
    #[command(visible_alias = "img")]
    Image {
        /// Image file
        file: PathBuf,
        /// Target key (0-8)
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..9))]
        key: u8,
    },

    /// Fill a key (or all keys) with a solid color
    Color {
        /// Key index 0-8, or "all"
        key: String,
        /// Color as RRGGBB
        color: String,
    },

    /// Blank one key, or every key
    Clear {
        /// Key to clear (default: all)
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..9))]
        key: Option<u8>,
    },

    // === Input Commands ===
    /// Print key presses until Ctrl+C
    #[command(visible_alias = "btn")]
    Buttons,

    /// Hex dump every input report until Ctrl+C
    Raw,

    // === Configuration ===
    /// Show or create the config file
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Print the config file path
    Path,
}
