//! MX Creative Console driver CLI
//!
//! A command-line interface for the LCD keys of the Logitech MX Creative
//! Console keypad.

use clap::Parser;
use mxconsole_driver::config::Config;

// CLI definitions
mod cli;
use cli::{Cli, Commands, ConfigCommands};

// Command handlers
mod commands;
use commands::DeviceContext;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path)?;

    let printer_config =
        commands::create_printer_config(cli.monitor, cli.hex, cli.json, cli.filter.as_deref())?;
    let ctx = DeviceContext::new(config, cli.device.clone(), printer_config, cli.json);

    match cli.command {
        None | Some(Commands::List) => {
            commands::query::list(&ctx).await?;
        }

        // === LCD Commands ===
        Some(Commands::Play {
            file,
            keys,
            once,
            quality,
            test,
            delay,
        }) => {
            let source = match test {
                Some(frames) => commands::lcd::Source::Test { frames, delay },
                None => match file {
                    Some(path) => commands::lcd::Source::File(path),
                    None => return Err("Either provide a GIF file or use --test".into()),
                },
            };
            commands::lcd::play(&ctx, source, &keys, once, quality).await?;
        }
        Some(Commands::Image { file, key }) => {
            commands::lcd::image(&ctx, &file, key).await?;
        }
        Some(Commands::Color { key, color }) => {
            commands::lcd::color(&ctx, &key, &color).await?;
        }
        Some(Commands::Clear { key }) => {
            commands::lcd::clear(&ctx, key).await?;
        }

        // === Input Commands ===
        Some(Commands::Buttons) => {
            commands::input::buttons(&ctx).await?;
        }
        Some(Commands::Raw) => {
            commands::input::raw(&ctx).await?;
        }

        // === Configuration ===
        Some(Commands::Config(action)) => match action {
            ConfigCommands::Show => commands::utility::config_show(&ctx.config, &config_path)?,
            ConfigCommands::Init { force } => commands::utility::config_init(&config_path, force)?,
            ConfigCommands::Path => commands::utility::config_path(&config_path)?,
        },
    }

    Ok(())
}
