//! LCD command handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use mxconsole_driver::gif::{generate_test_animation, load_gif, load_image, print_animation_info};
use mxconsole_keypad::{KeySlot, PlaybackScheduler, Rgb};

use super::{interrupted, keys_or_all, parse_key, setup_interrupt_handler, CommandResult, DeviceContext};

/// Where `play` gets its frames
pub enum Source {
    File(PathBuf),
    Test { frames: usize, delay: u32 },
}

/// Play an animation on keys until Ctrl+C, or until one-shot playback ends
pub async fn play(
    ctx: &DeviceContext,
    source: Source,
    keys: &[u8],
    once: bool,
    quality: Option<u8>,
) -> CommandResult {
    let mut settings = ctx.config.keypad_settings();
    if let Some(q) = quality {
        settings.quality = q;
    }
    let size = u32::from(settings.tile_size);

    let animation = match source {
        Source::Test { frames, delay } => {
            println!("Generating {frames} frame test animation...");
            generate_test_animation(frames, delay, size)?
        }
        Source::File(path) => {
            println!("Loading GIF: {}", path.display());
            load_gif(&path, size).map_err(|e| format!("Failed to load GIF: {e}"))?
        }
    };
    print_animation_info(&animation);
    let animation = Arc::new(animation);

    let keys = keys_or_all(keys)?;
    let pad = ctx.open_keypad_with(settings).await?;
    let mut interrupt = setup_interrupt_handler();

    for &key in &keys {
        pad.player().start(key, Arc::clone(&animation), !once).await?;
    }
    println!(
        "\nPlaying on keys {} (Ctrl+C to stop)...",
        keys.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
    );

    if once {
        tokio::select! {
            _ = report_outcomes(pad.player(), &keys) => {}
            _ = interrupted(&mut interrupt) => {}
        }
    } else {
        interrupted(&mut interrupt).await;
    }

    let stopped = pad.player().stop_all().await;
    println!("\nStopped playback on {stopped} keys");
    Ok(())
}

/// Wait for every key and report the ones that failed
async fn report_outcomes(player: &PlaybackScheduler, keys: &[KeySlot]) {
    let outcomes = join_all(keys.iter().map(|&key| async move { (key, player.wait(key).await) })).await;
    for (key, outcome) in outcomes {
        if let Some(Err(e)) = outcome {
            eprintln!("Key {key}: {e}");
        }
    }
}

/// Show a still image on one key
pub async fn image(ctx: &DeviceContext, file: &Path, key: u8) -> CommandResult {
    let key = KeySlot::new(key)?;
    let settings = ctx.config.keypad_settings();
    let rgba = load_image(file, u32::from(settings.tile_size))
        .map_err(|e| format!("Failed to load {}: {e}", file.display()))?;

    let pad = ctx.open_keypad_with(settings).await?;
    pad.set_key_rgba(key, &rgba).await?;
    println!("Image shown on key {key}");
    Ok(())
}

/// Fill one key, or all keys, with a color
pub async fn color(ctx: &DeviceContext, key: &str, color: &str) -> CommandResult {
    let rgb = Rgb::from_hex(color).ok_or_else(|| format!("Invalid color {color:?}: expected RRGGBB"))?;
    let keys = if key.eq_ignore_ascii_case("all") {
        KeySlot::all().collect()
    } else {
        vec![parse_key(key)?]
    };

    let pad = ctx.open_keypad().await?;
    for key in keys {
        pad.set_key_color(key, rgb).await?;
    }
    println!("Set {key} to #{:02X}{:02X}{:02X}", rgb.r, rgb.g, rgb.b);
    Ok(())
}

/// Blank one key, or every key
pub async fn clear(ctx: &DeviceContext, key: Option<u8>) -> CommandResult {
    let pad = ctx.open_keypad().await?;
    match key {
        Some(index) => {
            let key = KeySlot::new(index)?;
            pad.clear_key(key).await?;
            println!("Cleared key {key}");
        }
        None => {
            pad.clear_all().await?;
            println!("Cleared all keys");
        }
    }
    Ok(())
}
