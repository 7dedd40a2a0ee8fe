//! Query command handlers.

use crossterm::style::Stylize;
use mxconsole_transport::DeviceDiscovery;

use super::{CommandResult, DeviceContext};

/// List connected consoles
pub async fn list(ctx: &DeviceContext) -> CommandResult {
    let devices = ctx.discovery().list_devices().await?;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    if devices.is_empty() {
        println!("No MX Creative Console devices found");
        return Ok(());
    }

    println!("MX Creative Console devices:");
    for device in &devices {
        let info = &device.info;
        println!(
            "  {} {:04X}:{:04X}  {}",
            info.display_name().bold(),
            info.vid,
            info.pid,
            info.device_path
        );
        println!(
            "      kind={} keys={} capabilities={}",
            info.kind,
            info.kind.key_count(),
            info.kind.capabilities()
        );
        if let Some(serial) = &info.serial {
            println!("      serial={serial}");
        }
    }
    Ok(())
}
