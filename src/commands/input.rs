//! Input monitor command handlers.

use std::sync::Arc;

use crossterm::style::Stylize;
use mxconsole_transport::{Capabilities, KeypadEvent, TimestampedEvent, Transport};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use super::{interrupted, setup_interrupt_handler, CommandResult, DeviceContext};

/// Open the device and stream its input events
async fn event_stream(
    ctx: &DeviceContext,
) -> Result<(Arc<dyn Transport>, BroadcastStream<TimestampedEvent>), Box<dyn std::error::Error>> {
    let transport = ctx.open_transport().await?;
    let info = transport.device_info();
    if !info.kind.has(Capabilities::BUTTONS) {
        return Err(format!("{} has no buttons", info.kind).into());
    }
    let rx = transport
        .subscribe_events()
        .ok_or("Device input interface could not be opened")?;
    Ok((transport, BroadcastStream::new(rx)))
}

/// Run `handle` on every event until Ctrl+C or the reader stops
async fn for_each_event<F>(mut stream: BroadcastStream<TimestampedEvent>, mut handle: F)
where
    F: FnMut(&TimestampedEvent),
{
    let mut interrupt = setup_interrupt_handler();
    loop {
        tokio::select! {
            _ = interrupted(&mut interrupt) => break,
            item = stream.next() => match item {
                Some(Ok(event)) => handle(&event),
                Some(Err(BroadcastStreamRecvError::Lagged(n))) => {
                    eprintln!("{}", format!("(missed {n} events)").yellow());
                }
                None => {
                    eprintln!("Input reader stopped");
                    break;
                }
            },
        }
    }
}

/// Print key presses until Ctrl+C
pub async fn buttons(ctx: &DeviceContext) -> CommandResult {
    let (transport, stream) = event_stream(ctx).await?;
    println!(
        "Listening for key presses on {} (Ctrl+C to stop)...",
        transport.device_info().display_name()
    );

    let json = ctx.json;
    for_each_event(stream, |event| {
        let KeypadEvent::ButtonActivated { key } = event.event else {
            return;
        };
        if json {
            if let Ok(line) = serde_json::to_string(event) {
                println!("{line}");
            }
        } else {
            println!(
                "[{:>9.3}] {} {}",
                event.timestamp,
                "key".cyan(),
                key.to_string().bold()
            );
        }
    })
    .await;
    Ok(())
}

/// Hex dump every input report until Ctrl+C
pub async fn raw(ctx: &DeviceContext) -> CommandResult {
    let (transport, stream) = event_stream(ctx).await?;
    println!(
        "Dumping input reports from {} (Ctrl+C to stop)...",
        transport.device_info().display_name()
    );

    let json = ctx.json;
    for_each_event(stream, |event| {
        if json {
            if let Ok(line) = serde_json::to_string(event) {
                println!("{line}");
            }
        } else {
            println!(
                "[{:>9.3}] {:>3} bytes: {}",
                event.timestamp,
                event.report.len(),
                hex_line(&event.report)
            );
        }
    })
    .await;
    Ok(())
}

fn hex_line(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}
