//! Tune a rig through the relay using callbacks.
//!
//! Registers the single-slot callbacks, waits for the relay to accept the
//! session, then sets rig 1 to 14.074 MHz USB-data and prints the echoed
//! state.
//!
//! # Usage
//!
//! ```sh
//! cargo run -p catweb --example tune_rig
//! ```

use std::time::Duration;

use catweb::{CatWebBuilder, ModeFlags, RigId, format_freq_mhz, format_opt_mode};
use tokio::sync::Notify;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let client = CatWebBuilder::new().build()?;
    let rig = RigId::new(1).ok_or_else(|| anyhow::anyhow!("rig id must be non-zero"))?;

    let connected = std::sync::Arc::new(Notify::new());
    let notify = std::sync::Arc::clone(&connected);
    client.on_connect(move || notify.notify_one());
    client.on_disconnect(|| println!("relay connection closed"));
    client.on_frequency_change(|rig, freq| {
        if let Some(hz) = freq {
            println!("rig {rig} frequency {}", format_freq_mhz(hz));
        }
    });
    client.on_mode_change(|rig, mode| println!("rig {rig} mode {}", format_opt_mode(mode)));

    client.connect()?;
    tokio::time::timeout(Duration::from_secs(15), connected.notified()).await?;
    println!("status: {}", client.status_text(rig).unwrap_or("unknown"));

    client.set_frequency(rig, 14_074_000)?;
    client.set_mode(rig, ModeFlags::DIG_U)?;

    // Give the relay time to echo the new state.
    tokio::time::sleep(Duration::from_secs(2)).await;
    println!(
        "cached: {} / {}",
        catweb::format_opt_freq(client.frequency(rig)),
        format_opt_mode(client.mode(rig))
    );

    client.disconnect();
    Ok(())
}
