//! Monitor real-time relay events.
//!
//! Demonstrates subscribing to the relay event stream and printing all
//! events as they arrive. This is useful for building live displays or
//! debugging the relay connection.
//!
//! Events include the session lifecycle (connect, disconnect, reconnect)
//! and per-rig status, frequency, mode, and PTT changes.
//!
//! # Requirements
//!
//! - The CAT4Web relay running and reachable
//!
//! # Usage
//!
//! ```sh
//! cargo run -p catweb --example monitor_events
//! ```

use std::time::Duration;

use catweb::{CatWebBuilder, RelayEvent};
use catweb::{format_opt_freq, format_opt_mode, format_opt_status};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let client = CatWebBuilder::new().build()?;
    println!("Connecting to {}...", client.options().relay_url());

    let mut events = client.subscribe();
    client.connect()?;
    println!("Monitoring for 60 seconds...\n");

    let deadline = tokio::time::Instant::now() + Duration::from_secs(60);

    println!("{:<12} Event", "Timestamp");
    println!("{:-<12} {:-<50}", "", "");

    let start = tokio::time::Instant::now();

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }

        match tokio::time::timeout(remaining, events.recv()).await {
            Ok(Ok(event)) => {
                let elapsed = start.elapsed();
                let timestamp = format!("{:>6}.{:03}s", elapsed.as_secs(), elapsed.subsec_millis());

                match event {
                    RelayEvent::Connected => println!("{timestamp} Connected"),
                    RelayEvent::Disconnected => println!("{timestamp} Disconnected"),
                    RelayEvent::Reconnecting { attempt } => {
                        println!("{timestamp} Reconnecting      attempt {attempt}");
                    }
                    RelayEvent::StatusChanged { rig, status } => {
                        println!(
                            "{timestamp} StatusChanged     rig {rig} -> {}",
                            format_opt_status(status)
                        );
                    }
                    RelayEvent::FrequencyChanged { rig, freq_hz } => {
                        println!(
                            "{timestamp} FrequencyChanged  rig {rig} -> {}",
                            format_opt_freq(freq_hz)
                        );
                    }
                    RelayEvent::ModeChanged { rig, mode } => {
                        println!(
                            "{timestamp} ModeChanged       rig {rig} -> {}",
                            format_opt_mode(mode)
                        );
                    }
                    RelayEvent::PttChanged { rig, on } => {
                        let state = if on { "TX" } else { "RX" };
                        println!("{timestamp} PttChanged        rig {rig} -> {state}");
                    }
                }
            }
            Ok(Err(tokio::sync::broadcast::error::RecvError::Lagged(n))) => {
                println!("(missed {n} events due to lag)");
            }
            Ok(Err(tokio::sync::broadcast::error::RecvError::Closed)) => {
                println!("Event channel closed.");
                break;
            }
            Err(_) => {
                // Timeout -- monitoring period elapsed.
                break;
            }
        }
    }

    client.disconnect();
    println!("\nMonitoring complete.");
    Ok(())
}
