// catweb test application -- CLI tool for exercising the CAT4Web relay
// client against a live relay.
//
// Usage:
//   catweb-test-app monitor --duration 60
//   catweb-test-app status
//   catweb-test-app freq get 1
//   catweb-test-app freq set 1 14074000
//   catweb-test-app mode set 1 usb
//   catweb-test-app mode set 1 "dig-u|fm"
//   catweb-test-app ptt get 1
//   catweb-test-app --host 127.0.0.1 --insecure --plain-port 34468 status
//
// Logging is controlled with RUST_LOG (default: info), e.g.
//   RUST_LOG=catweb_client=trace catweb-test-app monitor

use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use catweb::{
    CatWebBuilder, CatWebClient, ModeFlags, RelayEvent, RigId, format_freq_mhz,
    format_opt_freq, format_opt_mode, format_opt_status,
};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// catweb test application -- monitors and controls rigs through the relay.
#[derive(Parser)]
#[command(name = "catweb-test-app", version, about)]
struct Cli {
    /// Relay host name.
    #[arg(long)]
    host: Option<String>,

    /// Connect with ws:// on the plain port instead of wss://.
    #[arg(long)]
    insecure: bool,

    /// Override the ws:// port (default: 34468).
    #[arg(long)]
    plain_port: Option<u16>,

    /// Override the wss:// port (default: 34469).
    #[arg(long)]
    secure_port: Option<u16>,

    /// Override the access-token endpoint.
    #[arg(long)]
    token_url: Option<String>,

    /// Delay before reconnecting after a lost connection, in milliseconds.
    #[arg(long, default_value_t = 5000)]
    reconnect_ms: u64,

    /// How long to wait for the relay to accept the session, in seconds.
    #[arg(long, default_value_t = 15)]
    connect_timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print relay events as they arrive.
    Monitor {
        /// Duration in seconds (0 = until Ctrl-C).
        #[arg(long, default_value_t = 0)]
        duration: u64,
    },

    /// Connect, collect rig state for a moment, and print every rig seen.
    Status {
        /// Seconds to collect updates after the relay accepts the session.
        #[arg(long, default_value_t = 2)]
        settle: u64,
    },

    /// Frequency operations.
    Freq {
        #[command(subcommand)]
        action: FreqAction,
    },

    /// Mode operations.
    Mode {
        #[command(subcommand)]
        action: ModeAction,
    },

    /// PTT operations (read-only; the relay does not accept PTT commands).
    Ptt {
        #[command(subcommand)]
        action: PttAction,
    },
}

#[derive(Subcommand)]
enum FreqAction {
    /// Read a rig's frequency.
    Get {
        /// Rig number (1-based).
        rig: RigId,
    },
    /// Set a rig's frequency (in Hz).
    Set {
        /// Rig number (1-based).
        rig: RigId,
        /// Frequency in hertz (e.g. 14074000).
        freq_hz: u64,
    },
}

#[derive(Subcommand)]
enum ModeAction {
    /// Read a rig's mode.
    Get {
        /// Rig number (1-based).
        rig: RigId,
    },
    /// Set a rig's mode.
    Set {
        /// Rig number (1-based).
        rig: RigId,
        /// Mode names joined with `|` (e.g. usb, cw-l, "dig-u|fm") or a hex
        /// bitmask (e.g. 0x02000000).
        mode: ModeFlags,
    },
}

#[derive(Subcommand)]
enum PttAction {
    /// Read a rig's PTT state.
    Get {
        /// Rig number (1-based).
        rig: RigId,
    },
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Echo wait after a set command.
const ECHO_TIMEOUT: Duration = Duration::from_secs(3);

/// State settle time for single-value reads.
const READ_SETTLE: Duration = Duration::from_secs(1);

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn create_client(cli: &Cli) -> Result<CatWebClient> {
    let mut builder = CatWebBuilder::new()
        .secure(!cli.insecure)
        .reconnect_delay(Duration::from_millis(cli.reconnect_ms));
    if let Some(host) = &cli.host {
        builder = builder.host(host);
    }
    if let Some(port) = cli.plain_port {
        builder = builder.plain_port(port);
    }
    if let Some(port) = cli.secure_port {
        builder = builder.secure_port(port);
    }
    if let Some(url) = &cli.token_url {
        builder = builder.token_url(url);
    }
    builder.build().context("failed to configure relay client")
}

/// Start the session and wait until the relay accepts it.
async fn connect_and_wait(client: &CatWebClient, timeout: Duration) -> Result<()> {
    let mut events = client.subscribe();
    client.connect()?;
    println!("Connecting to {}...", client.options().relay_url());

    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            bail!("relay did not accept the session within {timeout:?}");
        }
        match tokio::time::timeout(remaining, events.recv()).await {
            Ok(Ok(RelayEvent::Connected)) => return Ok(()),
            Ok(Ok(RelayEvent::Reconnecting { attempt })) => {
                println!("  retrying (attempt {attempt})...");
            }
            Ok(Ok(_)) | Ok(Err(broadcast::error::RecvError::Lagged(_))) => {}
            Ok(Err(broadcast::error::RecvError::Closed)) => bail!("event channel closed"),
            Err(_) => bail!("relay did not accept the session within {timeout:?}"),
        }
    }
}

/// Wait for an event matching `pred`, up to `timeout`.
async fn wait_for_event<F>(
    events: &mut broadcast::Receiver<RelayEvent>,
    timeout: Duration,
    pred: F,
) -> Option<RelayEvent>
where
    F: Fn(&RelayEvent) -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, events.recv()).await {
            Ok(Ok(event)) if pred(&event) => return Some(event),
            Ok(Ok(_)) | Ok(Err(broadcast::error::RecvError::Lagged(_))) => {}
            Ok(Err(broadcast::error::RecvError::Closed)) | Err(_) => return None,
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_monitor(client: &CatWebClient, duration_secs: u64) -> Result<()> {
    let mut event_rx = client.subscribe();
    client.connect()?;

    println!(
        "Monitoring {} (Ctrl-C to stop)...",
        client.options().relay_url()
    );

    let deadline = if duration_secs > 0 {
        Some(Instant::now() + Duration::from_secs(duration_secs))
    } else {
        None
    };

    loop {
        let timeout = match deadline {
            Some(dl) => {
                let remaining = dl.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    println!("Monitor duration elapsed.");
                    break;
                }
                remaining
            }
            None => Duration::from_secs(3600),
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("Interrupted.");
                break;
            }
            received = tokio::time::timeout(timeout, event_rx.recv()) => match received {
                Ok(Ok(event)) => print_event(&event),
                Ok(Err(broadcast::error::RecvError::Lagged(n))) => {
                    println!("[warning] missed {n} events (consumer too slow)");
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => {
                    println!("Event channel closed.");
                    break;
                }
                Err(_) => {
                    if deadline.is_some() {
                        println!("Monitor duration elapsed.");
                        break;
                    }
                }
            },
        }
    }

    Ok(())
}

fn print_event(event: &RelayEvent) {
    match *event {
        RelayEvent::Connected => println!("[event] connected"),
        RelayEvent::Disconnected => println!("[event] disconnected"),
        RelayEvent::Reconnecting { attempt } => {
            println!("[event] reconnecting (attempt {attempt})");
        }
        RelayEvent::StatusChanged { rig, status } => {
            println!("[event] rig {rig} status: {}", format_opt_status(status));
        }
        RelayEvent::FrequencyChanged { rig, freq_hz } => {
            println!("[event] rig {rig} frequency: {}", format_opt_freq(freq_hz));
        }
        RelayEvent::ModeChanged { rig, mode } => {
            println!("[event] rig {rig} mode: {}", format_opt_mode(mode));
        }
        RelayEvent::PttChanged { rig, on } => {
            let state = if on { "ON (transmitting)" } else { "OFF (receiving)" };
            println!("[event] rig {rig} PTT: {state}");
        }
    }
}

async fn cmd_status(client: &CatWebClient, timeout: Duration, settle_secs: u64) -> Result<()> {
    connect_and_wait(client, timeout).await?;
    tokio::time::sleep(Duration::from_secs(settle_secs)).await;

    let rigs = client.rigs();
    if rigs.is_empty() {
        println!("No rigs reported by the relay.");
        return Ok(());
    }

    println!();
    println!(
        "{:<5} {:<24} {:<18} {:<14} PTT",
        "Rig", "Status", "Frequency", "Mode"
    );
    println!("{:-<5} {:-<24} {:-<18} {:-<14} {:-<3}", "", "", "", "", "");
    for rig in rigs {
        let Some(attrs) = client.rig(rig) else {
            continue;
        };
        println!(
            "{:<5} {:<24} {:<18} {:<14} {}",
            rig,
            format_opt_status(attrs.status),
            format_opt_freq(attrs.frequency_hz),
            format_opt_mode(attrs.mode),
            if attrs.ptt { "TX" } else { "RX" }
        );
    }
    Ok(())
}

async fn cmd_freq_get(client: &CatWebClient, timeout: Duration, rig: RigId) -> Result<()> {
    connect_and_wait(client, timeout).await?;
    tokio::time::sleep(READ_SETTLE).await;
    println!("rig {rig}: {}", format_opt_freq(client.frequency(rig)));
    Ok(())
}

async fn cmd_freq_set(
    client: &CatWebClient,
    timeout: Duration,
    rig: RigId,
    freq_hz: u64,
) -> Result<()> {
    connect_and_wait(client, timeout).await?;
    let mut events = client.subscribe();
    client.set_frequency(rig, freq_hz)?;
    println!("rig {rig}: set to {}", format_freq_mhz(freq_hz));

    let echo = wait_for_event(&mut events, ECHO_TIMEOUT, |e| {
        matches!(e, RelayEvent::FrequencyChanged { rig: r, .. } if *r == rig)
    })
    .await;
    match echo {
        Some(RelayEvent::FrequencyChanged { freq_hz, .. }) => {
            println!("rig {rig}: relay reports {}", format_opt_freq(freq_hz));
        }
        _ => println!("rig {rig}: no confirmation from relay"),
    }
    Ok(())
}

async fn cmd_mode_get(client: &CatWebClient, timeout: Duration, rig: RigId) -> Result<()> {
    connect_and_wait(client, timeout).await?;
    tokio::time::sleep(READ_SETTLE).await;
    println!("rig {rig}: {}", format_opt_mode(client.mode(rig)));
    Ok(())
}

async fn cmd_mode_set(
    client: &CatWebClient,
    timeout: Duration,
    rig: RigId,
    mode: ModeFlags,
) -> Result<()> {
    if mode.is_empty() {
        bail!("mode must name at least one flag");
    }
    connect_and_wait(client, timeout).await?;
    let mut events = client.subscribe();
    client.set_mode(rig, mode)?;
    println!("rig {rig}: mode set to {mode}");

    let echo = wait_for_event(&mut events, ECHO_TIMEOUT, |e| {
        matches!(e, RelayEvent::ModeChanged { rig: r, .. } if *r == rig)
    })
    .await;
    match echo {
        Some(RelayEvent::ModeChanged { mode, .. }) => {
            println!("rig {rig}: relay reports {}", format_opt_mode(mode));
        }
        _ => println!("rig {rig}: no confirmation from relay"),
    }
    Ok(())
}

async fn cmd_ptt_get(client: &CatWebClient, timeout: Duration, rig: RigId) -> Result<()> {
    connect_and_wait(client, timeout).await?;
    tokio::time::sleep(READ_SETTLE).await;
    if client.ptt(rig) {
        println!("rig {rig}: PTT ON (transmitting)");
    } else {
        println!("rig {rig}: PTT OFF (receiving)");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let client = create_client(&cli)?;
    let timeout = Duration::from_secs(cli.connect_timeout);

    let result = match &cli.command {
        Command::Monitor { duration } => cmd_monitor(&client, *duration).await,
        Command::Status { settle } => cmd_status(&client, timeout, *settle).await,
        Command::Freq { action } => match action {
            FreqAction::Get { rig } => cmd_freq_get(&client, timeout, *rig).await,
            FreqAction::Set { rig, freq_hz } => {
                cmd_freq_set(&client, timeout, *rig, *freq_hz).await
            }
        },
        Command::Mode { action } => match action {
            ModeAction::Get { rig } => cmd_mode_get(&client, timeout, *rig).await,
            ModeAction::Set { rig, mode } => cmd_mode_set(&client, timeout, *rig, *mode).await,
        },
        Command::Ptt { action } => match action {
            PttAction::Get { rig } => cmd_ptt_get(&client, timeout, *rig).await,
        },
    };

    client.disconnect();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_freq_set() {
        let cli = Cli::try_parse_from(["catweb-test-app", "freq", "set", "3", "14074000"]).unwrap();
        match cli.command {
            Command::Freq {
                action: FreqAction::Set { rig, freq_hz },
            } => {
                assert_eq!(rig.get(), 3);
                assert_eq!(freq_hz, 14_074_000);
            }
            _ => panic!("expected freq set"),
        }
    }

    #[test]
    fn parses_mode_list() {
        let cli = Cli::try_parse_from(["catweb-test-app", "mode", "set", "1", "usb|fm"]).unwrap();
        match cli.command {
            Command::Mode {
                action: ModeAction::Set { mode, .. },
            } => assert_eq!(mode, ModeFlags::SSB_U | ModeFlags::FM),
            _ => panic!("expected mode set"),
        }
    }

    #[test]
    fn rejects_rig_zero() {
        assert!(Cli::try_parse_from(["catweb-test-app", "freq", "get", "0"]).is_err());
    }

    #[test]
    fn connection_flags() {
        let cli = Cli::try_parse_from([
            "catweb-test-app",
            "--host",
            "127.0.0.1",
            "--insecure",
            "--plain-port",
            "9000",
            "status",
        ])
        .unwrap();
        let client = create_client(&cli).unwrap();
        assert_eq!(client.options().relay_url(), "ws://127.0.0.1:9000");
        assert_eq!(client.options().reconnect_delay, Duration::from_millis(5000));
    }
}
