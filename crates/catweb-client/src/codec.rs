//! Relay wire format encoding and decoding.
//!
//! The relay speaks UTF-8 text frames over the WebSocket. Commands flow from
//! client to relay as colon-separated text; state updates and the handshake
//! confirmation flow from relay to client as JSON objects.
//!
//! # Frame formats
//!
//! ```text
//! Command:   <rig>:<param>:<value>         param is "freq" or "mode"
//! Token:     token:<value>
//! Auth:      {"auth":true}
//! State:     {"type":"status"|"freq"|"mode"|"ptt","rig":<n>,"value":<v>|null}
//! ```
//!
//! No escaping is performed on outbound frames. All encoding/decoding in this
//! module is pure parsing -- no I/O is performed.

use serde::Deserialize;
use serde_json::Value;

use catweb_core::{Error, ModeFlags, Result, RigId, RigStatus};

/// Parameter name for frequency commands and updates.
pub const PARAM_FREQ: &str = "freq";

/// Parameter name for mode commands and updates.
pub const PARAM_MODE: &str = "mode";

/// Update type carrying a rig's connection status.
pub const TYPE_STATUS: &str = "status";

/// Update type carrying a rig's PTT state.
pub const TYPE_PTT: &str = "ptt";

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// A command sent from the client to the relay.
///
/// Only frequency and mode can be set; status and PTT are relay-to-client
/// only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Tune a rig.
    SetFrequency {
        /// Target rig.
        rig: RigId,
        /// Frequency in hertz.
        freq_hz: u64,
    },
    /// Change a rig's modulation mode.
    SetMode {
        /// Target rig.
        rig: RigId,
        /// Mode bitmask, forwarded as-is.
        mode: ModeFlags,
    },
}

/// Encode a command frame.
///
/// Example output: `"3:freq:14074000"`, `"3:mode:33554432"`
pub fn encode_command(command: &Command) -> String {
    match command {
        Command::SetFrequency { rig, freq_hz } => format!("{rig}:{PARAM_FREQ}:{freq_hz}"),
        Command::SetMode { rig, mode } => format!("{rig}:{PARAM_MODE}:{}", mode.bits()),
    }
}

/// Encode the handshake token frame.
///
/// Example output: `"token:abc123"`
pub fn encode_token(token: &str) -> String {
    format!("token:{token}")
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// A decoded frame received from the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// Handshake confirmation: `{"auth":true}`.
    AuthConfirmed,
    /// Rig status update.
    Status {
        rig: RigId,
        status: Option<RigStatus>,
    },
    /// Rig frequency update.
    Frequency { rig: RigId, freq_hz: Option<u64> },
    /// Rig mode update.
    Mode {
        rig: RigId,
        mode: Option<ModeFlags>,
    },
    /// Rig PTT update.
    Ptt { rig: RigId, on: bool },
    /// A state update of a known type whose `rig` is missing, zero, or not
    /// a number.
    Unroutable(String),
    /// A frame with an unrecognized `type`. Ignored by the session.
    Unknown(String),
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default)]
    auth: Value,
    #[serde(default, rename = "type")]
    kind: Value,
    #[serde(default)]
    rig: Value,
    #[serde(default)]
    value: Value,
}

/// Parse a single text frame received from the relay.
///
/// Returns [`Error::Protocol`] when the frame is not a JSON object.
pub fn decode_message(frame: &str) -> Result<InboundMessage> {
    let value: Value = serde_json::from_str(frame)
        .map_err(|e| Error::Protocol(format!("invalid relay frame: {e}")))?;
    // A derived struct would also accept a JSON array as positional fields.
    if !value.is_object() {
        return Err(Error::Protocol(format!(
            "relay frame is not a JSON object: {value}"
        )));
    }
    let raw = RawFrame::deserialize(value)
        .map_err(|e| Error::Protocol(format!("invalid relay frame: {e}")))?;

    if raw.auth == Value::Bool(true) {
        return Ok(InboundMessage::AuthConfirmed);
    }

    let kind = match &raw.kind {
        Value::String(s) => s.as_str(),
        other => return Ok(InboundMessage::Unknown(other.to_string())),
    };

    if !matches!(kind, TYPE_STATUS | PARAM_FREQ | PARAM_MODE | TYPE_PTT) {
        return Ok(InboundMessage::Unknown(kind.to_string()));
    }

    let Some(rig) = parse_int(&raw.rig)
        .and_then(|n| u32::try_from(n).ok())
        .and_then(RigId::new)
    else {
        return Ok(InboundMessage::Unroutable(kind.to_string()));
    };

    let message = match kind {
        TYPE_STATUS => InboundMessage::Status {
            rig,
            status: parse_int(&raw.value)
                .and_then(|n| u32::try_from(n).ok())
                .map(RigStatus::from_code),
        },
        PARAM_FREQ => InboundMessage::Frequency {
            rig,
            freq_hz: parse_int(&raw.value).and_then(|n| u64::try_from(n).ok()),
        },
        PARAM_MODE => InboundMessage::Mode {
            rig,
            mode: parse_int(&raw.value)
                .and_then(|n| u32::try_from(n).ok())
                .map(ModeFlags::from_bits),
        },
        _ => InboundMessage::Ptt {
            rig,
            on: is_truthy(&raw.value),
        },
    };
    Ok(message)
}

/// Parse an integer from a JSON value the way the relay's values are meant.
///
/// Numbers are truncated toward zero. Strings are parsed by their leading
/// integer (`"14074000.5"` is 14074000, `" 42abc"` is 42, `"0x1F"` is 31).
/// `null`, booleans, containers, and strings with no leading integer yield
/// `None`.
pub fn parse_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => parse_leading_int(s),
        _ => None,
    }
}

fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let (radix, digits) = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => (16, hex),
        None => (10, digits),
    };

    let end = digits
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let magnitude = i64::from_str_radix(&digits[..end], radix).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Interpret a PTT value as a boolean.
///
/// `null`, `false`, `0`, `""` and `"0"` are false; everything else is true.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(_) | Value::Object(_) => true,
    }
}
