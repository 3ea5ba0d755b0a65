//! Core types used throughout catweb.
//!
//! The numeric values of [`ModeFlags`] and [`RigStatus`] are shared with the
//! relay server and must stay bit-exact.

use std::fmt;
use std::num::NonZeroU32;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

/// Identifier of one remote rig behind the relay.
///
/// Rig numbers are small positive integers assigned by the relay. Zero is
/// never a valid rig, so it cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RigId(NonZeroU32);

impl RigId {
    /// Create a `RigId` from a raw rig number. Returns `None` for zero.
    pub fn new(id: u32) -> Option<Self> {
        NonZeroU32::new(id).map(RigId)
    }

    /// Return the raw rig number.
    pub fn get(&self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for RigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RigId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let n: u32 = s
            .trim()
            .parse()
            .map_err(|e| format!("invalid rig number {s:?}: {e}"))?;
        RigId::new(n).ok_or_else(|| "rig number must be non-zero".to_string())
    }
}

/// Connection status of a rig as reported by the relay.
///
/// Stored as the raw status code so that codes added by newer relay
/// versions survive a round trip through the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RigStatus(u32);

impl RigStatus {
    /// The rig has not been configured in the relay.
    pub const NOT_CONFIGURED: RigStatus = RigStatus(0x0000_0000);
    /// The rig is configured but disabled.
    pub const DISABLED: RigStatus = RigStatus(0x0000_0001);
    /// The rig's serial port is busy or missing.
    pub const PORT_BUSY: RigStatus = RigStatus(0x0000_0002);
    /// The port is open but the rig does not answer.
    pub const NOT_RESPONDING: RigStatus = RigStatus(0x0000_0003);
    /// The rig is on-line.
    pub const ONLINE: RigStatus = RigStatus(0x0000_0004);

    /// Wrap a raw status code.
    pub const fn from_code(code: u32) -> Self {
        RigStatus(code)
    }

    /// Return the raw status code.
    pub const fn code(&self) -> u32 {
        self.0
    }

    /// Whether this is one of the five codes known to this client.
    pub fn is_known(&self) -> bool {
        self.0 <= Self::ONLINE.0
    }

    /// Human-readable description of the status.
    ///
    /// Codes this client does not know map to `"Unknown status"`.
    pub fn description(&self) -> &'static str {
        match *self {
            Self::NOT_CONFIGURED => "Rig is not configured",
            Self::DISABLED => "Rig is disabled",
            Self::PORT_BUSY => "Port is not available",
            Self::NOT_RESPONDING => "Rig is not responding",
            Self::ONLINE => "On-line",
            _ => "Unknown status",
        }
    }
}

impl fmt::Display for RigStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Modulation mode bitmask.
///
/// Flags are independent bits and may be combined. The client never
/// validates combinations; it stores and forwards the value as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ModeFlags(u32);

impl ModeFlags {
    /// CW, upper sideband offset.
    pub const CW_U: ModeFlags = ModeFlags(0x0080_0000);
    /// CW, lower sideband offset.
    pub const CW_L: ModeFlags = ModeFlags(0x0100_0000);
    /// Upper sideband voice.
    pub const SSB_U: ModeFlags = ModeFlags(0x0200_0000);
    /// Lower sideband voice.
    pub const SSB_L: ModeFlags = ModeFlags(0x0400_0000);
    /// Digital, upper sideband.
    pub const DIG_U: ModeFlags = ModeFlags(0x0800_0000);
    /// Digital, lower sideband.
    pub const DIG_L: ModeFlags = ModeFlags(0x1000_0000);
    /// Amplitude modulation.
    pub const AM: ModeFlags = ModeFlags(0x2000_0000);
    /// Frequency modulation.
    pub const FM: ModeFlags = ModeFlags(0x4000_0000);

    const NAMED: [(ModeFlags, &'static str); 8] = [
        (Self::CW_U, "CW-U"),
        (Self::CW_L, "CW-L"),
        (Self::SSB_U, "SSB-U"),
        (Self::SSB_L, "SSB-L"),
        (Self::DIG_U, "DIG-U"),
        (Self::DIG_L, "DIG-L"),
        (Self::AM, "AM"),
        (Self::FM, "FM"),
    ];

    /// Wrap raw mode bits. Unknown bits are preserved.
    pub const fn from_bits(bits: u32) -> Self {
        ModeFlags(bits)
    }

    /// Return the raw mode bits.
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Whether all bits of `other` are set in `self`.
    pub const fn contains(&self, other: ModeFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no bits are set.
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl BitOr for ModeFlags {
    type Output = ModeFlags;

    fn bitor(self, rhs: ModeFlags) -> ModeFlags {
        ModeFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ModeFlags {
    fn bitor_assign(&mut self, rhs: ModeFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for ModeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rest = self.0;
        let mut first = true;
        for (flag, name) in Self::NAMED {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                rest &= !flag.0;
                first = false;
            }
        }
        if rest != 0 || first {
            if !first {
                f.write_str("|")?;
            }
            write!(f, "0x{rest:08X}")?;
        }
        Ok(())
    }
}

/// Error returned when a string cannot be parsed into [`ModeFlags`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseModeError(String);

impl fmt::Display for ParseModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown mode: {}", self.0)
    }
}

impl std::error::Error for ParseModeError {}

impl FromStr for ModeFlags {
    type Err = ParseModeError;

    /// Parse a `|`-separated list of mode names (`"SSB-U"`, `"usb|am"`) or a
    /// raw hex value (`"0x02000000"`).
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut flags = ModeFlags::default();
        for part in s.split('|').map(str::trim) {
            let upper = part.to_uppercase();
            let flag = match upper.as_str() {
                "CW-U" | "CW" => ModeFlags::CW_U,
                "CW-L" | "CWR" => ModeFlags::CW_L,
                "SSB-U" | "USB" => ModeFlags::SSB_U,
                "SSB-L" | "LSB" => ModeFlags::SSB_L,
                "DIG-U" | "DIGU" => ModeFlags::DIG_U,
                "DIG-L" | "DIGL" => ModeFlags::DIG_L,
                "AM" => ModeFlags::AM,
                "FM" => ModeFlags::FM,
                _ => {
                    let hex = upper
                        .strip_prefix("0X")
                        .ok_or_else(|| ParseModeError(part.to_string()))?;
                    let bits = u32::from_str_radix(hex, 16)
                        .map_err(|_| ParseModeError(part.to_string()))?;
                    ModeFlags(bits)
                }
            };
            flags |= flag;
        }
        Ok(flags)
    }
}

/// Lifecycle state of the relay session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No session has been started.
    #[default]
    Idle,
    /// A transport is being opened or the handshake is in progress.
    Connecting,
    /// The relay confirmed the access token.
    Authenticated,
    /// The transport closed; a reconnect may be pending.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Authenticated => "authenticated",
            ConnectionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rig_id_rejects_zero() {
        assert!(RigId::new(0).is_none());
        assert_eq!(RigId::new(7).unwrap().get(), 7);
    }

    #[test]
    fn rig_id_from_str() {
        assert_eq!("3".parse::<RigId>().unwrap().get(), 3);
        assert!("0".parse::<RigId>().is_err());
        assert!("x".parse::<RigId>().is_err());
    }

    #[test]
    fn mode_flag_values_are_wire_exact() {
        assert_eq!(ModeFlags::CW_U.bits(), 0x0080_0000);
        assert_eq!(ModeFlags::CW_L.bits(), 0x0100_0000);
        assert_eq!(ModeFlags::SSB_U.bits(), 0x0200_0000);
        assert_eq!(ModeFlags::SSB_L.bits(), 0x0400_0000);
        assert_eq!(ModeFlags::DIG_U.bits(), 0x0800_0000);
        assert_eq!(ModeFlags::DIG_L.bits(), 0x1000_0000);
        assert_eq!(ModeFlags::AM.bits(), 0x2000_0000);
        assert_eq!(ModeFlags::FM.bits(), 0x4000_0000);
    }

    #[test]
    fn status_codes_are_wire_exact() {
        assert_eq!(RigStatus::NOT_CONFIGURED.code(), 0);
        assert_eq!(RigStatus::DISABLED.code(), 1);
        assert_eq!(RigStatus::PORT_BUSY.code(), 2);
        assert_eq!(RigStatus::NOT_RESPONDING.code(), 3);
        assert_eq!(RigStatus::ONLINE.code(), 4);
    }

    #[test]
    fn status_descriptions() {
        assert_eq!(RigStatus::NOT_CONFIGURED.description(), "Rig is not configured");
        assert_eq!(RigStatus::DISABLED.description(), "Rig is disabled");
        assert_eq!(RigStatus::PORT_BUSY.description(), "Port is not available");
        assert_eq!(RigStatus::NOT_RESPONDING.description(), "Rig is not responding");
        assert_eq!(RigStatus::ONLINE.description(), "On-line");
        assert_eq!(RigStatus::from_code(42).description(), "Unknown status");
        assert!(!RigStatus::from_code(42).is_known());
    }

    #[test]
    fn mode_flags_combine() {
        let m = ModeFlags::SSB_U | ModeFlags::DIG_U;
        assert!(m.contains(ModeFlags::SSB_U));
        assert!(m.contains(ModeFlags::DIG_U));
        assert!(!m.contains(ModeFlags::AM));
        assert_eq!(m.bits(), 0x0A00_0000);
    }

    #[test]
    fn mode_flags_display() {
        assert_eq!(ModeFlags::SSB_U.to_string(), "SSB-U");
        assert_eq!((ModeFlags::CW_U | ModeFlags::FM).to_string(), "CW-U|FM");
        assert_eq!(ModeFlags::from_bits(0).to_string(), "0x00000000");
        assert_eq!(
            ModeFlags::from_bits(0x0200_0001).to_string(),
            "SSB-U|0x00000001"
        );
    }

    #[test]
    fn mode_flags_parse() {
        assert_eq!("usb".parse::<ModeFlags>().unwrap(), ModeFlags::SSB_U);
        assert_eq!(
            "SSB-U|DIG-U".parse::<ModeFlags>().unwrap(),
            ModeFlags::SSB_U | ModeFlags::DIG_U
        );
        assert_eq!(
            "0x20000000".parse::<ModeFlags>().unwrap(),
            ModeFlags::AM
        );
        assert!("RTTY".parse::<ModeFlags>().is_err());
    }

    #[test]
    fn connection_state_default_is_idle() {
        assert_eq!(ConnectionState::default(), ConnectionState::Idle);
        assert_eq!(ConnectionState::Authenticated.to_string(), "authenticated");
    }
}
