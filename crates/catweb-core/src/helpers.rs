//! Formatting helpers for displaying rig state.

use crate::types::{ModeFlags, RigStatus};

/// Format a frequency in hertz as a human-readable MHz string.
///
/// Returns a string like `"14.074000 MHz"` with six decimal places,
/// which is the standard display precision for amateur radio frequencies.
///
/// # Example
///
/// ```
/// use catweb_core::format_freq_mhz;
///
/// assert_eq!(format_freq_mhz(14_074_000), "14.074000 MHz");
/// assert_eq!(format_freq_mhz(432_100_000), "432.100000 MHz");
/// ```
pub fn format_freq_mhz(freq_hz: u64) -> String {
    let mhz = freq_hz as f64 / 1_000_000.0;
    format!("{mhz:.6} MHz")
}

/// Format an optional frequency, printing `"unknown"` when unset.
pub fn format_opt_freq(freq_hz: Option<u64>) -> String {
    freq_hz.map_or_else(|| "unknown".to_string(), format_freq_mhz)
}

/// Format an optional mode bitmask, printing `"unknown"` when unset.
pub fn format_opt_mode(mode: Option<ModeFlags>) -> String {
    mode.map_or_else(|| "unknown".to_string(), |m| m.to_string())
}

/// Format an optional status, printing `"unknown"` when unset.
pub fn format_opt_status(status: Option<RigStatus>) -> String {
    status.map_or_else(|| "unknown".to_string(), |s| s.description().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_freq_mhz_hf() {
        assert_eq!(format_freq_mhz(7_074_000), "7.074000 MHz");
        assert_eq!(format_freq_mhz(14_250_500), "14.250500 MHz");
    }

    #[test]
    fn format_freq_mhz_zero() {
        assert_eq!(format_freq_mhz(0), "0.000000 MHz");
    }

    #[test]
    fn format_optional_values() {
        assert_eq!(format_opt_freq(None), "unknown");
        assert_eq!(format_opt_freq(Some(3_573_000)), "3.573000 MHz");
        assert_eq!(format_opt_mode(Some(ModeFlags::AM)), "AM");
        assert_eq!(format_opt_mode(None), "unknown");
        assert_eq!(format_opt_status(Some(RigStatus::ONLINE)), "On-line");
        assert_eq!(format_opt_status(None), "unknown");
    }
}
