//! Asynchronous relay event types.
//!
//! Events are emitted by the session through a `tokio::sync::broadcast`
//! channel whenever the connection or a rig's cached state changes. The same
//! events drive the single-slot callbacks registered on the client.

use crate::types::{ModeFlags, RigId, RigStatus};

/// An event emitted when the relay connection or rig state changes.
///
/// Attribute events carry the value as it was stored in the cache, so a
/// `None` means the relay reported the attribute as unknown.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    /// The relay accepted the access token.
    Connected,

    /// The transport to the relay closed.
    Disconnected,

    /// A reconnect attempt is starting after an unexpected close.
    Reconnecting {
        /// The reconnection attempt number (1-based).
        attempt: u32,
    },

    /// A rig's connection status changed.
    StatusChanged {
        /// Which rig changed.
        rig: RigId,
        /// New status, or `None` if the relay reported it as unknown.
        status: Option<RigStatus>,
    },

    /// A rig's frequency changed.
    FrequencyChanged {
        /// Which rig changed.
        rig: RigId,
        /// New frequency in hertz.
        freq_hz: Option<u64>,
    },

    /// A rig's modulation mode changed.
    ModeChanged {
        /// Which rig changed.
        rig: RigId,
        /// New mode bitmask.
        mode: Option<ModeFlags>,
    },

    /// Push-to-talk state changed (TX/RX transition).
    PttChanged {
        /// Which rig changed.
        rig: RigId,
        /// `true` if transmitting.
        on: bool,
    },
}

impl RelayEvent {
    /// The rig this event refers to, if any.
    pub fn rig(&self) -> Option<RigId> {
        match self {
            RelayEvent::StatusChanged { rig, .. }
            | RelayEvent::FrequencyChanged { rig, .. }
            | RelayEvent::ModeChanged { rig, .. }
            | RelayEvent::PttChanged { rig, .. } => Some(*rig),
            _ => None,
        }
    }
}
