//! Cached rig state from relay updates.
//!
//! The relay pushes every attribute change after authentication, so the
//! client's getters read from this cache with zero latency. Each attribute
//! is independently unset until the relay (or an optimistic frequency write)
//! first provides it. PTT is the exception and reads as `false` until seen.

use std::collections::HashMap;

use catweb_core::{ModeFlags, RigId, RigStatus};

/// Last-known attributes of one rig.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RigAttributes {
    /// Connection status between the relay and the radio.
    pub status: Option<RigStatus>,
    /// Frequency in Hz.
    pub frequency_hz: Option<u64>,
    /// Modulation mode bitmask, stored as received.
    pub mode: Option<ModeFlags>,
    /// Whether the rig is transmitting.
    pub ptt: bool,
}

/// A single attribute write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigAttribute {
    Status(Option<RigStatus>),
    Frequency(Option<u64>),
    Mode(Option<ModeFlags>),
    Ptt(bool),
}

/// Mapping from rig to its last-known attributes.
///
/// Entries are created lazily on first write and never removed while the
/// client lives. No validation is performed on stored values.
#[derive(Debug, Clone, Default)]
pub struct RigStateCache {
    rigs: HashMap<RigId, RigAttributes>,
}

impl RigStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite one attribute of `rig`, leaving the others untouched.
    pub fn update(&mut self, rig: RigId, attribute: RigAttribute) {
        let entry = self.rigs.entry(rig).or_default();
        match attribute {
            RigAttribute::Status(status) => entry.status = status,
            RigAttribute::Frequency(freq_hz) => entry.frequency_hz = freq_hz,
            RigAttribute::Mode(mode) => entry.mode = mode,
            RigAttribute::Ptt(on) => entry.ptt = on,
        }
    }

    pub fn get(&self, rig: RigId) -> Option<&RigAttributes> {
        self.rigs.get(&rig)
    }

    pub fn status(&self, rig: RigId) -> Option<RigStatus> {
        self.get(rig).and_then(|a| a.status)
    }

    pub fn frequency(&self, rig: RigId) -> Option<u64> {
        self.get(rig).and_then(|a| a.frequency_hz)
    }

    pub fn mode(&self, rig: RigId) -> Option<ModeFlags> {
        self.get(rig).and_then(|a| a.mode)
    }

    pub fn ptt(&self, rig: RigId) -> bool {
        self.get(rig).is_some_and(|a| a.ptt)
    }

    /// Rigs with at least one write, in ascending order.
    pub fn rigs(&self) -> Vec<RigId> {
        let mut rigs: Vec<RigId> = self.rigs.keys().copied().collect();
        rigs.sort_unstable();
        rigs
    }

    pub fn len(&self) -> usize {
        self.rigs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rigs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rig(n: u32) -> RigId {
        RigId::new(n).unwrap()
    }

    #[test]
    fn unseen_rig_reads_unset() {
        let cache = RigStateCache::new();
        assert_eq!(cache.status(rig(1)), None);
        assert_eq!(cache.frequency(rig(1)), None);
        assert_eq!(cache.mode(rig(1)), None);
        assert!(!cache.ptt(rig(1)));
        assert!(cache.get(rig(1)).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn update_touches_only_named_attribute() {
        let mut cache = RigStateCache::new();
        cache.update(rig(2), RigAttribute::Frequency(Some(7_074_000)));
        cache.update(rig(2), RigAttribute::Ptt(true));

        let attrs = cache.get(rig(2)).unwrap();
        assert_eq!(attrs.frequency_hz, Some(7_074_000));
        assert!(attrs.ptt);
        assert_eq!(attrs.status, None);
        assert_eq!(attrs.mode, None);
    }

    #[test]
    fn unset_write_clears_value() {
        let mut cache = RigStateCache::new();
        cache.update(rig(1), RigAttribute::Mode(Some(ModeFlags::FM)));
        cache.update(rig(1), RigAttribute::Mode(None));
        assert_eq!(cache.mode(rig(1)), None);
        // The entry itself stays.
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn rigs_are_isolated_and_sorted() {
        let mut cache = RigStateCache::new();
        cache.update(rig(9), RigAttribute::Status(Some(RigStatus::ONLINE)));
        cache.update(rig(3), RigAttribute::Status(Some(RigStatus::DISABLED)));

        assert_eq!(cache.status(rig(9)), Some(RigStatus::ONLINE));
        assert_eq!(cache.status(rig(3)), Some(RigStatus::DISABLED));
        assert_eq!(cache.rigs(), vec![rig(3), rig(9)]);
    }
}
