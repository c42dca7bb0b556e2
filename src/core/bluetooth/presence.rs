//! Advertisement-driven presence tracking.
//!
//! An external observer (platform scanner, test harness) feeds appearance
//! and disappearance events in; the engine uses the resulting set to avoid
//! connection attempts against cameras that are clearly not around. An
//! empty set is treated as "no presence information", not "nothing nearby",
//! so a host without a scanner still connects.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::core::bluetooth::types::DeviceId;

/// A camera advertisement came or went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEvent {
    Appeared(DeviceId),
    Disappeared(DeviceId),
}

/// Set of cameras currently advertising.
#[derive(Default)]
pub struct PresenceSet {
    seen: Mutex<HashSet<DeviceId>>,
}

impl PresenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the device was not present before.
    pub fn mark_present(&self, id: &DeviceId) -> bool {
        self.seen.lock().unwrap().insert(id.clone())
    }

    pub fn mark_absent(&self, id: &DeviceId) {
        self.seen.lock().unwrap().remove(id);
    }

    /// Drops all presence information, e.g. when the observer stops.
    pub fn clear(&self) {
        self.seen.lock().unwrap().clear();
    }

    pub fn snapshot(&self) -> HashSet<DeviceId> {
        self.seen.lock().unwrap().clone()
    }

    /// Presence gate for a connection attempt: pass when the device is
    /// advertising, or when there is no presence information at all.
    pub fn allows(&self, id: &DeviceId) -> bool {
        let seen = self.seen.lock().unwrap();
        seen.is_empty() || seen.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> DeviceId {
        DeviceId::new(format!("AA:00:00:00:00:{n:02X}"))
    }

    #[test]
    fn empty_set_allows_everything() {
        let set = PresenceSet::new();
        assert!(set.allows(&id(1)));
    }

    #[test]
    fn populated_set_gates_on_membership() {
        let set = PresenceSet::new();
        set.mark_present(&id(1));
        assert!(set.allows(&id(1)));
        assert!(!set.allows(&id(2)));
    }

    #[test]
    fn clearing_restores_the_open_gate() {
        let set = PresenceSet::new();
        set.mark_present(&id(1));
        set.mark_absent(&id(1));
        assert!(set.allows(&id(2)));

        set.mark_present(&id(1));
        set.clear();
        assert!(set.allows(&id(2)));
    }

    #[test]
    fn mark_present_reports_first_sighting() {
        let set = PresenceSet::new();
        assert!(set.mark_present(&id(1)));
        assert!(!set.mark_present(&id(1)));
    }
}
