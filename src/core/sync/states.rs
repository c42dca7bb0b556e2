//! Per-device connection states and the observable state map.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;
use tokio::sync::watch;

use crate::core::bluetooth::types::DeviceId;
use crate::error::{self, SyncError};

/// Connection lifecycle of one camera.
///
/// `Syncing` is the only state carrying live session data. `Unreachable`
/// means the camera is out of range or off; `Error` means something broke,
/// with `recoverable` deciding whether the periodic sweep may retry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DeviceState {
    Disconnected,
    Searching,
    Connecting,
    Syncing {
        firmware_version: Option<String>,
        last_location_sync: Option<DateTime<Utc>>,
    },
    Unreachable,
    Error {
        message: String,
        recoverable: bool,
    },
}

impl DeviceState {
    /// States a new connection attempt may start from. Fatal errors are
    /// excluded so the sweep does not hammer cameras we cannot drive.
    pub fn is_eligible_for_sync(&self) -> bool {
        match self {
            DeviceState::Disconnected | DeviceState::Unreachable => true,
            DeviceState::Error { recoverable, .. } => *recoverable,
            _ => false,
        }
    }

    /// True while a connection attempt owns this device.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            DeviceState::Searching | DeviceState::Connecting | DeviceState::Syncing { .. }
        )
    }

    pub fn is_syncing(&self) -> bool {
        matches!(self, DeviceState::Syncing { .. })
    }
}

/// Maps a connection failure to the terminal state the device lands in.
///
/// Unreachable-looking failures become `Unreachable`; pairing rejections
/// become a recoverable `Error` with a message worth showing to a person;
/// missing vendor support is the one non-recoverable `Error`.
pub fn classify_failure(err: &SyncError) -> DeviceState {
    if error::indicates_unreachable(err) {
        return DeviceState::Unreachable;
    }
    if error::indicates_pairing_rejection(err) {
        return DeviceState::Error {
            message: "Pairing was rejected. Confirm the pairing prompt on the camera and retry."
                .to_string(),
            recoverable: true,
        };
    }
    match err {
        SyncError::UnsupportedVendor(model) => DeviceState::Error {
            message: format!("No sync support for camera model {model}"),
            recoverable: false,
        },
        other => DeviceState::Error {
            message: other.to_string(),
            recoverable: true,
        },
    }
}

/// Observable map of every known device's state.
///
/// Readers subscribe to a watch channel carrying an `Arc` of the whole
/// map; every mutation publishes a fresh snapshot, so readers never see a
/// map mid-update and never block writers.
pub struct StateMap {
    tx: watch::Sender<Arc<HashMap<DeviceId, DeviceState>>>,
}

impl StateMap {
    pub fn new() -> Self {
        Self {
            tx: watch::channel(Arc::new(HashMap::new())).0,
        }
    }

    /// Current state of a device; devices never seen are `Disconnected`.
    pub fn get(&self, id: &DeviceId) -> DeviceState {
        self.tx
            .borrow()
            .get(id)
            .cloned()
            .unwrap_or(DeviceState::Disconnected)
    }

    pub fn set(&self, id: &DeviceId, state: DeviceState) {
        self.transform(id, |_| Some(state));
    }

    /// Atomically replaces the state when `f` returns `Some`. The closure
    /// sees the current state; returning `None` leaves it untouched.
    /// Returns whether a replacement happened.
    pub fn transform(
        &self,
        id: &DeviceId,
        f: impl FnOnce(&DeviceState) -> Option<DeviceState>,
    ) -> bool {
        let mut changed = false;
        self.tx.send_modify(|map| {
            let current = map.get(id).cloned().unwrap_or(DeviceState::Disconnected);
            if let Some(next) = f(&current) {
                debug!("Device {} state: {:?} -> {:?}", id, current, next);
                Arc::make_mut(map).insert(id.clone(), next);
                changed = true;
            }
        });
        changed
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<HashMap<DeviceId, DeviceState>>> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> Arc<HashMap<DeviceId, DeviceState>> {
        self.tx.borrow().clone()
    }
}

impl Default for StateMap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> DeviceId {
        DeviceId::new(format!("AA:00:00:00:00:{n:02X}"))
    }

    #[test]
    fn unknown_devices_read_as_disconnected() {
        let map = StateMap::new();
        assert_eq!(map.get(&id(1)), DeviceState::Disconnected);
    }

    #[test]
    fn snapshots_are_isolated_from_later_writes() {
        let map = StateMap::new();
        map.set(&id(1), DeviceState::Searching);
        let before = map.snapshot();

        map.set(&id(1), DeviceState::Connecting);

        assert_eq!(before.get(&id(1)), Some(&DeviceState::Searching));
        assert_eq!(map.get(&id(1)), DeviceState::Connecting);
    }

    #[test]
    fn transform_sees_current_state_and_can_decline() {
        let map = StateMap::new();
        map.set(
            &id(1),
            DeviceState::Error {
                message: "broken".into(),
                recoverable: false,
            },
        );

        // link-loss reset applies only to actively syncing devices
        let changed = map.transform(&id(1), |s| {
            s.is_syncing().then_some(DeviceState::Disconnected)
        });

        assert!(!changed);
        assert!(matches!(map.get(&id(1)), DeviceState::Error { .. }));
    }

    #[test]
    fn watchers_observe_every_published_snapshot() {
        let map = StateMap::new();
        let mut rx = map.subscribe();
        map.set(&id(2), DeviceState::Searching);
        assert!(rx.has_changed().unwrap());
        assert_eq!(
            rx.borrow_and_update().get(&id(2)),
            Some(&DeviceState::Searching)
        );
    }

    #[test]
    fn eligibility_follows_the_recoverable_flag() {
        assert!(DeviceState::Disconnected.is_eligible_for_sync());
        assert!(DeviceState::Unreachable.is_eligible_for_sync());
        assert!(
            DeviceState::Error {
                message: "x".into(),
                recoverable: true
            }
            .is_eligible_for_sync()
        );
        assert!(
            !DeviceState::Error {
                message: "x".into(),
                recoverable: false
            }
            .is_eligible_for_sync()
        );
        assert!(!DeviceState::Connecting.is_eligible_for_sync());
        assert!(
            !DeviceState::Syncing {
                firmware_version: None,
                last_location_sync: None
            }
            .is_eligible_for_sync()
        );
    }

    #[test]
    fn timeouts_classify_as_unreachable() {
        assert_eq!(classify_failure(&SyncError::Timeout), DeviceState::Unreachable);
        assert_eq!(
            classify_failure(&SyncError::Transport("operation timed out".into())),
            DeviceState::Unreachable
        );
    }

    #[test]
    fn unsupported_vendor_classifies_as_fatal() {
        let state = classify_failure(&SyncError::UnsupportedVendor("GR IIIx".into()));
        match state {
            DeviceState::Error {
                message,
                recoverable,
            } => {
                assert!(message.contains("GR IIIx"));
                assert!(!recoverable);
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn pairing_rejection_gets_a_friendly_recoverable_error() {
        let state = classify_failure(&SyncError::PairingRejected);
        match state {
            DeviceState::Error {
                message,
                recoverable,
            } => {
                assert!(message.contains("Confirm the pairing prompt"));
                assert!(recoverable);
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn other_failures_stay_recoverable_errors() {
        let state = classify_failure(&SyncError::Transport("write rejected".into()));
        assert!(matches!(
            state,
            DeviceState::Error {
                recoverable: true,
                ..
            }
        ));
    }
}
