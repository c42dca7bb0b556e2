//! Shared identity types for the Bluetooth layer.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::utils::normalize_address;

/// Stable identity of a camera across sessions.
///
/// Holds the normalized MAC-style address where the platform exposes one,
/// otherwise the platform's opaque device identifier verbatim. Used as the
/// key of the state map, the connection registry and the device store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Builds an id from a raw platform identifier, normalizing any embedded
    /// MAC address so the same camera maps to the same key on every run.
    pub fn new(raw: impl AsRef<str>) -> Self {
        let raw = raw.as_ref();
        Self(normalize_address(raw).unwrap_or_else(|| raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_camera_same_key_regardless_of_spelling() {
        let a = DeviceId::new("e8:6f:38:a2:00:1b");
        let b = DeviceId::new("dev_path/E8-6F-38-A2-00-1B");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "E8:6F:38:A2:00:1B");
    }

    #[test]
    fn opaque_identifiers_pass_through() {
        let id = DeviceId::new("6BD3C3F5-3AC1-4A5B");
        assert_eq!(id.as_str(), "6BD3C3F5-3AC1-4A5B");
    }
}
