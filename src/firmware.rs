//! Firmware catalog and update notifications.
//!
//! The catalog is a JSON file keyed by camera model, produced out-of-band
//! by a scraper over the vendors' download pages:
//!
//! ```json
//! { "last_updated": "2025-08-01T10:00:00Z",
//!   "cameras": { "ILCE-7M4": "4.00", "ZV-E10": "2.01" } }
//! ```
//!
//! The engine compares the catalog against the version read off a camera
//! and raises a notification once per new version.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::repository::Device;

/// Source of "latest known firmware" answers.
#[async_trait]
pub trait FirmwareSource: Send + Sync {
    async fn latest_version_for(&self, model: &str) -> Option<String>;
}

/// Sink for "a newer firmware exists" notifications.
pub trait UpdateNotifier: Send + Sync {
    fn notify_firmware_update(&self, device: &Device, latest: &str);
}

/// Static catalog loaded from the scraper's JSON output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FirmwareCatalog {
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub cameras: HashMap<String, String>,
}

impl FirmwareCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads the catalog; a missing file yields an empty catalog so the
    /// daemon runs fine without one.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("No firmware catalog at {:?}, update checks disabled", path);
            return Ok(Self::empty());
        }
        let raw = fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read firmware catalog {path:?}"))?;
        let catalog: FirmwareCatalog = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse firmware catalog {path:?}"))?;
        info!(
            "Loaded firmware catalog with {} camera(s), last updated {}",
            catalog.cameras.len(),
            catalog.last_updated.as_deref().unwrap_or("unknown")
        );
        Ok(catalog)
    }
}

#[async_trait]
impl FirmwareSource for FirmwareCatalog {
    async fn latest_version_for(&self, model: &str) -> Option<String> {
        let model = model.trim();
        self.cameras
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(model))
            .map(|(_, version)| version.clone())
    }
}

/// Notifier that just logs; the daemon has no UI surface to raise it on.
pub struct LogUpdateNotifier;

impl UpdateNotifier for LogUpdateNotifier {
    fn notify_firmware_update(&self, device: &Device, latest: &str) {
        info!(
            "Firmware update available for {} ({}): {} -> {}",
            device.name,
            device.model,
            device.firmware_version.as_deref().unwrap_or("unknown"),
            latest
        );
    }
}

/// Compares dotted version strings numerically per segment, e.g.
/// "1.10" is newer than "1.9". Non-numeric versions fall back to a plain
/// string comparison.
pub fn is_newer(candidate: &str, current: &str) -> bool {
    match (parse_segments(candidate), parse_segments(current)) {
        (Some(candidate), Some(current)) => candidate > current,
        _ => candidate.trim() > current.trim(),
    }
}

fn parse_segments(version: &str) -> Option<Vec<u32>> {
    let version = version.trim().trim_start_matches(['v', 'V']);
    version
        .split('.')
        .map(|segment| segment.parse::<u32>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::types::DeviceId;

    #[test]
    fn numeric_segments_beat_string_order() {
        assert!(is_newer("1.10", "1.9"));
        assert!(is_newer("2.00", "1.99"));
        assert!(!is_newer("1.31", "1.31"));
        assert!(!is_newer("1.30", "1.31"));
        assert!(is_newer("v2.0.1", "2.0.0"));
    }

    #[test]
    fn non_numeric_versions_fall_back_to_string_compare() {
        assert!(is_newer("build-b", "build-a"));
        assert!(!is_newer("build-a", "build-a"));
    }

    #[tokio::test]
    async fn catalog_lookup_is_case_insensitive() {
        let raw = r#"{
            "last_updated": "2025-08-01T10:00:00Z",
            "cameras": { "ILCE-7M4": "4.00", "ZV-E10": "2.01" }
        }"#;
        let catalog: FirmwareCatalog = serde_json::from_str(raw).unwrap();

        assert_eq!(
            catalog.latest_version_for("ilce-7m4").await.as_deref(),
            Some("4.00")
        );
        assert_eq!(catalog.latest_version_for("X100V").await, None);
    }

    #[tokio::test]
    async fn missing_catalog_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = FirmwareCatalog::load(dir.path().join("absent.json"))
            .await
            .unwrap();
        assert!(catalog.cameras.is_empty());
    }

    #[tokio::test]
    async fn catalog_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("firmware.json");

        let mut catalog = FirmwareCatalog::empty();
        catalog.last_updated = Some("2025-08-01T10:00:00Z".into());
        catalog.cameras.insert("ILCE-7M4".into(), "4.00".into());
        tokio::fs::write(&path, serde_json::to_string_pretty(&catalog).unwrap())
            .await
            .unwrap();

        let loaded = FirmwareCatalog::load(&path).await.unwrap();
        assert_eq!(loaded.cameras.get("ILCE-7M4").map(String::as_str), Some("4.00"));
    }

    #[test]
    fn log_notifier_accepts_any_device() {
        let device = Device::new(DeviceId::new("AA:00:00:00:00:01"), "A7 IV", "ILCE-7M4");
        LogUpdateNotifier.notify_firmware_update(&device, "4.00");
    }
}
