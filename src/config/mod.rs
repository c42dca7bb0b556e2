//! Daemon configuration.

use std::path::{Path, PathBuf};

use anyhow::Result;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::core::bluetooth::types::DeviceId;
use crate::core::location::TimeZoneSpec;
use crate::repository::Device;
use crate::utils::ensure_directory_exists;

pub const CONFIG_FILE_NAME: &str = "camsync.json";

/// A camera entry as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceEntry {
    /// MAC-style address or platform identifier of the camera.
    pub address: String,
    /// Display name; defaults to the model when omitted.
    #[serde(default)]
    pub name: Option<String>,
    /// Vendor model string, e.g. "ILCE-7M4".
    pub model: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Fixed host position for setups without a live GPS source.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FixedLocation {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Host name pushed to cameras during setup.
    pub display_name: String,

    /// UTC offset of the host in minutes, including DST.
    pub timezone_offset_minutes: i16,

    /// DST portion of the offset in minutes.
    #[serde(default)]
    pub timezone_dst_minutes: i16,

    /// Path of the firmware catalog JSON; update checks are off without it.
    #[serde(default)]
    pub firmware_catalog: Option<PathBuf>,

    /// Fixed position to feed cameras when no GPS source is wired up.
    #[serde(default)]
    pub location: Option<FixedLocation>,

    #[serde(default)]
    pub devices: Vec<DeviceEntry>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            display_name: "camsync".to_string(),
            timezone_offset_minutes: 0,
            timezone_dst_minutes: 0,
            firmware_catalog: None,
            location: None,
            devices: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Loads the config from a configuration file.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Config file not found at {:?}, using default.", path);
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&config_json)?;

        info!("Config loaded from {:?}", path);
        Ok(config)
    }

    /// Saves the current config to a configuration file.
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            ensure_directory_exists(parent).await?;
        }

        let config_json = match serde_json::to_string_pretty(&self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize config to JSON: {}", e);
                return Err(e.into());
            }
        };

        fs::write(path, config_json).await?;

        info!("Config saved to {:?}.", path);
        Ok(())
    }

    pub fn timezone(&self) -> TimeZoneSpec {
        TimeZoneSpec::new(self.timezone_offset_minutes, self.timezone_dst_minutes)
    }

    /// Builds repository devices from the configured entries.
    pub fn devices(&self) -> Vec<Device> {
        self.devices
            .iter()
            .map(|entry| {
                let id = DeviceId::new(&entry.address);
                let name = entry.name.clone().unwrap_or_else(|| entry.model.clone());
                let mut device = Device::new(id, name, entry.model.clone());
                device.enabled = entry.enabled;
                device
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(dir.path().join("absent.json")).await.unwrap();
        assert_eq!(config.display_name, "camsync");
        assert!(config.devices.is_empty());
    }

    #[tokio::test]
    async fn config_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut config = AppConfig::default();
        config.display_name = "studio-laptop".into();
        config.timezone_offset_minutes = -480;
        config.devices.push(DeviceEntry {
            address: "e8:6f:38:a2:00:1b".into(),
            name: Some("A7 IV".into()),
            model: "ILCE-7M4".into(),
            enabled: true,
        });

        config.save(&path).await.unwrap();
        let loaded = AppConfig::load(&path).await.unwrap();

        assert_eq!(loaded.display_name, "studio-laptop");
        assert_eq!(loaded.timezone().offset_minutes, -480);
        assert_eq!(loaded.devices.len(), 1);
    }

    #[test]
    fn devices_normalize_addresses_and_default_names() {
        let mut config = AppConfig::default();
        config.devices.push(DeviceEntry {
            address: "e8-6f-38-a2-00-1b".into(),
            name: None,
            model: "ZV-E10".into(),
            enabled: false,
        });

        let devices = config.devices();
        assert_eq!(devices[0].id.as_str(), "E8:6F:38:A2:00:1B");
        assert_eq!(devices[0].name, "ZV-E10");
        assert!(!devices[0].enabled);
    }

    #[test]
    fn minimal_json_parses_with_defaults() {
        let raw = r#"{
            "display_name": "host",
            "timezone_offset_minutes": 120,
            "devices": [ { "address": "AA:BB:CC:DD:EE:FF", "model": "ILCE-7M4" } ]
        }"#;
        let config: AppConfig = serde_json::from_str(raw).unwrap();
        assert!(config.devices[0].enabled);
        assert_eq!(config.timezone_dst_minutes, 0);
        assert!(config.location.is_none());
    }
}
