//! Device store contract and an in-memory implementation.
//!
//! The engine treats the store as an external system: it subscribes to the
//! enabled-device list and writes sync results back, but owns none of the
//! data. `MemoryDeviceRepository` backs the daemon binary and the tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::core::bluetooth::types::DeviceId;
use crate::error::SyncError;

/// A camera known to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    /// Name shown to the user, not necessarily the advertised name.
    pub name: String,
    /// Vendor model string, e.g. "ILCE-7M4"; drives vendor resolution.
    pub model: String,
    /// Disabled cameras are never connected to.
    pub enabled: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Firmware revision last read off the camera.
    pub firmware_version: Option<String>,
    /// Newest version known to exist for this model. Maintained by the
    /// store owner; the engine only reads it, as a fallback when the
    /// firmware source has no answer for the model.
    pub latest_firmware_version: Option<String>,
    /// Whether the user was already told about the current firmware update.
    pub update_notification_shown: bool,
}

impl Device {
    pub fn new(id: DeviceId, name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            model: model.into(),
            enabled: true,
            last_synced_at: None,
            firmware_version: None,
            latest_firmware_version: None,
            update_notification_shown: false,
        }
    }
}

/// Storage contract the engine runs against.
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// Current list of enabled cameras. The engine's monitor loop follows
    /// this; publishing a new list is what triggers connect/disconnect
    /// sweeps.
    fn enabled_devices(&self) -> watch::Receiver<Vec<Device>>;

    /// Global sync switch. When it flips off every camera is released.
    fn sync_enabled(&self) -> watch::Receiver<bool>;

    async fn device(&self, id: &DeviceId) -> Option<Device>;

    async fn update_last_synced_at(
        &self,
        id: &DeviceId,
        at: DateTime<Utc>,
    ) -> Result<(), SyncError>;

    async fn update_firmware_version(
        &self,
        id: &DeviceId,
        version: &str,
    ) -> Result<(), SyncError>;

    async fn set_update_notification_shown(
        &self,
        id: &DeviceId,
        shown: bool,
    ) -> Result<(), SyncError>;
}

/// Plain in-memory store.
pub struct MemoryDeviceRepository {
    devices: Mutex<HashMap<DeviceId, Device>>,
    devices_tx: watch::Sender<Vec<Device>>,
    sync_enabled_tx: watch::Sender<bool>,
}

impl MemoryDeviceRepository {
    pub fn new() -> Self {
        Self::with_devices(Vec::new())
    }

    pub fn with_devices(devices: Vec<Device>) -> Self {
        let map: HashMap<DeviceId, Device> =
            devices.into_iter().map(|d| (d.id.clone(), d)).collect();
        let enabled = Self::enabled_of(&map);
        Self {
            devices: Mutex::new(map),
            devices_tx: watch::channel(enabled).0,
            sync_enabled_tx: watch::channel(true).0,
        }
    }

    /// Inserts or replaces a camera and republishes the enabled list.
    pub fn upsert(&self, device: Device) {
        let mut devices = self.devices.lock().unwrap();
        devices.insert(device.id.clone(), device);
        self.publish(&devices);
    }

    pub fn remove(&self, id: &DeviceId) {
        let mut devices = self.devices.lock().unwrap();
        devices.remove(id);
        self.publish(&devices);
    }

    pub fn set_enabled(&self, id: &DeviceId, enabled: bool) {
        let mut devices = self.devices.lock().unwrap();
        if let Some(device) = devices.get_mut(id) {
            device.enabled = enabled;
        }
        self.publish(&devices);
    }

    pub fn set_sync_enabled(&self, enabled: bool) {
        self.sync_enabled_tx.send_replace(enabled);
    }

    fn enabled_of(map: &HashMap<DeviceId, Device>) -> Vec<Device> {
        let mut list: Vec<Device> = map.values().filter(|d| d.enabled).cloned().collect();
        list.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        list
    }

    fn publish(&self, map: &HashMap<DeviceId, Device>) {
        self.devices_tx.send_replace(Self::enabled_of(map));
    }

    fn with_device<R>(
        &self,
        id: &DeviceId,
        f: impl FnOnce(&mut Device) -> R,
    ) -> Result<R, SyncError> {
        let mut devices = self.devices.lock().unwrap();
        let device = devices
            .get_mut(id)
            .ok_or_else(|| SyncError::Repository(format!("unknown device {id}")))?;
        let result = f(device);
        self.publish(&devices);
        Ok(result)
    }
}

impl Default for MemoryDeviceRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceRepository for MemoryDeviceRepository {
    fn enabled_devices(&self) -> watch::Receiver<Vec<Device>> {
        self.devices_tx.subscribe()
    }

    fn sync_enabled(&self) -> watch::Receiver<bool> {
        self.sync_enabled_tx.subscribe()
    }

    async fn device(&self, id: &DeviceId) -> Option<Device> {
        self.devices.lock().unwrap().get(id).cloned()
    }

    async fn update_last_synced_at(
        &self,
        id: &DeviceId,
        at: DateTime<Utc>,
    ) -> Result<(), SyncError> {
        self.with_device(id, |d| d.last_synced_at = Some(at))
    }

    async fn update_firmware_version(
        &self,
        id: &DeviceId,
        version: &str,
    ) -> Result<(), SyncError> {
        self.with_device(id, |d| {
            if d.firmware_version.as_deref() != Some(version) {
                d.firmware_version = Some(version.to_string());
                // a new reading restarts the notification cycle
                d.update_notification_shown = false;
            }
        })
    }

    async fn set_update_notification_shown(
        &self,
        id: &DeviceId,
        shown: bool,
    ) -> Result<(), SyncError> {
        self.with_device(id, |d| d.update_notification_shown = shown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera(id: &str, enabled: bool) -> Device {
        let mut device = Device::new(DeviceId::new(id), "Test body", "ILCE-7M4");
        device.enabled = enabled;
        device
    }

    #[tokio::test]
    async fn enabled_list_tracks_the_enabled_flag() {
        let repo = MemoryDeviceRepository::with_devices(vec![
            camera("AA:00:00:00:00:01", true),
            camera("AA:00:00:00:00:02", false),
        ]);
        let rx = repo.enabled_devices();
        assert_eq!(rx.borrow().len(), 1);

        repo.set_enabled(&DeviceId::new("AA:00:00:00:00:02"), true);
        assert_eq!(rx.borrow().len(), 2);
    }

    #[tokio::test]
    async fn firmware_update_resets_the_notification_flag() {
        let repo = MemoryDeviceRepository::with_devices(vec![camera("AA:00:00:00:00:01", true)]);
        let id = DeviceId::new("AA:00:00:00:00:01");

        repo.set_update_notification_shown(&id, true).await.unwrap();
        repo.update_firmware_version(&id, "2.00").await.unwrap();

        let device = repo.device(&id).await.unwrap();
        assert_eq!(device.firmware_version.as_deref(), Some("2.00"));
        assert!(!device.update_notification_shown);
    }

    #[tokio::test]
    async fn writes_to_unknown_devices_fail() {
        let repo = MemoryDeviceRepository::new();
        let err = repo
            .update_last_synced_at(&DeviceId::new("AA:00:00:00:00:09"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Repository(_)));
    }
}
