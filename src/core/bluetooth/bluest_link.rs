//! Production connector and transport over the platform Bluetooth stack.
//!
//! `BluestConnector` finds the camera (already-connected devices first,
//! then a discovery scan), connects, walks the GATT surface once and hands
//! out a `BluestTransport` exposing the discovered characteristics as
//! channels. The transport polls link liveness, since the stack gives no
//! reliable disconnect event on every platform.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bluest::{Adapter, Characteristic};
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::core::bluetooth::constants::{LINK_POLL_INTERVAL_SECS, SONY_WRITE_LIMIT};
use crate::core::bluetooth::transport::{CameraConnector, ChannelTransport};
use crate::core::bluetooth::types::DeviceId;
use crate::error::SyncError;
use crate::repository::Device;

pub struct BluestConnector {
    adapter: Adapter,
}

impl BluestConnector {
    /// Grabs the default adapter and waits for it to power up.
    pub async fn new() -> Result<Self, SyncError> {
        let adapter = Adapter::default()
            .await
            .ok_or_else(|| SyncError::Transport("no bluetooth adapter available".into()))?;
        adapter.wait_available().await?;
        Ok(Self { adapter })
    }

    /// Finds the peripheral behind a device id. Already-connected devices
    /// are checked first; otherwise a scan runs until the device shows up
    /// or the stream ends. The caller bounds the whole thing with its
    /// connect timeout.
    async fn find_device(&self, id: &DeviceId) -> Result<bluest::Device, SyncError> {
        debug!("Checking for connected devices");
        for device in self.adapter.connected_devices().await? {
            if Self::matches(&device, id) {
                info!("Device {} is already connected", id);
                return Ok(device);
            }
        }

        info!("Scanning for {}", id);
        let mut scan_stream = self.adapter.scan(&[]).await?;
        while let Some(discovered) = scan_stream.next().await {
            let device = discovered.device;
            if Self::matches(&device, id) {
                debug!(
                    "Found {} (RSSI: {:?})",
                    device.name().unwrap_or_else(|_| "Unknown".to_string()),
                    discovered.rssi
                );
                return Ok(device);
            }
        }
        Err(SyncError::DeviceNotFound(id.clone()))
    }

    fn matches(device: &bluest::Device, id: &DeviceId) -> bool {
        DeviceId::new(device.id().to_string()) == *id
    }
}

#[async_trait]
impl CameraConnector for BluestConnector {
    async fn connect(&self, device: &Device) -> Result<Arc<dyn ChannelTransport>, SyncError> {
        let target = self.find_device(&device.id).await?;

        if !target.is_connected().await {
            info!("Initiating connection to {}...", device.id);
            self.adapter.connect_device(&target).await?;
        }

        info!("Connection successful, discovering services...");
        let mut channels = HashMap::new();
        for service in target.services().await? {
            debug!("Service {}", service.uuid());
            for characteristic in service.characteristics().await? {
                channels.insert(characteristic.uuid(), characteristic);
            }
        }
        info!("Discovered {} channel(s) on {}", channels.len(), device.id);

        Ok(Arc::new(BluestTransport::start(
            self.adapter.clone(),
            target,
            channels,
        )))
    }
}

pub struct BluestTransport {
    adapter: Adapter,
    device: bluest::Device,
    channels: HashMap<Uuid, Characteristic>,
    connected_rx: watch::Receiver<bool>,
    watch_task: JoinHandle<()>,
}

impl BluestTransport {
    fn start(
        adapter: Adapter,
        device: bluest::Device,
        channels: HashMap<Uuid, Characteristic>,
    ) -> Self {
        let (connected_tx, connected_rx) = watch::channel(true);
        let watch_task = tokio::spawn(watch_link(device.clone(), connected_tx));
        Self {
            adapter,
            device,
            channels,
            connected_rx,
            watch_task,
        }
    }

    fn channel(&self, channel: Uuid) -> Result<&Characteristic, SyncError> {
        self.channels
            .get(&channel)
            .ok_or(SyncError::ChannelMissing(channel))
    }
}

impl Drop for BluestTransport {
    fn drop(&mut self) {
        self.watch_task.abort();
    }
}

#[async_trait]
impl ChannelTransport for BluestTransport {
    fn write_limit(&self) -> usize {
        SONY_WRITE_LIMIT
    }

    fn has_channel(&self, channel: Uuid) -> bool {
        self.channels.contains_key(&channel)
    }

    async fn read_channel(&self, channel: Uuid) -> Result<Vec<u8>, SyncError> {
        let characteristic = self.channel(channel)?;
        Ok(characteristic.read().await?)
    }

    async fn write_channel(&self, channel: Uuid, payload: &[u8]) -> Result<(), SyncError> {
        let characteristic = self.channel(channel)?;
        characteristic.write(payload).await?;
        Ok(())
    }

    async fn subscribe(
        &self,
        channel: Uuid,
    ) -> Result<watch::Receiver<Option<Vec<u8>>>, SyncError> {
        let characteristic = self.channel(channel)?.clone();
        let (frames_tx, frames_rx) = watch::channel(None);
        tokio::spawn(pump_notifications(characteristic, frames_tx));
        Ok(frames_rx)
    }

    fn connected(&self) -> watch::Receiver<bool> {
        self.connected_rx.clone()
    }

    async fn disconnect(&self) {
        if self.device.is_connected().await {
            info!("Disconnecting from device {}", self.device.id());
            if let Err(e) = self.adapter.disconnect_device(&self.device).await {
                warn!("Disconnect failed: {}", e);
            }
        } else {
            debug!("Device {} not connected", self.device.id());
        }
    }
}

/// Polls the link until it drops, then reports false exactly once.
async fn watch_link(device: bluest::Device, connected_tx: watch::Sender<bool>) {
    let interval = Duration::from_secs(LINK_POLL_INTERVAL_SECS);
    loop {
        tokio::time::sleep(interval).await;
        if !device.is_connected().await {
            info!("Link to {} lost", device.id());
            let _ = connected_tx.send(false);
            break;
        }
        // all receivers gone means the transport was dropped
        if connected_tx.is_closed() {
            break;
        }
    }
}

/// Forwards notification frames into a watch channel, giving subscribers
/// replay-of-latest semantics.
async fn pump_notifications(
    characteristic: Characteristic,
    frames_tx: watch::Sender<Option<Vec<u8>>>,
) {
    info!("Subscribing to notifications on {}", characteristic.uuid());
    match characteristic.notify().await {
        Ok(mut notification_stream) => {
            while let Some(result) = notification_stream.next().await {
                match result {
                    Ok(value) => {
                        debug!("Received {} byte frame", value.len());
                        if frames_tx.send(Some(value)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Error in notification stream: {}", e);
                        break;
                    }
                }
            }
        }
        Err(e) => {
            error!("Failed to subscribe to notifications: {}", e);
        }
    }
    info!("Notification stream ended");
}
