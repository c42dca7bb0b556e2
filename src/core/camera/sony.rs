//! Sony camera delegate.
//!
//! Drives the location service write sequence and the vendor setup steps
//! over a [`ChannelTransport`]. The write sequence has a strict order the
//! camera enforces: the status subscription goes up before the first data
//! write, newer bodies want the lock and enable switches asserted before
//! every location packet, and teardown releases them in reverse order.
//! Older bodies expose the data channel alone and get plain writes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use tokio::sync::{Mutex, watch};
use uuid::Uuid;

use crate::core::bluetooth::constants::{DATA_WRITE_ATTEMPTS, DATA_WRITE_RETRY_DELAY_MS};
use crate::core::bluetooth::transport::ChannelTransport;
use crate::core::camera::capabilities::{
    CameraVendor, GattMap, GpsSyncCapabilities, SONY_GATT_MAP,
};
use crate::core::camera::sony_codec::{
    CameraMode, StatusEvent, decode_camera_status, decode_location_config,
    decode_status_notification, encode_datetime, encode_location,
};
use crate::core::camera::{CameraDelegate, SetupOutcome};
use crate::core::location::{LocationFix, TimeZoneSpec};
use crate::error::SyncError;

/// Single-byte switch values for the lock/enable/geo-tag channels.
const SWITCH_ON: [u8; 1] = [0x01];
const SWITCH_OFF: [u8; 1] = [0x00];

/// Per-link protocol state guarded by one mutex so concurrent callers
/// cannot interleave their write sequences.
struct Session {
    /// True once the enable switch has been written this link. Decides
    /// whether teardown has anything to release.
    engaged: bool,
    /// Whether location packets carry the timezone suffix. Read from the
    /// camera's config blob during setup; excluded until known.
    include_timezone: bool,
    timezone: TimeZoneSpec,
    subscribed: bool,
}

pub struct SonyCamera {
    transport: Arc<dyn ChannelTransport>,
    map: &'static GattMap,
    session: Mutex<Session>,
    status_tx: watch::Sender<Option<StatusEvent>>,
}

impl SonyCamera {
    pub fn new(transport: Arc<dyn ChannelTransport>) -> Self {
        Self {
            transport,
            map: &SONY_GATT_MAP,
            session: Mutex::new(Session {
                engaged: false,
                include_timezone: false,
                timezone: TimeZoneSpec::UTC,
                subscribed: false,
            }),
            status_tx: watch::channel(None).0,
        }
    }

    /// Latest decoded status notification from the camera.
    pub fn status_events(&self) -> watch::Receiver<Option<StatusEvent>> {
        self.status_tx.subscribe()
    }

    /// True when the camera exposes the channel and the vendor map knows it.
    fn channel(&self, slot: Option<Uuid>) -> Option<Uuid> {
        slot.filter(|channel| self.transport.has_channel(*channel))
    }

    async fn ensure_status_subscription(&self, session: &mut Session) {
        if session.subscribed {
            return;
        }
        let Some(channel) = self.channel(self.map.status_notify) else {
            return;
        };
        match self.transport.subscribe(channel).await {
            Ok(frames) => {
                session.subscribed = true;
                let status_tx = self.status_tx.clone();
                tokio::spawn(pump_status_frames(frames, status_tx));
            }
            Err(e) => warn!("Status subscription failed: {}", e),
        }
    }

    async fn write_data_with_retry(&self, channel: Uuid, packet: &[u8]) -> Result<(), SyncError> {
        let mut last_error = None;
        for attempt in 1..=DATA_WRITE_ATTEMPTS {
            match self.transport.write_channel(channel, packet).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!("Location write attempt {} failed: {}", attempt, e);
                    last_error = Some(e);
                    if attempt < DATA_WRITE_ATTEMPTS {
                        tokio::time::sleep(Duration::from_millis(DATA_WRITE_RETRY_DELAY_MS)).await;
                    }
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| SyncError::Transport("location write never attempted".into())))
    }

    async fn push_display_name(&self, display_name: &str) -> Result<(), SyncError> {
        let Some(channel) = self.channel(self.map.device_name) else {
            return Ok(());
        };
        self.transport
            .write_channel(channel, display_name.as_bytes())
            .await
    }

    async fn push_datetime(&self, timezone: TimeZoneSpec) -> Result<(), SyncError> {
        if self.map.unified_time_and_location() {
            debug!("Clock rides in the location packet, skipping date/time write");
            return Ok(());
        }
        let Some(channel) = self.channel(self.map.date_time) else {
            return Ok(());
        };
        let packet = encode_datetime(Utc::now(), timezone);
        self.transport.write_channel(channel, &packet).await
    }

    /// Reads the location-feature config blob and learns whether the camera
    /// wants the timezone suffix on location packets.
    async fn read_location_config(&self) -> Result<Option<bool>, SyncError> {
        let Some(channel) = self.channel(self.map.location_config) else {
            return Ok(None);
        };
        let blob = self.transport.read_channel(channel).await?;
        Ok(decode_location_config(&blob))
    }

    async fn enable_geo_tagging(&self) -> Result<(), SyncError> {
        let Some(channel) = self.channel(self.map.geo_tag) else {
            return Ok(());
        };
        self.transport.write_channel(channel, &SWITCH_ON).await
    }

    async fn read_firmware_version(&self) -> Result<Option<String>, SyncError> {
        let Some(channel) = self.channel(self.map.firmware_version) else {
            return Ok(None);
        };
        let raw = self.transport.read_channel(channel).await?;
        let version = String::from_utf8_lossy(&raw)
            .trim_matches(char::from(0))
            .trim()
            .to_string();
        Ok((!version.is_empty()).then_some(version))
    }

    async fn read_camera_mode(&self) -> Result<CameraMode, SyncError> {
        let Some(channel) = self.channel(self.map.status_notify) else {
            return Ok(CameraMode::Unknown);
        };
        let raw = self.transport.read_channel(channel).await?;
        Ok(decode_camera_status(&raw))
    }
}

#[async_trait]
impl CameraDelegate for SonyCamera {
    fn vendor(&self) -> CameraVendor {
        CameraVendor::Sony
    }

    fn capabilities(&self) -> &'static GpsSyncCapabilities {
        CameraVendor::Sony.capabilities()
    }

    async fn run_setup(&self, display_name: &str, timezone: TimeZoneSpec) -> SetupOutcome {
        let caps = self.capabilities();
        let mut outcome = SetupOutcome::default();

        {
            let mut session = self.session.lock().await;
            session.timezone = timezone;
        }

        if caps.device_name {
            match self.push_display_name(display_name).await {
                Ok(()) => debug!("Pushed display name {:?}", display_name),
                Err(e) => warn!("Failed to push display name: {}", e),
            }
        }

        if caps.date_time_sync {
            if let Err(e) = self.push_datetime(timezone).await {
                warn!("Failed to sync date/time: {}", e);
            }
        }

        match self.read_location_config().await {
            Ok(Some(include_timezone)) => {
                debug!("Camera asks for timezone suffix: {}", include_timezone);
                self.session.lock().await.include_timezone = include_timezone;
            }
            Ok(None) => warn!("Location config blob missing or short, leaving timezone suffix off"),
            Err(e) => warn!("Failed to read location config: {}", e),
        }

        if caps.geo_tagging {
            match self.enable_geo_tagging().await {
                Ok(()) => debug!("Geo-tagging enabled"),
                Err(e) => warn!("Failed to enable geo-tagging: {}", e),
            }
        }

        if caps.firmware_version {
            match self.read_firmware_version().await {
                Ok(version) => {
                    if let Some(version) = &version {
                        info!("Camera firmware version: {}", version);
                    }
                    outcome.firmware_version = version;
                }
                Err(e) => warn!("Failed to read firmware version: {}", e),
            }
        }

        match self.read_camera_mode().await {
            Ok(CameraMode::Recording) => info!("Camera is currently recording"),
            Ok(CameraMode::Unknown) => {}
            Err(e) => debug!("Camera status read failed: {}", e),
        }

        outcome
    }

    async fn sync_location(&self, fix: &LocationFix) -> Result<(), SyncError> {
        let Some(data_channel) = self.map.location_data else {
            return Err(SyncError::Transport(
                "vendor map has no location channel".into(),
            ));
        };
        if !self.transport.has_channel(data_channel) {
            return Err(SyncError::ChannelMissing(data_channel));
        }

        let mut session = self.session.lock().await;
        self.ensure_status_subscription(&mut session).await;

        let timezone = session.include_timezone.then_some(session.timezone);
        let packet = encode_location(fix, timezone);
        let limit = self.transport.write_limit();
        if packet.len() > limit {
            return Err(SyncError::PayloadTooLarge {
                len: packet.len(),
                mtu: limit,
            });
        }

        // Newer bodies gate the data channel behind lock and enable and
        // want both asserted before every packet. Bodies without the
        // switches take bare data writes.
        let switches = match (
            self.channel(self.map.location_lock),
            self.channel(self.map.location_enable),
        ) {
            (Some(lock), Some(enable)) => Some((lock, enable)),
            _ => None,
        };
        if let Some((lock, enable)) = switches {
            self.transport.write_channel(lock, &SWITCH_ON).await?;
            self.transport.write_channel(enable, &SWITCH_ON).await?;
            session.engaged = true;
        }

        self.write_data_with_retry(data_channel, &packet).await
    }

    async fn on_disconnecting(&self) {
        let mut session = self.session.lock().await;
        if !session.engaged {
            return;
        }
        // Release order is the reverse of engagement: enable, then lock.
        let switches = [
            (self.map.location_enable, "enable"),
            (self.map.location_lock, "lock"),
        ];
        for (slot, label) in switches {
            if let Some(channel) = self.channel(slot) {
                if let Err(e) = self.transport.write_channel(channel, &SWITCH_OFF).await {
                    debug!("Location {} release failed: {}", label, e);
                }
            }
        }
        session.engaged = false;
    }
}

async fn pump_status_frames(
    mut frames: watch::Receiver<Option<Vec<u8>>>,
    status_tx: watch::Sender<Option<StatusEvent>>,
) {
    // The subscription replays the latest frame; drain it before waiting.
    let replayed = frames.borrow_and_update().clone();
    if let Some(frame) = replayed {
        forward_status_frame(&frame, &status_tx);
    }
    while frames.changed().await.is_ok() {
        let frame = frames.borrow_and_update().clone();
        if let Some(frame) = frame {
            forward_status_frame(&frame, &status_tx);
        }
    }
    debug!("Status notification stream ended");
}

fn forward_status_frame(frame: &[u8], status_tx: &watch::Sender<Option<StatusEvent>>) {
    match decode_status_notification(frame) {
        Some(event) => {
            match event {
                StatusEvent::Focus { acquired } => debug!("Focus acquired: {}", acquired),
                StatusEvent::Shutter { active } => info!("Shutter active: {}", active),
                StatusEvent::Recording { active } => info!("Recording active: {}", active),
            }
            status_tx.send_replace(Some(event));
        }
        None => debug!("Ignoring unrecognized status frame ({} bytes)", frame.len()),
    }
}
