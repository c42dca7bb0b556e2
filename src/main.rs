use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use log::{info, warn};
use tokio::sync::watch;

use camsync::config::{AppConfig, FixedLocation, CONFIG_FILE_NAME};
use camsync::core::bluetooth::BluestConnector;
use camsync::core::location::LocationFix;
use camsync::core::sync::{CameraSyncEngine, EngineOptions, SyncTimings};
use camsync::firmware::{FirmwareCatalog, LogUpdateNotifier};
use camsync::repository::{DeviceRepository, MemoryDeviceRepository};

/// How often the configured fixed position is restamped and re-announced.
const LOCATION_REFRESH_SECS: u64 = 60;

#[tokio::main]
async fn main() -> Result<()> {
    camsync::setup_logging();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| CONFIG_FILE_NAME.to_string());
    let config = AppConfig::load(&config_path).await?;

    let repository = Arc::new(MemoryDeviceRepository::with_devices(config.devices()));
    let catalog = match &config.firmware_catalog {
        Some(path) => FirmwareCatalog::load(path).await?,
        None => FirmwareCatalog::empty(),
    };
    let connector = Arc::new(BluestConnector::new().await?);

    let (location_tx, location_rx) = watch::channel(None);

    let engine = CameraSyncEngine::new(
        repository.clone(),
        connector,
        Arc::new(catalog),
        Arc::new(LogUpdateNotifier),
        location_rx,
        EngineOptions {
            display_name: config.display_name.clone(),
            timezone: config.timezone(),
            timings: SyncTimings::default(),
        },
    );

    engine
        .start_background_monitoring(repository.enabled_devices())
        .await;
    tokio::spawn(feed_location(location_tx, config.location));

    info!("camsync running, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    engine.stop_all_devices().await;
    Ok(())
}

/// Publishes the configured fixed position on a timer so connected cameras
/// always hold a recent fix. Without a configured position the task only
/// keeps the channel open; cameras then get clock and settings but no
/// location updates.
async fn feed_location(
    location_tx: watch::Sender<Option<LocationFix>>,
    fixed: Option<FixedLocation>,
) {
    let Some(fixed) = fixed else {
        warn!("No location configured, cameras will receive time and settings only");
        location_tx.closed().await;
        return;
    };
    loop {
        let fix = LocationFix::new(fixed.latitude, fixed.longitude, fixed.altitude, Utc::now());
        if location_tx.send(Some(fix)).is_err() {
            break;
        }
        tokio::time::sleep(Duration::from_secs(LOCATION_REFRESH_SECS)).await;
    }
}
