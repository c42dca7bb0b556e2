//! camsync library
//! Keeps the clock, GPS position and geo-tagging settings of BLE cameras
//! in sync with the host.

// Module declarations
pub mod config;
pub mod core;
pub mod error;
pub mod firmware;
pub mod repository;
pub mod utils;

// Re-export the surface most callers need
pub use crate::config::AppConfig;
pub use crate::core::bluetooth::{BluestConnector, DeviceId, PresenceEvent};
pub use crate::core::location::{LocationFix, TimeZoneSpec};
pub use crate::core::sync::{CameraSyncEngine, DeviceState, EngineOptions, SyncTimings};
pub use crate::error::SyncError;
pub use crate::firmware::{FirmwareCatalog, FirmwareSource, UpdateNotifier};
pub use crate::repository::{Device, DeviceRepository, MemoryDeviceRepository};

// Initialize logging
pub fn setup_logging() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
    log::info!("Logging initialized");
}
