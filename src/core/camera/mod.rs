//! Vendor-specific camera protocol implementations.
//!
//! The sync engine drives every camera through [`CameraDelegate`]; which
//! concrete delegate gets built is decided by the vendor resolved from the
//! model string. Only Sony bodies have a full protocol implementation
//! today. Ricoh resolves to a vendor with capability flags but no channel
//! map, so it cannot be driven yet and connection attempts to it fail as
//! unsupported.

pub mod capabilities;
pub mod sony;
pub mod sony_codec;

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::bluetooth::transport::ChannelTransport;
use crate::core::camera::capabilities::{CameraVendor, GpsSyncCapabilities};
use crate::core::camera::sony::SonyCamera;
use crate::core::location::{LocationFix, TimeZoneSpec};
use crate::error::SyncError;

/// What the vendor setup sequence managed to learn about the camera.
/// Setup steps are best-effort, so any of this can be absent.
#[derive(Debug, Clone, Default)]
pub struct SetupOutcome {
    pub firmware_version: Option<String>,
}

/// One connected camera, driven through its vendor protocol.
#[async_trait]
pub trait CameraDelegate: Send + Sync {
    fn vendor(&self) -> CameraVendor;

    fn capabilities(&self) -> &'static GpsSyncCapabilities;

    /// Runs the vendor setup sequence: name, clock, feature config,
    /// geo-tagging, firmware. Individual steps log and continue on
    /// failure; setup as a whole never fails a connection.
    async fn run_setup(&self, display_name: &str, timezone: TimeZoneSpec) -> SetupOutcome;

    /// Pushes one location fix to the camera.
    async fn sync_location(&self, fix: &LocationFix) -> Result<(), SyncError>;

    /// Releases any camera-side state before the link goes away. Must not
    /// fail; teardown problems are logged and swallowed.
    async fn on_disconnecting(&self);
}

/// Builds the delegate for a resolved vendor, or `None` when no protocol
/// implementation exists for it.
pub fn create_delegate(
    vendor: CameraVendor,
    transport: Arc<dyn ChannelTransport>,
) -> Option<Arc<dyn CameraDelegate>> {
    match vendor {
        CameraVendor::Sony => Some(Arc::new(SonyCamera::new(transport))),
        CameraVendor::Ricoh => None,
    }
}
