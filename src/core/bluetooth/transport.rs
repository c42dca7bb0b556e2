//! Channel-level transport abstraction over an established camera link.
//!
//! Camera delegates speak to channels (GATT characteristics) through this
//! trait and never touch the Bluetooth stack directly, which is what lets
//! the whole protocol run against an in-memory transport in tests.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::SyncError;
use crate::repository::Device;

/// Byte-level access to the channels of one connected camera.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    /// Largest payload a single write may carry.
    fn write_limit(&self) -> usize;

    /// True when the camera exposes the channel. Feature probing goes
    /// through this, never through a failed write.
    fn has_channel(&self, channel: Uuid) -> bool;

    async fn read_channel(&self, channel: Uuid) -> Result<Vec<u8>, SyncError>;

    async fn write_channel(&self, channel: Uuid, payload: &[u8]) -> Result<(), SyncError>;

    /// Subscribes to a notify channel. The receiver replays the most recent
    /// frame, so a notification arriving between subscription and the first
    /// poll is not lost.
    async fn subscribe(&self, channel: Uuid) -> Result<watch::Receiver<Option<Vec<u8>>>, SyncError>;

    /// Link liveness. Flips to false exactly once, when the link is gone.
    fn connected(&self) -> watch::Receiver<bool>;

    /// Tears the link down. Errors are logged by the implementation; by the
    /// time this is called there is nothing useful left to do about them.
    async fn disconnect(&self);
}

/// Opens camera links. The production implementation sits on top of the
/// platform Bluetooth stack; tests substitute their own.
#[async_trait]
pub trait CameraConnector: Send + Sync {
    async fn connect(&self, device: &Device) -> Result<Arc<dyn ChannelTransport>, SyncError>;
}
