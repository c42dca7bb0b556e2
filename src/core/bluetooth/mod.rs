//! Bluetooth functionality for the camera sync engine.
//! This module holds the channel transport abstraction, the production
//! implementation over the platform stack, and the bookkeeping around
//! connections: identity, presence and the attempt registry.

pub mod bluest_link;
pub mod constants;
pub mod presence;
pub mod registry;
pub mod transport;
pub mod types;

// Re-export types that should be publicly accessible
pub use bluest_link::{BluestConnector, BluestTransport};
pub use presence::{PresenceEvent, PresenceSet};
pub use registry::{ActiveLink, ConnectionRegistry};
pub use transport::{CameraConnector, ChannelTransport};
pub use types::DeviceId;
