//! Core functionality for the camera sync engine
//! This module contains the transport, codec and coordination layers that
//! keep BLE cameras in sync with the host.

pub mod bluetooth;
pub mod camera;
pub mod location;
pub mod sync;

// Re-export commonly used types
pub use location::{LocationFix, TimeZoneSpec};
pub use sync::{CameraSyncEngine, DeviceState};
