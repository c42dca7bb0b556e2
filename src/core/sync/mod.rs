//! Synchronization engine: per-device state tracking and the background
//! coordinator that drives connection attempts and location fan-out.

pub mod engine;
pub mod states;

// Re-export types that should be publicly accessible
pub use engine::{CameraSyncEngine, EngineOptions, SyncTimings};
pub use states::{DeviceState, StateMap};
