//! Error types for the sync engine.
//! Failures are classified into terminal device states by
//! `core::sync::states::classify_failure`; the message sniffing that feeds
//! that classification lives here so it can be tested on its own.

use bluest::Uuid;
use thiserror::Error;

use crate::core::bluetooth::types::DeviceId;

/// Errors produced while connecting to or talking to a camera.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The connection attempt did not complete within the allowed window.
    #[error("connection attempt timed out")]
    Timeout,

    /// The camera never showed up during discovery.
    #[error("device {0} not found")]
    DeviceNotFound(DeviceId),

    /// Error reported by the Bluetooth stack.
    #[error("bluetooth error: {0}")]
    Bluetooth(#[from] bluest::Error),

    /// Transport-level failure that is not a plain Bluetooth error.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The camera does not expose a channel the protocol requires.
    #[error("channel {0} not exposed by the camera")]
    ChannelMissing(Uuid),

    /// The camera refused the pairing request.
    #[error("camera rejected the pairing request")]
    PairingRejected,

    /// No protocol support for this camera model.
    #[error("unsupported camera model: {0}")]
    UnsupportedVendor(String),

    /// A received packet did not match the expected layout.
    #[error("invalid packet: {0}")]
    InvalidPacket(String),

    /// An encoded payload does not fit into a single write.
    #[error("payload of {len} bytes exceeds the {mtu}-byte write limit")]
    PayloadTooLarge { len: usize, mtu: usize },

    /// The backing device store failed.
    #[error("repository error: {0}")]
    Repository(String),
}

/// Returns true when the failure means the camera is out of reach rather
/// than broken: the device should surface as `Unreachable`, not `Error`.
///
/// Besides the obviously structural variants this also sniffs the message
/// text, because platform Bluetooth stacks bury timeouts and lost devices
/// inside opaque error strings.
pub fn indicates_unreachable(err: &SyncError) -> bool {
    match err {
        SyncError::Timeout | SyncError::DeviceNotFound(_) => true,
        SyncError::Bluetooth(_) | SyncError::Transport(_) => {
            let text = err.to_string().to_lowercase();
            text.contains("timed out")
                || text.contains("timeout")
                || text.contains("not found")
                || text.contains("unreachable")
        }
        _ => false,
    }
}

/// Returns true when the failure is the camera turning down the pairing
/// request. These get a friendlier user-facing message than the raw stack
/// error, and stay recoverable so the user can retry after confirming on
/// the camera body.
pub fn indicates_pairing_rejection(err: &SyncError) -> bool {
    match err {
        SyncError::PairingRejected => true,
        SyncError::Bluetooth(_) | SyncError::Transport(_) => {
            let text = err.to_string().to_lowercase();
            text.contains("pair")
                && (text.contains("reject")
                    || text.contains("denied")
                    || text.contains("cancel"))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_variants_are_unreachable() {
        assert!(indicates_unreachable(&SyncError::Timeout));
        assert!(indicates_unreachable(&SyncError::DeviceNotFound(DeviceId::new(
            "AA:BB:CC:DD:EE:FF"
        ))));
    }

    #[test]
    fn transport_messages_are_sniffed_case_insensitively() {
        assert!(indicates_unreachable(&SyncError::Transport(
            "Operation Timed Out".into()
        )));
        assert!(indicates_unreachable(&SyncError::Transport(
            "peripheral Not Found in cache".into()
        )));
        assert!(!indicates_unreachable(&SyncError::Transport(
            "write rejected".into()
        )));
    }

    #[test]
    fn pairing_rejection_is_detected_from_text() {
        assert!(indicates_pairing_rejection(&SyncError::PairingRejected));
        assert!(indicates_pairing_rejection(&SyncError::Transport(
            "Pairing request was rejected by the remote device".into()
        )));
        assert!(!indicates_pairing_rejection(&SyncError::Transport(
            "pairing succeeded".into()
        )));
    }

    #[test]
    fn other_failures_are_not_unreachable() {
        assert!(!indicates_unreachable(&SyncError::UnsupportedVendor(
            "GR IIIx".into()
        )));
        assert!(!indicates_unreachable(&SyncError::InvalidPacket("short".into())));
    }
}
