//! Constants used throughout the sync engine
//! This module contains the service and characteristic UUIDs of the
//! supported cameras plus the timing and sizing constants of the protocol.

use uuid::Uuid;

/// Standard Bluetooth Service UUIDs
pub const UUID_DEVICE_INFORMATION_SERVICE: Uuid = Uuid::from_u128(0x0000180a_0000_1000_8000_00805f9b34fb);

/// Standard Bluetooth Characteristic UUIDs
pub const UUID_FIRMWARE_REVISION: Uuid = Uuid::from_u128(0x00002a26_0000_1000_8000_00805f9b34fb);

/// Sony remote-control service and its status notification characteristic
pub const SONY_REMOTE_SERVICE: Uuid = Uuid::from_u128(0x8000ff00_ff00_ffff_ffff_ffffffffffff);
pub const SONY_STATUS_NOTIFY_CHAR: Uuid = Uuid::from_u128(0x0000ff02_0000_1000_8000_00805f9b34fb);

/// Sony location service; carries both the clock and the GPS position
pub const SONY_LOCATION_SERVICE: Uuid = Uuid::from_u128(0x8000dd00_dd00_ffff_ffff_ffffffffffff);

/// Location packet sink. Time rides inside the location packet, so this
/// doubles as the date/time channel on Sony bodies.
pub const SONY_LOCATION_DATA_CHAR: Uuid = Uuid::from_u128(0x0000dd11_0000_1000_8000_00805f9b34fb);

/// Location-feature config blob (read)
pub const SONY_LOCATION_CONFIG_CHAR: Uuid = Uuid::from_u128(0x0000dd21_0000_1000_8000_00805f9b34fb);

/// Location service lock and enable switches, written before location data
pub const SONY_LOCATION_LOCK_CHAR: Uuid = Uuid::from_u128(0x0000dd30_0000_1000_8000_00805f9b34fb);
pub const SONY_LOCATION_ENABLE_CHAR: Uuid = Uuid::from_u128(0x0000dd31_0000_1000_8000_00805f9b34fb);

/// Geo-tagging switch; turns position embedding into captured images on
pub const SONY_GEOTAG_CHAR: Uuid = Uuid::from_u128(0x0000dd32_0000_1000_8000_00805f9b34fb);

/// Sony pairing service and the paired-host display name characteristic
pub const SONY_PAIRING_SERVICE: Uuid = Uuid::from_u128(0x8000cc00_cc00_ffff_ffff_ffffffffffff);
pub const SONY_DEVICE_NAME_CHAR: Uuid = Uuid::from_u128(0x0000cc01_0000_1000_8000_00805f9b34fb);

/// Largest single write Sony bodies accept on the location channels
pub const SONY_WRITE_LIMIT: usize = 158;

/// Timeout for a whole connection attempt in seconds
pub const CONNECT_TIMEOUT_SECS: u64 = 90;

/// Interval between periodic reconnect sweeps in seconds
pub const HEALTH_CHECK_INTERVAL_SECS: u64 = 30;

/// Grace period after a camera advertisement before connecting, in seconds
pub const PRESENCE_GRACE_SECS: u64 = 10;

/// Interval between keep-alive location resends in seconds
pub const KEEPALIVE_INTERVAL_SECS: u64 = 30;

/// Total attempts for a location data write before giving up
pub const DATA_WRITE_ATTEMPTS: u32 = 3;

/// Delay between location data write attempts in milliseconds
pub const DATA_WRITE_RETRY_DELAY_MS: u64 = 250;

/// Poll interval for watching an established link in seconds
pub const LINK_POLL_INTERVAL_SECS: u64 = 2;
