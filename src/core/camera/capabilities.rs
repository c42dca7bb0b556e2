//! Vendor capability flags and GATT channel maps.
//!
//! A vendor is resolved from the camera's model string. Its capability set
//! says which sync features the setup sequence should attempt, and its
//! channel map says where on the GATT surface each feature lives. Feature
//! code never hardcodes a channel; it always goes through the map.

use uuid::Uuid;

use crate::core::bluetooth::constants::{
    SONY_DEVICE_NAME_CHAR, SONY_GEOTAG_CHAR, SONY_LOCATION_CONFIG_CHAR, SONY_LOCATION_DATA_CHAR,
    SONY_LOCATION_ENABLE_CHAR, SONY_LOCATION_LOCK_CHAR, SONY_LOCATION_SERVICE,
    SONY_STATUS_NOTIFY_CHAR, UUID_FIRMWARE_REVISION,
};

/// Which sync features a vendor's protocol supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpsSyncCapabilities {
    /// Continuous location push.
    pub location_sync: bool,
    /// Clock synchronization.
    pub date_time_sync: bool,
    /// Turning geo-tagging of captured images on.
    pub geo_tagging: bool,
    /// Pushing the host's display name to the camera.
    pub device_name: bool,
    /// Reading the firmware revision.
    pub firmware_version: bool,
}

/// Where each feature lives on the vendor's GATT surface. `None` means the
/// vendor has no channel for the feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GattMap {
    /// Primary service the sync protocol speaks to.
    pub service: Uuid,
    pub date_time: Option<Uuid>,
    pub location_data: Option<Uuid>,
    pub location_lock: Option<Uuid>,
    pub location_enable: Option<Uuid>,
    pub location_config: Option<Uuid>,
    pub geo_tag: Option<Uuid>,
    pub device_name: Option<Uuid>,
    pub firmware_version: Option<Uuid>,
    pub status_notify: Option<Uuid>,
}

impl GattMap {
    /// True when one channel carries both the clock and the location, in
    /// which case a separate date/time write is redundant: the first
    /// location packet already sets the clock.
    pub fn unified_time_and_location(&self) -> bool {
        match (self.date_time, self.location_data) {
            (Some(time), Some(location)) => time == location,
            _ => false,
        }
    }
}

/// Sony bodies take the clock through the location packet.
pub(crate) static SONY_GATT_MAP: GattMap = GattMap {
    service: SONY_LOCATION_SERVICE,
    date_time: Some(SONY_LOCATION_DATA_CHAR),
    location_data: Some(SONY_LOCATION_DATA_CHAR),
    location_lock: Some(SONY_LOCATION_LOCK_CHAR),
    location_enable: Some(SONY_LOCATION_ENABLE_CHAR),
    location_config: Some(SONY_LOCATION_CONFIG_CHAR),
    geo_tag: Some(SONY_GEOTAG_CHAR),
    device_name: Some(SONY_DEVICE_NAME_CHAR),
    firmware_version: Some(UUID_FIRMWARE_REVISION),
    status_notify: Some(SONY_STATUS_NOTIFY_CHAR),
};

static SONY_CAPABILITIES: GpsSyncCapabilities = GpsSyncCapabilities {
    location_sync: true,
    date_time_sync: true,
    geo_tagging: true,
    device_name: true,
    firmware_version: true,
};

/// Ricoh bodies only get their clock set; there is no protocol support for
/// the rest yet, and no channel map to drive it with.
static RICOH_CAPABILITIES: GpsSyncCapabilities = GpsSyncCapabilities {
    location_sync: false,
    date_time_sync: true,
    geo_tagging: false,
    device_name: false,
    firmware_version: false,
};

/// Camera vendors the model-string resolver knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraVendor {
    Sony,
    Ricoh,
}

/// Model prefixes per vendor, compared case-insensitively.
const SONY_MODEL_PREFIXES: &[&str] = &["ILCE-", "ILME-", "DSC-", "ZV-"];
const RICOH_MODEL_PREFIXES: &[&str] = &["RICOH", "GR ", "PENTAX"];

impl CameraVendor {
    /// Resolves the vendor from a camera model string, e.g. "ILCE-7M4".
    pub fn for_model(model: &str) -> Option<CameraVendor> {
        let model = model.trim().to_uppercase();
        if SONY_MODEL_PREFIXES.iter().any(|p| model.starts_with(p)) {
            Some(CameraVendor::Sony)
        } else if RICOH_MODEL_PREFIXES.iter().any(|p| model.starts_with(p)) {
            Some(CameraVendor::Ricoh)
        } else {
            None
        }
    }

    pub fn capabilities(&self) -> &'static GpsSyncCapabilities {
        match self {
            CameraVendor::Sony => &SONY_CAPABILITIES,
            CameraVendor::Ricoh => &RICOH_CAPABILITIES,
        }
    }

    /// The vendor's channel map, when a sync protocol exists for it.
    pub fn gatt_map(&self) -> Option<&'static GattMap> {
        match self {
            CameraVendor::Sony => Some(&SONY_GATT_MAP),
            CameraVendor::Ricoh => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CameraVendor::Sony => "Sony",
            CameraVendor::Ricoh => "Ricoh",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sony_models_resolve_by_prefix() {
        assert_eq!(CameraVendor::for_model("ILCE-7M4"), Some(CameraVendor::Sony));
        assert_eq!(CameraVendor::for_model("ilce-6700"), Some(CameraVendor::Sony));
        assert_eq!(CameraVendor::for_model(" ZV-E10 "), Some(CameraVendor::Sony));
        assert_eq!(CameraVendor::for_model("ILME-FX3"), Some(CameraVendor::Sony));
    }

    #[test]
    fn ricoh_models_resolve_without_a_channel_map() {
        let vendor = CameraVendor::for_model("GR IIIx").unwrap();
        assert_eq!(vendor, CameraVendor::Ricoh);
        assert!(vendor.gatt_map().is_none());
        assert!(!vendor.capabilities().location_sync);
    }

    #[test]
    fn unknown_models_resolve_to_none() {
        assert_eq!(CameraVendor::for_model("X100V"), None);
        assert_eq!(CameraVendor::for_model(""), None);
    }

    #[test]
    fn sony_map_is_unified_for_time_and_location() {
        assert!(SONY_GATT_MAP.unified_time_and_location());
        let split = GattMap {
            date_time: Some(UUID_FIRMWARE_REVISION),
            ..SONY_GATT_MAP
        };
        assert!(!split.unified_time_and_location());
    }
}
