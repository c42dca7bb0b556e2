//! Packet encoding and decoding for Sony's BLE camera protocol.
//!
//! All multi-byte integers on the wire are big-endian. Packets have fixed
//! layouts, so encoding is plain offset arithmetic into a pre-sized buffer
//! and decoding never panics on short or malformed input; it reports an
//! unknown/absent value instead.

use chrono::{DateTime, Datelike, TimeDelta, TimeZone, Timelike, Utc};

use crate::core::location::{LocationFix, TimeZoneSpec};

/// Location packet length without the timezone suffix.
pub const LOCATION_PACKET_LEN: usize = 91;
/// Location packet length with the timezone suffix appended.
pub const LOCATION_PACKET_LEN_WITH_TZ: usize = 95;
/// Fixed length of the date/time packet.
pub const DATETIME_PACKET_LEN: usize = 13;
/// Minimum length of the location-feature config blob.
pub const LOCATION_CONFIG_LEN: usize = 6;

/// Fixed packet-type marker following the length prefix.
const LOCATION_HEADER: [u8; 3] = [0x08, 0x02, 0xFC];
/// Reserved bytes between the feature flag and the coordinates.
const LOCATION_RESERVED: [u8; 5] = [0x00, 0x00, 0x10, 0x10, 0x10];
/// Feature flag value announcing the timezone suffix.
const FLAG_WITH_TIMEZONE: u8 = 0x03;
const FLAG_NO_TIMEZONE: u8 = 0x00;

/// Coordinates are carried as degrees scaled to a signed 32-bit integer.
const COORDINATE_SCALE: f64 = 1e7;

/// First byte of every status notification frame.
const STATUS_FRAME_PREFIX: u8 = 0x02;
/// Subtype codes for status notification frames.
const STATUS_SUBTYPE_FOCUS: u8 = 0x3F;
const STATUS_SUBTYPE_SHUTTER: u8 = 0xA0;
const STATUS_SUBTYPE_RECORDING: u8 = 0xD5;
/// Third byte value meaning "active"; anything else is idle.
const STATUS_VALUE_ACTIVE: u8 = 0x20;

/// TLV tag carrying the recording state in a camera-status response.
const TAG_RECORDING_STATE: u16 = 0x0008;

/// Bit set in the first byte of a capture-status response while a capture
/// is in progress. The byte is read unsigned; 0x80 alone must register.
const CAPTURE_IN_PROGRESS_BIT: u8 = 0x80;

/// Bit in config byte 1 that asks for the timezone suffix on location
/// packets.
const CONFIG_TIMEZONE_BIT: u8 = 0x02;

/// Encodes a location packet for the camera's location-data channel.
///
/// The first two bytes are a payload length covering everything after
/// themselves. Coordinates are degrees times 1e7, the timestamp is UTC
/// split into calendar fields, and when `timezone` is given a 4-byte
/// suffix with the UTC offset and DST delta (both minutes) is appended.
pub fn encode_location(fix: &LocationFix, timezone: Option<TimeZoneSpec>) -> Vec<u8> {
    let total = if timezone.is_some() {
        LOCATION_PACKET_LEN_WITH_TZ
    } else {
        LOCATION_PACKET_LEN
    };
    let mut buf = vec![0u8; total];

    buf[0..2].copy_from_slice(&((total - 2) as u16).to_be_bytes());
    buf[2..5].copy_from_slice(&LOCATION_HEADER);
    buf[5] = if timezone.is_some() {
        FLAG_WITH_TIMEZONE
    } else {
        FLAG_NO_TIMEZONE
    };
    buf[6..11].copy_from_slice(&LOCATION_RESERVED);

    buf[11..15].copy_from_slice(&scale_coordinate(fix.latitude).to_be_bytes());
    buf[15..19].copy_from_slice(&scale_coordinate(fix.longitude).to_be_bytes());

    let t = fix.timestamp;
    buf[19..21].copy_from_slice(&(t.year() as u16).to_be_bytes());
    buf[21] = t.month() as u8;
    buf[22] = t.day() as u8;
    buf[23] = t.hour() as u8;
    buf[24] = t.minute() as u8;
    buf[25] = t.second() as u8;
    // bytes 26..91 stay zero

    if let Some(tz) = timezone {
        buf[91..93].copy_from_slice(&tz.offset_minutes.to_be_bytes());
        buf[93..95].copy_from_slice(&tz.dst_minutes.to_be_bytes());
    }

    buf
}

fn scale_coordinate(degrees: f64) -> i32 {
    (degrees * COORDINATE_SCALE).round() as i32
}

/// Fields recovered from a location packet.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
    pub timezone: Option<TimeZoneSpec>,
}

/// Decodes a location packet. Returns `None` for anything that is not a
/// well-formed location packet of either length.
pub fn decode_location(data: &[u8]) -> Option<DecodedLocation> {
    if data.len() != LOCATION_PACKET_LEN && data.len() != LOCATION_PACKET_LEN_WITH_TZ {
        return None;
    }
    if u16::from_be_bytes([data[0], data[1]]) as usize != data.len() - 2 {
        return None;
    }
    if data[2..5] != LOCATION_HEADER {
        return None;
    }

    let latitude =
        i32::from_be_bytes([data[11], data[12], data[13], data[14]]) as f64 / COORDINATE_SCALE;
    let longitude =
        i32::from_be_bytes([data[15], data[16], data[17], data[18]]) as f64 / COORDINATE_SCALE;

    let year = u16::from_be_bytes([data[19], data[20]]) as i32;
    let timestamp = Utc
        .with_ymd_and_hms(
            year,
            data[21] as u32,
            data[22] as u32,
            data[23] as u32,
            data[24] as u32,
            data[25] as u32,
        )
        .single()?;

    let timezone = if data.len() == LOCATION_PACKET_LEN_WITH_TZ {
        Some(TimeZoneSpec::new(
            i16::from_be_bytes([data[91], data[92]]),
            i16::from_be_bytes([data[93], data[94]]),
        ))
    } else {
        None
    };

    Some(DecodedLocation {
        latitude,
        longitude,
        timestamp,
        timezone,
    })
}

/// Encodes the standalone date/time packet.
///
/// The camera wants wall-clock time; the UTC instant is shifted by the
/// timezone offset and the offset itself rides along so the camera can
/// recover UTC.
pub fn encode_datetime(utc: DateTime<Utc>, tz: TimeZoneSpec) -> [u8; DATETIME_PACKET_LEN] {
    let local = utc + TimeDelta::minutes(tz.offset_minutes as i64);
    let mut buf = [0u8; DATETIME_PACKET_LEN];
    buf[0] = 0x0C;
    // bytes 1..3 stay zero
    buf[3..5].copy_from_slice(&(local.year() as u16).to_be_bytes());
    buf[5] = local.month() as u8;
    buf[6] = local.day() as u8;
    buf[7] = local.hour() as u8;
    buf[8] = local.minute() as u8;
    buf[9] = local.second() as u8;
    buf[10] = tz.dst_active() as u8;
    buf[11] = tz.offset_hours() as u8;
    buf[12] = tz.offset_remainder_minutes();
    buf
}

/// A decoded status notification frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    Focus { acquired: bool },
    Shutter { active: bool },
    Recording { active: bool },
}

/// Decodes a status notification frame.
///
/// Frames start with 0x02, carry a subtype in byte 1 and an active/idle
/// value in byte 2. Unknown subtypes and malformed frames decode to `None`
/// so a camera emitting frames we do not know about never disturbs the
/// notification pump.
pub fn decode_status_notification(data: &[u8]) -> Option<StatusEvent> {
    if data.len() < 3 || data[0] != STATUS_FRAME_PREFIX {
        return None;
    }
    let active = data[2] == STATUS_VALUE_ACTIVE;
    match data[1] {
        STATUS_SUBTYPE_FOCUS => Some(StatusEvent::Focus { acquired: active }),
        STATUS_SUBTYPE_SHUTTER => Some(StatusEvent::Shutter { active }),
        STATUS_SUBTYPE_RECORDING => Some(StatusEvent::Recording { active }),
        _ => None,
    }
}

/// Coarse capture state reported by the capture-status channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    Idle,
    Capturing,
    Unknown,
}

/// Decodes a capture-status response. The in-progress flag sits in the top
/// bit of the first byte, which must be treated as unsigned: `[0x80, 0x00]`
/// is a capture in progress.
pub fn decode_capture_status(data: &[u8]) -> CaptureStatus {
    match data.first() {
        Some(byte) if byte & CAPTURE_IN_PROGRESS_BIT != 0 => CaptureStatus::Capturing,
        Some(_) => CaptureStatus::Idle,
        None => CaptureStatus::Unknown,
    }
}

/// Operating mode derived from a camera-status TLV response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraMode {
    Recording,
    Unknown,
}

/// Walks the TLV entries of a camera-status response looking for the
/// recording-state tag.
///
/// Entries are `tag (u16 BE) | len (u16 BE) | value`. A recording-state
/// value of 1 means recording; 0 and everything else stays `Unknown`, it
/// does not mean "still mode". A truncated final entry ends the walk.
pub fn decode_camera_status(data: &[u8]) -> CameraMode {
    let mut offset = 0;
    while offset + 4 <= data.len() {
        let tag = u16::from_be_bytes([data[offset], data[offset + 1]]);
        let len = u16::from_be_bytes([data[offset + 2], data[offset + 3]]) as usize;
        let value_end = offset + 4 + len;
        if value_end > data.len() {
            break;
        }
        if tag == TAG_RECORDING_STATE {
            let value = &data[offset + 4..value_end];
            if value.first() == Some(&1) {
                return CameraMode::Recording;
            }
        }
        offset = value_end;
    }
    CameraMode::Unknown
}

/// Reads the location-feature config blob and reports whether the camera
/// asks for the timezone suffix on location packets. `None` for blobs too
/// short to carry the flag.
pub fn decode_location_config(data: &[u8]) -> Option<bool> {
    if data.len() < LOCATION_CONFIG_LEN {
        return None;
    }
    Some(data[1] & CONFIG_TIMEZONE_BIT != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn sample_fix() -> LocationFix {
        LocationFix::new(37.7749, -122.4194, 10.0, utc(2024, 12, 25, 14, 30, 45))
    }

    #[test]
    fn location_packet_with_timezone_matches_wire_layout() {
        let tz = TimeZoneSpec::new(-480, 0);
        let packet = encode_location(&sample_fix(), Some(tz));

        assert_eq!(packet.len(), 95);
        // length prefix counts everything after itself
        assert_eq!(&packet[0..2], &[0x00, 0x5D]);
        assert_eq!(&packet[2..5], &[0x08, 0x02, 0xFC]);
        assert_eq!(packet[5], 0x03);
        assert_eq!(&packet[6..11], &[0x00, 0x00, 0x10, 0x10, 0x10]);
        // 2024-12-25 14:30:45 UTC
        assert_eq!(&packet[19..21], &[0x07, 0xE8]);
        assert_eq!(&packet[21..26], &[12, 25, 14, 30, 45]);
        // -480 minutes, no DST
        assert_eq!(&packet[91..93], &[0xFE, 0x20]);
        assert_eq!(&packet[93..95], &[0x00, 0x00]);
    }

    #[test]
    fn location_packet_without_timezone_is_91_bytes() {
        let packet = encode_location(&sample_fix(), None);

        assert_eq!(packet.len(), 91);
        assert_eq!(&packet[0..2], &[0x00, 0x59]);
        assert_eq!(packet[5], 0x00);
        // padding after the time fields stays zeroed
        assert!(packet[26..91].iter().all(|b| *b == 0));
    }

    #[test]
    fn location_round_trips_coordinates_and_time() {
        let cases = [
            (37.7749, -122.4194),
            (-33.8688, 151.2093),
            (0.0, 0.0),
            (89.9999999, 179.9999999),
            (-89.9999999, -179.9999999),
        ];
        for (lat, lon) in cases {
            let fix = LocationFix::new(lat, lon, 0.0, utc(2031, 1, 2, 3, 4, 5));
            for tz in [None, Some(TimeZoneSpec::new(330, 60))] {
                let decoded = decode_location(&encode_location(&fix, tz)).unwrap();
                assert!((decoded.latitude - lat).abs() < 1e-7, "lat {lat}");
                assert!((decoded.longitude - lon).abs() < 1e-7, "lon {lon}");
                assert_eq!(decoded.timestamp, fix.timestamp);
                assert_eq!(decoded.timezone, tz);
            }
        }
    }

    #[test]
    fn malformed_location_packets_decode_to_none() {
        assert_eq!(decode_location(&[]), None);
        assert_eq!(decode_location(&[0x00; 42]), None);
        let mut packet = encode_location(&sample_fix(), None);
        packet[3] = 0xFF;
        assert_eq!(decode_location(&packet), None);
    }

    #[test]
    fn datetime_packet_carries_local_wall_clock() {
        let tz = TimeZoneSpec::new(60, 60); // CET in summer
        let packet = encode_datetime(utc(2025, 6, 30, 23, 15, 2), tz);

        assert_eq!(packet.len(), 13);
        assert_eq!(&packet[0..3], &[0x0C, 0x00, 0x00]);
        // 23:15 UTC + 1h rolls into July 1st
        assert_eq!(&packet[3..5], &[0x07, 0xE9]);
        assert_eq!(&packet[5..10], &[7, 1, 0, 15, 2]);
        assert_eq!(packet[10], 1);
        assert_eq!(packet[11], 1);
        assert_eq!(packet[12], 0);
    }

    #[test]
    fn datetime_packet_encodes_negative_offsets() {
        let tz = TimeZoneSpec::new(-330, 0);
        let packet = encode_datetime(utc(2025, 6, 15, 12, 0, 0), tz);

        assert_eq!(packet[10], 0);
        // -5 hours as a signed byte, remainder magnitude 30
        assert_eq!(packet[11] as i8, -5);
        assert_eq!(packet[12], 30);
    }

    #[test]
    fn status_frames_decode_by_subtype() {
        assert_eq!(
            decode_status_notification(&[0x02, 0x3F, 0x20]),
            Some(StatusEvent::Focus { acquired: true })
        );
        assert_eq!(
            decode_status_notification(&[0x02, 0x3F, 0x00]),
            Some(StatusEvent::Focus { acquired: false })
        );
        assert_eq!(
            decode_status_notification(&[0x02, 0xA0, 0x20]),
            Some(StatusEvent::Shutter { active: true })
        );
        assert_eq!(
            decode_status_notification(&[0x02, 0xD5, 0x20]),
            Some(StatusEvent::Recording { active: true })
        );
        assert_eq!(
            decode_status_notification(&[0x02, 0xD5, 0x60]),
            Some(StatusEvent::Recording { active: false })
        );
    }

    #[test]
    fn foreign_status_frames_are_ignored() {
        assert_eq!(decode_status_notification(&[]), None);
        assert_eq!(decode_status_notification(&[0x02, 0x3F]), None);
        assert_eq!(decode_status_notification(&[0x01, 0x3F, 0x20]), None);
        assert_eq!(decode_status_notification(&[0x02, 0x99, 0x20]), None);
    }

    #[test]
    fn capture_status_reads_the_byte_unsigned() {
        assert_eq!(decode_capture_status(&[0x80, 0x00]), CaptureStatus::Capturing);
        assert_eq!(decode_capture_status(&[0x81]), CaptureStatus::Capturing);
        assert_eq!(decode_capture_status(&[0x00]), CaptureStatus::Idle);
        assert_eq!(decode_capture_status(&[0x7F]), CaptureStatus::Idle);
        assert_eq!(decode_capture_status(&[]), CaptureStatus::Unknown);
    }

    #[test]
    fn camera_status_finds_recording_tag_at_any_position() {
        // unrelated tag first, then recording-state = 1
        let data = [0x00, 0x01, 0x00, 0x02, 0xAA, 0xBB, 0x00, 0x08, 0x00, 0x01, 0x01];
        assert_eq!(decode_camera_status(&data), CameraMode::Recording);
    }

    #[test]
    fn camera_status_value_zero_is_unknown_not_still() {
        let data = [0x00, 0x08, 0x00, 0x01, 0x00];
        assert_eq!(decode_camera_status(&data), CameraMode::Unknown);
    }

    #[test]
    fn truncated_camera_status_does_not_panic() {
        assert_eq!(decode_camera_status(&[]), CameraMode::Unknown);
        assert_eq!(decode_camera_status(&[0x00, 0x08]), CameraMode::Unknown);
        // declared length runs past the buffer
        let data = [0x00, 0x08, 0x00, 0x10, 0x01];
        assert_eq!(decode_camera_status(&data), CameraMode::Unknown);
    }

    #[test]
    fn location_config_reads_the_timezone_bit() {
        assert_eq!(decode_location_config(&[0x00, 0x02, 0, 0, 0, 0]), Some(true));
        assert_eq!(decode_location_config(&[0x00, 0x03, 0, 0, 0, 0]), Some(true));
        assert_eq!(decode_location_config(&[0x00, 0x01, 0, 0, 0, 0]), Some(false));
        assert_eq!(decode_location_config(&[0x00, 0x02, 0]), None);
    }
}
