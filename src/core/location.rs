//! Location fixes and timezone data pushed to cameras.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// A fix older than this is considered stale and is not fanned out.
pub const FIX_FRESHNESS_SECS: i64 = 10;

/// A single GPS fix as produced by the host's location source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    /// Degrees, positive north.
    pub latitude: f64,
    /// Degrees, positive east.
    pub longitude: f64,
    /// Meters above sea level.
    pub altitude: f64,
    /// When the fix was taken, in UTC.
    pub timestamp: DateTime<Utc>,
}

impl LocationFix {
    pub fn new(latitude: f64, longitude: f64, altitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
            timestamp,
        }
    }

    /// True while the fix is recent enough to be worth sending to cameras.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.timestamp) <= TimeDelta::seconds(FIX_FRESHNESS_SECS)
    }

    /// Copy of this fix restamped to `now`, used by the keep-alive resend so
    /// cameras keep geo-tagging from the last known position.
    pub fn restamped(&self, now: DateTime<Utc>) -> Self {
        Self {
            timestamp: now,
            ..self.clone()
        }
    }
}

/// Timezone of the host, expressed the way camera packets want it: a UTC
/// offset plus the currently applied DST delta, both in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeZoneSpec {
    /// Offset from UTC including DST, positive east of Greenwich.
    pub offset_minutes: i16,
    /// Portion of the offset contributed by DST, zero when not in effect.
    pub dst_minutes: i16,
}

impl TimeZoneSpec {
    pub const UTC: TimeZoneSpec = TimeZoneSpec {
        offset_minutes: 0,
        dst_minutes: 0,
    };

    pub fn new(offset_minutes: i16, dst_minutes: i16) -> Self {
        Self {
            offset_minutes,
            dst_minutes,
        }
    }

    /// Whole hours of the offset, signed. Minutes-only remainder is
    /// reported separately by `offset_remainder_minutes`.
    pub fn offset_hours(&self) -> i8 {
        (self.offset_minutes / 60) as i8
    }

    /// Magnitude of the sub-hour part of the offset.
    pub fn offset_remainder_minutes(&self) -> u8 {
        (self.offset_minutes % 60).unsigned_abs() as u8
    }

    pub fn dst_active(&self) -> bool {
        self.dst_minutes != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_735_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn fix_is_fresh_within_the_window() {
        let fix = LocationFix::new(35.0, 139.0, 40.0, at(0));
        assert!(fix.is_fresh(at(0)));
        assert!(fix.is_fresh(at(FIX_FRESHNESS_SECS)));
        assert!(!fix.is_fresh(at(FIX_FRESHNESS_SECS + 1)));
    }

    #[test]
    fn restamped_keeps_coordinates() {
        let fix = LocationFix::new(35.0, 139.0, 40.0, at(0));
        let again = fix.restamped(at(60));
        assert_eq!(again.latitude, fix.latitude);
        assert_eq!(again.longitude, fix.longitude);
        assert_eq!(again.timestamp, at(60));
        assert!(again.is_fresh(at(60)));
    }

    #[test]
    fn half_hour_timezones_split_correctly() {
        let india = TimeZoneSpec::new(330, 0);
        assert_eq!(india.offset_hours(), 5);
        assert_eq!(india.offset_remainder_minutes(), 30);

        let newfoundland = TimeZoneSpec::new(-210, 60);
        assert_eq!(newfoundland.offset_hours(), -3);
        assert_eq!(newfoundland.offset_remainder_minutes(), 30);
        assert!(newfoundland.dst_active());
    }
}
