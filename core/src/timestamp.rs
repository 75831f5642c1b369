use chrono::{DateTime, Datelike, SecondsFormat, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BuildtimeError, Result};

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// A point in time broken down into calendar fields, so records can be
/// grouped by day, month or hour without reparsing the timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitTimestamp {
    pub isotimestamp: String,
    pub timestamp_seconds: f64,
    pub year: i32,
    pub month: u32,
    pub month_name: String,
    pub month_short_name: String,
    pub day_of_month: u32,
    pub day_of_week: u32,
    pub day_of_week_name: String,
    pub day_of_week_short_name: String,
    pub hour_24: u32,
    pub hour_12: u32,
    pub hour_ampm: String,
    pub minute: u32,
    pub second: u32,
    pub microsecond: u32,
    pub timezone: String,
    pub timezone_offset: i32,
}

impl SplitTimestamp {
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        let (_, hour_12) = dt.hour12();

        Self {
            isotimestamp: dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            timestamp_seconds: dt.timestamp() as f64
                + f64::from(dt.timestamp_subsec_nanos()) / NANOS_PER_SECOND,
            year: dt.year(),
            month: dt.month(),
            month_name: dt.format("%B").to_string(),
            month_short_name: dt.format("%b").to_string(),
            day_of_month: dt.day(),
            day_of_week: dt.weekday().num_days_from_sunday(),
            day_of_week_name: dt.format("%A").to_string(),
            day_of_week_short_name: dt.format("%a").to_string(),
            hour_24: dt.hour(),
            hour_12,
            hour_ampm: dt.format("%p").to_string(),
            minute: dt.minute(),
            second: dt.second(),
            microsecond: dt.timestamp_subsec_micros(),
            timezone: "UTC".to_string(),
            timezone_offset: 0,
        }
    }

    /// Returns `None` for non-finite or out of range values.
    pub fn from_seconds(seconds: f64) -> Option<Self> {
        if !seconds.is_finite() {
            return None;
        }

        let whole = seconds.floor();
        let nanos = ((seconds - whole) * NANOS_PER_SECOND).round().min(999_999_999.0) as u32;

        if whole < i64::MIN as f64 || whole > i64::MAX as f64 {
            return None;
        }

        Utc.timestamp_opt(whole as i64, nanos)
            .single()
            .map(Self::from_datetime)
    }

    pub fn from_nanos(nanos: i64) -> Self {
        Self::from_datetime(Utc.timestamp_nanos(nanos))
    }

    pub fn parse_iso(value: &str) -> Result<Self> {
        DateTime::parse_from_rfc3339(value.trim())
            .map(|dt| Self::from_datetime(dt.with_timezone(&Utc)))
            .map_err(|e| BuildtimeError::InvalidTimestamp(format!("{value}: {e}")))
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.isotimestamp)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn is_before(&self, other: &SplitTimestamp) -> bool {
        self.timestamp_seconds < other.timestamp_seconds
    }

    pub fn is_after(&self, other: &SplitTimestamp) -> bool {
        self.timestamp_seconds > other.timestamp_seconds
    }
}
