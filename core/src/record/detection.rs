use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// Producer-side date layout (`DD/MM/YYYY`).
pub const STORED_DATE_FORMAT: &str = "%d/%m/%Y";
/// Producer-side time layout (`HH:MM:SS`).
pub const STORED_TIME_FORMAT: &str = "%H:%M:%S";

/// A single detection as written by the producer.
///
/// `date` and `time` are the producer's own rendering of `timestamp`.
/// Viewers do not rely on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    pub timestamp: DateTime<Utc>,
    #[serde(alias = "Location")]
    pub location: String,
    pub source: i64,
    pub date: String,
    pub time: String,
}

impl Detection {
    pub fn new(
        timestamp: DateTime<Utc>,
        location: impl Into<String>,
        source: i64,
        date: impl Into<String>,
        time: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            location: location.into(),
            source,
            date: date.into(),
            time: time.into(),
        }
    }

    /// Builds a record stamped the way the producer stamps it, with
    /// `date`/`time` rendered in the producer's zone.
    pub fn stamped(
        timestamp: DateTime<Utc>,
        location: impl Into<String>,
        source: i64,
        zone: &FixedOffset,
    ) -> Self {
        let local = timestamp.with_timezone(zone);
        Self::new(
            timestamp,
            location,
            source,
            local.format(STORED_DATE_FORMAT).to_string(),
            local.format(STORED_TIME_FORMAT).to_string(),
        )
    }
}
