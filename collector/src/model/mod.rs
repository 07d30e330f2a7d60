pub mod cluster;
pub mod job;
pub mod statistics;

// Re-export the main types for easy access
pub use cluster::*;
pub use job::*;
pub use statistics::*;

use chrono::{
    DateTime,
    Utc,
};

/// Converts epoch milliseconds as stored in the database back into an instant.
pub(crate) fn instant_from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

/// Remote systems report "not set" as `-1` or `0`; those are absent, not the epoch.
pub(crate) fn optional_instant_from_millis(millis: Option<i64>) -> Option<DateTime<Utc>> {
    millis.filter(|ms| *ms > 0).and_then(DateTime::from_timestamp_millis)
}
