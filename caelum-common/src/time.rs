//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Whole seconds since the unix epoch, clamped at zero
pub fn unix_seconds(at: DateTime<Utc>) -> u64 {
    at.timestamp().max(0) as u64
}

/// Fixed-width RFC 3339 form (microseconds, `Z` suffix)
///
/// Lexicographic order of the output matches chronological order, which the
/// SQLite pending index relies on.
pub fn sortable(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}
