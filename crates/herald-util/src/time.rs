//! Time utilities for heraldd

use chrono::{DateTime, Local};

/// Get the current local time.
///
/// All timestamps in herald go through this wrapper so callers never reach
/// for `Local::now()` directly.
pub fn now() -> DateTime<Local> {
    Local::now()
}

/// Format a timestamp for storage (RFC 3339).
pub fn to_storage(ts: &DateTime<Local>) -> String {
    ts.to_rfc3339()
}

/// Parse a stored timestamp, falling back to the current time on garbage.
pub fn from_storage(s: &str) -> DateTime<Local> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Local))
        .unwrap_or_else(|_| now())
}
