//! Wall-clock helpers shared by the protocol types.
//!
//! Payload timestamps travel as local wall-clock strings with millisecond
//! resolution; envelope timestamps travel as epoch milliseconds. Both sides
//! of a sync pair run on the same host, so local time is comparable.

use chrono::{Local, NaiveDateTime, TimeZone};
use std::time::{SystemTime, UNIX_EPOCH};

/// Wire format for `EditorState.timestamp`: `YYYY-MM-DD HH:MM:SS.mmm`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Current time as epoch milliseconds.
pub fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Current local time in the payload timestamp format.
pub fn now_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a payload timestamp back to epoch milliseconds.
///
/// Returns `None` for malformed input or a local time that does not
/// resolve (DST gap).
pub fn parse_timestamp(s: &str) -> Option<i64> {
    let naive = NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp_millis())
}
