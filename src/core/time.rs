//! Shared timestamp and event id helpers.

use chrono::{SecondsFormat, Utc};
use ulid::Ulid;

/// Returns the current UTC time as RFC 3339 with millisecond precision
/// (e.g. `2026-02-16T05:43:12.345Z`).
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}
