pub mod bookmark;
pub mod history;
pub mod notification;

use chrono::{DateTime, SecondsFormat, Utc};

/// Timestamps are stored as fixed-width RFC 3339 UTC strings so they sort lexically.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

pub(crate) fn episode_to_column(episode: u32) -> i32 {
    i32::try_from(episode).unwrap_or(i32::MAX)
}

pub(crate) fn episode_from_column(episode: i32) -> u32 {
    u32::try_from(episode).unwrap_or(0)
}
