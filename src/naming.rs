//! Title generation for servers, disks, and templates.

use chrono::{DateTime, Utc};

const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Formats `now` as `YYYYMMDD-HHMMSS`.
#[must_use]
pub fn timestamp(now: DateTime<Utc>) -> String {
    now.format(TIMESTAMP_FORMAT).to_string()
}

/// Returns `<prefix>-<timestamp>` for the current UTC time.
#[must_use]
pub fn timestamped_title(prefix: &str) -> String {
    timestamped_title_at(prefix, Utc::now())
}

/// Returns `<prefix>-<timestamp>` for `now`.
#[must_use]
pub fn timestamped_title_at(prefix: &str, now: DateTime<Utc>) -> String {
    format!("{prefix}-{}", timestamp(now))
}

/// Boot disk title for a server.
#[must_use]
pub fn disk_title(server_title: &str) -> String {
    format!("{server_title}-disk1")
}

/// Title for a cross-zone clone of the boot disk.
#[must_use]
pub fn clone_title(prefix: &str, now: DateTime<Utc>) -> String {
    format!("{}-cloned-disk1", timestamped_title_at(prefix, now))
}
