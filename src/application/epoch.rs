//! Conversion of Messages store timestamps.
//!
//! The store records message dates as nanoseconds since
//! 2001-01-01T00:00:00 UTC. Zero and negative values mean "unset".

use chrono::{DateTime, Local, TimeZone, Utc};

/// Seconds between 1970-01-01 and 2001-01-01 UTC.
pub const STORE_EPOCH_OFFSET_SECS: i64 = 978_307_200;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Output layout: seconds precision, no offset suffix.
const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Converts a raw store timestamp to a UTC instant, truncated to whole seconds.
#[must_use]
pub fn to_utc(raw_epoch_ns: i64) -> Option<DateTime<Utc>> {
    if raw_epoch_ns <= 0 {
        return None;
    }
    let secs = (raw_epoch_ns / NANOS_PER_SEC).checked_add(STORE_EPOCH_OFFSET_SECS)?;
    DateTime::from_timestamp(secs, 0)
}

/// Formats a raw store timestamp in `tz`, or returns an empty string when unset.
#[must_use]
pub fn format_in<Tz: TimeZone>(raw_epoch_ns: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    to_utc(raw_epoch_ns).map_or_else(String::new, |utc| {
        utc.with_timezone(tz).format(ISO_FORMAT).to_string()
    })
}

/// Formats a raw store timestamp in the process-local timezone.
#[must_use]
pub fn to_local_iso(raw_epoch_ns: i64) -> String {
    format_in(raw_epoch_ns, &Local)
}
