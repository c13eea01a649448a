//! Coarse time buckets used as the cache key's time component.

use chrono::{DateTime, TimeZone, Timelike, Utc};

pub const DEFAULT_BUCKET_HOURS: u32 = 6;

/// Truncate `t` to the preceding multiple of `hours` within its day.
///
/// `hours` of 0 is treated as 1.
pub fn bucket_start(t: DateTime<Utc>, hours: u32) -> DateTime<Utc> {
    let hours = hours.max(1);
    let hour = t.hour() / hours * hours;
    let date = t.date_naive();

    // hour < 24 so and_hms_opt always succeeds; fall back to the day start regardless.
    date.and_hms_opt(hour, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .unwrap_or_else(|| Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN)))
}
