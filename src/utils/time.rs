/// Epoch-aligned window arithmetic
use chrono::{DateTime, TimeDelta, Utc};

/// Truncate a timestamp down to the start of its window.
///
/// Windows are multiples of `interval_ms` counted from the Unix epoch, so
/// pre-epoch timestamps floor toward the past rather than toward zero.
pub fn truncate_to_interval(timestamp: DateTime<Utc>, interval_ms: i64) -> DateTime<Utc> {
    let millis = timestamp.timestamp_millis();
    let start = millis.div_euclid(interval_ms) * interval_ms;

    DateTime::from_timestamp_millis(start).unwrap_or(timestamp)
}

/// First window boundary strictly after `now`, saturating at chrono's max
pub fn next_boundary(now: DateTime<Utc>, interval_ms: i64) -> DateTime<Utc> {
    truncate_to_interval(now, interval_ms)
        .checked_add_signed(TimeDelta::milliseconds(interval_ms))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
