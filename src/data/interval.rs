/// Aggregation interval and its short labels
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;

use crate::error::{KlineError, Result};
use crate::utils::{next_boundary, truncate_to_interval};

const MS_PER_SECOND: u64 = 1_000;
const MS_PER_MINUTE: u64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: u64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: u64 = 24 * MS_PER_HOUR;

// Keeps window arithmetic well inside chrono's representable range
const MAX_INTERVAL_MS: u64 = 3650 * MS_PER_DAY;

/// Fixed bar width, between one millisecond and ten years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct Interval(Duration);

impl Interval {
    pub const ONE_MINUTE: Interval = Interval(Duration::from_secs(60));
    pub const FIVE_MINUTES: Interval = Interval(Duration::from_secs(5 * 60));
    pub const FIFTEEN_MINUTES: Interval = Interval(Duration::from_secs(15 * 60));
    pub const ONE_HOUR: Interval = Interval(Duration::from_secs(60 * 60));
    pub const ONE_DAY: Interval = Interval(Duration::from_secs(24 * 60 * 60));

    pub fn new(duration: Duration) -> Result<Self> {
        if duration.as_millis() == 0 {
            return Err(KlineError::InvalidInterval(format!(
                "interval must be at least 1ms, got {:?}",
                duration
            )));
        }
        if duration.subsec_nanos() % 1_000_000 != 0 {
            return Err(KlineError::InvalidInterval(format!(
                "interval must be a whole number of milliseconds, got {:?}",
                duration
            )));
        }
        if duration.as_millis() > MAX_INTERVAL_MS as u128 {
            return Err(KlineError::InvalidInterval(format!(
                "interval too large: {:?} (max {} days)",
                duration,
                MAX_INTERVAL_MS / MS_PER_DAY
            )));
        }
        Ok(Interval(duration))
    }

    pub fn duration(&self) -> Duration {
        self.0
    }

    pub fn as_millis(&self) -> i64 {
        self.0.as_millis() as i64
    }

    /// Short label used on emitted bars ("1m", "1h", ...)
    pub fn label(&self) -> String {
        let canonical = [
            (Interval::ONE_MINUTE, "1m"),
            (Interval::FIVE_MINUTES, "5m"),
            (Interval::FIFTEEN_MINUTES, "15m"),
            (Interval::ONE_HOUR, "1h"),
            (Interval::ONE_DAY, "1d"),
        ];

        canonical
            .iter()
            .find(|(interval, _)| interval == self)
            .map(|(_, label)| label.to_string())
            .unwrap_or_else(|| literal_duration(self.0))
    }

    /// Start of the window containing `timestamp`
    pub fn window_start(&self, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        truncate_to_interval(timestamp, self.as_millis())
    }

    /// Nominal end of a window that started at `start`
    pub fn window_end(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        start
            .checked_add_signed(TimeDelta::milliseconds(self.as_millis()))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// First window boundary strictly after `now`
    pub fn next_boundary(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        next_boundary(now, self.as_millis())
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for Interval {
    type Err = KlineError;

    /// Parses `<n><unit>` sequences such as "1m", "90s", "1h30m" or "250ms".
    fn from_str(s: &str) -> Result<Self> {
        let input = s.trim();
        if input.is_empty() {
            return Err(KlineError::InvalidInterval("empty interval".to_string()));
        }

        let invalid = || KlineError::InvalidInterval(format!("cannot parse '{}'", input));
        let mut total_ms: u64 = 0;
        let mut rest = input;

        while !rest.is_empty() {
            let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
            if digits == 0 {
                return Err(invalid());
            }
            let value: u64 = rest[..digits].parse().map_err(|_| invalid())?;
            rest = &rest[digits..];

            let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
            let unit_ms = match &rest[..unit_len] {
                "ms" => 1,
                "s" => MS_PER_SECOND,
                "m" => MS_PER_MINUTE,
                "h" => MS_PER_HOUR,
                "d" => MS_PER_DAY,
                "" => {
                    return Err(KlineError::InvalidInterval(format!(
                        "missing unit in '{}'",
                        input
                    )))
                }
                other => {
                    return Err(KlineError::InvalidInterval(format!(
                        "unknown unit '{}' in '{}'",
                        other, input
                    )))
                }
            };
            rest = &rest[unit_len..];

            total_ms = value
                .checked_mul(unit_ms)
                .and_then(|ms| total_ms.checked_add(ms))
                .ok_or_else(invalid)?;
        }

        Interval::new(Duration::from_millis(total_ms))
    }
}

impl TryFrom<String> for Interval {
    type Error = KlineError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Literal representation for durations without a canonical label.
///
/// Mirrors the common `1h2m3.5s` notation: hours force minutes and
/// seconds to print, fractional seconds are decimals and anything under a
/// second is written in milliseconds.
fn literal_duration(duration: Duration) -> String {
    let ms = duration.as_millis() as u64;
    if ms == 0 {
        return "0s".to_string();
    }
    if ms < MS_PER_SECOND {
        return format!("{}ms", ms);
    }

    let hours = ms / MS_PER_HOUR;
    let minutes = (ms % MS_PER_HOUR) / MS_PER_MINUTE;
    let mut seconds = ((ms % MS_PER_MINUTE) / MS_PER_SECOND).to_string();
    let millis = ms % MS_PER_SECOND;
    if millis > 0 {
        let fraction = format!("{:03}", millis);
        seconds.push('.');
        seconds.push_str(fraction.trim_end_matches('0'));
    }

    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
