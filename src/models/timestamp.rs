use std::fmt::Display;
use std::ops::Add;
use std::ops::Sub;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use chrono::DateTime;
use chrono::Utc;
use num_traits::Zero;
use serde::Deserialize;
use serde::Serialize;

/// Dedicated struct for timestamps (and durations). Counts the number of
/// milliseconds elapsed since the Unix epoch (00:00 UTC on 1 Jan 1970).
///
/// Subtraction saturates at zero: a clock that steps backwards yields an
/// empty interval, never a huge one.
#[derive(
    Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Zero for Timestamp {
    fn zero() -> Self {
        Timestamp(0)
    }

    fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Add for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Self) -> Self::Output {
        Timestamp(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: Self) -> Self::Output {
        Timestamp(self.0.saturating_sub(rhs.0))
    }
}

impl From<Duration> for Timestamp {
    fn from(duration: Duration) -> Self {
        Timestamp(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }
}

impl Timestamp {
    pub fn now() -> Timestamp {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        Timestamp::from(since_epoch)
    }

    pub const fn days(num: u64) -> Timestamp {
        Timestamp(num.saturating_mul(24 * 60 * 60 * 1000))
    }

    pub const fn hours(num: u64) -> Timestamp {
        Timestamp(num.saturating_mul(60 * 60 * 1000))
    }

    pub const fn minutes(num: u64) -> Timestamp {
        Timestamp(num.saturating_mul(60 * 1000))
    }

    pub const fn seconds(num: u64) -> Timestamp {
        Timestamp(num.saturating_mul(1000))
    }

    pub const fn millis(num: u64) -> Timestamp {
        Timestamp(num)
    }

    pub const fn to_millis(self) -> u64 {
        self.0
    }

    /// Whole seconds from `earlier` to `self`, rounded down. Zero if `earlier`
    /// is not before `self`.
    pub const fn whole_seconds_since(self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0) / 1000
    }

    pub fn format(&self, format_descriptor: &str) -> String {
        let Ok(millis) = i64::try_from(self.0) else {
            return String::new();
        };
        match DateTime::from_timestamp_millis(millis) {
            Some(dt) => dt.format(format_descriptor).to_string(),
            None => String::new(),
        }
    }

    pub fn standard_format(&self) -> String {
        let Ok(millis) = i64::try_from(self.0) else {
            return String::new();
        };
        DateTime::<Utc>::from_timestamp_millis(millis)
            .map(|utc| utc.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
            .unwrap_or_default()
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
