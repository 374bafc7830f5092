// Copyright (c) 2022 The zchain developers
//! Unsigned time management
#![warn(missing_docs)]
#![warn(unused_crate_dependencies)]

mod error;
pub use error::TimeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Time structure used everywhere.
/// Either a timestamp (milliseconds since 01/01/1970) or a duration in milliseconds.
#[derive(
    Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct ChainTime(u64);

impl fmt::Display for ChainTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_millis())
    }
}

impl TryFrom<Duration> for ChainTime {
    type Error = TimeError;

    /// Conversion from `std::time::Duration`.
    /// ```
    /// # use std::time::Duration;
    /// # use zchain_time::*;
    /// let duration: Duration = Duration::from_millis(42);
    /// let time : ChainTime = ChainTime::from_millis(42);
    /// assert_eq!(time, ChainTime::try_from(duration).unwrap());
    /// ```
    fn try_from(value: Duration) -> Result<Self, Self::Error> {
        Ok(ChainTime(
            value
                .as_millis()
                .try_into()
                .map_err(|_| TimeError::ConversionError)?,
        ))
    }
}

impl From<ChainTime> for Duration {
    fn from(value: ChainTime) -> Self {
        value.to_duration()
    }
}

impl FromStr for ChainTime {
    type Err = crate::TimeError;

    /// Conversion from `&str`: a plain number of milliseconds or a human readable duration.
    ///
    /// ```
    /// # use zchain_time::*;
    /// # use std::str::FromStr;
    /// assert_eq!(ChainTime::from_millis(42), ChainTime::from_str("42").unwrap());
    /// assert_eq!(ChainTime::from_millis(16_000), ChainTime::from_str("16s").unwrap());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(millis) = u64::from_str(s) {
            return Ok(ChainTime(millis));
        }
        let duration =
            humantime::parse_duration(s).map_err(|err| TimeError::ParseError(err.to_string()))?;
        ChainTime::try_from(duration)
    }
}

impl ChainTime {
    /// Conversion from `u64`, representing milliseconds.
    pub const fn from_millis(value: u64) -> Self {
        ChainTime(value)
    }

    /// Smallest time interval
    pub const EPSILON: ChainTime = ChainTime(1);

    /// Gets current UNIX timestamp (resolution: milliseconds).
    pub fn now() -> Result<Self, TimeError> {
        let now: u64 = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| TimeError::TimeOverflowError)?
            .as_millis()
            .try_into()
            .map_err(|_| TimeError::TimeOverflowError)?;
        Ok(ChainTime(now))
    }

    /// Conversion to `std::time::Duration`.
    pub fn to_duration(&self) -> Duration {
        Duration::from_millis(self.0)
    }

    /// Conversion to `u64`, representing milliseconds.
    pub const fn to_millis(&self) -> u64 {
        self.0
    }

    /// ```
    /// # use zchain_time::*;
    /// let time_1 : ChainTime = ChainTime::from_millis(42);
    /// let time_2 : ChainTime = ChainTime::from_millis(7);
    /// assert_eq!(time_1.saturating_sub(time_2), ChainTime::from_millis(35));
    /// assert_eq!(time_2.saturating_sub(time_1), ChainTime::from_millis(0));
    /// ```
    #[must_use]
    pub fn saturating_sub(self, t: ChainTime) -> Self {
        ChainTime(self.0.saturating_sub(t.0))
    }

    /// ```
    /// # use zchain_time::*;
    /// let time_1 : ChainTime = ChainTime::from_millis(42);
    /// let time_2 : ChainTime = ChainTime::from_millis(7);
    /// assert_eq!(time_1.saturating_add(time_2), ChainTime::from_millis(49));
    /// ```
    #[must_use]
    pub fn saturating_add(self, t: ChainTime) -> Self {
        ChainTime(self.0.saturating_add(t.0))
    }

    /// Checked subtraction, fails on underflow.
    pub fn checked_sub(self, t: ChainTime) -> Result<Self, TimeError> {
        self.0
            .checked_sub(t.0)
            .ok_or(TimeError::TimeUnderflowError)
            .map(ChainTime)
    }

    /// Checked addition, fails on overflow.
    pub fn checked_add(self, t: ChainTime) -> Result<Self, TimeError> {
        self.0
            .checked_add(t.0)
            .ok_or(TimeError::TimeOverflowError)
            .map(ChainTime)
    }

    /// Checked multiplication by a factor, fails on overflow.
    pub fn checked_mul(self, n: u64) -> Result<Self, TimeError> {
        self.0
            .checked_mul(n)
            .ok_or(TimeError::TimeOverflowError)
            .map(ChainTime)
    }

    /// Time elapsed since this timestamp, zero if it lies in the future.
    pub fn elapsed(&self) -> Result<ChainTime, TimeError> {
        Ok(ChainTime::now()?.saturating_sub(*self))
    }

    /// Estimates the `Instant` corresponding to this timestamp.
    pub fn estimate_instant(self) -> Result<Instant, TimeError> {
        let (cur_timestamp, cur_instant): (ChainTime, Instant) = (ChainTime::now()?, Instant::now());
        if self >= cur_timestamp {
            cur_instant.checked_add(self.saturating_sub(cur_timestamp).to_duration())
        } else {
            cur_instant.checked_sub(cur_timestamp.saturating_sub(self).to_duration())
        }
        .ok_or(TimeError::TimeOverflowError)
    }

    /// RFC 3339 rendering of the timestamp, for logs.
    ///
    /// ```
    /// # use zchain_time::*;
    /// let time = ChainTime::from_millis(1_000);
    /// assert_eq!(time.format_instant(), "1970-01-01T00:00:01Z");
    /// ```
    pub fn format_instant(&self) -> String {
        let millis = self.0 as i128;
        OffsetDateTime::from_unix_timestamp_nanos(millis * 1_000_000)
            .ok()
            .and_then(|date| date.format(&Rfc3339).ok())
            .unwrap_or_else(|| self.0.to_string())
    }
}
