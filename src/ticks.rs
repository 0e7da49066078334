//! High-resolution timestamps for measurement alignment.
//!
//! All timestamps in the crate are [`Ticks`]: a signed count of 100 ns
//! intervals since the Unix epoch. The tick is the native resolution of the
//! upstream telemetry sources, and integer ticks keep frame-slot arithmetic
//! exact where floating-point seconds would drift.
//!
//! ## Example
//!
//! ```
//! use gridframe::ticks::Ticks;
//!
//! let now = Ticks::now();
//! let slot = now + Ticks::PER_SECOND / 30; // next frame at 30 frames/sec
//! assert!(slot > now);
//! ```

use std::fmt;
use std::ops::{Add, Sub};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A timestamp measured in 100 ns intervals since the Unix epoch.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Ticks(i64);

impl Ticks {
    /// Number of ticks in one second.
    pub const PER_SECOND: i64 = 10_000_000;

    /// Number of ticks in one millisecond.
    pub const PER_MILLISECOND: i64 = 10_000;

    /// The zero timestamp (the Unix epoch itself).
    pub const ZERO: Ticks = Ticks(0);

    /// Creates a timestamp from a raw tick count.
    pub const fn new(value: i64) -> Self {
        Ticks(value)
    }

    /// Returns the raw tick count.
    pub const fn value(self) -> i64 {
        self.0
    }

    /// Returns the current wall-clock time as ticks.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Converts a `chrono` timestamp to ticks, truncating below 100 ns.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        let seconds = dt.timestamp();
        let sub_ticks = i64::from(dt.timestamp_subsec_nanos()) / 100;
        Ticks(seconds * Self::PER_SECOND + sub_ticks)
    }

    /// Converts ticks back to a `chrono` timestamp.
    ///
    /// Returns `None` for tick counts outside the range `chrono` can
    /// represent.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        let seconds = self.0.div_euclid(Self::PER_SECOND);
        let sub_nanos = self.0.rem_euclid(Self::PER_SECOND) * 100;
        DateTime::from_timestamp(seconds, sub_nanos as u32)
    }

    /// Creates a timestamp from fractional seconds since the epoch.
    pub fn from_seconds(seconds: f64) -> Self {
        Ticks((seconds * Self::PER_SECOND as f64) as i64)
    }

    /// Returns the timestamp as fractional seconds since the epoch.
    pub fn as_seconds_f64(self) -> f64 {
        self.0 as f64 / Self::PER_SECOND as f64
    }

    /// Tests whether this timestamp falls inside a lag/lead window around
    /// `current`.
    ///
    /// The distance is `(current - self)` in seconds: positive when this
    /// timestamp is in the past. The window accepts timestamps up to
    /// `lag_time` seconds old and up to `lead_time` seconds ahead of
    /// `current`, both bounds inclusive.
    ///
    /// Tolerances must be strictly positive; callers validate them before
    /// calling (see [`TimeConstraints`](crate::temporal::TimeConstraints)).
    pub fn time_is_valid(self, current: Ticks, lag_time: f64, lead_time: f64) -> bool {
        let distance = (current.0 - self.0) as f64 / Self::PER_SECOND as f64;
        distance >= -lead_time && distance <= lag_time
    }
}

impl Add for Ticks {
    type Output = Ticks;

    fn add(self, rhs: Ticks) -> Ticks {
        Ticks(self.0 + rhs.0)
    }
}

impl Sub for Ticks {
    type Output = Ticks;

    fn sub(self, rhs: Ticks) -> Ticks {
        Ticks(self.0 - rhs.0)
    }
}

impl Add<i64> for Ticks {
    type Output = Ticks;

    fn add(self, rhs: i64) -> Ticks {
        Ticks(self.0 + rhs)
    }
}

impl Sub<i64> for Ticks {
    type Output = Ticks;

    fn sub(self, rhs: i64) -> Ticks {
        Ticks(self.0 - rhs)
    }
}

impl From<i64> for Ticks {
    fn from(value: i64) -> Self {
        Ticks(value)
    }
}

impl From<Ticks> for i64 {
    fn from(value: Ticks) -> Self {
        value.0
    }
}

impl From<DateTime<Utc>> for Ticks {
    fn from(value: DateTime<Utc>) -> Self {
        Self::from_datetime(value)
    }
}

impl fmt::Display for Ticks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::Micros, true)),
            None => write!(f, "{} ticks", self.0),
        }
    }
}
