//! Time-windowed measurement reads.
//!
//! A [`TemporalMeasurement`] holds the latest sample of one signal and only
//! reveals its value while the sample is fresh relative to a caller-supplied
//! reference time. Freshness is a [`TimeConstraints`] window: up to
//! `lag_time` seconds old and up to `lead_time` seconds ahead (sources with
//! skewed clocks legitimately stamp slightly into the future).
//!
//! Reads outside the window return NaN, the same sentinel an unset value
//! reads as. A signal whose genuine value is NaN is indistinguishable from
//! a stale one through `value_at` alone; callers needing the distinction
//! check [`TemporalMeasurement::timestamp`] directly.

use crate::error::{GridFrameError, Result};
use crate::measurement::Measurement;
use crate::ticks::Ticks;

/// Validated lag/lead time tolerances, in seconds.
///
/// Both tolerances must be strictly positive; sub-second values are
/// routine for high-rate telemetry. Construction is the single validation
/// point, so code holding a `TimeConstraints` never re-checks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeConstraints {
    lag_time: f64,
    lead_time: f64,
}

impl TimeConstraints {
    /// Creates a window allowing `lag_time` seconds of age and `lead_time`
    /// seconds of clock skew ahead.
    pub fn new(lag_time: f64, lead_time: f64) -> Result<Self> {
        if lag_time <= 0.0 || lag_time.is_nan() {
            return Err(GridFrameError::InvalidTimeConstraint {
                name: "lag_time",
                value: lag_time,
            });
        }
        if lead_time <= 0.0 || lead_time.is_nan() {
            return Err(GridFrameError::InvalidTimeConstraint {
                name: "lead_time",
                value: lead_time,
            });
        }
        Ok(TimeConstraints {
            lag_time,
            lead_time,
        })
    }

    /// Allowed age in seconds.
    pub fn lag_time(self) -> f64 {
        self.lag_time
    }

    /// Allowed lead in seconds.
    pub fn lead_time(self) -> f64 {
        self.lead_time
    }

    /// Whether `timestamp` is inside this window around `current`.
    pub fn contains(self, timestamp: Ticks, current: Ticks) -> bool {
        timestamp.time_is_valid(current, self.lag_time, self.lead_time)
    }
}

/// The latest sample of one signal, readable only while fresh.
#[derive(Debug, Clone)]
pub struct TemporalMeasurement {
    measurement: Measurement,
    constraints: TimeConstraints,
}

impl TemporalMeasurement {
    /// Wraps a sample with a freshness window.
    pub fn new(measurement: Measurement, constraints: TimeConstraints) -> Self {
        TemporalMeasurement {
            measurement,
            constraints,
        }
    }

    /// The wrapped sample, unconditionally.
    pub fn measurement(&self) -> &Measurement {
        &self.measurement
    }

    /// Timestamp of the stored sample; `Ticks::ZERO` before any update.
    pub fn timestamp(&self) -> Ticks {
        self.measurement.timestamp
    }

    /// The freshness window.
    pub fn constraints(&self) -> TimeConstraints {
        self.constraints
    }

    /// Replaces the freshness window.
    pub fn set_constraints(&mut self, constraints: TimeConstraints) {
        self.constraints = constraints;
    }

    /// Replaces the allowed age, re-validating it.
    pub fn set_lag_time(&mut self, lag_time: f64) -> Result<()> {
        self.constraints = TimeConstraints::new(lag_time, self.constraints.lead_time)?;
        Ok(())
    }

    /// Replaces the allowed lead, re-validating it.
    pub fn set_lead_time(&mut self, lead_time: f64) -> Result<()> {
        self.constraints = TimeConstraints::new(self.constraints.lag_time, lead_time)?;
        Ok(())
    }

    /// The raw value as of `current`, NaN when stale or never set.
    ///
    /// A pure read: any reference time may be supplied, so replaying
    /// history against an old `current` is allowed.
    pub fn value_at(&self, current: Ticks) -> f64 {
        if self.constraints.contains(self.measurement.timestamp, current) {
            self.measurement.value
        } else {
            f64::NAN
        }
    }

    /// The calibrated value as of `current`, NaN when stale or never set.
    pub fn adjusted_value_at(&self, current: Ticks) -> f64 {
        if self.constraints.contains(self.measurement.timestamp, current) {
            self.measurement.adjusted_value()
        } else {
            f64::NAN
        }
    }

    /// Stores `value` if `timestamp` strictly exceeds the stored timestamp.
    ///
    /// Returns whether the update was taken. A `false` return is the
    /// normal outcome for an out-of-order sample, not an error: the newer
    /// value already present wins.
    pub fn try_update(&mut self, timestamp: Ticks, value: f64) -> bool {
        if timestamp > self.measurement.timestamp {
            self.measurement.timestamp = timestamp;
            self.measurement.value = value;
            true
        } else {
            false
        }
    }
}
