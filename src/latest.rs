//! Absolute-latest value per signal, independent of frame alignment.
//!
//! Frames answer "what did the grid look like at slot T"; some consumers
//! only ever ask "what is the freshest value for this signal right now".
//! [`LatestMeasurements`] serves the second question: a concurrent map of
//! per-signal [`TemporalMeasurement`]s fed with every accepted sample.
//! Values are stored already calibrated, so reads hand back engineering
//! units directly, and every read is gated by the shared lag/lead window
//! against a caller-supplied clock.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use gridframe::key::MeasurementKey;
//! use gridframe::latest::LatestMeasurements;
//! use gridframe::measurement::Measurement;
//! use gridframe::metadata::MeasurementMetadata;
//! use gridframe::temporal::TimeConstraints;
//! use gridframe::ticks::Ticks;
//!
//! # fn main() -> gridframe::error::Result<()> {
//! let latest = LatestMeasurements::new(TimeConstraints::new(5.0, 5.0)?);
//! let meta = MeasurementMetadata::new(MeasurementKey::generate("PMU-7", 12), "BUS1.FREQ");
//!
//! let now = Ticks::now();
//! latest.update(&Measurement::new(meta.clone(), 59.98, now));
//! assert_eq!(latest.value(meta.key(), now), 59.98);
//! # Ok(())
//! # }
//! ```

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

use crate::key::MeasurementKey;
use crate::measurement::Measurement;
use crate::temporal::{TemporalMeasurement, TimeConstraints};
use crate::ticks::Ticks;

/// Concurrent per-signal cache of the freshest calibrated value.
#[derive(Debug)]
pub struct LatestMeasurements {
    measurements: DashMap<MeasurementKey, Mutex<TemporalMeasurement>>,
    constraints: RwLock<TimeConstraints>,
}

impl LatestMeasurements {
    /// Creates an empty cache whose reads honor `constraints`.
    pub fn new(constraints: TimeConstraints) -> Self {
        LatestMeasurements {
            measurements: DashMap::new(),
            constraints: RwLock::new(constraints),
        }
    }

    /// The freshness window applied to all reads.
    pub fn constraints(&self) -> TimeConstraints {
        *self.constraints.read()
    }

    /// Replaces the freshness window, on existing entries as well.
    pub fn set_constraints(&self, constraints: TimeConstraints) {
        *self.constraints.write() = constraints;
        for entry in self.measurements.iter() {
            entry.value().lock().set_constraints(constraints);
        }
    }

    /// Feeds one sample into the cache.
    ///
    /// The stored value is the calibrated one; a sample time-stamped at or
    /// before the signal's current record is ignored and `false` returned.
    pub fn update(&self, measurement: &Measurement) -> bool {
        if let Some(entry) = self.measurements.get(measurement.key()) {
            return entry
                .lock()
                .try_update(measurement.timestamp, measurement.adjusted_value());
        }

        let entry = self
            .measurements
            .entry(measurement.key().clone())
            .or_insert_with(|| {
                let seed = Measurement {
                    metadata: Arc::clone(&measurement.metadata),
                    ..Measurement::default()
                };
                Mutex::new(TemporalMeasurement::new(seed, self.constraints()))
            });
        let mut record = entry.lock();
        record.try_update(measurement.timestamp, measurement.adjusted_value())
    }

    /// The signal's latest calibrated value as of `now`, or NaN when the
    /// signal is unknown or its record has aged out of the window.
    pub fn value(&self, key: &MeasurementKey, now: Ticks) -> f64 {
        match self.measurements.get(key) {
            Some(entry) => entry.lock().value_at(now),
            None => f64::NAN,
        }
    }

    /// Mean of all in-window values as of `now`; NaN when none qualify.
    pub fn average(&self, now: Ticks) -> f64 {
        let mut sum = 0.0;
        let mut count = 0u32;
        for entry in self.measurements.iter() {
            let value = entry.value().lock().value_at(now);
            if !value.is_nan() {
                sum += value;
                count += 1;
            }
        }
        if count == 0 {
            f64::NAN
        } else {
            sum / f64::from(count)
        }
    }

    /// Smallest in-window value as of `now`; NaN when none qualify.
    pub fn minimum(&self, now: Ticks) -> f64 {
        self.fold_values(now, f64::min)
    }

    /// Largest in-window value as of `now`; NaN when none qualify.
    pub fn maximum(&self, now: Ticks) -> f64 {
        self.fold_values(now, f64::max)
    }

    fn fold_values(&self, now: Ticks, fold: fn(f64, f64) -> f64) -> f64 {
        let mut folded = f64::NAN;
        for entry in self.measurements.iter() {
            let value = entry.value().lock().value_at(now);
            if value.is_nan() {
                continue;
            }
            folded = if folded.is_nan() { value } else { fold(folded, value) };
        }
        folded
    }

    /// Keys of every signal the cache has seen.
    pub fn keys(&self) -> Vec<MeasurementKey> {
        self.measurements
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Number of signals the cache has seen.
    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    /// Whether the cache has seen any signal at all.
    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    /// Forgets every signal.
    pub fn clear(&self) {
        self.measurements.clear();
    }
}
