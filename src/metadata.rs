//! Immutable per-signal calibration metadata.
//!
//! A [`MeasurementMetadata`] record carries everything about a signal that
//! changes rarely: its key, human-readable tag, linear calibration
//! (`adder`/`multiplier`), and an optional value filter for downsampling.
//! Records are immutable and always handled through `Arc`, so thousands of
//! in-flight samples share one allocation and a metadata update never
//! mutates what another thread is reading.
//!
//! Updates go through the `change_*` methods, which return a new record
//! with one field replaced. When the replacement equals the current value
//! the SAME handle comes back (pointer-equal), so repeated idempotent
//! updates from a config refresh loop allocate nothing:
//!
//! ```
//! use std::sync::Arc;
//! use gridframe::key::MeasurementKey;
//! use gridframe::metadata::MeasurementMetadata;
//!
//! let meta = MeasurementMetadata::new(MeasurementKey::generate("PMU-7", 12), "BUS1.FREQ");
//! let tuned = meta.clone().change_adder(0.5);
//! let again = tuned.clone().change_adder(0.5);
//! assert!(!Arc::ptr_eq(&meta, &tuned));
//! assert!(Arc::ptr_eq(&tuned, &again));
//! ```

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::key::MeasurementKey;
use crate::measurement::Measurement;

/// Value filter callback type.
///
/// Reduces a window of samples for one signal to a single value. Used by
/// the filtered downsampling method; signals without an explicit filter
/// fall back to [`average_value_filter`](crate::measurement::average_value_filter).
pub type ValueFilter = Arc<dyn Fn(&[Measurement]) -> f64 + Send + Sync>;

static UNDEFINED: Lazy<Arc<MeasurementMetadata>> = Lazy::new(|| {
    Arc::new(MeasurementMetadata {
        key: MeasurementKey::undefined(),
        tag_name: String::new(),
        adder: MeasurementMetadata::DEFAULT_ADDER,
        multiplier: MeasurementMetadata::DEFAULT_MULTIPLIER,
        value_filter: None,
    })
});

/// Immutable calibration and identification metadata for one signal.
#[derive(Clone)]
pub struct MeasurementMetadata {
    key: MeasurementKey,
    tag_name: String,
    adder: f64,
    multiplier: f64,
    value_filter: Option<ValueFilter>,
}

impl MeasurementMetadata {
    /// Default adder applied to raw values.
    pub const DEFAULT_ADDER: f64 = 0.0;

    /// Default multiplier applied to raw values.
    pub const DEFAULT_MULTIPLIER: f64 = 1.0;

    /// Creates metadata with identity calibration and no value filter.
    pub fn new(key: MeasurementKey, tag_name: impl Into<String>) -> Arc<Self> {
        Arc::new(MeasurementMetadata {
            key,
            tag_name: tag_name.into(),
            adder: Self::DEFAULT_ADDER,
            multiplier: Self::DEFAULT_MULTIPLIER,
            value_filter: None,
        })
    }

    /// Creates metadata with an explicit linear calibration.
    pub fn with_calibration(
        key: MeasurementKey,
        tag_name: impl Into<String>,
        adder: f64,
        multiplier: f64,
    ) -> Arc<Self> {
        Arc::new(MeasurementMetadata {
            key,
            tag_name: tag_name.into(),
            adder,
            multiplier,
            value_filter: None,
        })
    }

    /// The shared metadata record for measurements with no assigned signal.
    pub fn undefined() -> Arc<Self> {
        Arc::clone(&UNDEFINED)
    }

    /// The signal this metadata describes.
    pub fn key(&self) -> &MeasurementKey {
        &self.key
    }

    /// Human-readable point tag, empty when unnamed.
    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    /// Offset added to the scaled raw value.
    pub fn adder(&self) -> f64 {
        self.adder
    }

    /// Scale applied to the raw value before the adder.
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// The downsampling value filter, if one is assigned.
    pub fn value_filter(&self) -> Option<&ValueFilter> {
        self.value_filter.as_ref()
    }

    /// Applies the linear calibration to a raw value.
    pub fn adjust(&self, value: f64) -> f64 {
        value * self.multiplier + self.adder
    }

    // ===== Change operations =====
    //
    // Each consumes the handle and returns it unchanged when the update is
    // idempotent, otherwise a fresh record. Clone the handle first to keep
    // the original.

    /// Returns metadata with the key replaced.
    ///
    /// Keys compare by signal identity, so swapping in a key with the same
    /// UUID but a different `SOURCE:ID` composite is a no-op.
    pub fn change_key(self: Arc<Self>, key: MeasurementKey) -> Arc<Self> {
        if self.key == key {
            return self;
        }
        let mut next = (*self).clone();
        next.key = key;
        Arc::new(next)
    }

    /// Returns metadata with the tag name replaced.
    pub fn change_tag_name(self: Arc<Self>, tag_name: impl Into<String>) -> Arc<Self> {
        let tag_name = tag_name.into();
        if self.tag_name == tag_name {
            return self;
        }
        let mut next = (*self).clone();
        next.tag_name = tag_name;
        Arc::new(next)
    }

    /// Returns metadata with the adder replaced.
    pub fn change_adder(self: Arc<Self>, adder: f64) -> Arc<Self> {
        if self.adder == adder {
            return self;
        }
        let mut next = (*self).clone();
        next.adder = adder;
        Arc::new(next)
    }

    /// Returns metadata with the multiplier replaced.
    pub fn change_multiplier(self: Arc<Self>, multiplier: f64) -> Arc<Self> {
        if self.multiplier == multiplier {
            return self;
        }
        let mut next = (*self).clone();
        next.multiplier = multiplier;
        Arc::new(next)
    }

    /// Returns metadata with both calibration factors replaced.
    pub fn change_adder_multiplier(self: Arc<Self>, adder: f64, multiplier: f64) -> Arc<Self> {
        if self.adder == adder && self.multiplier == multiplier {
            return self;
        }
        let mut next = (*self).clone();
        next.adder = adder;
        next.multiplier = multiplier;
        Arc::new(next)
    }

    /// Returns metadata with the value filter replaced.
    ///
    /// Filters compare by handle identity: passing a clone of the current
    /// filter (or `None` when none is assigned) is a no-op.
    pub fn change_value_filter(self: Arc<Self>, value_filter: Option<ValueFilter>) -> Arc<Self> {
        let unchanged = match (&self.value_filter, &value_filter) {
            (None, None) => true,
            (Some(current), Some(next)) => Arc::ptr_eq(current, next),
            _ => false,
        };
        if unchanged {
            return self;
        }
        let mut next = (*self).clone();
        next.value_filter = value_filter;
        Arc::new(next)
    }
}

impl fmt::Debug for MeasurementMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeasurementMetadata")
            .field("key", &self.key)
            .field("tag_name", &self.tag_name)
            .field("adder", &self.adder)
            .field("multiplier", &self.multiplier)
            .field("has_value_filter", &self.value_filter.is_some())
            .finish()
    }
}
