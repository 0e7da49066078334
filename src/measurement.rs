//! Measurement samples and buffer-block payloads.
//!
//! A [`Measurement`] is one time-stamped sample of one signal: the raw
//! value as received, quality flags, and a shared handle to the signal's
//! [`MeasurementMetadata`]. The calibrated value is always computed at read
//! time from the current metadata, never cached, so swapping a
//! measurement's metadata retroactively recalibrates it.
//!
//! ## Example
//!
//! ```
//! use gridframe::key::MeasurementKey;
//! use gridframe::measurement::Measurement;
//! use gridframe::metadata::MeasurementMetadata;
//! use gridframe::ticks::Ticks;
//!
//! let meta = MeasurementMetadata::with_calibration(
//!     MeasurementKey::generate("PMU-7", 12),
//!     "BUS1.FREQ",
//!     -5.0,
//!     2.0,
//! );
//! let sample = Measurement::new(meta, 100.0, Ticks::now());
//! assert_eq!(sample.value, 100.0);
//! assert_eq!(sample.adjusted_value(), 195.0);
//! ```

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::{GridFrameError, Result};
use crate::flags::MeasurementStateFlags;
use crate::key::MeasurementKey;
use crate::metadata::{MeasurementMetadata, ValueFilter};
use crate::ticks::Ticks;

/// One time-stamped sample of one signal.
#[derive(Debug, Clone)]
pub struct Measurement {
    /// Raw value as received, before calibration.
    pub value: f64,
    /// When the value was measured at the source.
    pub timestamp: Ticks,
    /// Quality and state flags.
    pub state_flags: MeasurementStateFlags,
    /// Shared signal metadata; swap the handle to re-describe the sample.
    pub metadata: Arc<MeasurementMetadata>,
}

impl Default for Measurement {
    fn default() -> Self {
        Measurement {
            value: f64::NAN,
            timestamp: Ticks::ZERO,
            state_flags: MeasurementStateFlags::NORMAL,
            metadata: MeasurementMetadata::undefined(),
        }
    }
}

impl Measurement {
    /// Creates a sample with normal quality.
    pub fn new(metadata: Arc<MeasurementMetadata>, value: f64, timestamp: Ticks) -> Self {
        Measurement {
            value,
            timestamp,
            state_flags: MeasurementStateFlags::NORMAL,
            metadata,
        }
    }

    /// Creates a sample with explicit state flags.
    pub fn with_flags(
        metadata: Arc<MeasurementMetadata>,
        value: f64,
        timestamp: Ticks,
        state_flags: MeasurementStateFlags,
    ) -> Self {
        Measurement {
            value,
            timestamp,
            state_flags,
            metadata,
        }
    }

    /// The key of the signal this sample belongs to.
    pub fn key(&self) -> &MeasurementKey {
        self.metadata.key()
    }

    /// The calibrated value: `value * multiplier + adder`.
    ///
    /// Computed on every read from the current metadata, so a metadata
    /// swap re-calibrates samples already in flight.
    pub fn adjusted_value(&self) -> f64 {
        self.metadata.adjust(self.value)
    }

    /// Whether the value quality is good ([`BAD_DATA`] clear).
    ///
    /// [`BAD_DATA`]: MeasurementStateFlags::BAD_DATA
    pub fn value_quality_is_good(&self) -> bool {
        !self.state_flags.contains(MeasurementStateFlags::BAD_DATA)
    }

    /// Whether the timestamp quality is good ([`BAD_TIME`] clear).
    ///
    /// [`BAD_TIME`]: MeasurementStateFlags::BAD_TIME
    pub fn timestamp_quality_is_good(&self) -> bool {
        !self.state_flags.contains(MeasurementStateFlags::BAD_TIME)
    }

    // ===== Metadata-backed setters =====
    //
    // Each computes the changed record through the metadata change
    // operations and swaps the handle. The shared record itself is never
    // mutated, and an idempotent set keeps the existing handle.

    /// Re-keys this sample.
    pub fn set_key(&mut self, key: MeasurementKey) {
        self.metadata = self.metadata.clone().change_key(key);
    }

    /// Renames this sample's point tag.
    pub fn set_tag_name(&mut self, tag_name: impl Into<String>) {
        self.metadata = self.metadata.clone().change_tag_name(tag_name);
    }

    /// Replaces the calibration adder.
    pub fn set_adder(&mut self, adder: f64) {
        self.metadata = self.metadata.clone().change_adder(adder);
    }

    /// Replaces the calibration multiplier.
    pub fn set_multiplier(&mut self, multiplier: f64) {
        self.metadata = self.metadata.clone().change_multiplier(multiplier);
    }

    /// Replaces the downsampling value filter.
    pub fn set_value_filter(&mut self, value_filter: Option<ValueFilter>) {
        self.metadata = self.metadata.clone().change_value_filter(value_filter);
    }

    /// Clones this sample with a different value and timestamp.
    pub fn clone_with(&self, value: f64, timestamp: Ticks) -> Self {
        let mut next = self.clone();
        next.value = value;
        next.timestamp = timestamp;
        next
    }

    /// Clones this sample re-stamped to a different time.
    pub fn clone_with_timestamp(&self, timestamp: Ticks) -> Self {
        let mut next = self.clone();
        next.timestamp = timestamp;
        next
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.metadata.tag_name();
        if tag.is_empty() {
            write!(f, "{}", self.key())
        } else {
            write!(f, "{} [{}]", tag, self.key())
        }
    }
}

// ===== Value filters =====

/// Averages the raw values of a sample window.
///
/// The default filter for signals without an explicit one. Empty windows
/// yield NaN.
pub fn average_value_filter(samples: &[Measurement]) -> f64 {
    if samples.is_empty() {
        return f64::NAN;
    }
    samples.iter().map(|m| m.value).sum::<f64>() / samples.len() as f64
}

/// Picks the most frequently occurring raw value in a sample window.
///
/// Intended for digital signals, where averaging would manufacture states
/// that never occurred. Values bucket by bit pattern (so NaNs group
/// together) and ties resolve to the value seen first. Empty windows yield
/// NaN.
pub fn majority_value_filter(samples: &[Measurement]) -> f64 {
    let mut buckets: Vec<(u64, usize, f64)> = Vec::new();
    for sample in samples {
        let bits = sample.value.to_bits();
        match buckets.iter_mut().find(|(b, _, _)| *b == bits) {
            Some(bucket) => bucket.1 += 1,
            None => buckets.push((bits, 1, sample.value)),
        }
    }

    let mut majority = f64::NAN;
    let mut majority_count = 0;
    for (_, count, value) in buckets {
        if count > majority_count {
            majority_count = count;
            majority = value;
        }
    }
    majority
}

// ===== Buffer blocks =====

/// A measurement that transports an opaque byte payload.
///
/// Buffer blocks ride the concentration pipeline like ordinary samples so
/// they stay ordered relative to the measurements around them, but they
/// carry no numeric value: the value is pinned to NaN and consumers read
/// the payload instead. The payload is copied out of the source buffer at
/// construction, so later reuse of that buffer cannot corrupt the block.
#[derive(Debug, Clone)]
pub struct BufferBlockMeasurement {
    measurement: Measurement,
    payload: Bytes,
}

impl BufferBlockMeasurement {
    /// Copies `length` bytes starting at `start` out of `buffer`.
    ///
    /// The range must lie entirely inside `buffer`; an out-of-range request
    /// is an error, never clamped. An empty range is allowed.
    pub fn new(buffer: &[u8], start: usize, length: usize) -> Result<Self> {
        let end = start
            .checked_add(length)
            .filter(|&end| end <= buffer.len())
            .ok_or(GridFrameError::BufferOutOfRange {
                start,
                length,
                buffer_length: buffer.len(),
            })?;
        Ok(BufferBlockMeasurement {
            measurement: Measurement::default(),
            payload: Bytes::copy_from_slice(&buffer[start..end]),
        })
    }

    /// Copies an entire buffer as the payload.
    pub fn from_payload(buffer: &[u8]) -> Self {
        BufferBlockMeasurement {
            measurement: Measurement::default(),
            payload: Bytes::copy_from_slice(buffer),
        }
    }

    /// The transported bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// The measurement view of this block; its value is always NaN.
    pub fn measurement(&self) -> &Measurement {
        &self.measurement
    }

    /// Re-keys the block by swapping its metadata.
    pub fn set_metadata(&mut self, metadata: Arc<MeasurementMetadata>) {
        self.measurement.metadata = metadata;
    }

    /// Stamps the block with a source timestamp.
    pub fn set_timestamp(&mut self, timestamp: Ticks) {
        self.measurement.timestamp = timestamp;
    }

    /// Replaces the block's state flags.
    pub fn set_state_flags(&mut self, state_flags: MeasurementStateFlags) {
        self.measurement.state_flags = state_flags;
    }
}
