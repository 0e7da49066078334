//! Frame-level downsampling of multi-rate telemetry.
//!
//! When sources report faster than the concentrator publishes, several
//! samples of one signal land in the same frame slot and one must be
//! chosen to represent it. A [`TrackingFrame`] wraps one [`Frame`] for the
//! duration of its fill window and makes that per-sample decision through
//! [`TrackingFrame::derive_measurement_value`], according to the frame's
//! [`DownsamplingMethod`]:
//!
//! - `LastReceived`: every sample is representative; arrival order decides.
//! - `Closest`: keep the sample whose timestamp is nearest the frame's,
//!   without ever trading a kept sample for a later-stamped one.
//! - `Filtered`: fold all samples of a signal through its value filter
//!   (average by default), re-deriving the folded value as samples arrive.
//! - `BestQuality`: like `Closest`, but a good-quality sample always
//!   replaces a bad-quality one first.
//!
//! Decisions for one signal are linearizable (a per-signal lock is held
//! across the whole decide-and-update), while distinct signals proceed in
//! parallel on separate shards. The accepted-sample count is a plain
//! statistic kept exact by an atomic; it orders with nothing else.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use gridframe::downsampling::{DownsamplingMethod, TrackingFrame};
//! use gridframe::frame::Frame;
//! use gridframe::key::MeasurementKey;
//! use gridframe::measurement::Measurement;
//! use gridframe::metadata::MeasurementMetadata;
//! use gridframe::ticks::Ticks;
//!
//! let frame = Arc::new(Frame::new(Ticks::new(100)));
//! let tracker = TrackingFrame::new(Arc::clone(&frame), DownsamplingMethod::Closest);
//! let meta = MeasurementMetadata::new(MeasurementKey::generate("PMU-7", 12), "BUS1.FREQ");
//!
//! // 105 starts the slot, 103 is closer to 100, 104 is not.
//! assert!(tracker.derive_measurement_value(&Measurement::new(meta.clone(), 1.0, Ticks::new(105))).is_some());
//! assert!(tracker.derive_measurement_value(&Measurement::new(meta.clone(), 2.0, Ticks::new(103))).is_some());
//! assert!(tracker.derive_measurement_value(&Measurement::new(meta, 3.0, Ticks::new(104))).is_none());
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::GridFrameError;
use crate::frame::Frame;
use crate::key::MeasurementKey;
use crate::measurement::{average_value_filter, Measurement};
use crate::spinlock::ReaderWriterSpinLock;
use crate::ticks::Ticks;

/// How a frame chooses one representative sample per signal.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownsamplingMethod {
    /// Keep whichever sample arrived last.
    #[default]
    LastReceived,
    /// Keep the sample time-stamped closest to the frame, never trading
    /// for a later-stamped one.
    Closest,
    /// Fold all samples through the signal's value filter.
    Filtered,
    /// Prefer good quality over proximity, then fall back to `Closest`.
    BestQuality,
}

impl fmt::Display for DownsamplingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DownsamplingMethod::LastReceived => "last_received",
            DownsamplingMethod::Closest => "closest",
            DownsamplingMethod::Filtered => "filtered",
            DownsamplingMethod::BestQuality => "best_quality",
        };
        f.write_str(name)
    }
}

impl FromStr for DownsamplingMethod {
    type Err = GridFrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last_received" | "lastreceived" => Ok(DownsamplingMethod::LastReceived),
            "closest" => Ok(DownsamplingMethod::Closest),
            "filtered" => Ok(DownsamplingMethod::Filtered),
            "best_quality" | "bestquality" => Ok(DownsamplingMethod::BestQuality),
            other => Err(GridFrameError::Validation(format!(
                "unknown downsampling method: {other}"
            ))),
        }
    }
}

// Per-signal tracking state. Closest and BestQuality keep one candidate
// per signal; Filtered accumulates the whole window. The slot Arc is
// cloned out of the map entry before locking, so the shard lock is never
// held across a decision.
type CandidateSlots = DashMap<MeasurementKey, Arc<Mutex<Option<Measurement>>>>;
type FilterWindows = DashMap<MeasurementKey, Arc<Mutex<Vec<Measurement>>>>;

#[derive(Debug)]
enum SampleTracker {
    LastReceived,
    Closest(CandidateSlots),
    Filtered(FilterWindows),
    BestQuality(CandidateSlots),
}

/// Downsampling state bound to one frame for its fill window.
#[derive(Debug)]
pub struct TrackingFrame {
    source_frame: Arc<Frame>,
    timestamp: Ticks,
    method: DownsamplingMethod,
    tracker: SampleTracker,
    derived_measurements: AtomicI64,
    lock: ReaderWriterSpinLock,
}

impl TrackingFrame {
    /// Binds downsampling state to a frame. The method is fixed for the
    /// tracker's lifetime.
    pub fn new(source_frame: Arc<Frame>, method: DownsamplingMethod) -> Self {
        let timestamp = source_frame.timestamp();
        let tracker = match method {
            DownsamplingMethod::LastReceived => SampleTracker::LastReceived,
            DownsamplingMethod::Closest => SampleTracker::Closest(DashMap::new()),
            DownsamplingMethod::Filtered => SampleTracker::Filtered(DashMap::new()),
            DownsamplingMethod::BestQuality => SampleTracker::BestQuality(DashMap::new()),
        };
        TrackingFrame {
            source_frame,
            timestamp,
            method,
            tracker,
            derived_measurements: AtomicI64::new(0),
            lock: ReaderWriterSpinLock::new(),
        }
    }

    /// The frame this tracker feeds.
    pub fn source_frame(&self) -> &Arc<Frame> {
        &self.source_frame
    }

    /// The frame's destination timestamp.
    pub fn timestamp(&self) -> Ticks {
        self.timestamp
    }

    /// The downsampling method in effect.
    pub fn method(&self) -> DownsamplingMethod {
        self.method
    }

    /// The coordination lock for this frame's window.
    ///
    /// Sorting threads take the shared side around examine-and-assign;
    /// the publishing scheduler takes the exclusive side to flip the frame
    /// published. Purely cooperative: derivation itself stays correct
    /// without it.
    pub fn lock(&self) -> &ReaderWriterSpinLock {
        &self.lock
    }

    /// Total samples accepted by this tracker so far.
    pub fn derived_measurements(&self) -> i64 {
        self.derived_measurements.load(Ordering::Relaxed)
    }

    /// Samples folded away by downsampling: accepted minus sorted.
    pub fn downsampled_measurements(&self) -> i64 {
        self.derived_measurements() - self.source_frame.sorted_measurements()
    }

    /// Decides whether `measurement` (or a value derived from it) should
    /// represent its signal in the frame.
    ///
    /// `Some` carries the measurement to assign; `None` means the frame
    /// keeps what it has. Callers may invoke this from any number of
    /// threads; same-signal calls serialize, distinct signals do not.
    pub fn derive_measurement_value(&self, measurement: &Measurement) -> Option<Measurement> {
        match &self.tracker {
            SampleTracker::LastReceived => {
                self.derived_measurements.fetch_add(1, Ordering::Relaxed);
                Some(measurement.clone())
            }
            SampleTracker::Closest(slots) => self.derive_candidate(slots, measurement, false),
            SampleTracker::Filtered(windows) => self.derive_filtered(windows, measurement),
            SampleTracker::BestQuality(slots) => self.derive_candidate(slots, measurement, true),
        }
    }

    /// Candidate keeping for `Closest` and `BestQuality`.
    ///
    /// A kept sample is only ever traded for one that is closer to the
    /// frame timestamp without preceding it. With `consider_quality`, a
    /// sample with any good quality additionally replaces a kept sample
    /// with any bad quality, regardless of proximity.
    fn derive_candidate(
        &self,
        slots: &CandidateSlots,
        measurement: &Measurement,
        consider_quality: bool,
    ) -> Option<Measurement> {
        let slot = Arc::clone(
            slots
                .entry(measurement.key().clone())
                .or_default()
                .value(),
        );
        let mut current = slot.lock();

        let accept = match current.as_ref() {
            None => true,
            Some(kept) => {
                let closer = measurement.timestamp < kept.timestamp
                    && measurement.timestamp >= self.timestamp;
                let improves_quality = consider_quality
                    && (!kept.value_quality_is_good() || !kept.timestamp_quality_is_good())
                    && (measurement.value_quality_is_good()
                        || measurement.timestamp_quality_is_good());
                closer || improves_quality
            }
        };

        if accept {
            *current = Some(measurement.clone());
            self.derived_measurements.fetch_add(1, Ordering::Relaxed);
            Some(measurement.clone())
        } else {
            trace!(
                key = %measurement.key(),
                timestamp = %measurement.timestamp,
                method = %self.method,
                "sample dropped by downsampling"
            );
            None
        }
    }

    /// Window folding for `Filtered`.
    ///
    /// Every sample joins the signal's window; from the second sample on,
    /// the window is folded through the signal's value filter and returned
    /// on a clone of the FIRST sample, so the representative keeps the
    /// earliest timestamp and flags while its value tracks the whole
    /// window. A lone sample has nothing to fold yet and derives nothing.
    fn derive_filtered(
        &self,
        windows: &FilterWindows,
        measurement: &Measurement,
    ) -> Option<Measurement> {
        let window = Arc::clone(
            windows
                .entry(measurement.key().clone())
                .or_default()
                .value(),
        );
        let mut samples = window.lock();

        samples.push(measurement.clone());
        if samples.len() == 1 {
            return None;
        }

        let first = &samples[0];
        let filtered = match first.metadata.value_filter() {
            Some(filter) => filter(samples.as_slice()),
            None => average_value_filter(samples.as_slice()),
        };
        let derived = first.clone_with(filtered, first.timestamp);
        self.derived_measurements.fetch_add(1, Ordering::Relaxed);
        Some(derived)
    }
}
