//! Time-aligned frames of measurements.
//!
//! A [`Frame`] collects, for one destination timestamp, the most recent
//! representative sample of every signal that reported in time. Sorting
//! threads assign measurements into the frame concurrently; once the
//! scheduler publishes it, the frame is handed off read-only and no
//! further assignment is expected.
//!
//! The keyed map is sharded ([`DashMap`]), so assignments to distinct
//! signals proceed in parallel without a frame-wide lock, and racing
//! assignments to the same signal serialize to a well-defined last-write
//! order. Frozen-after-publish is a scheduler contract, checked only by a
//! debug assertion; the frame does not police its callers.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::key::MeasurementKey;
use crate::measurement::Measurement;
use crate::ticks::Ticks;

/// One frame slot: a concurrent map of signal key to representative sample.
#[derive(Debug)]
pub struct Frame {
    timestamp: Ticks,
    measurements: DashMap<MeasurementKey, Measurement>,
    published: AtomicBool,
    // -1 means "use the map length"; set explicitly by the scheduler when
    // downsampling makes the sorted count differ from the kept count.
    sorted_measurements: AtomicI64,
    received_timestamp: Ticks,
    // 0 means "not yet published".
    published_timestamp: AtomicI64,
    last_sorted_measurement: Mutex<Option<Measurement>>,
}

impl Frame {
    /// Creates an empty frame for the given destination timestamp.
    pub fn new(timestamp: Ticks) -> Self {
        Frame {
            timestamp,
            measurements: DashMap::new(),
            published: AtomicBool::new(false),
            sorted_measurements: AtomicI64::new(-1),
            received_timestamp: Ticks::now(),
            published_timestamp: AtomicI64::new(0),
            last_sorted_measurement: Mutex::new(None),
        }
    }

    /// Creates an empty frame pre-sized for an expected signal count.
    pub fn with_expected_measurements(timestamp: Ticks, expected: usize) -> Self {
        Frame {
            timestamp,
            measurements: DashMap::with_capacity(expected),
            published: AtomicBool::new(false),
            sorted_measurements: AtomicI64::new(-1),
            received_timestamp: Ticks::now(),
            published_timestamp: AtomicI64::new(0),
            last_sorted_measurement: Mutex::new(None),
        }
    }

    /// The destination timestamp all contained samples align to.
    pub fn timestamp(&self) -> Ticks {
        self.timestamp
    }

    /// Wall-clock time this frame was created.
    pub fn received_timestamp(&self) -> Ticks {
        self.received_timestamp
    }

    /// Wall-clock time of first publication, `None` before it.
    pub fn published_timestamp(&self) -> Option<Ticks> {
        match self.published_timestamp.load(Ordering::Acquire) {
            0 => None,
            ticks => Some(Ticks::new(ticks)),
        }
    }

    /// Inserts or replaces the sample for the measurement's signal.
    ///
    /// Last write wins under same-key races. Safe to call from any number
    /// of threads without external locking.
    pub fn assign(&self, measurement: Measurement) {
        debug_assert!(
            !self.published(),
            "measurement assigned to a published frame"
        );
        self.measurements
            .insert(measurement.key().clone(), measurement);
    }

    /// The current sample for a signal, if one has been assigned.
    pub fn get(&self, key: &MeasurementKey) -> Option<Measurement> {
        self.measurements.get(key).map(|entry| entry.value().clone())
    }

    /// Whether a sample for this signal has been assigned.
    pub fn contains_key(&self, key: &MeasurementKey) -> bool {
        self.measurements.contains_key(key)
    }

    /// Number of distinct signals currently in the frame.
    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    /// Whether no signal has been assigned yet.
    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    /// Copies the frame contents out for read-only hand-off.
    pub fn snapshot(&self) -> Vec<Measurement> {
        self.measurements
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Whether this frame has been published.
    pub fn published(&self) -> bool {
        self.published.load(Ordering::Acquire)
    }

    /// Flips the published flag.
    ///
    /// The first transition to `true` stamps [`Frame::published_timestamp`];
    /// later transitions leave the stamp untouched.
    pub fn set_published(&self, published: bool) {
        self.published.store(published, Ordering::Release);
        if published {
            let now = Ticks::now().value();
            let _ = self.published_timestamp.compare_exchange(
                0,
                now,
                Ordering::AcqRel,
                Ordering::Relaxed,
            );
        }
    }

    /// Number of source measurements sorted into this frame.
    ///
    /// Until the scheduler sets an explicit count, this resolves to the
    /// number of signals in the map, which is correct whenever no signal
    /// received more than one source sample.
    pub fn sorted_measurements(&self) -> i64 {
        match self.sorted_measurements.load(Ordering::Acquire) {
            -1 => self.measurements.len() as i64,
            count => count,
        }
    }

    /// Sets the sorted-measurement count; -1 restores map-length tracking.
    pub fn set_sorted_measurements(&self, count: i64) {
        self.sorted_measurements.store(count, Ordering::Release);
    }

    /// The most recent measurement sorted into this frame, if any.
    pub fn last_sorted_measurement(&self) -> Option<Measurement> {
        self.last_sorted_measurement.lock().clone()
    }

    /// Records the most recent measurement sorted into this frame.
    pub fn set_last_sorted_measurement(&self, measurement: Measurement) {
        *self.last_sorted_measurement.lock() = Some(measurement);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MeasurementMetadata;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn keyed_sample(key: &MeasurementKey, value: f64) -> Measurement {
        Measurement::new(
            MeasurementMetadata::new(key.clone(), "TEST"),
            value,
            Ticks::new(100),
        )
    }

    #[test]
    fn new_frame_is_empty_and_unpublished() {
        let frame = Frame::new(Ticks::new(100));
        assert_eq!(frame.timestamp(), Ticks::new(100));
        assert!(frame.is_empty());
        assert_eq!(frame.len(), 0);
        assert!(!frame.published());
        assert!(frame.published_timestamp().is_none());
        assert!(frame.last_sorted_measurement().is_none());
        assert!(frame.received_timestamp() <= Ticks::now());
    }

    #[test]
    fn assign_replaces_by_signal() {
        let frame = Frame::new(Ticks::new(100));
        let key = MeasurementKey::generate("PMU-7", 12);

        frame.assign(keyed_sample(&key, 1.0));
        frame.assign(keyed_sample(&key, 2.0));
        frame.assign(keyed_sample(&MeasurementKey::generate("PMU-8", 1), 3.0));

        assert_eq!(frame.len(), 2);
        assert_eq!(frame.get(&key).map(|m| m.value), Some(2.0));
        assert!(frame.contains_key(&key));
    }

    #[test]
    fn sorted_count_falls_back_to_map_length() {
        let frame = Frame::new(Ticks::new(100));
        assert_eq!(frame.sorted_measurements(), 0);

        frame.assign(keyed_sample(&MeasurementKey::generate("PMU-7", 1), 1.0));
        frame.assign(keyed_sample(&MeasurementKey::generate("PMU-7", 2), 2.0));
        assert_eq!(frame.sorted_measurements(), 2);

        frame.set_sorted_measurements(7);
        assert_eq!(frame.sorted_measurements(), 7);

        frame.set_sorted_measurements(-1);
        assert_eq!(frame.sorted_measurements(), 2);
    }

    #[test]
    fn first_publication_stamps_the_timestamp_once() {
        let frame = Frame::new(Ticks::new(100));
        frame.set_published(true);
        let first = frame.published_timestamp().unwrap();
        assert!(frame.published());

        thread::sleep(Duration::from_millis(2));
        frame.set_published(false);
        frame.set_published(true);
        assert_eq!(frame.published_timestamp(), Some(first));
    }

    #[test]
    fn snapshot_copies_every_assigned_sample() {
        let frame = Frame::new(Ticks::new(100));
        for id in 0..5 {
            frame.assign(keyed_sample(&MeasurementKey::generate("PMU-7", id), id as f64));
        }
        let mut values: Vec<f64> = frame.snapshot().iter().map(|m| m.value).collect();
        values.sort_by(f64::total_cmp);
        assert_eq!(values, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn distinct_keys_assign_in_parallel() {
        let frame = Arc::new(Frame::new(Ticks::new(100)));
        let threads: u64 = 8;

        let handles: Vec<_> = (0..threads)
            .map(|id| {
                let frame = Arc::clone(&frame);
                thread::spawn(move || {
                    let key = MeasurementKey::generate("PMU-7", id);
                    for round in 0..100 {
                        frame.assign(keyed_sample(&key, round as f64));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(frame.len(), threads as usize);
        for sample in frame.snapshot() {
            assert_eq!(sample.value, 99.0);
        }
    }

    #[test]
    fn same_key_races_resolve_to_one_entry() {
        let frame = Arc::new(Frame::new(Ticks::new(100)));
        let key = MeasurementKey::generate("PMU-7", 12);

        let handles: Vec<_> = (0..4)
            .map(|writer| {
                let frame = Arc::clone(&frame);
                let key = key.clone();
                thread::spawn(move || {
                    for _ in 0..250 {
                        frame.assign(keyed_sample(&key, writer as f64));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(frame.len(), 1);
        let final_value = frame.get(&key).map(|m| m.value).unwrap();
        assert!((0.0..4.0).contains(&final_value));
    }

    #[test]
    fn last_sorted_measurement_round_trips() {
        let frame = Frame::new(Ticks::new(100));
        let key = MeasurementKey::generate("PMU-7", 12);
        frame.set_last_sorted_measurement(keyed_sample(&key, 8.25));
        assert_eq!(frame.last_sorted_measurement().map(|m| m.value), Some(8.25));
    }
}
