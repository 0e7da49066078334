//! Frame concurrency integration tests
//!
//! Exercises the concurrent surfaces together: many producers deriving
//! and assigning into one frame, the coordination lock fencing
//! publication against in-flight sorting, and the latest-value cache
//! converging under contention.
//!
//! # Test Coverage
//!
//! - Parallel producers on distinct signals fill a frame completely
//! - Contended single-signal closest only ever moves toward the frame
//! - Publication waits for in-flight sorting to drain
//! - Filtered windows fold independently across producer threads
//! - Latest cache converges to the newest sample regardless of schedule

use gridframe::downsampling::{DownsamplingMethod, TrackingFrame};
use gridframe::frame::Frame;
use gridframe::key::MeasurementKey;
use gridframe::latest::LatestMeasurements;
use gridframe::measurement::Measurement;
use gridframe::metadata::MeasurementMetadata;
use gridframe::temporal::TimeConstraints;
use gridframe::ticks::Ticks;
use rand::seq::SliceRandom;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// =============================================================================
// Test Helper Functions
// =============================================================================

fn signal_metadata(id: u64) -> Arc<MeasurementMetadata> {
    MeasurementMetadata::new(MeasurementKey::generate("PMU-7", id), format!("BUS{id}.FREQ"))
}

fn sample(metadata: &Arc<MeasurementMetadata>, value: f64, timestamp: i64) -> Measurement {
    Measurement::new(Arc::clone(metadata), value, Ticks::new(timestamp))
}

/// Derive-and-assign, holding the shared side of the coordination lock
/// the way a sorting thread does.
fn sort_one(frame: &Arc<Frame>, tracker: &TrackingFrame, measurement: &Measurement) {
    let _sorting = tracker.lock().read();
    if let Some(derived) = tracker.derive_measurement_value(measurement) {
        frame.assign(derived);
    }
}

// =============================================================================
// Parallel Producers
// =============================================================================

#[test]
fn test_parallel_producers_fill_distinct_signals() {
    let frame = Arc::new(Frame::new(Ticks::new(1_000)));
    let tracker = Arc::new(TrackingFrame::new(
        Arc::clone(&frame),
        DownsamplingMethod::LastReceived,
    ));
    let threads: u64 = 8;
    let signals_per_thread: u64 = 16;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let frame = Arc::clone(&frame);
            let tracker = Arc::clone(&tracker);
            thread::spawn(move || {
                for i in 0..signals_per_thread {
                    let metadata = signal_metadata(t * signals_per_thread + i);
                    sort_one(&frame, &tracker, &sample(&metadata, 1.0, 1_010));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let expected = (threads * signals_per_thread) as i64;
    assert_eq!(frame.len() as i64, expected);
    assert_eq!(tracker.derived_measurements(), expected);
    assert_eq!(tracker.downsampled_measurements(), 0);
}

#[test]
fn test_contended_closest_only_moves_toward_the_frame() {
    let frame = Arc::new(Frame::new(Ticks::new(100)));
    let tracker = Arc::new(TrackingFrame::new(
        Arc::clone(&frame),
        DownsamplingMethod::Closest,
    ));
    let metadata = signal_metadata(1);

    let mut timestamps: Vec<i64> = (101..=180).collect();
    timestamps.shuffle(&mut rand::thread_rng());

    let handles: Vec<_> = timestamps
        .chunks(10)
        .map(|chunk| {
            let frame = Arc::clone(&frame);
            let tracker = Arc::clone(&tracker);
            let metadata = Arc::clone(&metadata);
            let chunk = chunk.to_vec();
            thread::spawn(move || {
                for ts in chunk {
                    sort_one(&frame, &tracker, &sample(&metadata, ts as f64, ts));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // The kept candidate ratchets toward the frame timestamp under any
    // interleaving, so a frame-coincident sample must still win.
    let accepted = tracker.derived_measurements();
    assert!((1..=80).contains(&accepted));
    assert_eq!(tracker.downsampled_measurements(), accepted - 1);

    sort_one(&frame, &tracker, &sample(&metadata, 0.0, 100));
    let kept = frame.get(metadata.key()).unwrap();
    assert_eq!(kept.timestamp, Ticks::new(100));
}

#[test]
fn test_filtered_windows_fold_independently_across_threads() {
    let frame = Arc::new(Frame::new(Ticks::new(1_000)));
    let tracker = Arc::new(TrackingFrame::new(
        Arc::clone(&frame),
        DownsamplingMethod::Filtered,
    ));
    let threads: u64 = 8;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let frame = Arc::clone(&frame);
            let tracker = Arc::clone(&tracker);
            thread::spawn(move || {
                // One producer per signal keeps each window's order fixed.
                let metadata = signal_metadata(t);
                for (value, ts) in [(10.0, 1_001), (20.0, 1_002), (30.0, 1_003)] {
                    sort_one(&frame, &tracker, &sample(&metadata, value, ts));
                }
                metadata
            })
        })
        .collect();

    for handle in handles {
        let metadata = handle.join().unwrap();
        let folded = frame.get(metadata.key()).unwrap();
        assert_eq!(folded.value, 20.0);
        assert_eq!(folded.timestamp, Ticks::new(1_001));
    }

    assert_eq!(frame.len() as u64, threads);
    assert_eq!(tracker.derived_measurements(), threads as i64 * 2);
    assert_eq!(tracker.downsampled_measurements(), threads as i64);
}

// =============================================================================
// Publication Fencing
// =============================================================================

#[test]
fn test_publication_waits_for_sorting_to_drain() {
    let frame = Arc::new(Frame::new(Ticks::new(1_000)));
    let tracker = Arc::new(TrackingFrame::new(
        Arc::clone(&frame),
        DownsamplingMethod::LastReceived,
    ));

    let (held_tx, held_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let (published_tx, published_rx) = mpsc::channel();

    let sorter = {
        let tracker = Arc::clone(&tracker);
        thread::spawn(move || {
            let _sorting = tracker.lock().read();
            held_tx.send(()).unwrap();
            release_rx.recv().unwrap();
        })
    };

    held_rx.recv().unwrap();

    let publisher = {
        let frame = Arc::clone(&frame);
        let tracker = Arc::clone(&tracker);
        thread::spawn(move || {
            let _publishing = tracker.lock().write();
            frame.set_published(true);
            published_tx.send(()).unwrap();
        })
    };

    // While the sorter holds the shared side, publication cannot complete.
    assert!(published_rx.recv_timeout(Duration::from_millis(50)).is_err());
    assert!(!frame.published());

    release_tx.send(()).unwrap();
    sorter.join().unwrap();
    published_rx
        .recv_timeout(Duration::from_secs(1))
        .expect("publication should proceed once sorting drains");
    publisher.join().unwrap();
    assert!(frame.published());
}

// =============================================================================
// Latest Cache Under Contention
// =============================================================================

#[test]
fn test_latest_cache_converges_to_the_newest_sample() {
    let latest = Arc::new(LatestMeasurements::new(
        TimeConstraints::new(5.0, 2.0).unwrap(),
    ));
    let metadata = signal_metadata(1);
    let base = 1_000 * Ticks::PER_SECOND;
    let threads: i64 = 4;
    let rounds: i64 = 50;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let latest = Arc::clone(&latest);
            let metadata = Arc::clone(&metadata);
            thread::spawn(move || {
                for i in 0..rounds {
                    let offset = i * threads + t;
                    latest.update(&sample(&metadata, offset as f64, base + offset));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // Strictly-newer updates win under any schedule, so the record is the
    // sample with the globally newest timestamp.
    let newest = threads * rounds - 1;
    let now = Ticks::new(base + newest);
    assert_eq!(latest.value(metadata.key(), now), newest as f64);
    assert_eq!(latest.len(), 1);
}
