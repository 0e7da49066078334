//! Frame simulation harness for the gridframe core.
//!
//! Drives the library the way a live concentrator would, without any real
//! devices: producer threads generate jittered, out-of-order samples for a
//! set of simulated signals, each frame slot collapses them through the
//! configured downsampling method, and a publish step closes every slot
//! under the frame's coordination lock. Useful for eyeballing downsampling
//! behavior at different rates and for quick soak runs under contention.
//!
//! # Usage
//!
//! Fill 30 frames with 8 producers using the filtered method:
//! ```bash
//! framesim --frames 30 --producers 8 --method filtered
//! ```
//!
//! Run against a settings file and emit a JSON summary:
//! ```bash
//! framesim --config gridframe.toml --json
//! ```

use anyhow::{anyhow, bail, Result};
use clap::Parser;
use rand::Rng;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::info;

use gridframe::downsampling::{DownsamplingMethod, TrackingFrame};
use gridframe::flags::MeasurementStateFlags;
use gridframe::frame::Frame;
use gridframe::key::MeasurementKey;
use gridframe::latest::LatestMeasurements;
use gridframe::logging;
use gridframe::measurement::Measurement;
use gridframe::metadata::MeasurementMetadata;
use gridframe::settings::ConcentrationSettings;
use gridframe::ticks::Ticks;

#[derive(Parser)]
#[command(name = "framesim")]
#[command(about = "Simulated concentrator load against the gridframe core", long_about = None)]
struct Cli {
    /// Optional settings file (gridframe.toml format)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of frame slots to fill and publish
    #[arg(long, default_value = "10")]
    frames: usize,

    /// Concurrent producer threads
    #[arg(long, default_value = "4")]
    producers: usize,

    /// Distinct simulated signals
    #[arg(long, default_value = "8")]
    signals: usize,

    /// Samples generated per signal per frame
    #[arg(long, default_value = "3")]
    samples_per_signal: usize,

    /// Downsampling method override (last_received, closest, filtered, best_quality)
    #[arg(long)]
    method: Option<DownsamplingMethod>,

    /// Emit the run summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct RunSummary {
    frames: usize,
    method: String,
    samples_generated: u64,
    samples_derived: i64,
    samples_downsampled: i64,
    elapsed_ms: u128,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.frames == 0 || cli.producers == 0 || cli.signals == 0 || cli.samples_per_signal == 0 {
        bail!("frames, producers, signals and samples-per-signal must all be at least 1");
    }

    let mut settings = match &cli.config {
        Some(path) => ConcentrationSettings::load_from(path)?,
        None => ConcentrationSettings::load()?,
    };
    if let Some(method) = cli.method {
        settings.downsampling_method = method;
    }
    settings.validate()?;
    logging::init_from_settings(&settings)?;

    let metadata = simulated_signals(&settings, cli.signals)?;
    let interval = settings.frame_interval_ticks()?;
    let start = Ticks::now();
    let latest = settings
        .track_latest_measurements
        .then(|| -> gridframe::error::Result<_> {
            Ok(LatestMeasurements::new(settings.time_constraints()?))
        })
        .transpose()?;

    info!(
        rate = settings.frames_per_second,
        method = %settings.downsampling_method,
        signals = metadata.len(),
        producers = cli.producers,
        "framesim starting"
    );

    let began = Instant::now();
    let mut generated_total = 0u64;
    let mut derived_total = 0i64;
    let mut downsampled_total = 0i64;

    for slot in 0..cli.frames {
        let timestamp = start + slot as i64 * interval;
        let frame = match settings.expected_measurements {
            Some(expected) => Arc::new(Frame::with_expected_measurements(timestamp, expected)),
            None => Arc::new(Frame::new(timestamp)),
        };
        let tracker = TrackingFrame::new(Arc::clone(&frame), settings.downsampling_method);

        let generated = thread::scope(|s| -> Result<u64> {
            let handles: Vec<_> = (0..cli.producers)
                .map(|producer| {
                    let tracker = &tracker;
                    let frame = &frame;
                    let metadata = &metadata;
                    let latest = latest.as_ref();
                    s.spawn(move || {
                        let mut rng = rand::thread_rng();
                        let mut produced = 0u64;
                        for _ in 0..cli.samples_per_signal {
                            for meta in metadata.iter().skip(producer).step_by(cli.producers) {
                                let sample = synthesize(&mut rng, meta, frame.timestamp(), interval);

                                let derived = {
                                    let _sorting = tracker.lock().read();
                                    let derived = tracker.derive_measurement_value(&sample);
                                    if let Some(derived) = &derived {
                                        frame.assign(derived.clone());
                                    }
                                    derived
                                };
                                // Cache takes accepted samples only, outside the sorting window.
                                if let Some(derived) = derived {
                                    if let Some(latest) = latest {
                                        latest.update(&derived);
                                    }
                                }
                                produced += 1;
                            }
                        }
                        produced
                    })
                })
                .collect();

            let mut total = 0;
            for handle in handles {
                total += handle
                    .join()
                    .map_err(|_| anyhow!("sample producer panicked"))?;
            }
            Ok(total)
        })?;

        // Window closed: fence out the sorters and stamp the frame.
        {
            let _publishing = tracker.lock().write();
            frame.set_published(true);
        }

        info!(
            frame = %frame.timestamp(),
            sorted = frame.sorted_measurements(),
            derived = tracker.derived_measurements(),
            downsampled = tracker.downsampled_measurements(),
            "frame published"
        );

        generated_total += generated;
        derived_total += tracker.derived_measurements();
        downsampled_total += tracker.downsampled_measurements();
    }

    let summary = RunSummary {
        frames: cli.frames,
        method: settings.downsampling_method.to_string(),
        samples_generated: generated_total,
        samples_derived: derived_total,
        samples_downsampled: downsampled_total,
        elapsed_ms: began.elapsed().as_millis(),
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "📊 {} frames published using {}",
            summary.frames, summary.method
        );
        println!("   samples generated:   {}", summary.samples_generated);
        println!("   samples derived:     {}", summary.samples_derived);
        println!("   samples downsampled: {}", summary.samples_downsampled);
        println!("   elapsed:             {} ms", summary.elapsed_ms);
        if let Some(latest) = &latest {
            let now = start + cli.frames as i64 * interval;
            println!(
                "   latest cache:        {} signals, average {:.3}",
                latest.len(),
                latest.average(now)
            );
        }
    }

    Ok(())
}

/// Known signals from settings, padded with generated ones up to `count`.
fn simulated_signals(
    settings: &ConcentrationSettings,
    count: usize,
) -> Result<Vec<Arc<MeasurementMetadata>>> {
    let mut metadata = settings
        .signals
        .iter()
        .map(|signal| signal.metadata_for())
        .collect::<gridframe::error::Result<Vec<_>>>()?;
    while metadata.len() < count {
        let index = metadata.len() as u64;
        metadata.push(MeasurementMetadata::new(
            MeasurementKey::generate("SIM", index),
            format!("SIM.SIGNAL{index:03}"),
        ));
    }
    Ok(metadata)
}

/// One jittered sample: timestamp scattered across the frame interval,
/// value wobbling around nominal frequency, occasional bad-data flag.
fn synthesize(
    rng: &mut impl Rng,
    metadata: &Arc<MeasurementMetadata>,
    frame_timestamp: Ticks,
    interval: i64,
) -> Measurement {
    let jitter = rng.gen_range(0..interval);
    let value = 59.95 + rng.gen_range(-0.05..0.05);
    let flags = if rng.gen_bool(0.05) {
        MeasurementStateFlags::BAD_DATA
    } else {
        MeasurementStateFlags::NORMAL
    };
    Measurement::with_flags(
        Arc::clone(metadata),
        value,
        frame_timestamp + jitter,
        flags,
    )
}
