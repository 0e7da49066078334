//! # GridFrame Core Library
//!
//! This crate is the data model and downsampling core of a real-time
//! telemetry concentrator. Streaming devices report measurements at their
//! own rates with their own clocks; a concentrator lines those samples up
//! into fixed-rate frames, choosing one representative value per signal
//! per frame, and publishes each frame once its waiting window closes.
//! This library supplies the measurement types, the frame container and
//! the per-sample downsampling decisions; transport, scheduling and
//! persistence belong to the surrounding application.
//!
//! ## Crate Structure
//!
//! The library is organized into several modules, each with a distinct
//! responsibility:
//!
//! - **`ticks`**: The 100-nanosecond time base all timestamps share, with
//!   lag/lead reasonability checks against a reference clock.
//! - **`key`**: `MeasurementKey`, the identity of a signal: a UUID for
//!   equality and ordering plus a human-oriented source/index pair.
//! - **`flags`**: `MeasurementStateFlags`, the quality and processing
//!   state bits carried by every sample.
//! - **`metadata`**: Immutable per-signal metadata (tag, calibration,
//!   value filter) shared across samples behind an `Arc`.
//! - **`measurement`**: The `Measurement` sample type, stock value
//!   filters, and buffer-backed measurements for raw device payloads.
//! - **`temporal`**: `TemporalMeasurement`, a sample paired with a
//!   freshness window that reads as NaN once out of tolerance.
//! - **`frame`**: `Frame`, one concurrent time-aligned slot of the
//!   concentrator output, with publication bookkeeping.
//! - **`downsampling`**: `TrackingFrame` and the per-sample decision
//!   logic for the four downsampling methods.
//! - **`latest`**: `LatestMeasurements`, an optional cache of the
//!   freshest calibrated value per signal.
//! - **`spinlock`**: The reader/writer spin lock coordinating frame
//!   sorting against publication.
//! - **`settings`**: Figment-based configuration loading. See
//!   `settings::ConcentrationSettings`.
//! - **`error`**: The crate-wide `GridFrameError` enum and `Result`
//!   alias.
//! - **`logging`**: Tracing subscriber setup for concentrator processes.

pub mod downsampling;
pub mod error;
pub mod flags;
pub mod frame;
pub mod key;
pub mod latest;
pub mod logging;
pub mod measurement;
pub mod metadata;
pub mod settings;
pub mod spinlock;
pub mod temporal;
pub mod ticks;
