//! Error types for the measurement and concentration core.
//!
//! This module defines the crate-wide error type, `GridFrameError`, built on
//! the `thiserror` crate. The concentration hot path deliberately avoids
//! returning errors: per-sample outcomes (a stale temporal update, a sample
//! dropped by downsampling) are expressed as ordinary values (`bool`,
//! `Option`) so that sorting threads never pay for error construction.
//! `GridFrameError` therefore covers the edges of the crate:
//!
//! - **`InvalidTimeConstraint`**: a lag or lead tolerance that is not
//!   strictly positive. Caught at [`TimeConstraints`](crate::temporal::TimeConstraints)
//!   construction so the window math never sees a degenerate tolerance.
//! - **`UndefinedSignal`**: an attempt to build a [`MeasurementKey`](crate::key::MeasurementKey)
//!   from the nil UUID, which is reserved for the undefined sentinel.
//! - **`BufferOutOfRange`**: a buffer-block payload range that falls outside
//!   the source slice. Never clamped; the caller's offsets are wrong.
//! - **`Settings`**: wraps `figment` extraction failures from the
//!   configuration layer.
//! - **`Validation`**: semantic settings errors that parse cleanly but are
//!   logically invalid (an out-of-range frame rate, a duplicate signal).

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type Result<T> = std::result::Result<T, GridFrameError>;

/// Errors produced at the edges of the measurement core.
#[derive(Error, Debug)]
pub enum GridFrameError {
    /// A time tolerance was zero or negative.
    #[error("invalid time constraint: {name} must be greater than zero, got {value}")]
    InvalidTimeConstraint {
        /// Which tolerance was rejected (`"lag_time"` or `"lead_time"`).
        name: &'static str,
        /// The rejected value, in seconds.
        value: f64,
    },

    /// The nil UUID is reserved for the undefined measurement key.
    #[error("signal id must not be the nil UUID")]
    UndefinedSignal,

    /// A buffer-block payload range fell outside its source buffer.
    #[error("buffer range out of bounds: start {start} + length {length} exceeds buffer of {buffer_length} bytes")]
    BufferOutOfRange {
        /// Requested start offset into the source buffer.
        start: usize,
        /// Requested payload length.
        length: usize,
        /// Actual length of the source buffer.
        buffer_length: usize,
    },

    /// Configuration could not be read or deserialized.
    #[error("settings error: {0}")]
    Settings(#[from] Box<figment::Error>),

    /// Configuration parsed but failed semantic validation.
    #[error("settings validation error: {0}")]
    Validation(String),
}

impl From<figment::Error> for GridFrameError {
    fn from(value: figment::Error) -> Self {
        GridFrameError::Settings(Box::new(value))
    }
}
