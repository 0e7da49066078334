//! Typed concentrator settings loaded through Figment.
//!
//! Settings are merged from:
//! 1. a TOML file (`gridframe.toml` by default)
//! 2. environment variables prefixed with `GRIDFRAME_`
//!
//! The settings tree is flat, so variables map one-to-one onto fields:
//! `GRIDFRAME_LAG_TIME=5.0` overrides `lag_time`.
//!
//! # Example
//! ```no_run
//! use gridframe::settings::ConcentrationSettings;
//!
//! # fn main() -> gridframe::error::Result<()> {
//! let settings = ConcentrationSettings::load()?;
//! settings.validate()?;
//! println!("publishing at {} frames per second", settings.frames_per_second);
//! # Ok(())
//! # }
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::downsampling::DownsamplingMethod;
use crate::error::{GridFrameError, Result};
use crate::key::MeasurementKey;
use crate::metadata::MeasurementMetadata;
use crate::temporal::TimeConstraints;
use crate::ticks::Ticks;

/// Top-level concentrator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcentrationSettings {
    /// Frame publication rate in frames per second
    #[serde(default = "default_frames_per_second")]
    pub frames_per_second: u16,
    /// Seconds a sample may lag behind the clock and still be used
    #[serde(default = "default_lag_time")]
    pub lag_time: f64,
    /// Seconds a sample may lead the clock and still be used
    #[serde(default = "default_lead_time")]
    pub lead_time: f64,
    /// How multiple samples of one signal collapse into a frame slot
    #[serde(default)]
    pub downsampling_method: DownsamplingMethod,
    /// Whether to also maintain the latest-value cache
    #[serde(default)]
    pub track_latest_measurements: bool,
    /// Pre-sized capacity for per-frame signal maps
    #[serde(default)]
    pub expected_measurements: Option<usize>,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Known signal definitions
    #[serde(default)]
    pub signals: Vec<SignalDefinition>,
}

/// Signal definition in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalDefinition {
    /// Unique signal identifier
    pub signal_id: Uuid,
    /// Device acronym the signal originates from
    pub source: String,
    /// Numeric index under the source
    pub id: u64,
    /// Human-readable point tag
    pub tag: String,
    /// Calibration offset applied after scaling
    #[serde(default = "default_adder")]
    pub adder: f64,
    /// Calibration scale applied to raw values
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

// Default value functions
fn default_frames_per_second() -> u16 {
    30
}

fn default_lag_time() -> f64 {
    3.0
}

fn default_lead_time() -> f64 {
    1.0
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_adder() -> f64 {
    0.0
}

fn default_multiplier() -> f64 {
    1.0
}

impl Default for ConcentrationSettings {
    fn default() -> Self {
        ConcentrationSettings {
            frames_per_second: default_frames_per_second(),
            lag_time: default_lag_time(),
            lead_time: default_lead_time(),
            downsampling_method: DownsamplingMethod::default(),
            track_latest_measurements: false,
            expected_measurements: None,
            log_level: default_log_level(),
            signals: Vec::new(),
        }
    }
}

impl ConcentrationSettings {
    /// Load configuration from gridframe.toml and environment variables
    ///
    /// Environment variables override configuration with prefix GRIDFRAME_
    /// Example: GRIDFRAME_FRAMES_PER_SECOND=120
    pub fn load() -> Result<Self> {
        Self::load_from("gridframe.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("GRIDFRAME_"))
            .extract()?;
        Ok(settings)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<()> {
        // Time tolerances and the frame rate share their rules with the
        // runtime accessors.
        self.time_constraints()?;
        self.frame_interval_ticks()?;

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(GridFrameError::Validation(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        let mut ids = std::collections::HashSet::new();
        for signal in &self.signals {
            if signal.signal_id.is_nil() {
                return Err(GridFrameError::Validation(format!(
                    "Signal '{}' has a nil signal_id",
                    signal.tag
                )));
            }
            if !ids.insert(signal.signal_id) {
                return Err(GridFrameError::Validation(format!(
                    "Duplicate signal ID: {}",
                    signal.signal_id
                )));
            }
        }

        Ok(())
    }

    /// The configured lag/lead tolerances as a freshness window.
    pub fn time_constraints(&self) -> Result<TimeConstraints> {
        TimeConstraints::new(self.lag_time, self.lead_time)
    }

    /// Tick spacing between consecutive frame slots at the configured rate.
    ///
    /// Rejects rates outside 1-1000 rather than dividing by zero.
    pub fn frame_interval_ticks(&self) -> Result<i64> {
        if self.frames_per_second == 0 || self.frames_per_second > 1000 {
            return Err(GridFrameError::Validation(format!(
                "Invalid frames_per_second {}. Must be 1-1000",
                self.frames_per_second
            )));
        }
        Ok(Ticks::PER_SECOND / i64::from(self.frames_per_second))
    }
}

impl SignalDefinition {
    /// Immutable metadata for this signal, shared across its samples.
    pub fn metadata_for(&self) -> Result<Arc<MeasurementMetadata>> {
        let key = MeasurementKey::new(self.signal_id, self.source.clone(), self.id)?;
        Ok(MeasurementMetadata::with_calibration(
            key,
            self.tag.clone(),
            self.adder,
            self.multiplier,
        ))
    }
}
