//! Structured logging setup for concentrator processes.
//!
//! Built on `tracing` and `tracing-subscriber`:
//! - pretty, compact and JSON output formats
//! - `RUST_LOG`-style environment filtering, falling back to the
//!   configured level
//! - idempotent initialization, safe to call from tests and embedders
//!
//! The library itself only emits events (for example the per-sample
//! downsampling traces); installing a subscriber is left to the process,
//! typically through [`init_from_settings`] right after loading settings.
//!
//! # Example
//! ```no_run
//! use gridframe::{logging, settings::ConcentrationSettings};
//! use tracing::info;
//!
//! # fn main() -> gridframe::error::Result<()> {
//! let settings = ConcentrationSettings::load()?;
//! logging::init_from_settings(&settings)?;
//! info!(rate = settings.frames_per_second, "concentrator starting");
//! # Ok(())
//! # }
//! ```

use tracing::Level;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use crate::error::{GridFrameError, Result};
use crate::settings::ConcentrationSettings;

/// Output format for log events.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Pretty-printed format with colors (for development)
    #[default]
    Pretty,
    /// Compact single-line format without colors (for production)
    Compact,
    /// JSON format for log aggregation
    Json,
}

/// Logging configuration options.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum level to emit when `RUST_LOG` is unset
    pub level: Level,
    /// Output format
    pub format: LogFormat,
    /// Whether to include file and line numbers
    pub with_file_and_line: bool,
    /// Whether to include thread names
    pub with_thread_names: bool,
    /// Whether to enable ANSI colors (Pretty format only)
    pub with_ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            with_file_and_line: true,
            with_thread_names: true,
            with_ansi: true,
        }
    }
}

impl LoggingConfig {
    /// Logging configuration at `level` with default formatting.
    pub fn new(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// Logging configuration derived from loaded settings.
    pub fn from_settings(settings: &ConcentrationSettings) -> Result<Self> {
        let level = parse_log_level(&settings.log_level)?;
        Ok(Self {
            level,
            ..Default::default()
        })
    }

    /// Set output format
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Enable or disable ANSI colors
    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.with_ansi = enabled;
        self
    }
}

/// Initialize logging from loaded settings.
pub fn init_from_settings(settings: &ConcentrationSettings) -> Result<()> {
    init(LoggingConfig::from_settings(settings)?)
}

/// Initialize logging with custom configuration.
///
/// Idempotent: if a global subscriber is already installed this returns
/// Ok(()) rather than failing, so tests and embedding applications can
/// both call it freely.
pub fn init(config: LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_directive(config.level)));

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_file(config.with_file_and_line)
            .with_line_number(config.with_file_and_line)
            .with_thread_names(config.with_thread_names)
            .with_ansi(config.with_ansi)
            .with_filter(env_filter)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_file(config.with_file_and_line)
            .with_line_number(config.with_file_and_line)
            .with_thread_names(config.with_thread_names)
            .with_ansi(false)
            .with_filter(env_filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_file(config.with_file_and_line)
            .with_line_number(config.with_file_and_line)
            .with_thread_names(config.with_thread_names)
            .with_filter(env_filter)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .try_init()
        .or_else(|e| {
            // Another subscriber being installed first is fine, notably
            // under test harnesses that set their own.
            if e.to_string()
                .contains("a global default trace dispatcher has already been set")
            {
                Ok(())
            } else {
                Err(GridFrameError::Validation(format!(
                    "Failed to initialize tracing: {e}"
                )))
            }
        })
}

/// Parse log level string into tracing Level
fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(GridFrameError::Validation(format!(
            "Invalid log level '{level}'. Must be one of: trace, debug, info, warn, error"
        ))),
    }
}

/// Default filter directive when the environment supplies none.
fn level_directive(level: Level) -> &'static str {
    match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert!(matches!(parse_log_level("trace"), Ok(Level::TRACE)));
        assert!(matches!(parse_log_level("debug"), Ok(Level::DEBUG)));
        assert!(matches!(parse_log_level("info"), Ok(Level::INFO)));
        assert!(matches!(parse_log_level("warn"), Ok(Level::WARN)));
        assert!(matches!(parse_log_level("error"), Ok(Level::ERROR)));

        // Case insensitive
        assert!(matches!(parse_log_level("INFO"), Ok(Level::INFO)));
        assert!(matches!(parse_log_level("Debug"), Ok(Level::DEBUG)));

        // Invalid
        assert!(parse_log_level("verbose").is_err());
    }

    #[test]
    fn test_config_from_settings() {
        let settings = ConcentrationSettings {
            log_level: "debug".to_string(),
            ..Default::default()
        };
        let config = LoggingConfig::from_settings(&settings).unwrap();
        assert!(matches!(config.level, Level::DEBUG));
    }

    #[test]
    fn test_config_builder() {
        let config = LoggingConfig::new(Level::WARN)
            .with_format(LogFormat::Json)
            .with_ansi(false);

        assert!(matches!(config.level, Level::WARN));
        assert_eq!(config.format, LogFormat::Json);
        assert!(!config.with_ansi);
    }
}
