//! Process-wide `tracing` subscriber setup.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::config::ConfigLoadError;

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive, e.g. `info` or `strata=debug,router=trace`.
    pub log_level: String,
    /// Emit one JSON object per event instead of human-readable lines.
    pub json: bool,
    pub thread_ids: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            json: false,
            thread_ids: false,
        }
    }
}

impl TelemetryConfig {
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        self.filter().map(|_| ())
    }

    fn filter(&self) -> Result<EnvFilter, ConfigLoadError> {
        EnvFilter::try_new(&self.log_level).map_err(|e| {
            ConfigLoadError::Validation(format!("telemetry.log_level `{}`: {e}", self.log_level))
        })
    }
}

/// Install the global subscriber.
///
/// Returns `Ok(false)` when a subscriber was already installed; the existing
/// one is left in place.
pub fn init_tracing(config: &TelemetryConfig) -> Result<bool, ConfigLoadError> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.filter()?)
        .with_target(false)
        .with_thread_ids(config.thread_ids);
    let installed = if config.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };
    Ok(installed)
}
