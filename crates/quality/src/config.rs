//! Thresholds and sampling settings for the quality metrics.

use serde::{Deserialize, Serialize};

use crate::error::QualityError;
use crate::report::QualityStatus;

/// Coherence thresholds; higher values are better.
///
/// A score at or above `warning` is healthy, a score in
/// `[critical, warning)` is a warning, and anything below `critical` is
/// critical. `target` is the score the hierarchy is expected to reach and is
/// carried into each report.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CoherenceThresholds {
    pub target: f64,
    pub warning: f64,
    pub critical: f64,
}

impl Default for CoherenceThresholds {
    fn default() -> Self {
        Self {
            target: 0.8,
            warning: 0.7,
            critical: 0.5,
        }
    }
}

impl CoherenceThresholds {
    pub fn validate(&self) -> Result<(), QualityError> {
        let in_range = |v: f64| v.is_finite() && (-1.0..=1.0).contains(&v);
        if !(in_range(self.target) && in_range(self.warning) && in_range(self.critical)) {
            return Err(QualityError::InvalidConfig(
                "coherence thresholds must lie in [-1, 1]".into(),
            ));
        }
        if !(self.critical <= self.warning && self.warning <= self.target) {
            return Err(QualityError::InvalidConfig(format!(
                "coherence thresholds must satisfy critical <= warning <= target, got {} / {} / {}",
                self.critical, self.warning, self.target
            )));
        }
        Ok(())
    }

    pub fn status(&self, coherence: f64) -> QualityStatus {
        if coherence >= self.warning {
            QualityStatus::Healthy
        } else if coherence >= self.critical {
            QualityStatus::Warning
        } else {
            QualityStatus::Critical
        }
    }
}

/// Drift thresholds; lower values are better.
///
/// Mean drift at or below `warning_drift` is healthy, at or below
/// `max_drift` a warning, and above `max_drift` critical.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StabilityThresholds {
    pub warning_drift: f64,
    pub max_drift: f64,
}

impl Default for StabilityThresholds {
    fn default() -> Self {
        Self {
            warning_drift: 0.05,
            max_drift: 0.15,
        }
    }
}

impl StabilityThresholds {
    pub fn validate(&self) -> Result<(), QualityError> {
        let in_range = |v: f64| v.is_finite() && (0.0..=2.0).contains(&v);
        if !(in_range(self.warning_drift) && in_range(self.max_drift)) {
            return Err(QualityError::InvalidConfig(
                "drift thresholds must lie in [0, 2]".into(),
            ));
        }
        if self.warning_drift > self.max_drift {
            return Err(QualityError::InvalidConfig(format!(
                "warning_drift {} exceeds max_drift {}",
                self.warning_drift, self.max_drift
            )));
        }
        Ok(())
    }

    pub fn status(&self, mean_drift: f64) -> QualityStatus {
        if mean_drift <= self.warning_drift {
            QualityStatus::Healthy
        } else if mean_drift <= self.max_drift {
            QualityStatus::Warning
        } else {
            QualityStatus::Critical
        }
    }
}

/// Settings for [`crate::QualityMetrics`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QualityConfig {
    pub coherence: CoherenceThresholds,
    pub stability: StabilityThresholds,
    /// Upper bound on the evaluation sample; larger inputs are thinned by an
    /// even stride over id order.
    pub max_samples: usize,
    /// Compute per-item similarities on the rayon pool. Sums are always
    /// taken sequentially, so results do not depend on this flag.
    pub use_parallel: bool,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            coherence: CoherenceThresholds::default(),
            stability: StabilityThresholds::default(),
            max_samples: 10_000,
            use_parallel: false,
        }
    }
}

impl QualityConfig {
    pub fn with_coherence(mut self, thresholds: CoherenceThresholds) -> Self {
        self.coherence = thresholds;
        self
    }

    pub fn with_stability(mut self, thresholds: StabilityThresholds) -> Self {
        self.stability = thresholds;
        self
    }

    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    pub fn with_parallel(mut self, use_parallel: bool) -> Self {
        self.use_parallel = use_parallel;
        self
    }

    pub fn validate(&self) -> Result<(), QualityError> {
        self.coherence.validate()?;
        self.stability.validate()?;
        if self.max_samples == 0 {
            return Err(QualityError::InvalidConfig(
                "max_samples must be >= 1".into(),
            ));
        }
        Ok(())
    }
}
