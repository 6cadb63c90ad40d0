use index::Level;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Health of one metric against its thresholds, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityStatus {
    Healthy,
    Warning,
    Critical,
}

impl fmt::Display for QualityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QualityStatus::Healthy => "healthy",
            QualityStatus::Warning => "warning",
            QualityStatus::Critical => "critical",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Coherence,
    Stability,
}

/// What a report measured: an adjacent level pair or one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportScope {
    Pair { child: Level, parent: Level },
    Level(Level),
}

/// One computed metric.
///
/// For coherence `value` is the mean child/parent cosine. For stability
/// `value` is `1 - mean_drift` and `drift_by_label` holds the mean drift
/// of each perturbation kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub metric: Metric,
    pub scope: ReportScope,
    pub value: f64,
    pub status: QualityStatus,
    pub sample_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_drift: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub drift_by_label: BTreeMap<String, f64>,
}

impl QualityReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Acceptance rule over a batch of reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityGate {
    /// Treat warnings as failures too.
    pub fail_on_warning: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDecision {
    pub accepted: bool,
    /// Worst status seen; healthy when there were no reports.
    pub worst: QualityStatus,
    /// Reports that caused a rejection.
    pub failing: Vec<QualityReport>,
}

impl QualityGate {
    pub fn new(fail_on_warning: bool) -> Self {
        Self { fail_on_warning }
    }

    pub fn evaluate(&self, reports: &[QualityReport]) -> GateDecision {
        let limit = if self.fail_on_warning {
            QualityStatus::Healthy
        } else {
            QualityStatus::Warning
        };
        let failing: Vec<QualityReport> = reports
            .iter()
            .filter(|r| r.status > limit)
            .cloned()
            .collect();
        let worst = reports
            .iter()
            .map(|r| r.status)
            .max()
            .unwrap_or(QualityStatus::Healthy);
        GateDecision {
            accepted: failing.is_empty(),
            worst,
            failing,
        }
    }
}
