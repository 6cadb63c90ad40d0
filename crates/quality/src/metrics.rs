use std::collections::BTreeMap;
use std::time::Instant;

use index::{Level, VectorRecord};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::QualityConfig;
use crate::error::QualityError;
use crate::report::{Metric, QualityReport, ReportScope};
use crate::sample::{cosine, even_stride};

/// Child vectors, parent vectors, and the child → parent assignment for one
/// adjacent level pair.
#[derive(Debug, Clone, Copy)]
pub struct CoherenceInput<'a> {
    pub child_level: Level,
    pub parent_level: Level,
    pub children: &'a [VectorRecord],
    pub parents: &'a [VectorRecord],
    /// Child id → parent id.
    pub parent_of: &'a BTreeMap<String, String>,
}

/// An original vector and its re-embedding after one perturbation.
///
/// Perturbing and re-encoding happen upstream; `perturbation` is the
/// caller's label for the transformation applied (e.g. `"case_fold"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerturbedPair {
    pub id: String,
    pub perturbation: String,
    pub original: Vec<f32>,
    pub perturbed: Vec<f32>,
}

/// Read-only quality metrics over evaluation samples.
///
/// Nothing here touches a serving index: callers pass vectors in and get a
/// [`QualityReport`] back.
#[derive(Debug, Clone)]
pub struct QualityMetrics {
    config: QualityConfig,
}

impl QualityMetrics {
    pub fn new(config: QualityConfig) -> Result<Self, QualityError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Mean cosine between each sampled child and its assigned parent.
    pub fn coherence(&self, input: &CoherenceInput<'_>) -> Result<QualityReport, QualityError> {
        let span = tracing::span!(
            tracing::Level::INFO,
            "quality.coherence",
            child = %input.child_level,
            parent = %input.parent_level
        );
        let _guard = span.enter();
        let start = Instant::now();

        let result = self.coherence_inner(input);
        log_outcome(&result, start);
        result
    }

    fn coherence_inner(&self, input: &CoherenceInput<'_>) -> Result<QualityReport, QualityError> {
        if input.child_level.parent() != Some(input.parent_level) {
            return Err(QualityError::NotAdjacent {
                child: input.child_level,
                parent: input.parent_level,
            });
        }
        if input.children.is_empty() {
            return Err(QualityError::EmptySample {
                metric: "coherence",
            });
        }

        let mut parents: BTreeMap<&str, &VectorRecord> = BTreeMap::new();
        for parent in input.parents {
            check_level(parent, input.parent_level)?;
            if parents.insert(parent.id.as_str(), parent).is_some() {
                return Err(QualityError::DuplicateId {
                    id: parent.id.clone(),
                    level: input.parent_level,
                });
            }
        }

        let mut children: Vec<&VectorRecord> = input.children.iter().collect();
        children.sort_by(|a, b| a.id.cmp(&b.id));
        if let Some(pair) = children.windows(2).find(|w| w[0].id == w[1].id) {
            return Err(QualityError::DuplicateId {
                id: pair[0].id.clone(),
                level: input.child_level,
            });
        }
        let sample = even_stride(&children, self.config.max_samples);

        let mut pairs = Vec::with_capacity(sample.len());
        for child in sample {
            check_level(child, input.child_level)?;
            let parent = input
                .parent_of
                .get(&child.id)
                .and_then(|pid| parents.get(pid.as_str()))
                .ok_or_else(|| QualityError::MissingParent {
                    child: child.id.clone(),
                    level: input.parent_level,
                })?;
            if child.values.len() != parent.values.len() {
                return Err(QualityError::DimensionMismatch {
                    id: child.id.clone(),
                    expected: parent.values.len(),
                    got: child.values.len(),
                });
            }
            pairs.push((child.values.as_slice(), parent.values.as_slice()));
        }

        let similarities = self.similarities(&pairs);
        let value = mean(&similarities);
        let thresholds = &self.config.coherence;
        Ok(QualityReport {
            metric: Metric::Coherence,
            scope: ReportScope::Pair {
                child: input.child_level,
                parent: input.parent_level,
            },
            value,
            status: thresholds.status(value),
            sample_size: similarities.len(),
            target: Some(thresholds.target),
            mean_drift: None,
            drift_by_label: BTreeMap::new(),
        })
    }

    /// Mean drift `1 - cosine(original, perturbed)` over the sampled pairs,
    /// with a per-perturbation breakdown.
    pub fn stability(
        &self,
        level: Level,
        pairs: &[PerturbedPair],
    ) -> Result<QualityReport, QualityError> {
        let span = tracing::span!(tracing::Level::INFO, "quality.stability", level = %level);
        let _guard = span.enter();
        let start = Instant::now();

        let result = self.stability_inner(level, pairs);
        log_outcome(&result, start);
        result
    }

    fn stability_inner(
        &self,
        level: Level,
        pairs: &[PerturbedPair],
    ) -> Result<QualityReport, QualityError> {
        if pairs.is_empty() {
            return Err(QualityError::EmptySample {
                metric: "stability",
            });
        }
        let mut ordered: Vec<&PerturbedPair> = pairs.iter().collect();
        ordered.sort_by(|a, b| {
            a.id.cmp(&b.id)
                .then_with(|| a.perturbation.cmp(&b.perturbation))
        });
        let sample = even_stride(&ordered, self.config.max_samples);

        let mut vectors = Vec::with_capacity(sample.len());
        for pair in &sample {
            if pair.original.len() != pair.perturbed.len() {
                return Err(QualityError::DimensionMismatch {
                    id: pair.id.clone(),
                    expected: pair.original.len(),
                    got: pair.perturbed.len(),
                });
            }
            vectors.push((pair.original.as_slice(), pair.perturbed.as_slice()));
        }

        let drifts: Vec<f64> = self
            .similarities(&vectors)
            .into_iter()
            .map(|cos| 1.0 - cos)
            .collect();
        let mean_drift = mean(&drifts);

        let mut by_label: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
        for (pair, drift) in sample.iter().zip(&drifts) {
            let entry = by_label.entry(pair.perturbation.as_str()).or_default();
            entry.0 += drift;
            entry.1 += 1;
        }
        let drift_by_label = by_label
            .into_iter()
            .map(|(label, (sum, n))| (label.to_string(), sum / n as f64))
            .collect();

        Ok(QualityReport {
            metric: Metric::Stability,
            scope: ReportScope::Level(level),
            value: 1.0 - mean_drift,
            status: self.config.stability.status(mean_drift),
            sample_size: drifts.len(),
            target: None,
            mean_drift: Some(mean_drift),
            drift_by_label,
        })
    }

    fn similarities(&self, pairs: &[(&[f32], &[f32])]) -> Vec<f64> {
        if self.config.use_parallel {
            let mut out = Vec::with_capacity(pairs.len());
            pairs
                .par_iter()
                .map(|(a, b)| cosine(a, b))
                .collect_into_vec(&mut out);
            out
        } else {
            pairs.iter().map(|(a, b)| cosine(a, b)).collect()
        }
    }
}

fn check_level(record: &VectorRecord, expected: Level) -> Result<(), QualityError> {
    if record.level != expected {
        return Err(QualityError::LevelMismatch {
            id: record.id.clone(),
            expected,
            got: record.level,
        });
    }
    Ok(())
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn log_outcome(result: &Result<QualityReport, QualityError>, start: Instant) {
    match result {
        Ok(report) => info!(
            metric = ?report.metric,
            value = report.value,
            status = %report.status,
            sample_size = report.sample_size,
            elapsed_micros = start.elapsed().as_micros(),
            "quality_report"
        ),
        Err(err) => warn!(
            error = %err,
            elapsed_micros = start.elapsed().as_micros(),
            "quality_report_failure"
        ),
    }
}
