//! # Strata Quality (`quality`)
//!
//! Quality metrics that decide whether a built index set is fit to serve.
//!
//! * **Coherence** measures how well each finer-grained vector aligns with
//!   the coarser unit that contains it (sentence → paragraph, paragraph →
//!   document): the mean cosine between children and their assigned parents.
//! * **Stability** measures how far a level's vectors drift when the source
//!   text is perturbed. The caller re-embeds perturbed text upstream and
//!   hands over `(original, perturbed)` pairs labelled by perturbation kind.
//!
//! Each metric yields a [`QualityReport`] whose status comes from configured
//! thresholds, and a [`QualityGate`] folds a batch of reports into an
//! accept/reject [`GateDecision`]. Samples are thinned deterministically, so
//! the same inputs always produce the same report.
//!
//! ```
//! use index::Level;
//! use quality::{PerturbedPair, QualityConfig, QualityGate, QualityMetrics, QualityStatus};
//!
//! let metrics = QualityMetrics::new(QualityConfig::default()).unwrap();
//! let pairs = vec![PerturbedPair {
//!     id: "doc-1".into(),
//!     perturbation: "whitespace".into(),
//!     original: vec![0.6, 0.8],
//!     perturbed: vec![0.6, 0.8],
//! }];
//! let report = metrics.stability(Level::Document, &pairs).unwrap();
//! assert_eq!(report.value, 1.0);
//! assert_eq!(report.status, QualityStatus::Healthy);
//! assert!(QualityGate::default().evaluate(&[report]).accepted);
//! ```

mod config;
mod error;
mod metrics;
mod report;
mod sample;

pub use crate::config::{CoherenceThresholds, QualityConfig, StabilityThresholds};
pub use crate::error::QualityError;
pub use crate::metrics::{CoherenceInput, PerturbedPair, QualityMetrics};
pub use crate::report::{
    GateDecision, Metric, QualityGate, QualityReport, QualityStatus, ReportScope,
};
