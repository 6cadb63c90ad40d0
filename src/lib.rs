//! Workspace umbrella crate for Strata, a hierarchical multi-level semantic
//! retrieval engine.
//!
//! Text is embedded upstream at three granularities (sentence, paragraph,
//! document). Strata builds one approximate-nearest-neighbor index per level,
//! binds the indices and the models that produced their vectors into a
//! digest-backed manifest, serves queries by searching every level in
//! parallel and fusing the per-level rankings, and scores whether the levels
//! stay aligned and robust.
//!
//! The components live in their own crates and are re-exported here:
//!
//! * [`index`]: per-level graph (HNSW) and IVF-PQ indices, artifact stores,
//!   the on-disk format and its SHA-256 digests.
//! * [`manifest`]: manifest generation, validation, and the generation
//!   manager that owns readiness, reload, and rollback.
//! * [`router`]: async fan-out with per-level deadlines and the pure fusion
//!   functions (RRF, max-similarity).
//! * [`quality`]: coherence and stability reports plus the acceptance gate.
//!
//! This crate adds the YAML [`StrataConfig`], [`telemetry`] setup, the
//! [`pipeline`] that builds a whole generation, and the [`RetrievalService`]
//! that ties serving together.
//!
//! ```
//! use std::collections::BTreeMap;
//! use strata::{build_generation, BuildPlan, ControlCommand, LevelInput, RetrievalService, StrataConfig};
//! use strata::index::{GraphParams, IndexParams, InMemoryArtifactStore, Level, VectorRecord};
//! use std::sync::Arc;
//!
//! let mut levels = BTreeMap::new();
//! levels.insert(Level::Sentence, IndexParams::Graph(GraphParams::default()));
//! let config = StrataConfig::new(2, levels);
//! let store = Arc::new(InMemoryArtifactStore::new());
//!
//! let records: Vec<VectorRecord> = (0..12)
//!     .map(|i| {
//!         let a = i as f32 * 0.4;
//!         VectorRecord::new(format!("s{i}"), Level::Sentence, vec![a.cos(), a.sin()])
//!     })
//!     .collect();
//! let plan = BuildPlan::new("rev-1").with_level(LevelInput::new(Level::Sentence, records));
//! let built = build_generation(&plan, store.clone(), &config).unwrap();
//!
//! let service = RetrievalService::new(&config, store).unwrap();
//! assert!(!service.is_ready());
//! service
//!     .handle(ControlCommand::Reload { manifest: built.manifest_location })
//!     .unwrap();
//! assert!(service.is_ready());
//! ```

pub mod config;
mod error;
pub mod pipeline;
mod service;
pub mod telemetry;

pub use index;
pub use manifest;
pub use quality;
pub use router;

pub use crate::config::{ConfigLoadError, QualitySection, StorageSection, StrataConfig};
pub use crate::error::StrataError;
pub use crate::pipeline::{build_generation, BuildPlan, GenerationBuild, LevelInput};
pub use crate::service::{
    CoherenceSample, ControlCommand, ControlOutcome, QualityBatch, RetrievalService,
    StabilitySample,
};
pub use crate::telemetry::{init_tracing, TelemetryConfig};
