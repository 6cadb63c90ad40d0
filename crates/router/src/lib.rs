//! # Strata Router (`router`)
//!
//! Multi-level query routing: one request fans out to the sentence,
//! paragraph, and document indices in parallel, each level under its own
//! deadline, and the per-level hit lists are merged into one ranking.
//!
//! The [`Router`] is stateless. It receives the [`index::IndexSet`] of the
//! active generation on every call and keeps nothing between calls, so hot
//! swaps never race with in-flight queries.
//!
//! Fusion itself lives in free functions ([`fuse`], [`fuse_rrf`],
//! [`fuse_max_sim`]) that depend only on their inputs:
//!
//! ```
//! use index::{Level, Neighbor};
//! use router::{fuse_rrf, LevelHits};
//!
//! let hit = |id: &str| Neighbor { id: id.into(), score: 0.5 };
//! let lists = vec![
//!     LevelHits::new(Level::Sentence, vec![hit("d1"), hit("d2")]),
//!     LevelHits::new(Level::Paragraph, vec![hit("d1")]),
//! ];
//! let fused = fuse_rrf(&lists, 60.0, 10);
//! assert_eq!(fused[0].id, "d1");
//! assert!((fused[0].score - 2.0 / 60.0).abs() < 1e-12);
//! ```
//!
//! Levels that cannot answer (not loaded, no query vector, failed, or too
//! slow) are reported in [`RouteResponse::omitted`]; the request only fails
//! when no level answers at all.

mod engine;
mod fusion;
mod serde_millis;
mod types;

pub use crate::engine::Router;
pub use crate::fusion::{fuse, fuse_max_sim, fuse_rrf};
pub use crate::types::{
    FusedResult, FusionMethod, LevelContribution, LevelHits, LevelOmission, OmissionReason,
    QueryVectors, ResultLevel, RouteError, RouteRequest, RouteResponse, RouterConfig, DEFAULT_K,
    DEFAULT_KAPPA, DEFAULT_LEVEL_TIMEOUT,
};
