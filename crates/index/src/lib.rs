//! # Strata Index
//!
//! Per-level approximate-nearest-neighbor indices for the sentence, paragraph,
//! and document levels of a Strata deployment.
//!
//! ## Core Features
//!
//! - **Two index families**:
//!   - [`GraphIndex`]: a seeded layered proximity graph for the sentence and
//!     paragraph levels.
//!   - [`IvfPqIndex`]: an inverted file over k-means partitions with
//!     product-quantized residual codes for the document level.
//! - **Deterministic builds**: records are ordered by id and every random
//!   choice is seeded, so identical `(records, params)` produce bit-identical
//!   files and therefore identical SHA-256 digests.
//! - **Typed parameters**: [`IndexParams`] is a tagged variant per algorithm,
//!   validated before any build work starts.
//! - **Pluggable storage**: builders write through an [`ArtifactStore`]
//!   (filesystem or in-memory), and [`IndexHandle`] loads back through the
//!   same trait after verifying the artifact digest.
//!
//! ## Example Usage
//!
//! ```
//! use index::{
//!     BuilderConfig, GraphParams, IndexBuilder, InMemoryArtifactStore, IndexHandle, Level,
//!     SearchOptions, VectorIndex, VectorRecord,
//! };
//! use std::sync::Arc;
//!
//! let records: Vec<VectorRecord> = (0..32)
//!     .map(|i| {
//!         let angle = i as f32 * 0.1;
//!         VectorRecord::new(format!("s{i:02}"), Level::Sentence, vec![angle.cos(), angle.sin()])
//!     })
//!     .collect();
//!
//! let store = Arc::new(InMemoryArtifactStore::new());
//! let builder = IndexBuilder::new(BuilderConfig::new(2), store.clone());
//! let built = builder
//!     .build_graph(Level::Sentence, &records, GraphParams::default())
//!     .unwrap();
//!
//! let mut handle = IndexHandle::new(built.descriptor);
//! handle.load(&*store).unwrap();
//! let hits = handle.knn(&[1.0, 0.0], 3, &SearchOptions::default()).unwrap();
//! assert_eq!(hits[0].id, "s00");
//! ```

mod builder;
mod error;
pub mod eval;
mod graph;
mod handle;
mod ivf;
mod kmeans;
mod level;
mod params;
pub mod persist;
mod record;
mod store;

pub use builder::{BuilderConfig, BuiltIndex, IndexBuilder, IndexDescriptor};
pub use error::{ErrorKind, IndexError};
pub use graph::GraphIndex;
pub use handle::{IndexHandle, IndexSet, LoadedIndex, SearchOptions, VectorIndex};
pub use ivf::IvfPqIndex;
pub use level::Level;
pub use params::{
    Algorithm, GraphParams, IndexParams, IvfPqParams, EF_MAX, GRAPH_M_RANGE, NBITS_MAX,
    NLIST_MAX, TRAINING_VECTORS_PER_LIST,
};
pub use persist::{
    digest_hex, is_digest, CompressionCodec, CompressionConfig, INDEX_FORMAT_VERSION,
    INDEX_MAGIC,
};
pub use record::{dot, Neighbor, VectorRecord, NORM_TOLERANCE};
pub use store::{ArtifactStore, FsArtifactStore, InMemoryArtifactStore, StoreConfig};
