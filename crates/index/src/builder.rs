use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::persist::{digest_hex, CompressionConfig};
use crate::record::prepare_records;
use crate::{
    Algorithm, ArtifactStore, GraphIndex, GraphParams, IndexError, IndexParams, IvfPqIndex,
    IvfPqParams, Level, LoadedIndex, VectorRecord,
};

/// Everything a manifest records about one built index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexDescriptor {
    pub level: Level,
    pub algorithm: Algorithm,
    pub params: IndexParams,
    pub dimension: usize,
    pub vector_count: usize,
    /// SHA-256 hex of the artifact bytes.
    pub digest: String,
    /// Store-relative artifact location.
    pub location: String,
}

/// Result of a successful build: the resident index plus its descriptor.
#[derive(Debug, Clone)]
pub struct BuiltIndex {
    pub index: LoadedIndex,
    pub descriptor: IndexDescriptor,
}

/// Configuration shared by every build in one deployment generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuilderConfig {
    /// Vector dimensionality every record and query must have.
    pub dimension: usize,
    pub compression: CompressionConfig,
    /// Directory (store-relative) that level files are written under.
    pub prefix: String,
}

impl BuilderConfig {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            compression: CompressionConfig::default(),
            prefix: String::new(),
        }
    }

    pub fn with_compression(mut self, compression: CompressionConfig) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn validate(&self) -> Result<(), IndexError> {
        if self.dimension == 0 {
            return Err(IndexError::invalid("dimension must be positive"));
        }
        self.compression.validate()
    }

    /// Level-named artifact location, e.g. `gen-3/sentence.idx`.
    pub fn location(&self, level: Level) -> String {
        let prefix = self.prefix.trim_end_matches('/');
        if prefix.is_empty() {
            level.file_name()
        } else {
            format!("{prefix}/{}", level.file_name())
        }
    }
}

/// Builds per-level indices and writes them through an [`ArtifactStore`].
///
/// Callers must not run two builds for the same location concurrently.
pub struct IndexBuilder {
    config: BuilderConfig,
    store: Arc<dyn ArtifactStore>,
}

impl IndexBuilder {
    pub fn new(config: BuilderConfig, store: Arc<dyn ArtifactStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    pub fn build_graph(
        &self,
        level: Level,
        records: &[VectorRecord],
        params: GraphParams,
    ) -> Result<BuiltIndex, IndexError> {
        self.build(level, records, None, IndexParams::Graph(params))
    }

    pub fn build_ivf_pq(
        &self,
        level: Level,
        records: &[VectorRecord],
        training_sample: &[Vec<f32>],
        params: IvfPqParams,
    ) -> Result<BuiltIndex, IndexError> {
        self.build(level, records, Some(training_sample), IndexParams::IvfPq(params))
    }

    /// Build `level` with `params`, persist it, and describe it.
    ///
    /// IVF-PQ builds without an explicit `training_sample` train on the
    /// records themselves. Graph builds ignore the sample.
    pub fn build(
        &self,
        level: Level,
        records: &[VectorRecord],
        training_sample: Option<&[Vec<f32>]>,
        params: IndexParams,
    ) -> Result<BuiltIndex, IndexError> {
        let start = Instant::now();
        let span = tracing::span!(
            tracing::Level::INFO,
            "index.build",
            level = %level,
            algorithm = %params.algorithm(),
            records = records.len()
        );
        let _guard = span.enter();

        match self.build_inner(level, records, training_sample, params) {
            Ok(built) => {
                info!(
                    location = %built.descriptor.location,
                    digest = %built.descriptor.digest,
                    vector_count = built.descriptor.vector_count,
                    elapsed_micros = start.elapsed().as_micros(),
                    "index_build_success"
                );
                Ok(built)
            }
            Err(err) => {
                warn!(
                    error = %err,
                    elapsed_micros = start.elapsed().as_micros(),
                    "index_build_failure"
                );
                Err(err)
            }
        }
    }

    fn build_inner(
        &self,
        level: Level,
        records: &[VectorRecord],
        training_sample: Option<&[Vec<f32>]>,
        params: IndexParams,
    ) -> Result<BuiltIndex, IndexError> {
        self.config.validate()?;
        let dimension = self.config.dimension;
        params.validate(dimension)?;
        let sorted = prepare_records(level, dimension, records)?;

        let index = match params {
            IndexParams::Graph(p) => {
                LoadedIndex::Graph(GraphIndex::build(level, dimension, &sorted, p))
            }
            IndexParams::IvfPq(p) => {
                let owned;
                let sample = match training_sample {
                    Some(sample) => sample,
                    None => {
                        owned = sorted.iter().map(|r| r.values.clone()).collect::<Vec<_>>();
                        owned.as_slice()
                    }
                };
                LoadedIndex::IvfPq(IvfPqIndex::build(level, dimension, &sorted, sample, p)?)
            }
        };

        let bytes = index.to_bytes(&self.config.compression)?;
        let location = self.config.location(level);
        self.store.put(&location, &bytes)?;

        let descriptor = IndexDescriptor {
            level,
            algorithm: params.algorithm(),
            params,
            dimension,
            vector_count: sorted.len(),
            digest: digest_hex(&bytes),
            location,
        };
        Ok(BuiltIndex { index, descriptor })
    }
}
