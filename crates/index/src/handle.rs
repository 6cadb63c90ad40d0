use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::persist::{decode_index, digest_hex, encode_index, CompressionConfig};
use crate::{
    Algorithm, ArtifactStore, GraphIndex, IndexDescriptor, IndexError, IndexParams, IvfPqIndex,
    Level, Neighbor,
};

/// Per-query overrides of the build-time search defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Candidate-list size for graph indices.
    pub ef_search: Option<usize>,
    /// Partitions scanned for IVF-PQ indices.
    pub nprobe: Option<usize>,
}

impl SearchOptions {
    pub fn with_ef_search(mut self, ef: usize) -> Self {
        self.ef_search = Some(ef);
        self
    }

    pub fn with_nprobe(mut self, nprobe: usize) -> Self {
        self.nprobe = Some(nprobe);
        self
    }
}

/// Read-only search surface shared by every index kind.
///
/// Implementations are immutable after construction, so `knn` may be called
/// from any number of threads at once.
pub trait VectorIndex: Send + Sync {
    fn level(&self) -> Level;
    fn dimension(&self) -> usize;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn is_loaded(&self) -> bool {
        true
    }
    /// Top-`k` hits by descending similarity, ties by ascending id.
    fn knn(&self, query: &[f32], k: usize, options: &SearchOptions)
        -> Result<Vec<Neighbor>, IndexError>;
}

/// The indices a query may fan out to, keyed by level.
pub type IndexSet = BTreeMap<Level, Arc<dyn VectorIndex>>;

/// A decoded index of either family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LoadedIndex {
    Graph(GraphIndex),
    IvfPq(IvfPqIndex),
}

impl LoadedIndex {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            LoadedIndex::Graph(_) => Algorithm::Graph,
            LoadedIndex::IvfPq(_) => Algorithm::IvfPq,
        }
    }

    pub fn params(&self) -> IndexParams {
        match self {
            LoadedIndex::Graph(g) => IndexParams::Graph(*g.params()),
            LoadedIndex::IvfPq(i) => IndexParams::IvfPq(*i.params()),
        }
    }

    pub fn ids(&self) -> &[String] {
        match self {
            LoadedIndex::Graph(g) => g.ids(),
            LoadedIndex::IvfPq(i) => i.ids(),
        }
    }

    pub fn to_bytes(&self, compression: &CompressionConfig) -> Result<Vec<u8>, IndexError> {
        encode_index(self, compression)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IndexError> {
        decode_index(bytes)
    }
}

impl VectorIndex for LoadedIndex {
    fn level(&self) -> Level {
        match self {
            LoadedIndex::Graph(g) => g.level(),
            LoadedIndex::IvfPq(i) => i.level(),
        }
    }

    fn dimension(&self) -> usize {
        match self {
            LoadedIndex::Graph(g) => g.dimension(),
            LoadedIndex::IvfPq(i) => i.dimension(),
        }
    }

    fn len(&self) -> usize {
        self.ids().len()
    }

    fn knn(
        &self,
        query: &[f32],
        k: usize,
        options: &SearchOptions,
    ) -> Result<Vec<Neighbor>, IndexError> {
        match self {
            LoadedIndex::Graph(g) => g.knn(query, k, options.ef_search),
            LoadedIndex::IvfPq(i) => i.knn(query, k, options.nprobe),
        }
    }
}

/// A manifest-described index that may or may not be resident.
///
/// Loading always verifies the artifact digest against the descriptor, so a
/// loaded handle is known to serve exactly the bytes the manifest names.
#[derive(Debug, Clone)]
pub struct IndexHandle {
    descriptor: IndexDescriptor,
    index: Option<Arc<LoadedIndex>>,
}

impl IndexHandle {
    pub fn new(descriptor: IndexDescriptor) -> Self {
        Self {
            descriptor,
            index: None,
        }
    }

    /// Handle over an index that was just built in this process.
    pub fn resident(descriptor: IndexDescriptor, index: LoadedIndex) -> Self {
        Self {
            descriptor,
            index: Some(Arc::new(index)),
        }
    }

    pub fn descriptor(&self) -> &IndexDescriptor {
        &self.descriptor
    }

    pub fn index(&self) -> Option<&Arc<LoadedIndex>> {
        self.index.as_ref()
    }

    pub fn unload(&mut self) {
        self.index = None;
    }

    /// Read the artifact from `store` and load it.
    pub fn load(&mut self, store: &dyn ArtifactStore) -> Result<(), IndexError> {
        let bytes = store
            .get(&self.descriptor.location)?
            .ok_or_else(|| IndexError::MissingArtifact(self.descriptor.location.clone()))?;
        self.load_from_bytes(&bytes)
    }

    /// Verify and decode `bytes` as this handle's artifact.
    pub fn load_from_bytes(&mut self, bytes: &[u8]) -> Result<(), IndexError> {
        let start = Instant::now();
        let span = tracing::span!(
            tracing::Level::INFO,
            "index.load",
            level = %self.descriptor.level,
            location = %self.descriptor.location
        );
        let _guard = span.enter();

        match self.verify(bytes) {
            Ok(index) => {
                info!(
                    vector_count = index.len(),
                    elapsed_micros = start.elapsed().as_micros(),
                    "index_load_success"
                );
                self.index = Some(Arc::new(index));
                Ok(())
            }
            Err(err) => {
                warn!(
                    error = %err,
                    elapsed_micros = start.elapsed().as_micros(),
                    "index_load_failure"
                );
                Err(err)
            }
        }
    }

    fn verify(&self, bytes: &[u8]) -> Result<LoadedIndex, IndexError> {
        let actual = digest_hex(bytes);
        if actual != self.descriptor.digest {
            return Err(IndexError::DigestMismatch {
                location: self.descriptor.location.clone(),
                expected: self.descriptor.digest.clone(),
                actual,
            });
        }
        let index = LoadedIndex::from_bytes(bytes)?;
        let d = &self.descriptor;
        if index.level() != d.level
            || index.dimension() != d.dimension
            || index.len() != d.vector_count
            || index.params() != d.params
        {
            return Err(IndexError::Corrupt(format!(
                "`{}` does not match its descriptor",
                d.location
            )));
        }
        Ok(index)
    }
}

impl VectorIndex for IndexHandle {
    fn level(&self) -> Level {
        self.descriptor.level
    }

    fn dimension(&self) -> usize {
        self.descriptor.dimension
    }

    fn len(&self) -> usize {
        self.descriptor.vector_count
    }

    fn is_loaded(&self) -> bool {
        self.index.is_some()
    }

    fn knn(
        &self,
        query: &[f32],
        k: usize,
        options: &SearchOptions,
    ) -> Result<Vec<Neighbor>, IndexError> {
        match &self.index {
            Some(index) => index.knn(query, k, options),
            None => Err(IndexError::NotLoaded {
                level: self.descriptor.level,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BuilderConfig, ErrorKind, GraphParams, IndexBuilder, InMemoryArtifactStore, VectorRecord};

    fn records() -> Vec<VectorRecord> {
        (0..40)
            .map(|i| {
                let angle = i as f32 * 0.15;
                VectorRecord::new(
                    format!("p{i:03}"),
                    Level::Paragraph,
                    vec![angle.cos(), angle.sin()],
                )
            })
            .collect()
    }

    fn built(store: Arc<InMemoryArtifactStore>) -> IndexDescriptor {
        let builder = IndexBuilder::new(BuilderConfig::new(2), store);
        builder
            .build_graph(
                Level::Paragraph,
                &records(),
                GraphParams::default().with_m(16).with_ef_construction(64),
            )
            .unwrap()
            .descriptor
    }

    #[test]
    fn knn_before_load_is_not_loaded() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let handle = IndexHandle::new(built(store));
        assert!(!handle.is_loaded());
        let err = handle
            .knn(&[1.0, 0.0], 3, &SearchOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotLoaded);
    }

    #[test]
    fn load_then_search() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let mut handle = IndexHandle::new(built(store.clone()));
        handle.load(&*store).unwrap();
        assert!(handle.is_loaded());
        let hits = handle
            .knn(&[1.0, 0.0], 3, &SearchOptions::default())
            .unwrap();
        assert_eq!(hits[0].id, "p000");
        assert_eq!(hits.len(), 3);

        handle.unload();
        assert!(!handle.is_loaded());
    }

    #[test]
    fn tampered_bytes_fail_digest() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let descriptor = built(store.clone());
        let mut bytes = store.get(&descriptor.location).unwrap().unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let mut handle = IndexHandle::new(descriptor);
        let err = handle.load_from_bytes(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DigestMismatch);
        assert!(!handle.is_loaded());
    }

    #[test]
    fn descriptor_disagreement_is_corrupt() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let mut descriptor = built(store.clone());
        descriptor.vector_count += 1;
        let mut handle = IndexHandle::new(descriptor);
        let err = handle.load(&*store).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn missing_artifact() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let descriptor = built(store.clone());
        store.remove(&descriptor.location);
        let mut handle = IndexHandle::new(descriptor);
        assert_eq!(
            handle.load(&*store).unwrap_err().kind(),
            ErrorKind::MissingArtifact
        );
    }
}
