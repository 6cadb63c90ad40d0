use chrono::{DateTime, Utc};
use index::{ArtifactStore, IndexHandle, IndexSet, Level, VectorIndex};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::{info, warn};

use crate::validate::verify;
use crate::{Manifest, ManifestConfig, ManifestError};

/// One validated manifest and the indices loaded from it.
#[derive(Debug)]
pub struct Generation {
    id: u64,
    location: String,
    manifest: Manifest,
    handles: BTreeMap<Level, Arc<IndexHandle>>,
    activated_at: DateTime<Utc>,
}

impl Generation {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn activated_at(&self) -> DateTime<Utc> {
        self.activated_at
    }

    pub fn handle(&self, level: Level) -> Option<&Arc<IndexHandle>> {
        self.handles.get(&level)
    }

    /// Loaded indices for query fan-out.
    pub fn index_set(&self) -> IndexSet {
        self.handles
            .iter()
            .filter(|(_, h)| h.is_loaded())
            .map(|(level, h)| (*level, h.clone() as Arc<dyn VectorIndex>))
            .collect()
    }
}

/// Summary row for operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationInfo {
    pub id: u64,
    pub revision: String,
    pub location: String,
    pub active: bool,
}

#[derive(Default)]
struct State {
    next_id: u64,
    generations: BTreeMap<u64, Arc<Generation>>,
    active: Option<u64>,
}

/// Owns manifest generations and the readiness flag.
///
/// Nothing is served until a manifest passes validation. A failed activation
/// or rollback leaves the current generation (if any) in place. Previously
/// activated generations stay loaded for rollback until retired.
pub struct ManifestManager {
    store: Arc<dyn ArtifactStore>,
    config: ManifestConfig,
    state: RwLock<State>,
}

impl ManifestManager {
    pub fn new(store: Arc<dyn ArtifactStore>, config: ManifestConfig) -> Self {
        Self {
            store,
            config,
            state: RwLock::new(State {
                next_id: 1,
                ..State::default()
            }),
        }
    }

    pub fn config(&self) -> &ManifestConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// True once some manifest generation has been validated and activated.
    pub fn is_ready(&self) -> bool {
        self.read_state().active.is_some()
    }

    pub fn active(&self) -> Option<Arc<Generation>> {
        let state = self.read_state();
        state
            .active
            .and_then(|id| state.generations.get(&id).cloned())
    }

    pub fn generations(&self) -> Vec<GenerationInfo> {
        let state = self.read_state();
        state
            .generations
            .values()
            .map(|g| GenerationInfo {
                id: g.id,
                revision: g.manifest.revision.clone(),
                location: g.location.clone(),
                active: state.active == Some(g.id),
            })
            .collect()
    }

    /// Persist `manifest` as pretty JSON at `location`.
    pub fn write_manifest(&self, manifest: &Manifest, location: &str) -> Result<(), ManifestError> {
        self.store.put(location, &manifest.to_json()?)?;
        Ok(())
    }

    /// Read, validate, and load the manifest at `location`, then make it the
    /// active generation.
    pub fn activate(&self, location: &str) -> Result<Arc<Generation>, ManifestError> {
        let start = Instant::now();
        let span = tracing::span!(tracing::Level::INFO, "manifest.activate", location = %location);
        let _guard = span.enter();

        match self.load_generation(location) {
            Ok((manifest, handles)) => {
                let generation = {
                    let mut state = self.write_state();
                    let id = state.next_id;
                    state.next_id += 1;
                    let generation = Arc::new(Generation {
                        id,
                        location: location.to_string(),
                        manifest,
                        handles,
                        activated_at: Utc::now(),
                    });
                    state.generations.insert(id, generation.clone());
                    state.active = Some(id);
                    generation
                };
                info!(
                    generation = generation.id,
                    revision = %generation.manifest.revision,
                    elapsed_micros = start.elapsed().as_micros(),
                    "manifest_activated"
                );
                Ok(generation)
            }
            Err(err) => {
                warn!(
                    error = %err,
                    kind = ?err.kind(),
                    still_active = ?self.read_state().active,
                    elapsed_micros = start.elapsed().as_micros(),
                    "manifest_activation_failure"
                );
                Err(err)
            }
        }
    }

    /// Re-validate a previously activated generation and make it active again.
    pub fn rollback(&self, id: u64) -> Result<Arc<Generation>, ManifestError> {
        let span = tracing::span!(tracing::Level::INFO, "manifest.rollback", generation = id);
        let _guard = span.enter();

        let generation = self
            .read_state()
            .generations
            .get(&id)
            .cloned()
            .ok_or(ManifestError::UnknownGeneration(id))?;

        if let Err(err) = verify(&generation.manifest, self.store.as_ref(), &self.config) {
            warn!(error = %err, kind = ?err.kind(), "manifest_rollback_failure");
            return Err(err);
        }

        let mut state = self.write_state();
        if !state.generations.contains_key(&id) {
            return Err(ManifestError::UnknownGeneration(id));
        }
        state.active = Some(id);
        info!(revision = %generation.manifest.revision, "manifest_rolled_back");
        Ok(generation)
    }

    /// Forget a non-active generation and release its indices.
    pub fn retire(&self, id: u64) -> Result<(), ManifestError> {
        let mut state = self.write_state();
        if state.active == Some(id) {
            return Err(ManifestError::ActiveGeneration(id));
        }
        state
            .generations
            .remove(&id)
            .ok_or(ManifestError::UnknownGeneration(id))?;
        info!(generation = id, "manifest_retired");
        Ok(())
    }

    #[allow(clippy::type_complexity)]
    fn load_generation(
        &self,
        location: &str,
    ) -> Result<(Manifest, BTreeMap<Level, Arc<IndexHandle>>), ManifestError> {
        let bytes = self
            .store
            .get(location)?
            .ok_or_else(|| ManifestError::MissingArtifact(location.to_string()))?;
        let manifest = Manifest::from_json(&bytes)?;
        let mut verified = verify(&manifest, self.store.as_ref(), &self.config)?;

        let mut handles = BTreeMap::new();
        for descriptor in &manifest.indices {
            let bytes = verified
                .remove(&descriptor.level)
                .ok_or_else(|| ManifestError::MissingArtifact(descriptor.location.clone()))?;
            let mut handle = IndexHandle::new(descriptor.clone());
            handle.load_from_bytes(&bytes)?;
            handles.insert(descriptor.level, Arc::new(handle));
        }
        Ok((manifest, handles))
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
