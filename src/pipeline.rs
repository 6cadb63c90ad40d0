//! Build one deployment generation: every level's index, then the manifest
//! that binds them.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use index::{ArtifactStore, BuiltIndex, IndexBuilder, IndexParams, Level, VectorRecord};
use manifest::{generate, Manifest, ManifestInputs, ModelArtifact};
use tracing::{info, warn};

use crate::config::StrataConfig;
use crate::error::StrataError;

/// Vectors for one level.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelInput {
    pub level: Level,
    pub records: Vec<VectorRecord>,
    /// IVF-PQ training sample; the records themselves are used when absent.
    pub training_sample: Option<Vec<Vec<f32>>>,
    /// Overrides the level's parameters from [`StrataConfig::levels`].
    pub params: Option<IndexParams>,
}

impl LevelInput {
    pub fn new(level: Level, records: Vec<VectorRecord>) -> Self {
        Self {
            level,
            records,
            training_sample: None,
            params: None,
        }
    }

    pub fn with_training_sample(mut self, sample: Vec<Vec<f32>>) -> Self {
        self.training_sample = Some(sample);
        self
    }

    pub fn with_params(mut self, params: IndexParams) -> Self {
        self.params = Some(params);
        self
    }
}

/// Everything one build consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildPlan {
    /// Source-control revision recorded in the manifest.
    pub revision: String,
    pub models: Vec<ModelArtifact>,
    pub levels: Vec<LevelInput>,
}

impl BuildPlan {
    pub fn new(revision: impl Into<String>) -> Self {
        Self {
            revision: revision.into(),
            models: Vec::new(),
            levels: Vec::new(),
        }
    }

    pub fn with_model(mut self, model: ModelArtifact) -> Self {
        self.models.push(model);
        self
    }

    pub fn with_level(mut self, input: LevelInput) -> Self {
        self.levels.push(input);
        self
    }
}

/// Output of [`build_generation`].
#[derive(Debug)]
pub struct GenerationBuild {
    pub manifest: Manifest,
    /// Where the manifest was written; pass this to activation.
    pub manifest_location: String,
    pub indices: BTreeMap<Level, BuiltIndex>,
}

/// Build every level in `plan`, generate the manifest, and write it.
///
/// A failure at any level aborts the build before a manifest is written, so
/// a half-built generation can never be activated. Artifacts already present
/// under the configured prefix are never overwritten: each generation needs
/// its own prefix so earlier manifests stay valid for rollback.
pub fn build_generation(
    plan: &BuildPlan,
    store: Arc<dyn ArtifactStore>,
    config: &StrataConfig,
) -> Result<GenerationBuild, StrataError> {
    let span = tracing::span!(
        tracing::Level::INFO,
        "strata.build_generation",
        revision = %plan.revision,
        levels = plan.levels.len()
    );
    let _guard = span.enter();
    let start = Instant::now();

    match build_inner(plan, store, config) {
        Ok(output) => {
            info!(
                manifest = %output.manifest_location,
                levels = output.indices.len(),
                elapsed_micros = start.elapsed().as_micros(),
                "generation_built"
            );
            Ok(output)
        }
        Err(err) => {
            warn!(
                error = %err,
                kind = ?err.kind(),
                elapsed_micros = start.elapsed().as_micros(),
                "generation_build_failure"
            );
            Err(err)
        }
    }
}

fn build_inner(
    plan: &BuildPlan,
    store: Arc<dyn ArtifactStore>,
    config: &StrataConfig,
) -> Result<GenerationBuild, StrataError> {
    config.validate()?;

    let mut seen = BTreeSet::new();
    for input in &plan.levels {
        if !seen.insert(input.level) {
            return Err(StrataError::DuplicateLevel(input.level));
        }
    }

    let builder_config = config.builder_config();
    let manifest_location = config.manifest_location();
    let targets = plan
        .levels
        .iter()
        .map(|input| builder_config.location(input.level))
        .chain(std::iter::once(manifest_location.clone()));
    for location in targets {
        if store.exists(&location)? {
            return Err(StrataError::ArtifactExists(location));
        }
    }

    let builder = IndexBuilder::new(builder_config, Arc::clone(&store));
    let mut indices = BTreeMap::new();
    for input in &plan.levels {
        let params = match input.params {
            Some(params) => params,
            None => *config
                .levels
                .get(&input.level)
                .ok_or(StrataError::MissingLevelParams(input.level))?,
        };
        let built = builder.build(
            input.level,
            &input.records,
            input.training_sample.as_deref(),
            params,
        )?;
        indices.insert(input.level, built);
    }

    let inputs = ManifestInputs {
        revision: plan.revision.clone(),
        vector_dim: config.dimension,
        models: plan.models.clone(),
        indices: indices.values().map(|b| b.descriptor.clone()).collect(),
    };
    let manifest = generate(&inputs, store.as_ref(), &config.manifest)?;
    store.put(&manifest_location, &manifest.to_json()?)?;

    Ok(GenerationBuild {
        manifest,
        manifest_location,
        indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use index::{ErrorKind, GraphParams, InMemoryArtifactStore};

    fn records(level: Level, n: usize) -> Vec<VectorRecord> {
        (0..n)
            .map(|i| {
                let a = i as f32 * 0.37;
                VectorRecord::new(format!("{level}-{i:03}"), level, vec![a.cos(), a.sin()])
            })
            .collect()
    }

    fn config() -> StrataConfig {
        let mut levels = BTreeMap::new();
        levels.insert(Level::Sentence, IndexParams::Graph(GraphParams::default()));
        levels.insert(Level::Paragraph, IndexParams::Graph(GraphParams::default()));
        StrataConfig::new(2, levels)
    }

    #[test]
    fn builds_levels_and_writes_manifest() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let plan = BuildPlan::new("rev-1")
            .with_level(LevelInput::new(Level::Sentence, records(Level::Sentence, 30)))
            .with_level(LevelInput::new(Level::Paragraph, records(Level::Paragraph, 10)));
        let output = build_generation(&plan, store.clone(), &config()).unwrap();

        assert_eq!(output.manifest.indices.len(), 2);
        assert_eq!(output.manifest_location, "manifest.json");
        assert!(store.exists("manifest.json").unwrap());
        assert!(store.exists("sentence.idx").unwrap());
        assert!(store.exists("paragraph.idx").unwrap());
    }

    #[test]
    fn level_without_params_is_rejected() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let plan = BuildPlan::new("rev-1")
            .with_level(LevelInput::new(Level::Document, records(Level::Document, 10)));
        let err = build_generation(&plan, store.clone(), &config()).unwrap_err();
        assert!(matches!(err, StrataError::MissingLevelParams(Level::Document)));
        assert!(!store.exists("manifest.json").unwrap());
    }

    #[test]
    fn duplicate_level_is_rejected() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let plan = BuildPlan::new("rev-1")
            .with_level(LevelInput::new(Level::Sentence, records(Level::Sentence, 5)))
            .with_level(LevelInput::new(Level::Sentence, records(Level::Sentence, 5)));
        let err = build_generation(&plan, store, &config()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParams);
    }

    #[test]
    fn rebuild_under_same_prefix_is_refused() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let plan = BuildPlan::new("rev-1")
            .with_level(LevelInput::new(Level::Sentence, records(Level::Sentence, 20)));
        build_generation(&plan, store.clone(), &config()).unwrap();
        let manifest_before = store.get("manifest.json").unwrap().unwrap();
        let index_before = store.get("sentence.idx").unwrap().unwrap();

        let mut shifted = records(Level::Sentence, 20);
        shifted.reverse();
        let again = BuildPlan::new("rev-2").with_level(LevelInput::new(Level::Sentence, shifted));
        let err = build_generation(&again, store.clone(), &config()).unwrap_err();
        assert!(matches!(err, StrataError::ArtifactExists(ref l) if l == "sentence.idx"));
        assert_eq!(err.kind(), ErrorKind::InvalidParams);
        assert_eq!(store.get("manifest.json").unwrap().unwrap(), manifest_before);
        assert_eq!(store.get("sentence.idx").unwrap().unwrap(), index_before);

        // A stale manifest alone also blocks the prefix.
        store.remove("sentence.idx");
        let err = build_generation(&again, store.clone(), &config()).unwrap_err();
        assert!(matches!(err, StrataError::ArtifactExists(ref l) if l == "manifest.json"));
        assert!(!store.exists("sentence.idx").unwrap());
    }

    #[test]
    fn failed_level_writes_no_manifest() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let mut bad = records(Level::Paragraph, 5);
        bad[2].values = vec![1.0, 0.0, 0.0];
        let plan = BuildPlan::new("rev-1")
            .with_level(LevelInput::new(Level::Sentence, records(Level::Sentence, 5)))
            .with_level(LevelInput::new(Level::Paragraph, bad));
        let err = build_generation(&plan, store.clone(), &config()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DimensionMismatch);
        assert!(!store.exists("manifest.json").unwrap());
    }
}
