use chrono::{DateTime, Utc};
use index::{digest_hex, ArtifactStore, IndexDescriptor, Level};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

use crate::{Compatibility, Manifest, ManifestConfig, ManifestError, ModelDescriptor, MANIFEST_FORMAT_VERSION};

/// A model artifact to bind into a manifest; its digest is computed from the
/// stored bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub name: String,
    pub version: String,
    pub level: Level,
    pub location: String,
    pub dimension: usize,
}

/// Everything a build contributes to its manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestInputs {
    pub revision: String,
    pub vector_dim: usize,
    pub models: Vec<ModelArtifact>,
    pub indices: Vec<IndexDescriptor>,
}

/// Combine build outputs into a manifest stamped with the current time.
pub fn generate(
    inputs: &ManifestInputs,
    store: &dyn ArtifactStore,
    config: &ManifestConfig,
) -> Result<Manifest, ManifestError> {
    generate_at(inputs, store, config, Utc::now())
}

/// [`generate`] with an explicit creation timestamp.
///
/// Digests are recomputed from the stored bytes. An index whose descriptor
/// already carries a digest must still match it, which catches artifacts
/// modified between build and manifest generation.
pub fn generate_at(
    inputs: &ManifestInputs,
    store: &dyn ArtifactStore,
    config: &ManifestConfig,
    created_at: DateTime<Utc>,
) -> Result<Manifest, ManifestError> {
    let dim = inputs.vector_dim;
    let mut levels = BTreeSet::new();
    let mut indices = Vec::with_capacity(inputs.indices.len());
    for descriptor in &inputs.indices {
        if descriptor.dimension != dim {
            return Err(ManifestError::DimensionInconsistent {
                location: descriptor.location.clone(),
                expected: dim,
                got: descriptor.dimension,
            });
        }
        if !levels.insert(descriptor.level) {
            return Err(ManifestError::SchemaInvalid(format!(
                "more than one {} index supplied",
                descriptor.level
            )));
        }
        let actual = stored_digest(store, &descriptor.location)?;
        if !descriptor.digest.is_empty() && descriptor.digest != actual {
            return Err(ManifestError::DigestMismatch {
                location: descriptor.location.clone(),
                expected: descriptor.digest.clone(),
                actual,
            });
        }
        indices.push(IndexDescriptor {
            digest: actual,
            ..descriptor.clone()
        });
    }

    let mut models = Vec::with_capacity(inputs.models.len());
    for model in &inputs.models {
        if model.dimension != dim {
            return Err(ManifestError::DimensionInconsistent {
                location: model.location.clone(),
                expected: dim,
                got: model.dimension,
            });
        }
        models.push(ModelDescriptor {
            name: model.name.clone(),
            version: model.version.clone(),
            level: model.level,
            location: model.location.clone(),
            dimension: model.dimension,
            digest: stored_digest(store, &model.location)?,
        });
    }

    let manifest = Manifest {
        format_version: MANIFEST_FORMAT_VERSION,
        revision: inputs.revision.clone(),
        created_at,
        models,
        indices,
        compatibility: Compatibility {
            vector_dim: dim,
            api_version: config.api_version,
        },
    };
    manifest.check_schema(config.api_version)?;
    info!(
        revision = %manifest.revision,
        indices = manifest.indices.len(),
        models = manifest.models.len(),
        "manifest_generated"
    );
    Ok(manifest)
}

fn stored_digest(store: &dyn ArtifactStore, location: &str) -> Result<String, ManifestError> {
    let bytes = store
        .get(location)?
        .ok_or_else(|| ManifestError::MissingArtifact(location.to_string()))?;
    Ok(digest_hex(&bytes))
}
