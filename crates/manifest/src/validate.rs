use index::{digest_hex, ArtifactStore, Level};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{info, warn};

use crate::{Manifest, ManifestConfig, ManifestError};

/// Check `manifest` against the artifacts in `store`.
///
/// Checks run in a fixed order (schema, presence of every artifact, then
/// every digest) and the first failure rejects the whole manifest.
pub fn validate(
    manifest: &Manifest,
    store: &dyn ArtifactStore,
    config: &ManifestConfig,
) -> Result<(), ManifestError> {
    verify(manifest, store, config).map(|_| ())
}

/// [`validate`], returning the verified index bytes keyed by level so the
/// caller can load exactly what was digested.
pub(crate) fn verify(
    manifest: &Manifest,
    store: &dyn ArtifactStore,
    config: &ManifestConfig,
) -> Result<BTreeMap<Level, Vec<u8>>, ManifestError> {
    let start = Instant::now();
    let span = tracing::span!(
        tracing::Level::INFO,
        "manifest.validate",
        revision = %manifest.revision
    );
    let _guard = span.enter();

    match verify_inner(manifest, store, config) {
        Ok(bytes) => {
            info!(
                artifacts = manifest.indices.len() + manifest.models.len(),
                elapsed_micros = start.elapsed().as_micros(),
                "manifest_validate_success"
            );
            Ok(bytes)
        }
        Err(err) => {
            warn!(
                error = %err,
                kind = ?err.kind(),
                elapsed_micros = start.elapsed().as_micros(),
                "manifest_validate_failure"
            );
            Err(err)
        }
    }
}

fn verify_inner(
    manifest: &Manifest,
    store: &dyn ArtifactStore,
    config: &ManifestConfig,
) -> Result<BTreeMap<Level, Vec<u8>>, ManifestError> {
    manifest.check_schema(config.api_version)?;

    for (location, _) in manifest.artifact_locations() {
        if !store.exists(location)? {
            return Err(ManifestError::MissingArtifact(location.to_string()));
        }
    }

    let mut index_bytes = BTreeMap::new();
    for descriptor in &manifest.indices {
        let bytes = read_checked(store, &descriptor.location, &descriptor.digest)?;
        index_bytes.insert(descriptor.level, bytes);
    }
    for model in &manifest.models {
        read_checked(store, &model.location, &model.digest)?;
    }
    Ok(index_bytes)
}

fn read_checked(
    store: &dyn ArtifactStore,
    location: &str,
    expected: &str,
) -> Result<Vec<u8>, ManifestError> {
    let bytes = store
        .get(location)?
        .ok_or_else(|| ManifestError::MissingArtifact(location.to_string()))?;
    let actual = digest_hex(&bytes);
    if actual != expected {
        return Err(ManifestError::DigestMismatch {
            location: location.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{generate, ManifestInputs, ModelArtifact};
    use index::{Algorithm, ErrorKind, GraphParams, IndexDescriptor, IndexParams, InMemoryArtifactStore};

    fn setup() -> (InMemoryArtifactStore, Manifest) {
        let store = InMemoryArtifactStore::new();
        store.put("paragraph.idx", b"paragraph index").unwrap();
        store.put("models/enc.bin", b"weights").unwrap();
        let inputs = ManifestInputs {
            revision: "deadbeef".into(),
            vector_dim: 16,
            models: vec![ModelArtifact {
                name: "enc".into(),
                version: "1".into(),
                level: Level::Paragraph,
                location: "models/enc.bin".into(),
                dimension: 16,
            }],
            indices: vec![IndexDescriptor {
                level: Level::Paragraph,
                algorithm: Algorithm::Graph,
                params: IndexParams::Graph(GraphParams::default()),
                dimension: 16,
                vector_count: 1,
                digest: String::new(),
                location: "paragraph.idx".into(),
            }],
        };
        let manifest = generate(&inputs, &store, &ManifestConfig::default()).unwrap();
        (store, manifest)
    }

    #[test]
    fn untouched_artifacts_pass() {
        let (store, manifest) = setup();
        validate(&manifest, &store, &ManifestConfig::default()).unwrap();
    }

    #[test]
    fn any_mutated_artifact_fails_with_digest_mismatch() {
        for location in ["paragraph.idx", "models/enc.bin"] {
            let (store, manifest) = setup();
            let mut bytes = store.get(location).unwrap().unwrap();
            bytes[0] ^= 0x80;
            store.put(location, &bytes).unwrap();
            let err = validate(&manifest, &store, &ManifestConfig::default()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::DigestMismatch, "{location}");
        }
    }

    #[test]
    fn missing_artifact_wins_over_digest() {
        let (store, manifest) = setup();
        store.put("paragraph.idx", b"tampered").unwrap();
        store.remove("models/enc.bin");
        let err = validate(&manifest, &store, &ManifestConfig::default()).unwrap_err();
        assert_eq!(err, ManifestError::MissingArtifact("models/enc.bin".into()));
    }

    #[test]
    fn schema_is_checked_first() {
        let (store, mut manifest) = setup();
        manifest.compatibility.api_version = 99;
        store.remove("paragraph.idx");
        let err = validate(&manifest, &store, &ManifestConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaInvalid);
    }
}
