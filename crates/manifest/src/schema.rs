//! Versioned manifest document.
//!
//! The schema is closed: unknown fields are rejected at every level, and a
//! field may only be added together with a [`MANIFEST_FORMAT_VERSION`] bump.

use chrono::{DateTime, Utc};
use index::{is_digest, IndexDescriptor, Level};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::ManifestError;

pub const MANIFEST_FORMAT_VERSION: u32 = 1;
/// Query API / schema version this build of the service speaks.
pub const API_VERSION: u32 = 1;

/// The encoder artifact that produced one level's vectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelDescriptor {
    pub name: String,
    pub version: String,
    pub level: Level,
    pub location: String,
    pub dimension: usize,
    pub digest: String,
}

/// Contract every referenced artifact must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Compatibility {
    pub vector_dim: usize,
    pub api_version: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub format_version: u32,
    /// Source-control revision the artifacts were built from.
    pub revision: String,
    pub created_at: DateTime<Utc>,
    pub models: Vec<ModelDescriptor>,
    pub indices: Vec<IndexDescriptor>,
    pub compatibility: Compatibility,
}

impl Manifest {
    /// Parse a manifest document.
    ///
    /// The format version is checked before the full parse so a newer
    /// document is reported as unsupported rather than as having unknown
    /// fields.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ManifestError> {
        let value: serde_json::Value = serde_json::from_slice(bytes).map_err(ManifestError::schema)?;
        match value.get("format_version").and_then(|v| v.as_u64()) {
            Some(v) if v == MANIFEST_FORMAT_VERSION as u64 => {}
            Some(v) => {
                return Err(ManifestError::SchemaInvalid(format!(
                    "unsupported format_version {v}"
                )))
            }
            None => {
                return Err(ManifestError::SchemaInvalid(
                    "missing numeric format_version".into(),
                ))
            }
        }
        serde_json::from_value(value).map_err(ManifestError::schema)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, ManifestError> {
        serde_json::to_vec_pretty(self).map_err(ManifestError::schema)
    }

    pub fn index(&self, level: Level) -> Option<&IndexDescriptor> {
        self.indices.iter().find(|d| d.level == level)
    }

    /// Every artifact location, indices first, in document order.
    pub fn artifact_locations(&self) -> impl Iterator<Item = (&str, &str)> {
        self.indices
            .iter()
            .map(|d| (d.location.as_str(), d.digest.as_str()))
            .chain(
                self.models
                    .iter()
                    .map(|m| (m.location.as_str(), m.digest.as_str())),
            )
    }

    /// Structural checks that need no artifact access.
    pub fn check_schema(&self, api_version: u32) -> Result<(), ManifestError> {
        if self.format_version != MANIFEST_FORMAT_VERSION {
            return Err(ManifestError::SchemaInvalid(format!(
                "unsupported format_version {}",
                self.format_version
            )));
        }
        if self.compatibility.api_version != api_version {
            return Err(ManifestError::SchemaInvalid(format!(
                "api_version {} is not supported (expected {api_version})",
                self.compatibility.api_version
            )));
        }
        if self.revision.trim().is_empty() {
            return Err(ManifestError::schema("revision must not be empty"));
        }
        if self.compatibility.vector_dim == 0 {
            return Err(ManifestError::schema("vector_dim must be positive"));
        }
        if self.indices.is_empty() {
            return Err(ManifestError::schema("manifest lists no indices"));
        }

        let dim = self.compatibility.vector_dim;
        let mut levels = BTreeSet::new();
        for d in &self.indices {
            if !levels.insert(d.level) {
                return Err(ManifestError::SchemaInvalid(format!(
                    "level {} is listed twice",
                    d.level
                )));
            }
            if d.algorithm != d.params.algorithm() {
                return Err(ManifestError::SchemaInvalid(format!(
                    "{} index declares algorithm {} but {} params",
                    d.level,
                    d.algorithm,
                    d.params.algorithm()
                )));
            }
            d.params
                .validate(d.dimension)
                .map_err(|e| ManifestError::SchemaInvalid(format!("{} index: {e}", d.level)))?;
            if d.dimension != dim {
                return Err(ManifestError::SchemaInvalid(format!(
                    "{} index dimension {} disagrees with vector_dim {dim}",
                    d.level, d.dimension
                )));
            }
            check_artifact(&d.location, &d.digest)?;
        }
        for m in &self.models {
            if m.name.is_empty() || m.version.is_empty() {
                return Err(ManifestError::schema("model name and version are required"));
            }
            if m.dimension != dim {
                return Err(ManifestError::SchemaInvalid(format!(
                    "model {} dimension {} disagrees with vector_dim {dim}",
                    m.name, m.dimension
                )));
            }
            check_artifact(&m.location, &m.digest)?;
        }
        Ok(())
    }
}

fn check_artifact(location: &str, digest: &str) -> Result<(), ManifestError> {
    if location.is_empty() {
        return Err(ManifestError::schema("artifact location must not be empty"));
    }
    if !is_digest(digest) {
        return Err(ManifestError::SchemaInvalid(format!(
            "`{location}` digest is not 64 lowercase hex characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use index::{digest_hex, Algorithm, GraphParams, IndexParams};

    fn sample() -> Manifest {
        Manifest {
            format_version: MANIFEST_FORMAT_VERSION,
            revision: "abc123".into(),
            created_at: DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
                .unwrap()
                .with_timezone(&Utc),
            models: vec![ModelDescriptor {
                name: "encoder".into(),
                version: "1.0".into(),
                level: Level::Sentence,
                location: "models/encoder.bin".into(),
                dimension: 8,
                digest: digest_hex(b"model"),
            }],
            indices: vec![IndexDescriptor {
                level: Level::Sentence,
                algorithm: Algorithm::Graph,
                params: IndexParams::Graph(GraphParams::default()),
                dimension: 8,
                vector_count: 10,
                digest: digest_hex(b"index"),
                location: "sentence.idx".into(),
            }],
            compatibility: Compatibility {
                vector_dim: 8,
                api_version: API_VERSION,
            },
        }
    }

    #[test]
    fn json_roundtrip() {
        let manifest = sample();
        let bytes = manifest.to_json().unwrap();
        assert_eq!(Manifest::from_json(&bytes).unwrap(), manifest);
        manifest.check_schema(API_VERSION).unwrap();
    }

    #[test]
    fn unknown_fields_rejected() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value["extra"] = serde_json::json!(1);
        let err = Manifest::from_json(&serde_json::to_vec(&value).unwrap()).unwrap_err();
        assert_eq!(err.kind(), index::ErrorKind::SchemaInvalid);

        let mut value = serde_json::to_value(sample()).unwrap();
        value["indices"][0]["shard"] = serde_json::json!(0);
        assert!(Manifest::from_json(&serde_json::to_vec(&value).unwrap()).is_err());
    }

    #[test]
    fn newer_format_is_unsupported() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value["format_version"] = serde_json::json!(2);
        value["new_section"] = serde_json::json!({});
        let err = Manifest::from_json(&serde_json::to_vec(&value).unwrap()).unwrap_err();
        assert!(err.to_string().contains("unsupported format_version 2"));
    }

    #[test]
    fn structural_rules() {
        let mut m = sample();
        m.indices.push(m.indices[0].clone());
        assert!(m.check_schema(API_VERSION).is_err());

        let mut m = sample();
        m.indices[0].algorithm = Algorithm::IvfPq;
        assert!(m.check_schema(API_VERSION).is_err());

        let mut m = sample();
        m.indices[0].digest = "nothex".into();
        assert!(m.check_schema(API_VERSION).is_err());

        let mut m = sample();
        m.revision = " ".into();
        assert!(m.check_schema(API_VERSION).is_err());

        assert!(sample().check_schema(API_VERSION + 1).is_err());

        let mut m = sample();
        m.models[0].dimension = 4;
        assert!(m.check_schema(API_VERSION).is_err());
    }
}
