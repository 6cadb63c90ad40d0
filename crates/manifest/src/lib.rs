//! # Strata Manifest (`manifest`)
//!
//! A manifest binds one deployment generation together: the encoder models
//! that produced each level's vectors, the index built for each level, and a
//! compatibility contract (vector dimensionality, API version). Every
//! artifact is referenced by location plus SHA-256 digest.
//!
//! ## Lifecycle
//!
//! 1. [`generate`] combines build outputs with digests recomputed from the
//!    stored bytes.
//! 2. [`validate`] is the single gate in front of serving: schema, then
//!    artifact presence, then every digest. Partial trust is never granted.
//! 3. [`ManifestManager::activate`] validates, loads every index from the
//!    bytes it just verified, and atomically swaps the active generation.
//!    Older generations stay loaded for [`ManifestManager::rollback`] until
//!    [`ManifestManager::retire`]d.
//!
//! ```
//! use index::{BuilderConfig, GraphParams, IndexBuilder, InMemoryArtifactStore, Level, VectorRecord};
//! use manifest::{generate, ManifestConfig, ManifestInputs, ManifestManager};
//! use std::sync::Arc;
//!
//! let store = Arc::new(InMemoryArtifactStore::new());
//! let records: Vec<VectorRecord> = (0..16)
//!     .map(|i| {
//!         let a = i as f32 * 0.3;
//!         VectorRecord::new(format!("s{i}"), Level::Sentence, vec![a.cos(), a.sin()])
//!     })
//!     .collect();
//! let built = IndexBuilder::new(BuilderConfig::new(2), store.clone())
//!     .build_graph(Level::Sentence, &records, GraphParams::default())
//!     .unwrap();
//!
//! let config = ManifestConfig::default();
//! let inputs = ManifestInputs {
//!     revision: "v1".into(),
//!     vector_dim: 2,
//!     models: vec![],
//!     indices: vec![built.descriptor],
//! };
//! let manifest = generate(&inputs, &*store, &config).unwrap();
//!
//! let manager = ManifestManager::new(store.clone(), config);
//! manager.write_manifest(&manifest, "manifest.json").unwrap();
//! assert!(!manager.is_ready());
//! manager.activate("manifest.json").unwrap();
//! assert!(manager.is_ready());
//! ```

mod error;
mod generate;
mod manager;
mod schema;
mod validate;

use serde::{Deserialize, Serialize};

pub use crate::error::ManifestError;
pub use crate::generate::{generate, generate_at, ManifestInputs, ModelArtifact};
pub use crate::manager::{Generation, GenerationInfo, ManifestManager};
pub use crate::schema::{
    Compatibility, Manifest, ModelDescriptor, API_VERSION, MANIFEST_FORMAT_VERSION,
};
pub use crate::validate::validate;

/// Manifest-layer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    /// API version written into generated manifests and required of
    /// validated ones.
    pub api_version: u32,
    /// File name a build writes its manifest under.
    pub file_name: String,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            api_version: API_VERSION,
            file_name: "manifest.json".into(),
        }
    }
}

impl ManifestConfig {
    pub fn with_api_version(mut self, api_version: u32) -> Self {
        self.api_version = api_version;
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.file_name.trim().is_empty() {
            return Err(ManifestError::SchemaInvalid(
                "manifest file_name must not be empty".into(),
            ));
        }
        Ok(())
    }
}
