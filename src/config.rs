//! YAML configuration for a Strata deployment.
//!
//! One document configures every component. Each section converts into the
//! explicit config struct its component takes at construction; nothing reads
//! configuration globally.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "docs-search"
//! dimension: 384
//!
//! storage:
//!   backend:
//!     kind: filesystem
//!     root: /var/lib/strata
//!   prefix: "gen-7"
//!   compression:
//!     codec: zstd
//!     level: 3
//!
//! levels:
//!   sentence:
//!     algorithm: graph
//!     m: 32
//!     ef_construction: 200
//!     ef_search: 64
//!     seed: 42
//!   paragraph:
//!     algorithm: graph
//!     m: 16
//!     ef_construction: 128
//!     ef_search: 48
//!     seed: 42
//!   document:
//!     algorithm: ivf_pq
//!     nlist: 64
//!     nprobe: 8
//!     m: 16
//!     nbits: 8
//!     seed: 42
//!
//! router:
//!   kappa: 60.0
//!   level_timeout: 250
//!   default_k: 10
//!
//! quality:
//!   max_samples: 5000
//!   fail_on_warning: false
//!   coherence: { target: 0.8, warning: 0.7, critical: 0.5 }
//!   stability: { warning_drift: 0.05, max_drift: 0.15 }
//!
//! manifest:
//!   api_version: 1
//!   file_name: manifest.json
//!
//! telemetry:
//!   log_level: info
//!   json: true
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use index::{
    ArtifactStore, BuilderConfig, CompressionConfig, ErrorKind, IndexError, IndexParams, Level,
    StoreConfig,
};
use manifest::ManifestConfig;
use quality::{QualityConfig, QualityGate};
use router::RouterConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::telemetry::TelemetryConfig;

/// Errors that can occur when loading YAML configuration files.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

impl ConfigLoadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConfigLoadError::FileRead(_) => ErrorKind::Io,
            _ => ErrorKind::InvalidParams,
        }
    }
}

/// Top-level YAML configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct StrataConfig {
    /// Configuration format version.
    pub version: String,

    #[serde(default)]
    pub name: Option<String>,

    /// Vector dimensionality shared by every level, model, and query.
    pub dimension: usize,

    #[serde(default)]
    pub storage: StorageSection,

    /// Index parameters per level. Levels absent here are not built.
    pub levels: BTreeMap<Level, IndexParams>,

    #[serde(default)]
    pub router: RouterConfig,

    #[serde(default)]
    pub quality: QualitySection,

    #[serde(default)]
    pub manifest: ManifestConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Where artifacts are written and how index files are encoded.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageSection {
    pub backend: StoreConfig,
    /// Store-relative directory for this generation's files.
    pub prefix: String,
    pub compression: CompressionConfig,
}

/// Quality thresholds plus the acceptance rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QualitySection {
    #[serde(flatten)]
    pub metrics: QualityConfig,
    pub fail_on_warning: bool,
}

impl StrataConfig {
    /// A config with the given dimension and level parameters and defaults
    /// everywhere else.
    pub fn new(dimension: usize, levels: BTreeMap<Level, IndexParams>) -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            dimension,
            storage: StorageSection::default(),
            levels,
            router: RouterConfig::default(),
            quality: QualitySection::default(),
            manifest: ManifestConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }

    /// Load a YAML configuration file from the given path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate YAML configuration from a string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: StrataConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigLoadError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        if self.dimension == 0 {
            return Err(ConfigLoadError::Validation(
                "dimension must be >= 1".to_string(),
            ));
        }
        self.storage
            .compression
            .validate()
            .map_err(|e| section_error("storage.compression", e))?;

        if self.levels.is_empty() {
            return Err(ConfigLoadError::Validation(
                "levels must configure at least one level".to_string(),
            ));
        }
        for (level, params) in &self.levels {
            params
                .validate(self.dimension)
                .map_err(|e| section_error(&format!("levels.{level}"), e))?;
        }

        self.router
            .validate()
            .map_err(|e| section_error("router", e))?;
        self.quality
            .metrics
            .validate()
            .map_err(|e| section_error("quality", e))?;
        self.manifest
            .validate()
            .map_err(|e| section_error("manifest", e))?;
        self.telemetry.validate()?;
        Ok(())
    }

    pub fn builder_config(&self) -> BuilderConfig {
        BuilderConfig::new(self.dimension)
            .with_compression(self.storage.compression)
            .with_prefix(self.storage.prefix.clone())
    }

    pub fn open_store(&self) -> Result<Arc<dyn ArtifactStore>, IndexError> {
        self.storage.backend.build()
    }

    pub fn quality_gate(&self) -> QualityGate {
        QualityGate::new(self.quality.fail_on_warning)
    }

    /// Store-relative location of this generation's manifest.
    pub fn manifest_location(&self) -> String {
        let prefix = self.storage.prefix.trim_end_matches('/');
        if prefix.is_empty() {
            self.manifest.file_name.clone()
        } else {
            format!("{prefix}/{}", self.manifest.file_name)
        }
    }
}

fn section_error(section: &str, err: impl std::fmt::Display) -> ConfigLoadError {
    ConfigLoadError::Validation(format!("{section}: {err}"))
}
