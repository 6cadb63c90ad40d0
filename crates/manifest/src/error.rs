use index::{ErrorKind, IndexError};
use thiserror::Error;

/// Errors raised while generating, validating, or activating a manifest.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ManifestError {
    #[error("manifest schema invalid: {0}")]
    SchemaInvalid(String),
    #[error("artifact `{0}` referenced by the manifest is missing")]
    MissingArtifact(String),
    #[error("digest mismatch for `{location}`: manifest says {expected}, artifact is {actual}")]
    DigestMismatch {
        location: String,
        expected: String,
        actual: String,
    },
    #[error("`{location}` has dimension {got}, manifest declares {expected}")]
    DimensionInconsistent {
        location: String,
        expected: usize,
        got: usize,
    },
    #[error("unknown manifest generation {0}")]
    UnknownGeneration(u64),
    #[error("generation {0} is active and cannot be retired")]
    ActiveGeneration(u64),
    #[error(transparent)]
    Index(#[from] IndexError),
}

impl ManifestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ManifestError::SchemaInvalid(_) => ErrorKind::SchemaInvalid,
            ManifestError::MissingArtifact(_) => ErrorKind::MissingArtifact,
            ManifestError::DigestMismatch { .. } => ErrorKind::DigestMismatch,
            ManifestError::DimensionInconsistent { .. } => ErrorKind::DimensionInconsistent,
            ManifestError::UnknownGeneration(_) => ErrorKind::UnknownGeneration,
            ManifestError::ActiveGeneration(_) => ErrorKind::InvalidParams,
            ManifestError::Index(e) => e.kind(),
        }
    }

    pub(crate) fn schema<E: std::fmt::Display>(err: E) -> Self {
        Self::SchemaInvalid(err.to_string())
    }
}
