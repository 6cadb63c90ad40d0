use bincode::error::{DecodeError, EncodeError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Level;

/// Stable classification shared by every Strata error type.
///
/// Concrete error enums carry context (paths, sizes, ids); `ErrorKind` is
/// what callers match on when they only care about the failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DimensionMismatch,
    InsufficientTrainingData,
    DigestMismatch,
    MissingArtifact,
    SchemaInvalid,
    NotLoaded,
    LevelTimeout,
    DimensionInconsistent,
    InvalidParams,
    NotNormalized,
    DuplicateId,
    Corrupt,
    Io,
    UnknownGeneration,
    NoLevelsAvailable,
    NotReady,
    EmptySample,
    MissingParent,
}

/// Errors raised while building, persisting, loading, or searching an index.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("insufficient training data: need at least {required} vectors, got {got}")]
    InsufficientTrainingData { required: usize, got: usize },
    #[error("invalid index params: {0}")]
    InvalidParams(String),
    #[error("vector `{id}` is not unit length (norm {norm})")]
    NotNormalized { id: String, norm: f32 },
    #[error("duplicate record id `{0}`")]
    DuplicateId(String),
    #[error("{level} index is not loaded")]
    NotLoaded { level: Level },
    #[error("digest mismatch for `{location}`: expected {expected}, got {actual}")]
    DigestMismatch {
        location: String,
        expected: String,
        actual: String,
    },
    #[error("artifact `{0}` not found")]
    MissingArtifact(String),
    #[error("corrupt index artifact: {0}")]
    Corrupt(String),
    #[error("storage error: {0}")]
    Io(String),
}

impl IndexError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IndexError::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            IndexError::InsufficientTrainingData { .. } => ErrorKind::InsufficientTrainingData,
            IndexError::InvalidParams(_) => ErrorKind::InvalidParams,
            IndexError::NotNormalized { .. } => ErrorKind::NotNormalized,
            IndexError::DuplicateId(_) => ErrorKind::DuplicateId,
            IndexError::NotLoaded { .. } => ErrorKind::NotLoaded,
            IndexError::DigestMismatch { .. } => ErrorKind::DigestMismatch,
            IndexError::MissingArtifact(_) => ErrorKind::MissingArtifact,
            IndexError::Corrupt(_) => ErrorKind::Corrupt,
            IndexError::Io(_) => ErrorKind::Io,
        }
    }

    pub fn invalid<E: std::fmt::Display>(err: E) -> Self {
        Self::InvalidParams(err.to_string())
    }
}

impl From<EncodeError> for IndexError {
    fn from(e: EncodeError) -> Self {
        IndexError::Corrupt(format!("encode: {e}"))
    }
}

impl From<DecodeError> for IndexError {
    fn from(e: DecodeError) -> Self {
        IndexError::Corrupt(format!("decode: {e}"))
    }
}

impl From<std::io::Error> for IndexError {
    fn from(e: std::io::Error) -> Self {
        IndexError::Io(e.to_string())
    }
}
