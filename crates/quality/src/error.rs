use index::{ErrorKind, Level};
use thiserror::Error;

/// Errors returned while computing quality metrics.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QualityError {
    #[error("invalid quality config: {0}")]
    InvalidConfig(String),

    #[error("{metric} sample is empty")]
    EmptySample { metric: &'static str },

    #[error("child {child} has no parent vector at level {level}")]
    MissingParent { child: String, level: Level },

    #[error("vector {id} has dimension {got}, expected {expected}")]
    DimensionMismatch {
        id: String,
        expected: usize,
        got: usize,
    },

    #[error("id {id} appears more than once at level {level}")]
    DuplicateId { id: String, level: Level },

    #[error("levels {child} and {parent} are not adjacent")]
    NotAdjacent { child: Level, parent: Level },

    #[error("record {id} is at level {got}, expected {expected}")]
    LevelMismatch {
        id: String,
        expected: Level,
        got: Level,
    },
}

impl QualityError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QualityError::InvalidConfig(_)
            | QualityError::NotAdjacent { .. }
            | QualityError::LevelMismatch { .. } => ErrorKind::InvalidParams,
            QualityError::EmptySample { .. } => ErrorKind::EmptySample,
            QualityError::MissingParent { .. } => ErrorKind::MissingParent,
            QualityError::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            QualityError::DuplicateId { .. } => ErrorKind::DuplicateId,
        }
    }
}
