use index::{ErrorKind, IndexError, Level};
use manifest::ManifestError;
use quality::QualityError;
use router::RouteError;
use thiserror::Error;

use crate::config::ConfigLoadError;

/// Errors surfaced by the build pipeline and the retrieval service.
#[derive(Debug, Error)]
pub enum StrataError {
    #[error(transparent)]
    Config(#[from] ConfigLoadError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Quality(#[from] QualityError),

    #[error("service is not ready: no manifest generation is active")]
    NotReady,

    #[error("no index parameters configured for level {0}")]
    MissingLevelParams(Level),

    #[error("level {0} appears more than once in the build plan")]
    DuplicateLevel(Level),

    #[error("artifact `{0}` already exists; build the generation under a new storage prefix")]
    ArtifactExists(String),
}

impl StrataError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StrataError::Config(e) => e.kind(),
            StrataError::Index(e) => e.kind(),
            StrataError::Manifest(e) => e.kind(),
            StrataError::Route(e) => e.kind(),
            StrataError::Quality(e) => e.kind(),
            StrataError::NotReady => ErrorKind::NotReady,
            StrataError::MissingLevelParams(_)
            | StrataError::DuplicateLevel(_)
            | StrataError::ArtifactExists(_) => ErrorKind::InvalidParams,
        }
    }
}
