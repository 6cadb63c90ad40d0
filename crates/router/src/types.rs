use index::{ErrorKind, Level, Neighbor, SearchOptions};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_KAPPA: f64 = 60.0;
pub const DEFAULT_LEVEL_TIMEOUT: Duration = Duration::from_millis(250);
pub const DEFAULT_K: usize = 10;

/// How per-level hit lists are merged.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FusionMethod {
    /// Reciprocal rank fusion: `Σ 1 / (rank + κ)` over the levels an id
    /// appears in, ranks 0-indexed.
    #[default]
    Rrf,
    /// Maximum raw similarity across levels.
    MaxSim,
}

/// Router settings fixed at construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RouterConfig {
    /// RRF constant κ; must be positive.
    pub kappa: f64,
    /// Per-level search deadline; a level that misses it is dropped from fusion.
    #[serde(with = "crate::serde_millis")]
    pub level_timeout: Duration,
    /// `k` used when a request asks for zero results.
    pub default_k: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            kappa: DEFAULT_KAPPA,
            level_timeout: DEFAULT_LEVEL_TIMEOUT,
            default_k: DEFAULT_K,
        }
    }
}

impl RouterConfig {
    pub fn with_kappa(mut self, kappa: f64) -> Self {
        self.kappa = kappa;
        self
    }

    pub fn with_level_timeout(mut self, timeout: Duration) -> Self {
        self.level_timeout = timeout;
        self
    }

    pub fn with_default_k(mut self, k: usize) -> Self {
        self.default_k = k;
        self
    }

    pub fn validate(&self) -> Result<(), RouteError> {
        if !(self.kappa.is_finite() && self.kappa > 0.0) {
            return Err(RouteError::InvalidConfig(format!(
                "kappa must be a positive number, got {}",
                self.kappa
            )));
        }
        if self.level_timeout.is_zero() {
            return Err(RouteError::InvalidConfig(
                "level_timeout must be positive".into(),
            ));
        }
        if self.default_k == 0 {
            return Err(RouteError::InvalidConfig("default_k must be positive".into()));
        }
        Ok(())
    }
}

/// Query vectors: one shared by every level, or one per level.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum QueryVectors {
    Shared(Vec<f32>),
    PerLevel(BTreeMap<Level, Vec<f32>>),
}

impl QueryVectors {
    pub fn for_level(&self, level: Level) -> Option<&[f32]> {
        match self {
            QueryVectors::Shared(v) => Some(v.as_slice()),
            QueryVectors::PerLevel(map) => map.get(&level).map(Vec::as_slice),
        }
    }
}

/// An already-validated search request from the transport layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteRequest {
    pub queries: QueryVectors,
    pub levels: BTreeSet<Level>,
    pub k: usize,
    pub fusion: FusionMethod,
    /// Overrides each graph index's build-time `ef_search`.
    pub ef_search: Option<usize>,
    /// Overrides each IVF-PQ index's build-time `nprobe`.
    pub nprobe: Option<usize>,
}

impl RouteRequest {
    pub fn new(
        queries: QueryVectors,
        levels: impl IntoIterator<Item = Level>,
        k: usize,
        fusion: FusionMethod,
    ) -> Self {
        Self {
            queries,
            levels: levels.into_iter().collect(),
            k,
            fusion,
            ef_search: None,
            nprobe: None,
        }
    }

    pub fn with_ef_search(mut self, ef: usize) -> Self {
        self.ef_search = Some(ef);
        self
    }

    pub fn with_nprobe(mut self, nprobe: usize) -> Self {
        self.nprobe = Some(nprobe);
        self
    }

    pub(crate) fn search_options(&self) -> SearchOptions {
        SearchOptions {
            ef_search: self.ef_search,
            nprobe: self.nprobe,
        }
    }
}

/// One level's ranked hits; a hit's rank is its position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LevelHits {
    pub level: Level,
    pub hits: Vec<Neighbor>,
}

impl LevelHits {
    pub fn new(level: Level, hits: Vec<Neighbor>) -> Self {
        Self { level, hits }
    }
}

/// A level's part in a fused result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LevelContribution {
    pub level: Level,
    /// 0-indexed rank within that level's hits.
    pub rank: usize,
    /// Raw similarity reported by that level.
    pub score: f32,
}

/// The level a fused result came from, or `multi` when several levels
/// contributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultLevel {
    Single(Level),
    Multi,
}

impl fmt::Display for ResultLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultLevel::Single(level) => f.write_str(level.as_str()),
            ResultLevel::Multi => f.write_str("multi"),
        }
    }
}

impl Serialize for ResultLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResultLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == "multi" {
            return Ok(ResultLevel::Multi);
        }
        raw.parse::<Level>()
            .map(ResultLevel::Single)
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FusedResult {
    pub id: String,
    pub level: ResultLevel,
    pub score: f64,
    /// Contributing levels in level order.
    pub trace: Vec<LevelContribution>,
}

/// Why a requested level contributed nothing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OmissionReason {
    NotLoaded,
    NoQueryVector,
    Timeout,
    /// The level search returned an error. `kind` is `None` only when the
    /// search task itself died (panic or cancellation).
    Failed {
        kind: Option<ErrorKind>,
        message: String,
    },
}

impl OmissionReason {
    pub(crate) fn failed(kind: Option<ErrorKind>, message: impl Into<String>) -> Self {
        OmissionReason::Failed {
            kind,
            message: message.into(),
        }
    }

    /// Error kind behind the omission.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            OmissionReason::NotLoaded => Some(ErrorKind::NotLoaded),
            OmissionReason::NoQueryVector => Some(ErrorKind::InvalidParams),
            OmissionReason::Timeout => Some(ErrorKind::LevelTimeout),
            OmissionReason::Failed { kind, .. } => *kind,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LevelOmission {
    pub level: Level,
    pub reason: OmissionReason,
}

/// Fused results plus which levels were actually searched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteResponse {
    pub results: Vec<FusedResult>,
    pub searched: Vec<Level>,
    pub omitted: Vec<LevelOmission>,
}

impl RouteResponse {
    pub fn is_partial(&self) -> bool {
        !self.omitted.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouteError {
    #[error("invalid router config: {0}")]
    InvalidConfig(String),
    #[error("invalid route request: {0}")]
    InvalidRequest(String),
    #[error("none of the requested levels could be searched: {omitted:?}")]
    NoLevelsAvailable { omitted: Vec<LevelOmission> },
}

impl RouteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RouteError::InvalidConfig(_) | RouteError::InvalidRequest(_) => {
                ErrorKind::InvalidParams
            }
            RouteError::NoLevelsAvailable { .. } => ErrorKind::NoLevelsAvailable,
        }
    }
}
