use std::collections::BTreeMap;
use std::sync::Arc;

use index::{ArtifactStore, Level, VectorRecord};
use manifest::{GenerationInfo, ManifestManager};
use quality::{
    CoherenceInput, GateDecision, PerturbedPair, QualityGate, QualityMetrics, QualityReport,
};
use router::{RouteRequest, RouteResponse, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::StrataConfig;
use crate::error::StrataError;

/// Operator triggers forwarded by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ControlCommand {
    /// Validate and activate the manifest stored at `manifest`.
    Reload { manifest: String },
    /// Re-validate and re-activate an earlier generation.
    Rollback { generation: u64 },
    /// Drop a non-active generation.
    Retire { generation: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ControlOutcome {
    Activated { generation: u64, revision: String },
    Retired { generation: u64 },
}

/// Child/parent vectors for one adjacent level pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoherenceSample {
    pub child_level: Level,
    pub parent_level: Level,
    pub children: Vec<VectorRecord>,
    pub parents: Vec<VectorRecord>,
    pub parent_of: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilitySample {
    pub level: Level,
    pub pairs: Vec<PerturbedPair>,
}

/// Held-out evaluation vectors; never taken from the serving indices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityBatch {
    #[serde(default)]
    pub coherence: Vec<CoherenceSample>,
    #[serde(default)]
    pub stability: Vec<StabilitySample>,
}

/// Manifest manager, router, and quality metrics behind one surface.
///
/// `search` always routes against the generation that is active when the
/// call starts; a concurrent reload swaps generations without affecting
/// in-flight queries.
pub struct RetrievalService {
    manifests: ManifestManager,
    router: Router,
    metrics: QualityMetrics,
    gate: QualityGate,
}

impl RetrievalService {
    pub fn new(config: &StrataConfig, store: Arc<dyn ArtifactStore>) -> Result<Self, StrataError> {
        config.validate()?;
        Ok(Self {
            manifests: ManifestManager::new(store, config.manifest.clone()),
            router: Router::new(config.router.clone())?,
            metrics: QualityMetrics::new(config.quality.metrics.clone())?,
            gate: config.quality_gate(),
        })
    }

    /// Open the configured store and build the service on it.
    pub fn from_config(config: &StrataConfig) -> Result<Self, StrataError> {
        let store = config.open_store()?;
        Self::new(config, store)
    }

    pub fn is_ready(&self) -> bool {
        self.manifests.is_ready()
    }

    pub fn manifests(&self) -> &ManifestManager {
        &self.manifests
    }

    pub fn generations(&self) -> Vec<GenerationInfo> {
        self.manifests.generations()
    }

    pub async fn search(&self, request: &RouteRequest) -> Result<RouteResponse, StrataError> {
        let generation = self.manifests.active().ok_or(StrataError::NotReady)?;
        let indices = generation.index_set();
        Ok(self.router.route(&indices, request).await?)
    }

    /// Compute every coherence and stability report in `batch`, in order.
    pub fn quality_reports(&self, batch: &QualityBatch) -> Result<Vec<QualityReport>, StrataError> {
        let mut reports = Vec::with_capacity(batch.coherence.len() + batch.stability.len());
        for sample in &batch.coherence {
            reports.push(self.metrics.coherence(&CoherenceInput {
                child_level: sample.child_level,
                parent_level: sample.parent_level,
                children: &sample.children,
                parents: &sample.parents,
                parent_of: &sample.parent_of,
            })?);
        }
        for sample in &batch.stability {
            reports.push(self.metrics.stability(sample.level, &sample.pairs)?);
        }
        Ok(reports)
    }

    /// Apply the configured acceptance gate.
    pub fn assess(&self, reports: &[QualityReport]) -> GateDecision {
        let decision = self.gate.evaluate(reports);
        info!(
            accepted = decision.accepted,
            worst = %decision.worst,
            reports = reports.len(),
            "quality_gate_decision"
        );
        decision
    }

    pub fn handle(&self, command: ControlCommand) -> Result<ControlOutcome, StrataError> {
        match command {
            ControlCommand::Reload { manifest } => {
                let generation = self.manifests.activate(&manifest)?;
                Ok(ControlOutcome::Activated {
                    generation: generation.id(),
                    revision: generation.manifest().revision.clone(),
                })
            }
            ControlCommand::Rollback { generation } => {
                let generation = self.manifests.rollback(generation)?;
                Ok(ControlOutcome::Activated {
                    generation: generation.id(),
                    revision: generation.manifest().revision.clone(),
                })
            }
            ControlCommand::Retire { generation } => {
                self.manifests.retire(generation)?;
                Ok(ControlOutcome::Retired { generation })
            }
        }
    }
}
