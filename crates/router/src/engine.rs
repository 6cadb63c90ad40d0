use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use index::{ErrorKind, IndexSet, Level, Neighbor, VectorIndex};
use tokio::task::JoinSet;
use tracing::{info, warn, Instrument};

use crate::fusion::fuse;
use crate::types::{
    LevelHits, LevelOmission, OmissionReason, RouteError, RouteRequest, RouteResponse,
    RouterConfig,
};


/// Fans a request out to every requested level in parallel and fuses what
/// comes back.
///
/// The router owns no indices and no per-request state: the index set is
/// passed to every call, so one router serves any number of generations.
#[derive(Debug, Clone)]
pub struct Router {
    config: RouterConfig,
}

enum LevelOutcome {
    Hits(Vec<Neighbor>),
    Omitted(OmissionReason),
}

impl Router {
    pub fn new(config: RouterConfig) -> Result<Self, RouteError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Search each requested level against `indices` and fuse the results.
    ///
    /// Levels that are missing, unloaded, lack a query vector, error, or miss
    /// the per-level deadline are listed in [`RouteResponse::omitted`] and the
    /// rest are fused. Only when no level produced hits does the call fail.
    ///
    /// A level search that times out keeps running on the blocking pool until
    /// it finishes; its result is discarded.
    pub async fn route(
        &self,
        indices: &IndexSet,
        request: &RouteRequest,
    ) -> Result<RouteResponse, RouteError> {
        if request.levels.is_empty() {
            return Err(RouteError::InvalidRequest(
                "at least one level must be requested".into(),
            ));
        }
        let k = if request.k == 0 {
            self.config.default_k
        } else {
            request.k
        };
        let span = tracing::span!(
            tracing::Level::INFO,
            "router.route",
            levels = request.levels.len(),
            k,
            fusion = ?request.fusion
        );
        self.route_inner(indices, request, k).instrument(span).await
    }

    async fn route_inner(
        &self,
        indices: &IndexSet,
        request: &RouteRequest,
        k: usize,
    ) -> Result<RouteResponse, RouteError> {
        let start = Instant::now();
        let options = request.search_options();
        let timeout = self.config.level_timeout;

        let mut outcomes: BTreeMap<Level, LevelOutcome> = BTreeMap::new();
        let mut tasks = JoinSet::new();
        for &level in &request.levels {
            let index: Arc<dyn VectorIndex> = match indices.get(&level) {
                Some(index) if index.is_loaded() => Arc::clone(index),
                _ => {
                    outcomes.insert(level, LevelOutcome::Omitted(OmissionReason::NotLoaded));
                    continue;
                }
            };
            let Some(query) = request.queries.for_level(level) else {
                outcomes.insert(
                    level,
                    LevelOutcome::Omitted(OmissionReason::NoQueryVector),
                );
                continue;
            };
            let query = query.to_vec();
            tasks.spawn(async move {
                let search =
                    tokio::task::spawn_blocking(move || index.knn(&query, k, &options));
                let outcome = match tokio::time::timeout(timeout, search).await {
                    Err(_) => LevelOutcome::Omitted(OmissionReason::Timeout),
                    Ok(Err(join)) => {
                        LevelOutcome::Omitted(OmissionReason::failed(None, join.to_string()))
                    }
                    Ok(Ok(Err(err))) if err.kind() == ErrorKind::NotLoaded => {
                        LevelOutcome::Omitted(OmissionReason::NotLoaded)
                    }
                    Ok(Ok(Err(err))) => {
                        LevelOutcome::Omitted(OmissionReason::failed(
                            Some(err.kind()),
                            err.to_string(),
                        ))
                    }
                    Ok(Ok(Ok(hits))) => LevelOutcome::Hits(hits),
                };
                (level, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((level, outcome)) => {
                    outcomes.insert(level, outcome);
                }
                // The level is unknown once its task is gone; it surfaces
                // below as missing from both lists.
                Err(err) => warn!(error = %err, "route_task_failure"),
            }
        }

        let mut lists = Vec::new();
        let mut omitted = Vec::new();
        for &level in &request.levels {
            match outcomes.remove(&level) {
                Some(LevelOutcome::Hits(hits)) => lists.push(LevelHits::new(level, hits)),
                Some(LevelOutcome::Omitted(reason)) => {
                    match &reason {
                        OmissionReason::Timeout => warn!(
                            level = %level,
                            kind = ?reason.kind(),
                            timeout_millis = timeout.as_millis(),
                            "route_level_timeout"
                        ),
                        OmissionReason::Failed { kind, message } => warn!(
                            level = %level,
                            kind = ?kind,
                            error = %message,
                            "route_level_failure"
                        ),
                        _ => {}
                    }
                    omitted.push(LevelOmission { level, reason });
                }
                None => omitted.push(LevelOmission {
                    level,
                    reason: OmissionReason::failed(None, "level task aborted"),
                }),
            }
        }

        if lists.is_empty() {
            warn!(
                omitted = omitted.len(),
                elapsed_micros = start.elapsed().as_micros(),
                "route_failure"
            );
            return Err(RouteError::NoLevelsAvailable { omitted });
        }

        let results = fuse(&lists, request.fusion, self.config.kappa, k);
        let searched: Vec<Level> = lists.iter().map(|list| list.level).collect();
        info!(
            searched = searched.len(),
            omitted = omitted.len(),
            results = results.len(),
            elapsed_micros = start.elapsed().as_micros(),
            "route_complete"
        );
        Ok(RouteResponse {
            results,
            searched,
            omitted,
        })
    }
}
