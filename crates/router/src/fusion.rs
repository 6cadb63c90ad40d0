//! Pure fusion functions.
//!
//! Each function depends only on its arguments: identical hit lists, method,
//! and κ always yield an identical fused list. Lists are processed in level
//! order, so the order callers pass them in does not matter either.

use std::collections::BTreeMap;

use crate::types::{FusedResult, FusionMethod, LevelContribution, LevelHits, ResultLevel};

/// Fuse with `method`, keeping the top `k`.
pub fn fuse(lists: &[LevelHits], method: FusionMethod, kappa: f64, k: usize) -> Vec<FusedResult> {
    match method {
        FusionMethod::Rrf => fuse_rrf(lists, kappa, k),
        FusionMethod::MaxSim => fuse_max_sim(lists, k),
    }
}

/// Reciprocal rank fusion: an id at 0-indexed rank `r` in a level gains
/// `1 / (r + kappa)`; contributions from several levels add up.
pub fn fuse_rrf(lists: &[LevelHits], kappa: f64, k: usize) -> Vec<FusedResult> {
    accumulate(lists, k, |acc, c| {
        acc.unwrap_or(0.0) + 1.0 / (c.rank as f64 + kappa)
    })
}

/// Max-similarity fusion: an id scores the highest raw similarity any level
/// reported for it.
pub fn fuse_max_sim(lists: &[LevelHits], k: usize) -> Vec<FusedResult> {
    accumulate(lists, k, |acc, c| {
        let score = f64::from(c.score);
        match acc {
            Some(best) if best >= score => best,
            _ => score,
        }
    })
}

fn accumulate<F>(lists: &[LevelHits], k: usize, combine: F) -> Vec<FusedResult>
where
    F: Fn(Option<f64>, &LevelContribution) -> f64,
{
    if k == 0 {
        return Vec::new();
    }
    let mut ordered: Vec<&LevelHits> = lists.iter().collect();
    ordered.sort_by_key(|list| list.level);

    let mut fused: BTreeMap<&str, (Option<f64>, Vec<LevelContribution>)> = BTreeMap::new();
    for list in ordered {
        for (rank, hit) in list.hits.iter().enumerate() {
            let (score, trace) = fused.entry(hit.id.as_str()).or_default();
            // best-ranked occurrence per level only
            if trace.iter().any(|c| c.level == list.level) {
                continue;
            }
            let contribution = LevelContribution {
                level: list.level,
                rank,
                score: hit.score,
            };
            *score = Some(combine(*score, &contribution));
            trace.push(contribution);
        }
    }

    let mut results: Vec<FusedResult> = fused
        .into_iter()
        .map(|(id, (score, trace))| FusedResult {
            id: id.to_string(),
            level: match trace.as_slice() {
                [only] => ResultLevel::Single(only.level),
                _ => ResultLevel::Multi,
            },
            score: score.unwrap_or(0.0),
            trace,
        })
        .collect();
    results.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    results.truncate(k);
    results
}
