//! Layered proximity-graph index (HNSW family) for the sentence and
//! paragraph levels.
//!
//! Construction is sequential and seeded: nodes are inserted in ascending id
//! order, layer assignment draws from a `fastrand` generator seeded with
//! [`GraphParams::seed`], and every tie is broken by node position. The same
//! `(records, params)` therefore always yields the same links, which is what
//! lets two builds be compared by digest.
//!
//! Similarity is the plain dot product; inputs are unit length, so this is
//! cosine similarity.

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::params::{validate_ef_search, GraphParams};
use crate::record::{check_dimension, dot};
use crate::{IndexError, Level, Neighbor, VectorRecord};

/// Hard cap on the number of layers.
const MAX_LAYERS: usize = 16;

/// A node position paired with its similarity to the current query.
///
/// Ordering: higher score is greater; on equal scores the lower position is
/// greater, so heaps and sorts prefer ascending ids on ties.
#[derive(Debug, Clone, Copy)]
struct Scored {
    score: f32,
    node: u32,
}

impl PartialEq for Scored {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scored {}

impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scored {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// Immutable graph index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphIndex {
    level: Level,
    dimension: usize,
    params: GraphParams,
    /// Record ids in ascending order; position == node number.
    ids: Vec<String>,
    /// Row-major vectors, `ids.len() * dimension` values.
    vectors: Vec<f32>,
    /// `links[node][layer]` lists neighbor node numbers.
    links: Vec<Vec<Vec<u32>>>,
    entry_point: u32,
    top_layer: usize,
}

impl GraphIndex {
    /// Build from records that are already validated and sorted by id.
    pub(crate) fn build(
        level: Level,
        dimension: usize,
        records: &[&VectorRecord],
        params: GraphParams,
    ) -> Self {
        let mut ids = Vec::with_capacity(records.len());
        let mut vectors = Vec::with_capacity(records.len() * dimension);
        for record in records {
            ids.push(record.id.clone());
            vectors.extend_from_slice(&record.values);
        }

        let mut rng = fastrand::Rng::with_seed(params.seed);
        let level_mult = 1.0 / (params.m as f64).ln();
        let node_layers: Vec<usize> = (0..records.len())
            .map(|_| {
                // (0, 1] so ln() stays finite.
                let u = 1.0 - rng.f64();
                ((-u.ln() * level_mult).floor() as usize).min(MAX_LAYERS - 1)
            })
            .collect();

        let mut builder = Builder {
            dimension,
            vectors: &vectors,
            params,
            links: node_layers.iter().map(|&l| vec![Vec::new(); l + 1]).collect(),
            entry_point: 0,
            top_layer: node_layers.first().copied().unwrap_or(0),
        };
        for (node, &layer) in node_layers.iter().enumerate().skip(1) {
            builder.insert(node as u32, layer);
        }

        let Builder {
            links,
            entry_point,
            top_layer,
            ..
        } = builder;

        Self {
            level,
            dimension,
            params,
            ids,
            vectors,
            links,
            entry_point,
            top_layer,
        }
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn params(&self) -> &GraphParams {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Top-`k` neighbors by descending similarity, ties by ascending id.
    ///
    /// `ef_search` overrides the build-time default for this query only; the
    /// effective candidate list is never smaller than `k`.
    pub fn knn(
        &self,
        query: &[f32],
        k: usize,
        ef_search: Option<usize>,
    ) -> Result<Vec<Neighbor>, IndexError> {
        check_dimension(self.dimension, query)?;
        let ef = ef_search.unwrap_or(self.params.ef_search);
        validate_ef_search(ef)?;
        if k == 0 || self.ids.is_empty() {
            return Ok(Vec::new());
        }

        let graph = GraphView {
            dimension: self.dimension,
            vectors: &self.vectors,
            links: &self.links,
        };
        let mut entry = self.entry_point;
        for layer in (1..=self.top_layer).rev() {
            entry = graph.search_layer(query, entry, 1, layer)[0].node;
        }
        let found = graph.search_layer(query, entry, ef.max(k), 0);

        Ok(found
            .into_iter()
            .take(k)
            .map(|s| Neighbor {
                id: self.ids[s.node as usize].clone(),
                score: s.score,
            })
            .collect())
    }
}

/// Read-only view shared by construction and search.
struct GraphView<'a> {
    dimension: usize,
    vectors: &'a [f32],
    links: &'a [Vec<Vec<u32>>],
}

impl GraphView<'_> {
    /// Best-first beam search on one layer; result sorted best first.
    fn search_layer(&self, query: &[f32], entry: u32, ef: usize, layer: usize) -> Vec<Scored> {
        search_layer(self.dimension, self.vectors, self.links, query, entry, ef, layer)
    }
}

#[inline]
fn vector_of(vectors: &[f32], dimension: usize, node: u32) -> &[f32] {
    let start = node as usize * dimension;
    &vectors[start..start + dimension]
}

fn search_layer(
    dimension: usize,
    vectors: &[f32],
    links: &[Vec<Vec<u32>>],
    query: &[f32],
    entry: u32,
    ef: usize,
    layer: usize,
) -> Vec<Scored> {
    let start = Scored {
        score: dot(query, vector_of(vectors, dimension, entry)),
        node: entry,
    };
    let mut visited: HashSet<u32> = HashSet::new();
    visited.insert(entry);

    let mut candidates = BinaryHeap::new();
    let mut results = BinaryHeap::new();
    candidates.push(start);
    results.push(Reverse(start));

    while let Some(current) = candidates.pop() {
        if let Some(Reverse(worst)) = results.peek() {
            if results.len() >= ef && current < *worst {
                break;
            }
        }
        let Some(neighbors) = links[current.node as usize].get(layer) else {
            continue;
        };
        for &next in neighbors {
            if !visited.insert(next) {
                continue;
            }
            let scored = Scored {
                score: dot(query, vector_of(vectors, dimension, next)),
                node: next,
            };
            let admit = results.len() < ef
                || results
                    .peek()
                    .map(|Reverse(worst)| scored > *worst)
                    .unwrap_or(true);
            if admit {
                candidates.push(scored);
                results.push(Reverse(scored));
                if results.len() > ef {
                    results.pop();
                }
            }
        }
    }

    let mut out: Vec<Scored> = results.into_iter().map(|Reverse(s)| s).collect();
    out.sort_by(|a, b| b.cmp(a));
    out
}

struct Builder<'a> {
    dimension: usize,
    vectors: &'a [f32],
    params: GraphParams,
    links: Vec<Vec<Vec<u32>>>,
    entry_point: u32,
    top_layer: usize,
}

impl<'a> Builder<'a> {
    fn vector(&self, node: u32) -> &'a [f32] {
        vector_of(self.vectors, self.dimension, node)
    }

    fn capacity(&self, layer: usize) -> usize {
        if layer == 0 {
            self.params.m * 2
        } else {
            self.params.m
        }
    }

    fn insert(&mut self, node: u32, node_layer: usize) {
        let query = vector_of(self.vectors, self.dimension, node);
        let mut entry = self.entry_point;

        for layer in ((node_layer + 1)..=self.top_layer).rev() {
            entry = search_layer(
                self.dimension,
                self.vectors,
                &self.links,
                query,
                entry,
                1,
                layer,
            )[0]
            .node;
        }

        for layer in (0..=node_layer.min(self.top_layer)).rev() {
            let candidates = search_layer(
                self.dimension,
                self.vectors,
                &self.links,
                query,
                entry,
                self.params.ef_construction,
                layer,
            );
            let selected = self.select_neighbors(&candidates, self.params.m);
            self.links[node as usize][layer] = selected.clone();

            let cap = self.capacity(layer);
            for neighbor in selected {
                self.links[neighbor as usize][layer].push(node);
                if self.links[neighbor as usize][layer].len() > cap {
                    self.prune(neighbor, layer, cap);
                }
            }
            entry = candidates[0].node;
        }

        if node_layer > self.top_layer {
            self.top_layer = node_layer;
            self.entry_point = node;
        }
    }

    /// Diversity heuristic: keep a candidate only when it is closer to the
    /// base node than to every neighbor already kept, then top up with the
    /// best of the discarded candidates.
    fn select_neighbors(&self, candidates: &[Scored], m: usize) -> Vec<u32> {
        let mut selected: Vec<u32> = Vec::with_capacity(m);
        let mut discarded: Vec<u32> = Vec::new();
        for candidate in candidates {
            if selected.len() >= m {
                break;
            }
            let vector = self.vector(candidate.node);
            let diverse = selected
                .iter()
                .all(|&kept| dot(vector, self.vector(kept)) < candidate.score);
            if diverse {
                selected.push(candidate.node);
            } else {
                discarded.push(candidate.node);
            }
        }
        for node in discarded {
            if selected.len() >= m {
                break;
            }
            selected.push(node);
        }
        selected
    }

    fn prune(&mut self, node: u32, layer: usize, cap: usize) {
        let base = self.vector(node);
        let mut scored: Vec<Scored> = self.links[node as usize][layer]
            .iter()
            .map(|&other| Scored {
                score: dot(base, self.vector(other)),
                node: other,
            })
            .collect();
        scored.sort_by(|a, b| b.cmp(a));
        let kept = self.select_neighbors(&scored, cap);
        self.links[node as usize][layer] = kept;
    }
}
