//! Hyperparameters for the two index families.
//!
//! Parameters are a tagged variant per algorithm rather than a loose
//! dictionary, and are validated before any build work starts. The values a
//! build ran with are stored verbatim in its [`IndexDescriptor`], so search
//! reproduces build-time behaviour.
//!
//! [`IndexDescriptor`]: crate::IndexDescriptor

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::IndexError;

pub const GRAPH_M_RANGE: (usize, usize) = (16, 64);
pub const EF_MAX: usize = 4096;
pub const NLIST_MAX: usize = 65_536;
pub const NBITS_MAX: u32 = 8;
/// Training vectors required per coarse partition.
pub const TRAINING_VECTORS_PER_LIST: usize = 100;

/// Algorithm family of a built index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Layered proximity graph (sentence and paragraph levels).
    Graph,
    /// Inverted file with product-quantized residual codes (document level).
    IvfPq,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::Graph => f.write_str("graph"),
            Algorithm::IvfPq => f.write_str("ivf_pq"),
        }
    }
}

/// Graph-index parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphParams {
    /// Neighbor links per node on the upper layers; layer 0 keeps `2 * m`.
    pub m: usize,
    /// Candidate-list size explored while inserting a node.
    pub ef_construction: usize,
    /// Default candidate-list size explored per query.
    pub ef_search: usize,
    /// Seed for layer assignment.
    pub seed: u64,
}

impl Default for GraphParams {
    fn default() -> Self {
        Self {
            m: 32,
            ef_construction: 200,
            ef_search: 64,
            seed: 42,
        }
    }
}

impl GraphParams {
    pub fn with_m(mut self, m: usize) -> Self {
        self.m = m;
        self
    }

    pub fn with_ef_construction(mut self, ef: usize) -> Self {
        self.ef_construction = ef;
        self
    }

    pub fn with_ef_search(mut self, ef: usize) -> Self {
        self.ef_search = ef;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), IndexError> {
        let (m_min, m_max) = GRAPH_M_RANGE;
        if !(m_min..=m_max).contains(&self.m) {
            return Err(IndexError::invalid(format!(
                "m must be within [{m_min}, {m_max}], got {}",
                self.m
            )));
        }
        if self.ef_construction < self.m || self.ef_construction > EF_MAX {
            return Err(IndexError::invalid(format!(
                "ef_construction must be within [m={}, {EF_MAX}], got {}",
                self.m, self.ef_construction
            )));
        }
        validate_ef_search(self.ef_search)
    }
}

pub(crate) fn validate_ef_search(ef: usize) -> Result<(), IndexError> {
    if ef == 0 || ef > EF_MAX {
        return Err(IndexError::invalid(format!(
            "ef_search must be within [1, {EF_MAX}], got {ef}"
        )));
    }
    Ok(())
}

/// Inverted-file + product-quantization parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IvfPqParams {
    /// Number of coarse partitions.
    pub nlist: usize,
    /// Default number of partitions scanned per query.
    pub nprobe: usize,
    /// Number of subquantizers; must divide the vector dimensionality.
    pub m: usize,
    /// Bits per subquantizer code (`2^nbits` codewords each).
    pub nbits: u32,
    /// Seed for k-means initialisation.
    pub seed: u64,
}

impl Default for IvfPqParams {
    fn default() -> Self {
        Self {
            nlist: 64,
            nprobe: 8,
            m: 16,
            nbits: 8,
            seed: 42,
        }
    }
}

impl IvfPqParams {
    pub fn with_nlist(mut self, nlist: usize) -> Self {
        self.nlist = nlist;
        self
    }

    pub fn with_nprobe(mut self, nprobe: usize) -> Self {
        self.nprobe = nprobe;
        self
    }

    pub fn with_subquantizers(mut self, m: usize) -> Self {
        self.m = m;
        self
    }

    pub fn with_nbits(mut self, nbits: u32) -> Self {
        self.nbits = nbits;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn codebook_size(&self) -> usize {
        1usize << self.nbits
    }

    /// Smallest training sample that populates every partition and codebook.
    pub fn min_training_vectors(&self) -> usize {
        (TRAINING_VECTORS_PER_LIST * self.nlist).max(self.codebook_size())
    }

    pub fn validate(&self, dimension: usize) -> Result<(), IndexError> {
        if self.nlist == 0 || self.nlist > NLIST_MAX {
            return Err(IndexError::invalid(format!(
                "nlist must be within [1, {NLIST_MAX}], got {}",
                self.nlist
            )));
        }
        if self.nprobe == 0 || self.nprobe > self.nlist {
            return Err(IndexError::invalid(format!(
                "nprobe must be within [1, nlist={}], got {}",
                self.nlist, self.nprobe
            )));
        }
        if self.m == 0 || dimension % self.m != 0 {
            return Err(IndexError::invalid(format!(
                "m={} must be positive and divide dimension {dimension}",
                self.m
            )));
        }
        if self.nbits == 0 || self.nbits > NBITS_MAX {
            return Err(IndexError::invalid(format!(
                "nbits must be within [1, {NBITS_MAX}], got {}",
                self.nbits
            )));
        }
        Ok(())
    }
}

/// Parameters for one level's index, tagged by algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum IndexParams {
    Graph(GraphParams),
    IvfPq(IvfPqParams),
}

impl IndexParams {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            IndexParams::Graph(_) => Algorithm::Graph,
            IndexParams::IvfPq(_) => Algorithm::IvfPq,
        }
    }

    pub fn validate(&self, dimension: usize) -> Result<(), IndexError> {
        match self {
            IndexParams::Graph(p) => p.validate(),
            IndexParams::IvfPq(p) => p.validate(dimension),
        }
    }
}

impl From<GraphParams> for IndexParams {
    fn from(p: GraphParams) -> Self {
        IndexParams::Graph(p)
    }
}

impl From<IvfPqParams> for IndexParams {
    fn from(p: IvfPqParams) -> Self {
        IndexParams::IvfPq(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn graph_defaults_are_valid() {
        GraphParams::default().validate().unwrap();
        let p = GraphParams::default()
            .with_m(16)
            .with_ef_construction(100)
            .with_ef_search(10)
            .with_seed(7);
        assert_eq!(p.m, 16);
        assert_eq!(p.seed, 7);
        p.validate().unwrap();
    }

    #[test]
    fn graph_ranges_enforced() {
        assert!(GraphParams::default().with_m(8).validate().is_err());
        assert!(GraphParams::default().with_m(65).validate().is_err());
        let err = GraphParams::default()
            .with_m(32)
            .with_ef_construction(16)
            .validate()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParams);
        assert!(GraphParams::default().with_ef_search(0).validate().is_err());
    }

    #[test]
    fn ivf_ranges_enforced() {
        let p = IvfPqParams::default();
        p.validate(384).unwrap();
        assert!(p.with_subquantizers(5).validate(384).is_err());
        assert!(p.with_nprobe(65).validate(384).is_err());
        assert!(p.with_nbits(9).validate(384).is_err());
        assert!(p.with_nlist(0).validate(384).is_err());
    }

    #[test]
    fn training_minimum() {
        let p = IvfPqParams::default().with_nlist(4).with_nbits(8);
        assert_eq!(p.min_training_vectors(), 400);
        let p = IvfPqParams::default().with_nlist(1).with_nbits(8);
        assert_eq!(p.min_training_vectors(), 256);
    }

    #[test]
    fn tagged_serde_form() {
        let params = IndexParams::Graph(GraphParams::default());
        let json = serde_json::to_value(params).unwrap();
        assert_eq!(json["algorithm"], "graph");
        assert_eq!(json["m"], 32);
        let back: IndexParams = serde_json::from_value(json).unwrap();
        assert_eq!(back, params);
        assert_eq!(back.algorithm(), Algorithm::Graph);
    }
}
