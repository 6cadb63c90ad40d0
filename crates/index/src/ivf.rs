//! Inverted-file index with product-quantized residual codes, used for the
//! document level.
//!
//! Build trains `nlist` coarse centroids on the training sample, then `m`
//! residual codebooks of `2^nbits` codewords each. Every stored vector keeps
//! only its partition and `m` one-byte codes. A query scores the `nprobe`
//! closest partitions with an inner-product lookup table:
//!
//! ```text
//! score(q, x) ≈ <q, c_list> + Σ_j <q_j, codeword_j[code_j]>
//! ```

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::kmeans::{self, Affinity};
use crate::params::IvfPqParams;
use crate::record::{check_dimension, dot};
use crate::{IndexError, Level, Neighbor, VectorRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct InvertedList {
    /// Node numbers in ascending order.
    members: Vec<u32>,
    /// `members.len() * m` codes, row-major.
    codes: Vec<u8>,
}

/// Immutable IVF-PQ index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IvfPqIndex {
    level: Level,
    dimension: usize,
    params: IvfPqParams,
    /// Record ids in ascending order; position == node number.
    ids: Vec<String>,
    /// `nlist * dimension` coarse centroids.
    centroids: Vec<f32>,
    /// `m * 2^nbits * (dimension / m)` residual codewords.
    codebooks: Vec<f32>,
    lists: Vec<InvertedList>,
}

impl IvfPqIndex {
    /// Build from validated, id-sorted records and a training sample.
    pub(crate) fn build(
        level: Level,
        dimension: usize,
        records: &[&VectorRecord],
        training_sample: &[Vec<f32>],
        params: IvfPqParams,
    ) -> Result<Self, IndexError> {
        params.validate(dimension)?;
        let required = params.min_training_vectors();
        if training_sample.len() < required {
            return Err(IndexError::InsufficientTrainingData {
                required,
                got: training_sample.len(),
            });
        }
        let mut training = Vec::with_capacity(training_sample.len() * dimension);
        for vector in training_sample {
            check_dimension(dimension, vector)?;
            training.extend_from_slice(vector);
        }

        let centroids = kmeans::train(
            &training,
            dimension,
            params.nlist,
            params.seed,
            Affinity::InnerProduct,
        );
        let residuals = residuals(&training, &centroids, dimension);

        let dsub = dimension / params.m;
        let ksub = params.codebook_size();
        let codebooks: Vec<f32> = (0..params.m)
            .into_par_iter()
            .map(|j| {
                let sub: Vec<f32> = residuals
                    .chunks_exact(dimension)
                    .flat_map(|r| r[j * dsub..(j + 1) * dsub].iter().copied())
                    .collect();
                let seed = params.seed.wrapping_add(j as u64 + 1);
                kmeans::train(&sub, dsub, ksub, seed, Affinity::Euclidean)
            })
            .collect::<Vec<Vec<f32>>>()
            .concat();

        let mut index = Self {
            level,
            dimension,
            params,
            ids: records.iter().map(|r| r.id.clone()).collect(),
            centroids,
            codebooks,
            lists: vec![
                InvertedList {
                    members: Vec::new(),
                    codes: Vec::new(),
                };
                params.nlist
            ],
        };

        let encoded: Vec<(usize, Vec<u8>)> = records
            .par_iter()
            .map(|record| index.encode(&record.values))
            .collect();
        for (node, (list, codes)) in encoded.into_iter().enumerate() {
            let list = &mut index.lists[list];
            list.members.push(node as u32);
            list.codes.extend_from_slice(&codes);
        }
        Ok(index)
    }

    fn dsub(&self) -> usize {
        self.dimension / self.params.m
    }

    fn codeword(&self, sub: usize, code: usize) -> &[f32] {
        let dsub = self.dsub();
        let start = (sub * self.params.codebook_size() + code) * dsub;
        &self.codebooks[start..start + dsub]
    }

    /// Partition and PQ codes for one vector.
    fn encode(&self, vector: &[f32]) -> (usize, Vec<u8>) {
        let list = kmeans::nearest(vector, &self.centroids, self.dimension, Affinity::InnerProduct);
        let centroid = &self.centroids[list * self.dimension..(list + 1) * self.dimension];
        let residual: Vec<f32> = vector.iter().zip(centroid).map(|(v, c)| v - c).collect();

        let dsub = self.dsub();
        let ksub = self.params.codebook_size();
        let codes = (0..self.params.m)
            .map(|j| {
                let book = &self.codebooks[j * ksub * dsub..(j + 1) * ksub * dsub];
                kmeans::nearest(&residual[j * dsub..(j + 1) * dsub], book, dsub, Affinity::Euclidean)
                    as u8
            })
            .collect();
        (list, codes)
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn params(&self) -> &IvfPqParams {
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

    /// Number of stored vectors per partition.
    pub fn list_sizes(&self) -> Vec<usize> {
        self.lists.iter().map(|l| l.members.len()).collect()
    }

    /// Bytes used by the compressed codes (excluding ids and codebooks).
    pub fn code_bytes(&self) -> usize {
        self.lists.iter().map(|l| l.codes.len()).sum()
    }

    /// Top-`k` by approximate similarity over the `nprobe` closest partitions.
    pub fn knn(
        &self,
        query: &[f32],
        k: usize,
        nprobe: Option<usize>,
    ) -> Result<Vec<Neighbor>, IndexError> {
        check_dimension(self.dimension, query)?;
        let nprobe = nprobe.unwrap_or(self.params.nprobe);
        if nprobe == 0 || nprobe > self.params.nlist {
            return Err(IndexError::invalid(format!(
                "nprobe must be within [1, nlist={}], got {nprobe}",
                self.params.nlist
            )));
        }
        if k == 0 || self.ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut coarse: Vec<(f32, usize)> = self
            .centroids
            .chunks_exact(self.dimension)
            .map(|c| dot(query, c))
            .zip(0..)
            .collect();
        coarse.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

        let dsub = self.dsub();
        let ksub = self.params.codebook_size();
        let mut table = Vec::with_capacity(self.params.m * ksub);
        for j in 0..self.params.m {
            let q_sub = &query[j * dsub..(j + 1) * dsub];
            table.extend((0..ksub).map(|code| dot(q_sub, self.codeword(j, code))));
        }

        let m = self.params.m;
        let mut scored: Vec<(f32, u32)> = Vec::new();
        for &(base, list) in coarse.iter().take(nprobe) {
            let list = &self.lists[list];
            for (member, codes) in list.members.iter().zip(list.codes.chunks_exact(m)) {
                let approx: f32 = codes
                    .iter()
                    .enumerate()
                    .map(|(j, &code)| table[j * ksub + code as usize])
                    .sum();
                scored.push((base + approx, *member));
            }
        }
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, node)| Neighbor {
                id: self.ids[node as usize].clone(),
                score,
            })
            .collect())
    }
}

fn residuals(data: &[f32], centroids: &[f32], dim: usize) -> Vec<f32> {
    let labels = kmeans::assign(data, centroids, dim, Affinity::InnerProduct);
    let mut out = Vec::with_capacity(data.len());
    for (point, &label) in data.chunks_exact(dim).zip(labels.iter()) {
        let centroid = &centroids[label * dim..(label + 1) * dim];
        out.extend(point.iter().zip(centroid).map(|(p, c)| p - c));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::prepare_records;

    fn unit(values: Vec<f32>) -> Vec<f32> {
        let norm = dot(&values, &values).sqrt();
        values.into_iter().map(|v| v / norm).collect()
    }

    fn clustered(n: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
        let mut rng = fastrand::Rng::with_seed(seed);
        let centers: Vec<Vec<f32>> = (0..8)
            .map(|_| unit((0..dim).map(|_| rng.f32() * 2.0 - 1.0).collect()))
            .collect();
        (0..n)
            .map(|i| {
                let c = &centers[i % centers.len()];
                unit(c.iter().map(|v| v + (rng.f32() - 0.5) * 0.4).collect())
            })
            .collect()
    }

    fn records(vectors: &[Vec<f32>]) -> Vec<VectorRecord> {
        vectors
            .iter()
            .enumerate()
            .map(|(i, v)| VectorRecord::new(format!("d-{i:05}"), Level::Document, v.clone()))
            .collect()
    }

    fn params() -> IvfPqParams {
        IvfPqParams::default()
            .with_nlist(4)
            .with_nprobe(2)
            .with_subquantizers(8)
            .with_nbits(4)
    }

    #[test]
    fn rejects_small_training_sample() {
        let vectors = clustered(100, 16, 1);
        let recs = records(&vectors);
        let sorted = prepare_records(Level::Document, 16, &recs).unwrap();
        let err = IvfPqIndex::build(Level::Document, 16, &sorted, &vectors[..50], params())
            .unwrap_err();
        assert_eq!(
            err,
            IndexError::InsufficientTrainingData {
                required: 400,
                got: 50
            }
        );
    }

    #[test]
    fn every_vector_lands_in_one_list() {
        let vectors = clustered(600, 16, 2);
        let recs = records(&vectors);
        let sorted = prepare_records(Level::Document, 16, &recs).unwrap();
        let index = IvfPqIndex::build(Level::Document, 16, &sorted, &vectors, params()).unwrap();
        assert_eq!(index.list_sizes().iter().sum::<usize>(), 600);
        assert_eq!(index.code_bytes(), 600 * 8);
    }

    #[test]
    fn query_finds_itself_when_scanning_all_lists() {
        let vectors = clustered(600, 16, 3);
        let recs = records(&vectors);
        let sorted = prepare_records(Level::Document, 16, &recs).unwrap();
        let index = IvfPqIndex::build(
            Level::Document,
            16,
            &sorted,
            &vectors,
            params().with_nbits(8),
        )
        .unwrap();
        let hits = index.knn(&vectors[7], 10, Some(4)).unwrap();
        assert_eq!(hits.len(), 10);
        assert!(hits.iter().any(|h| h.id == "d-00007"));
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn nprobe_is_bounded() {
        let vectors = clustered(400, 16, 4);
        let recs = records(&vectors);
        let sorted = prepare_records(Level::Document, 16, &recs).unwrap();
        let index = IvfPqIndex::build(Level::Document, 16, &sorted, &vectors, params()).unwrap();
        assert!(index.knn(&vectors[0], 5, Some(5)).is_err());
        assert!(index.knn(&vectors[0], 5, Some(0)).is_err());
        assert!(index.knn(&vectors[0], 0, None).unwrap().is_empty());
        assert!(matches!(
            index.knn(&[1.0], 5, None),
            Err(IndexError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn build_is_reproducible() {
        let vectors = clustered(400, 16, 5);
        let recs = records(&vectors);
        let sorted = prepare_records(Level::Document, 16, &recs).unwrap();
        let a = IvfPqIndex::build(Level::Document, 16, &sorted, &vectors, params()).unwrap();
        let b = IvfPqIndex::build(Level::Document, 16, &sorted, &vectors, params()).unwrap();
        assert_eq!(a, b);
    }
}
