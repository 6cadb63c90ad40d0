use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::{IndexError, Level};

/// Accepted deviation of a stored vector's L2 norm from 1.0.
pub const NORM_TOLERANCE: f32 = 1e-3;

/// An externally encoded, L2-normalized vector for one text unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub level: Level,
    pub values: Vec<f32>,
}

impl VectorRecord {
    pub fn new(id: impl Into<String>, level: Level, values: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            level,
            values,
        }
    }
}

/// One search hit: record id plus raw similarity (dot product).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub id: String,
    pub score: f32,
}

#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[inline]
pub(crate) fn l2_sq(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

pub(crate) fn check_dimension(expected: usize, values: &[f32]) -> Result<(), IndexError> {
    if values.len() != expected {
        return Err(IndexError::DimensionMismatch {
            expected,
            got: values.len(),
        });
    }
    Ok(())
}

/// Validate build input and return it ordered by ascending id.
///
/// Sorting here is what makes the built structure independent of the order
/// the encoder emitted records in.
pub(crate) fn prepare_records<'a>(
    level: Level,
    dimension: usize,
    records: &'a [VectorRecord],
) -> Result<Vec<&'a VectorRecord>, IndexError> {
    if records.is_empty() {
        return Err(IndexError::invalid(format!(
            "cannot build a {level} index from zero records"
        )));
    }

    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if record.level != level {
            return Err(IndexError::invalid(format!(
                "record `{}` is tagged {}, expected {level}",
                record.id, record.level
            )));
        }
        check_dimension(dimension, &record.values)?;
        check_normalized(&record.id, &record.values)?;
        if !seen.insert(record.id.as_str()) {
            return Err(IndexError::DuplicateId(record.id.clone()));
        }
    }

    let mut sorted: Vec<&VectorRecord> = records.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(sorted)
}

pub(crate) fn check_normalized(id: &str, values: &[f32]) -> Result<(), IndexError> {
    let norm = dot(values, values).sqrt();
    if !norm.is_finite() || (norm - 1.0).abs() > NORM_TOLERANCE {
        return Err(IndexError::NotNormalized {
            id: id.to_string(),
            norm,
        });
    }
    Ok(())
}
