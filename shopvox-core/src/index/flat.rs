//! Exact (brute-force) squared-L2 vector index.

use super::IndexError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Vectors of one fixed dimension stored contiguously in insertion order.
///
/// Position `i` is the i-th appended vector. The dimension is fixed by the
/// first append and never changes; empty vectors are refused.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatL2Index {
    dimension: Option<usize>,
    data: Vec<f32>,
}

/// Returned when a vector's length differs from the index dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionConflict {
    pub expected: usize,
    pub actual: usize,
}

impl FlatL2Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(dimension: Option<usize>, data: Vec<f32>) -> Self {
        Self { dimension, data }
    }

    pub(crate) fn raw_data(&self) -> &[f32] {
        &self.data
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn len(&self) -> usize {
        match self.dimension {
            Some(d) if d > 0 => self.data.len() / d,
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends a vector and returns its position.
    pub fn add(&mut self, vector: &[f32]) -> Result<usize, IndexError> {
        if vector.is_empty() {
            return Err(IndexError::EmptyVector);
        }
        let expected = *self.dimension.get_or_insert(vector.len());
        if vector.len() != expected {
            return Err(DimensionConflict {
                expected,
                actual: vector.len(),
            }
            .into());
        }

        let position = self.len();
        self.data.extend_from_slice(vector);
        Ok(position)
    }

    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let d = self.dimension?;
        self.data.get(position * d..(position + 1) * d)
    }

    /// The `k` nearest vectors to `query` as `(position, squared distance)`,
    /// ascending by distance. Equal distances keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, DimensionConflict> {
        let Some(dimension) = self.dimension else {
            return Ok(Vec::new());
        };
        if query.len() != dimension {
            return Err(DimensionConflict {
                expected: dimension,
                actual: query.len(),
            });
        }
        if k == 0 || dimension == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(dimension)
            .enumerate()
            .map(|(position, vector)| (position, squared_l2(query, vector)))
            .collect();

        scored.sort_by(|a, b| match a.1.total_cmp(&b.1) {
            Ordering::Equal => a.0.cmp(&b.0),
            other => other,
        });
        scored.truncate(k);

        Ok(scored)
    }
}

/// Squared Euclidean distance between two equal-length vectors.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}
