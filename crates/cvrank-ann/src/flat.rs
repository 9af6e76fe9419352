//! Exact brute-force backend.
//!
//! Stores L2-normalized vectors in one contiguous arena and scans all of
//! them per query. For pools up to a few tens of thousands of resumes this
//! is fast enough and its recall is exact, which makes it the reference
//! the graph backend is validated against.

use cvrank_core::traits::dot;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatIndex {
    pub dim: usize,
    vectors: Vec<f32>,
    count: usize,
}

impl FlatIndex {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            vectors: Vec::new(),
            count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Appends an already-normalized vector. Caller guarantees the length
    /// matches `dim`.
    pub fn push(&mut self, vector: &[f32]) {
        debug_assert_eq!(vector.len(), self.dim);
        self.vectors.extend_from_slice(vector);
        self.count += 1;
    }

    fn vector(&self, idx: usize) -> &[f32] {
        &self.vectors[idx * self.dim..(idx + 1) * self.dim]
    }

    /// Top-k by inner product, descending. Returns at most `k` entries and
    /// never pads with sentinels.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(u32, f32)> {
        let mut scored: Vec<(u32, f32)> = (0..self.count)
            .map(|i| (i as u32, dot(query, self.vector(i))))
            .collect();
        scored.sort_unstable_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_ranks_by_similarity() {
        let mut idx = FlatIndex::new(2);
        idx.push(&[1.0, 0.0]);
        idx.push(&[0.0, 1.0]);
        idx.push(&[0.6, 0.8]);
        let hits = idx.search(&[1.0, 0.0], 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, 0);
        assert!((hits[0].1 - 1.0).abs() < 1e-6);
        assert_eq!(hits[1].0, 2);
    }

    #[test]
    fn k_larger_than_index_is_not_padded() {
        let mut idx = FlatIndex::new(2);
        idx.push(&[1.0, 0.0]);
        let hits = idx.search(&[1.0, 0.0], 10);
        assert_eq!(hits.len(), 1);
    }
}
