//! Exact brute-force index.
//!
//! A full linear scan with no approximation. This is the reference every other
//! index is measured against, so it trades speed for determinism: ties on score
//! are broken by insertion id.

use std::sync::Arc;

use super::traits::{row_count, IndexBuilder, SearchIndex};
use crate::benchmark::metrics::SearchResult;
use crate::distance::DistanceMetric;
use crate::error::{EvalError, Result};

/// Flat (exhaustive) index over a contiguous vector buffer.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: usize,
    metric: DistanceMetric,
    vectors: Vec<f32>,
    num_vectors: usize,
}

impl FlatIndex {
    /// Create an empty index.
    pub fn new(dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            dimension,
            metric,
            vectors: Vec::new(),
            num_vectors: 0,
        }
    }

    /// Metric used for ranking.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Borrow the stored vector with the given id.
    pub fn vector(&self, id: usize) -> Option<&[f32]> {
        if id >= self.num_vectors {
            return None;
        }
        Some(&self.vectors[id * self.dimension..(id + 1) * self.dimension])
    }
}

impl SearchIndex for FlatIndex {
    fn name(&self) -> String {
        format!("Flat{}", self.metric)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn ntotal(&self) -> usize {
        self.num_vectors
    }

    fn add(&mut self, vectors: &[f32]) -> Result<()> {
        let n = row_count(vectors, self.dimension)?;
        self.vectors.extend_from_slice(vectors);
        self.num_vectors += n;
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<SearchResult> {
        if query.len() != self.dimension {
            return Err(EvalError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        let k = k.min(self.num_vectors);
        if k == 0 {
            return Ok(SearchResult::default());
        }

        let metric = self.metric;
        let mut scored: Vec<(f32, usize)> = self
            .vectors
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(id, v)| (metric.score(query, v), id))
            .collect();

        let by_rank = |a: &(f32, usize), b: &(f32, usize)| {
            metric.cmp_scores(a.0, b.0).then(a.1.cmp(&b.1))
        };
        // Only the top k need ordering.
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, by_rank);
            scored.truncate(k);
        }
        scored.sort_unstable_by(by_rank);

        let (distances, ids) = scored
            .into_iter()
            .map(|(score, id)| (score, id as i64))
            .unzip();
        Ok(SearchResult { ids, distances })
    }

    fn size_bytes(&self) -> Option<usize> {
        Some(self.vectors.len() * std::mem::size_of::<f32>())
    }
}

/// Builder for [`FlatIndex`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatBuilder;

impl FlatBuilder {
    pub fn shared() -> Arc<dyn IndexBuilder> {
        Arc::new(FlatBuilder)
    }
}

impl IndexBuilder for FlatBuilder {
    fn name(&self) -> &str {
        "Flat"
    }

    fn build(&self, dimension: usize, metric: DistanceMetric) -> Result<Box<dyn SearchIndex>> {
        if dimension == 0 {
            return Err(EvalError::InvalidParameter("dimension must be > 0".into()));
        }
        Ok(Box::new(FlatIndex::new(dimension, metric)))
    }
}
