//! Ranking-quality metrics.
//!
//! Standard metrics for measuring retrieval quality against ground truth:
//! - Recall@k: fraction of true neighbors found
//! - Precision@k: fraction of retrieved items that are true neighbors
//! - MRR: reciprocal rank of the first true neighbor
//! - NDCG@k: position-discounted gain with graded relevance
//!
//! Every aggregate takes one [`GroundTruth`] and one [`SearchResult`] per query.
//! Passing slices of different lengths is a caller bug and panics.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

/// Reference neighbors for one query, closest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroundTruth {
    /// True nearest-neighbor ids.
    pub ids: Vec<i64>,
    /// True distances, when known (shipped ground-truth files carry ids only).
    pub distances: Option<Vec<f32>>,
}

impl GroundTruth {
    pub fn from_ids(ids: Vec<i64>) -> Self {
        Self {
            ids,
            distances: None,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Observed neighbors for one query, as returned by the index under test.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResult {
    pub ids: Vec<i64>,
    pub distances: Vec<f32>,
}

impl SearchResult {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl From<&GroundTruth> for SearchResult {
    fn from(gt: &GroundTruth) -> Self {
        Self {
            ids: gt.ids.clone(),
            distances: gt.distances.clone().unwrap_or_default(),
        }
    }
}

/// Aggregate quality metrics for one evaluation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RecallMetrics {
    pub recall_1: f64,
    pub recall_10: f64,
    pub recall_100: f64,
    /// Recall at the run's configured K.
    pub recall_k: f64,
    pub precision: f64,
    pub mrr: f64,
    pub ndcg: f64,
}

impl std::fmt::Display for RecallMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Recall@1={:.4}, Recall@10={:.4}, Recall@100={:.4}, \
             Precision={:.4}, MRR={:.4}, NDCG={:.4}",
            self.recall_1, self.recall_10, self.recall_100, self.precision, self.mrr, self.ndcg
        )
    }
}

fn check_lengths(ground_truth: &[GroundTruth], results: &[SearchResult]) {
    assert_eq!(
        ground_truth.len(),
        results.len(),
        "mismatched lengths: ground_truth={}, results={}",
        ground_truth.len(),
        results.len()
    );
}

/// Mean of the defined per-query scores; 0 when none are defined.
fn mean_defined(scores: impl Iterator<Item = Option<f64>>) -> f64 {
    let (sum, count) = scores
        .flatten()
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Recall@k for one query.
///
/// `k` is clamped to `min(k, |observed|, |truth|)`. Returns `None` when that is 0,
/// so the query does not count toward the mean.
pub fn query_recall(truth: &[i64], observed: &[i64], k: usize) -> Option<f64> {
    let k = k.min(observed.len()).min(truth.len());
    if k == 0 {
        return None;
    }
    let truth_set: HashSet<i64> = truth.iter().take(k).copied().collect();
    let found = observed
        .iter()
        .take(k)
        .filter(|id| truth_set.contains(id))
        .count();
    Some(found as f64 / k as f64)
}

/// Precision@k for one query: hits among the retrieved top-k over the number retrieved.
///
/// A hit is an observed id among the first `k` truth ids, the same truth set
/// recall uses when at least `k` results come back.
pub fn query_precision(truth: &[i64], observed: &[i64], k: usize) -> Option<f64> {
    let retrieved = k.min(observed.len());
    if retrieved == 0 {
        return None;
    }
    let truth_set: HashSet<i64> = truth.iter().take(k).copied().collect();
    let hits = observed
        .iter()
        .take(retrieved)
        .filter(|id| truth_set.contains(id))
        .count();
    Some(hits as f64 / retrieved as f64)
}

/// Reciprocal rank of the first observed id that is a true neighbor; 0 if none is.
pub fn query_reciprocal_rank(truth: &[i64], observed: &[i64]) -> f64 {
    let truth_set: HashSet<i64> = truth.iter().copied().collect();
    observed
        .iter()
        .position(|id| truth_set.contains(id))
        .map_or(0.0, |rank| 1.0 / (rank + 1) as f64)
}

/// NDCG@k for one query.
///
/// Relevance of a true neighbor is `|truth| - position`, so the closest one has the
/// highest grade. Returns `None` when the ideal DCG is 0.
pub fn query_ndcg(truth: &[i64], observed: &[i64], k: usize) -> Option<f64> {
    let n = truth.len();
    let relevance: HashMap<i64, f64> = truth
        .iter()
        .enumerate()
        .map(|(pos, &id)| (id, (n - pos) as f64))
        .collect();

    let discount = |pos: usize| ((pos + 2) as f64).log2();

    let dcg: f64 = observed
        .iter()
        .take(k)
        .enumerate()
        .map(|(pos, id)| relevance.get(id).copied().unwrap_or(0.0) / discount(pos))
        .sum();
    let idcg: f64 = (0..k.min(n))
        .map(|pos| (n - pos) as f64 / discount(pos))
        .sum();

    if idcg > 0.0 {
        Some(dcg / idcg)
    } else {
        None
    }
}

/// Mean recall@k across queries.
///
/// Queries whose effective k is 0 are excluded from the mean rather than scored
/// as 0; recorded baselines depend on this.
pub fn recall_at_k(ground_truth: &[GroundTruth], results: &[SearchResult], k: usize) -> f64 {
    check_lengths(ground_truth, results);
    mean_defined(
        ground_truth
            .iter()
            .zip(results)
            .map(|(gt, res)| query_recall(&gt.ids, &res.ids, k)),
    )
}

/// Mean precision@k across queries.
pub fn precision_at_k(ground_truth: &[GroundTruth], results: &[SearchResult], k: usize) -> f64 {
    check_lengths(ground_truth, results);
    mean_defined(
        ground_truth
            .iter()
            .zip(results)
            .map(|(gt, res)| query_precision(&gt.ids, &res.ids, k)),
    )
}

/// Mean reciprocal rank across all queries.
pub fn mean_reciprocal_rank(ground_truth: &[GroundTruth], results: &[SearchResult]) -> f64 {
    check_lengths(ground_truth, results);
    if results.is_empty() {
        return 0.0;
    }
    let total: f64 = ground_truth
        .iter()
        .zip(results)
        .map(|(gt, res)| query_reciprocal_rank(&gt.ids, &res.ids))
        .sum();
    total / results.len() as f64
}

/// Mean NDCG@k across queries with a non-zero ideal DCG.
pub fn ndcg_at_k(ground_truth: &[GroundTruth], results: &[SearchResult], k: usize) -> f64 {
    check_lengths(ground_truth, results);
    mean_defined(
        ground_truth
            .iter()
            .zip(results)
            .map(|(gt, res)| query_ndcg(&gt.ids, &res.ids, k)),
    )
}

/// Mean recall at several k values.
pub fn recall_curve(
    ground_truth: &[GroundTruth],
    results: &[SearchResult],
    k_values: &[usize],
) -> Vec<(usize, f64)> {
    k_values
        .iter()
        .map(|&k| (k, recall_at_k(ground_truth, results, k)))
        .collect()
}

/// Compute every quality metric in one pass over the inputs.
pub fn calculate_all_metrics(
    ground_truth: &[GroundTruth],
    results: &[SearchResult],
    k: usize,
) -> RecallMetrics {
    check_lengths(ground_truth, results);
    RecallMetrics {
        recall_1: recall_at_k(ground_truth, results, 1),
        recall_10: recall_at_k(ground_truth, results, 10),
        recall_100: recall_at_k(ground_truth, results, 100),
        recall_k: recall_at_k(ground_truth, results, k),
        precision: precision_at_k(ground_truth, results, k),
        mrr: mean_reciprocal_rank(ground_truth, results),
        ndcg: ndcg_at_k(ground_truth, results, k),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gt(ids: &[i64]) -> GroundTruth {
        GroundTruth::from_ids(ids.to_vec())
    }

    fn res(ids: &[i64]) -> SearchResult {
        SearchResult {
            ids: ids.to_vec(),
            distances: vec![0.0; ids.len()],
        }
    }

    #[test]
    fn test_recall_at_k() {
        let truth = [gt(&[1, 2, 3, 4, 5])];
        assert!((recall_at_k(&truth, &[res(&[1, 2, 3, 6, 7])], 5) - 0.6).abs() < 1e-9);
        assert!((recall_at_k(&truth, &[res(&[1, 2, 3, 4, 5])], 5) - 1.0).abs() < 1e-9);
        assert_eq!(recall_at_k(&truth, &[res(&[6, 7, 8, 9, 10])], 5), 0.0);
    }

    #[test]
    fn perfect_results_score_one_everywhere() {
        let truth = [gt(&[1, 2, 3, 4, 5])];
        let results = [res(&[1, 2, 3, 4, 5])];
        let m = calculate_all_metrics(&truth, &results, 5);
        assert_eq!(m.recall_k, 1.0);
        assert_eq!(m.precision, 1.0);
        assert_eq!(m.mrr, 1.0);
        assert!((m.ndcg - 1.0).abs() < 1e-12);
        // clamped to the 5 available neighbors
        assert_eq!(m.recall_10, 1.0);
        assert_eq!(m.recall_100, 1.0);
    }

    #[test]
    fn single_late_match() {
        let truth = [gt(&[1, 2, 3, 4, 5])];
        let results = [res(&[9, 8, 1, 7, 6])];
        let m = calculate_all_metrics(&truth, &results, 5);
        assert!((m.recall_k - 0.2).abs() < 1e-12);
        assert!((m.mrr - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(m.recall_1, 0.0);
    }

    #[test]
    fn effective_k_zero_is_excluded_from_mean() {
        let truth = [gt(&[1, 2]), gt(&[3, 4])];
        let results = [res(&[1, 2]), res(&[])];
        assert_eq!(recall_at_k(&truth, &results, 2), 1.0);
        // MRR averages over every query
        assert_eq!(mean_reciprocal_rank(&truth, &results), 0.5);
    }

    #[test]
    fn short_result_lists_clamp_k() {
        let truth = [gt(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10])];
        let results = [res(&[1, 2, 11])];
        assert!((recall_at_k(&truth, &results, 10) - 2.0 / 3.0).abs() < 1e-12);
        assert!((precision_at_k(&truth, &results, 10) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn precision_matches_against_first_k_truth_ids() {
        let truth = [gt(&[1, 2, 3])];
        let results = [res(&[3])];
        // Recall clamps its truth set to the single returned slot.
        assert_eq!(recall_at_k(&truth, &results, 3), 0.0);
        assert_eq!(precision_at_k(&truth, &results, 3), 1.0);
        assert_eq!(precision_at_k(&truth, &results, 2), 0.0);
    }

    #[test]
    fn test_ndcg_penalizes_order() {
        let truth = [gt(&[1, 2, 3])];
        let reversed = [res(&[3, 2, 1])];
        let v = ndcg_at_k(&truth, &reversed, 3);
        assert!(v > 0.0 && v < 1.0);

        // dcg = 1/1 + 2/log2(3) + 3/2 ; idcg = 3/1 + 2/log2(3) + 1/2
        let l3 = 3f64.log2();
        let expected = (1.0 + 2.0 / l3 + 1.5) / (3.0 + 2.0 / l3 + 0.5);
        assert!((v - expected).abs() < 1e-12);
    }

    #[test]
    fn ndcg_skips_queries_without_truth() {
        let truth = [gt(&[]), gt(&[1])];
        let results = [res(&[5]), res(&[1])];
        assert_eq!(ndcg_at_k(&truth, &results, 1), 1.0);
    }

    #[test]
    fn test_recall_curve() {
        let truth = [gt(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10])];
        let results = [res(&[1, 2, 3, 11, 12, 6, 7, 13, 14, 15])];
        let curve = recall_curve(&truth, &results, &[1, 5, 10]);
        assert_eq!(curve.len(), 3);
        assert!((curve[0].1 - 1.0).abs() < 1e-9);
        assert!((curve[1].1 - 0.6).abs() < 1e-9);
        assert!((curve[2].1 - 0.5).abs() < 1e-9);
    }

    #[test]
    fn empty_inputs_are_zero() {
        let m = calculate_all_metrics(&[], &[], 10);
        assert_eq!(m, RecallMetrics::default());
    }

    #[test]
    #[should_panic(expected = "mismatched lengths")]
    fn mismatched_lengths_panic() {
        recall_at_k(&[gt(&[1])], &[], 1);
    }

    #[test]
    fn display_lists_every_metric() {
        let s = RecallMetrics::default().to_string();
        for name in ["Recall@1=", "Recall@10=", "Recall@100=", "Precision=", "MRR=", "NDCG="] {
            assert!(s.contains(name), "{s}");
        }
    }
}
