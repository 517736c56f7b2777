//! Distance metrics for dense vectors.
//!
//! Two metrics cover the exact indexes used as ground truth:
//!
//! - [`DistanceMetric::L2`] reports **squared** Euclidean distance; smaller is closer.
//! - [`DistanceMetric::InnerProduct`] reports the raw dot product; larger is closer.
//!
//! ## Important nuance
//!
//! Inner product is a similarity, not a distance. Ranking code must go through
//! [`DistanceMetric::is_closer`] instead of comparing scores directly. For cosine
//! similarity, [`normalize`] the vectors first and use inner product.

use serde::Serialize;

/// Distance metric for dense vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum DistanceMetric {
    /// Squared Euclidean distance.
    #[default]
    L2,
    /// Inner product $\langle a,b\rangle$ (maximum inner product search).
    InnerProduct,
}

impl DistanceMetric {
    /// Score between two vectors under this metric.
    ///
    /// If dimensions mismatch, this returns the worst possible score (so it is never
    /// selected as a nearest neighbor).
    #[inline]
    #[must_use]
    pub fn score(self, a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return self.worst();
        }
        match self {
            DistanceMetric::L2 => l2_squared(a, b),
            DistanceMetric::InnerProduct => inner_product(a, b),
        }
    }

    /// Whether score `a` ranks ahead of score `b`.
    #[inline]
    #[must_use]
    pub fn is_closer(self, a: f32, b: f32) -> bool {
        match self {
            DistanceMetric::L2 => a < b,
            DistanceMetric::InnerProduct => a > b,
        }
    }

    /// Total order consistent with [`DistanceMetric::is_closer`] (closest first).
    #[inline]
    pub fn cmp_scores(self, a: f32, b: f32) -> std::cmp::Ordering {
        let ord = a.total_cmp(&b);
        match self {
            DistanceMetric::L2 => ord,
            DistanceMetric::InnerProduct => ord.reverse(),
        }
    }

    fn worst(self) -> f32 {
        match self {
            DistanceMetric::L2 => f32::INFINITY,
            DistanceMetric::InnerProduct => f32::NEG_INFINITY,
        }
    }

    /// Short tag used in cache keys and reports.
    pub fn as_str(self) -> &'static str {
        match self {
            DistanceMetric::L2 => "L2",
            DistanceMetric::InnerProduct => "IP",
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Squared L2 distance.
#[inline]
#[must_use]
pub fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Dot product.
#[inline]
#[must_use]
pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Normalize a vector to unit L2 norm.
#[inline]
#[must_use]
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let n = inner_product(v, v).sqrt();
    if n < 1e-10 {
        return vec![0.0; v.len()];
    }
    v.iter().map(|x| x / n).collect()
}

/// Normalize every `dim`-sized row of a flat buffer in place.
pub fn normalize_rows(flat: &mut [f32], dim: usize) {
    if dim == 0 {
        return;
    }
    for row in flat.chunks_exact_mut(dim) {
        let n = inner_product(row, row).sqrt();
        if n > 0.0 {
            row.iter_mut().for_each(|x| *x /= n);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2_is_squared() {
        assert_eq!(DistanceMetric::L2.score(&[0.0, 0.0], &[3.0, 4.0]), 25.0);
    }

    #[test]
    fn inner_product_prefers_larger() {
        let m = DistanceMetric::InnerProduct;
        assert!(m.is_closer(0.9, 0.1));
        assert_eq!(m.cmp_scores(0.9, 0.1), std::cmp::Ordering::Less);
    }

    #[test]
    fn mismatched_dimensions_never_win() {
        assert_eq!(DistanceMetric::L2.score(&[1.0], &[1.0, 2.0]), f32::INFINITY);
        assert_eq!(
            DistanceMetric::InnerProduct.score(&[1.0], &[1.0, 2.0]),
            f32::NEG_INFINITY
        );
    }

    #[test]
    fn normalize_rows_unit_length() {
        let mut flat = vec![3.0, 4.0, 0.0, 0.0];
        normalize_rows(&mut flat, 2);
        assert!((flat[0] - 0.6).abs() < 1e-6);
        assert!((flat[1] - 0.8).abs() < 1e-6);
        assert_eq!(&flat[2..], &[0.0, 0.0]);
    }
}
