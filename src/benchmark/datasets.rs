//! Evaluation datasets and synthetic generation.
//!
//! Vectors are stored as flat row-major buffers (`n * dim` floats), the same
//! layout the index capability consumes, so nothing is copied between
//! acquisition and population.
//!
//! | Distribution | Shape | Notes |
//! |--------------|-------|-------|
//! | Uniform | `[0,1)^d` | Baseline, no structure |
//! | GaussianClustered | centers in `[0,100)^d`, σ = 5 | Closest to real embeddings |
//! | PowerLaw | radius `100 · i^-1.5` | Dense core, long tail |
//! | Normalized | unit sphere | For inner product / cosine |
//! | Sparse | mostly zeros | Bag-of-words style |

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::Serialize;

use super::metrics::GroundTruth;
use crate::distance::normalize_rows;
use crate::error::{EvalError, Result};

/// Seed used when a configuration does not pick one.
pub const DEFAULT_SEED: u64 = 42;

/// Shape of synthetic data.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub enum DataDistribution {
    #[default]
    Uniform,
    GaussianClustered,
    PowerLaw,
    Normalized,
    /// Each component is zero with probability `sparsity`.
    Sparse { sparsity: f64 },
}

/// Parameters for a synthetic dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyntheticSpec {
    pub n: usize,
    pub dim: usize,
    pub n_queries: usize,
    pub distribution: DataDistribution,
    /// Cluster count for [`DataDistribution::GaussianClustered`]; defaults to ~10% of `n`.
    pub n_clusters: Option<usize>,
    pub seed: u64,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            n: 10_000,
            dim: 128,
            n_queries: 100,
            distribution: DataDistribution::Uniform,
            n_clusters: None,
            seed: DEFAULT_SEED,
        }
    }
}

impl SyntheticSpec {
    pub fn new(n: usize, dim: usize, n_queries: usize, distribution: DataDistribution) -> Self {
        Self {
            n,
            dim,
            n_queries,
            distribution,
            ..Default::default()
        }
    }

    /// Stable label for logs and cache lookups.
    pub fn label(&self) -> String {
        format!(
            "synthetic-{:?}-n{}-d{}-q{}-s{}",
            self.distribution, self.n, self.dim, self.n_queries, self.seed
        )
    }
}

/// A corpus plus queries, with ground truth when the source ships it.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub name: String,
    /// Corpus, `n * dim` floats.
    pub vectors: Vec<f32>,
    /// Queries, `n_queries * dim` floats.
    pub queries: Vec<f32>,
    pub n: usize,
    pub n_queries: usize,
    pub dim: usize,
    pub ground_truth: Option<Vec<GroundTruth>>,
}

impl Dataset {
    /// Assemble a dataset from flat buffers, checking their shapes.
    pub fn from_flat(
        name: impl Into<String>,
        vectors: Vec<f32>,
        queries: Vec<f32>,
        dim: usize,
    ) -> Result<Self> {
        let n = crate::ann::row_count(&vectors, dim)?;
        let n_queries = crate::ann::row_count(&queries, dim)?;
        Ok(Self {
            name: name.into(),
            vectors,
            queries,
            n,
            n_queries,
            dim,
            ground_truth: None,
        })
    }

    pub fn with_ground_truth(mut self, ground_truth: Vec<GroundTruth>) -> Self {
        self.ground_truth = Some(ground_truth);
        self
    }

    /// Corpus vector `i`.
    pub fn vector(&self, i: usize) -> &[f32] {
        &self.vectors[i * self.dim..(i + 1) * self.dim]
    }

    /// Query vector `i`.
    pub fn query(&self, i: usize) -> &[f32] {
        &self.queries[i * self.dim..(i + 1) * self.dim]
    }

    /// Total memory footprint of raw vectors in bytes.
    pub fn memory_bytes(&self) -> usize {
        (self.vectors.len() + self.queries.len()) * std::mem::size_of::<f32>()
    }

    /// Validate dataset consistency.
    pub fn validate(&self) -> Result<()> {
        if self.dim == 0 {
            return Err(EvalError::InvalidParameter("dimension must be > 0".into()));
        }
        if self.vectors.len() != self.n * self.dim {
            return Err(EvalError::InvalidParameter(format!(
                "corpus holds {} floats, expected {} x {}",
                self.vectors.len(),
                self.n,
                self.dim
            )));
        }
        if self.queries.len() != self.n_queries * self.dim {
            return Err(EvalError::InvalidParameter(format!(
                "queries hold {} floats, expected {} x {}",
                self.queries.len(),
                self.n_queries,
                self.dim
            )));
        }
        if let Some(gt) = &self.ground_truth {
            if gt.len() < self.n_queries {
                return Err(EvalError::InvalidParameter(format!(
                    "ground truth covers {} queries, expected {}",
                    gt.len(),
                    self.n_queries
                )));
            }
        }
        Ok(())
    }

    /// Replace the queries with noisy copies of corpus vectors.
    ///
    /// Sources are spread evenly across the corpus so every query has a known
    /// near neighbor. `noise` is the standard deviation of the added Gaussian noise.
    pub fn perturb_queries(&mut self, n_queries: usize, noise: f32, seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut queries = Vec::with_capacity(n_queries * self.dim);
        if self.n > 0 {
            let stride = (self.n / n_queries.max(1)).max(1);
            for i in 0..n_queries {
                let base = i * self.n / n_queries;
                let src = (base + rng.random_range(0..stride)) % self.n;
                for j in 0..self.dim {
                    let z: f32 = rng.sample(StandardNormal);
                    queries.push(self.vectors[src * self.dim + j] + z * noise);
                }
            }
        }
        self.n_queries = queries.len() / self.dim.max(1);
        self.queries = queries;
        self.ground_truth = None;
    }
}

/// Generate a synthetic corpus and query set (no ground truth).
pub fn generate_synthetic(spec: &SyntheticSpec) -> Result<Dataset> {
    if spec.dim == 0 {
        return Err(EvalError::InvalidParameter("dimension must be > 0".into()));
    }
    let mut rng = StdRng::seed_from_u64(spec.seed);
    let (vectors, queries) = match spec.distribution {
        DataDistribution::Uniform => (
            uniform(&mut rng, spec.n, spec.dim),
            uniform(&mut rng, spec.n_queries, spec.dim),
        ),
        DataDistribution::GaussianClustered => {
            let n_clusters = spec.n_clusters.unwrap_or(spec.n / 10).max(1);
            let centers: Vec<f32> = (0..n_clusters * spec.dim)
                .map(|_| rng.random::<f32>() * 100.0)
                .collect();
            (
                clustered(&mut rng, &centers, spec.n, spec.dim),
                clustered(&mut rng, &centers, spec.n_queries, spec.dim),
            )
        }
        DataDistribution::PowerLaw => (
            power_law(&mut rng, spec.n, spec.dim),
            uniform(&mut rng, spec.n_queries, spec.dim),
        ),
        DataDistribution::Normalized => {
            let mut vectors = signed_uniform(&mut rng, spec.n, spec.dim);
            let mut queries = signed_uniform(&mut rng, spec.n_queries, spec.dim);
            normalize_rows(&mut vectors, spec.dim);
            normalize_rows(&mut queries, spec.dim);
            (vectors, queries)
        }
        DataDistribution::Sparse { sparsity } => {
            let sparsity = sparsity.clamp(0.0, 1.0);
            (
                sparse(&mut rng, spec.n, spec.dim, sparsity),
                sparse(&mut rng, spec.n_queries, spec.dim, sparsity),
            )
        }
    };

    Ok(Dataset {
        name: spec.label(),
        vectors,
        queries,
        n: spec.n,
        n_queries: spec.n_queries,
        dim: spec.dim,
        ground_truth: None,
    })
}

fn uniform(rng: &mut StdRng, n: usize, dim: usize) -> Vec<f32> {
    (0..n * dim).map(|_| rng.random::<f32>()).collect()
}

fn signed_uniform(rng: &mut StdRng, n: usize, dim: usize) -> Vec<f32> {
    (0..n * dim).map(|_| rng.random::<f32>() * 2.0 - 1.0).collect()
}

fn clustered(rng: &mut StdRng, centers: &[f32], n: usize, dim: usize) -> Vec<f32> {
    let n_clusters = centers.len() / dim;
    let mut out = Vec::with_capacity(n * dim);
    for _ in 0..n {
        let c = rng.random_range(0..n_clusters);
        for &center in &centers[c * dim..(c + 1) * dim] {
            let z: f32 = rng.sample(StandardNormal);
            out.push(center + z * 5.0);
        }
    }
    out
}

fn power_law(rng: &mut StdRng, n: usize, dim: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; n * dim];
    // Row 0 stays at the origin.
    for i in 1..n {
        let radius = (i as f64).powf(-1.5) as f32 * 100.0;
        let row = &mut out[i * dim..(i + 1) * dim];
        row.iter_mut()
            .for_each(|x| *x = rng.random::<f32>() * 2.0 - 1.0);
        let norm = row.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            row.iter_mut().for_each(|x| *x = *x / norm * radius);
        }
    }
    out
}

fn sparse(rng: &mut StdRng, n: usize, dim: usize, sparsity: f64) -> Vec<f32> {
    (0..n * dim)
        .map(|_| {
            if rng.random::<f64>() > sparsity {
                rng.random::<f32>()
            } else {
                0.0
            }
        })
        .collect()
}
