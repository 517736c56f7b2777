//! Exact nearest neighbors: the baseline every approximate index is scored against.
//!
//! Ground truth comes from a [`FlatIndex`] scan and is computed at most once per
//! (corpus, queries, k, metric). [`GroundTruthOracle`] memoizes results in memory
//! for the lifetime of a sweep and can persist them as JSON between runs.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::datasets::Dataset;
use super::metrics::GroundTruth;
use crate::ann::{row_count, FlatIndex, SearchIndex};
use crate::distance::DistanceMetric;
use crate::error::Result;

/// Brute-force top-`k` for every query.
///
/// `vectors` and `queries` are flat buffers of `dim`-sized rows. Returned ids are
/// corpus row numbers; distances are the exact index's scores.
pub fn compute_ground_truth(
    vectors: &[f32],
    queries: &[f32],
    dim: usize,
    k: usize,
    metric: DistanceMetric,
) -> Result<Vec<GroundTruth>> {
    let n_queries = row_count(queries, dim)?;
    let mut index = FlatIndex::new(dim, metric);
    index.add(vectors)?;

    let start = Instant::now();
    let ground_truth = queries
        .chunks_exact(dim)
        .map(|query| {
            let res = index.search(query, k)?;
            Ok(GroundTruth {
                ids: res.ids,
                distances: Some(res.distances),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    debug!(
        n = index.ntotal(),
        n_queries,
        k,
        %metric,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "computed exact ground truth"
    );
    Ok(ground_truth)
}

/// Content hash identifying a ground-truth computation.
///
/// Covers the raw vector bytes as well as the parameters, so renamed or regenerated
/// data never reuses a stale entry.
pub fn cache_key(
    vectors: &[f32],
    queries: &[f32],
    dim: usize,
    k: usize,
    metric: DistanceMetric,
) -> String {
    let mut hasher = Sha256::new();
    for v in vectors {
        hasher.update(v.to_le_bytes());
    }
    hasher.update(b"|");
    for q in queries {
        hasher.update(q.to_le_bytes());
    }
    hasher.update(format!("_d{dim}_k{k}_m{metric}").as_bytes());
    let hex = format!("{:x}", hasher.finalize());
    hex[..16].to_string()
}

const CACHE_VERSION: u32 = 1;
const CACHE_PREFIX: &str = "gt_cache_";

#[derive(Debug, Serialize, Deserialize)]
struct CachedGroundTruth {
    version: u32,
    n: usize,
    n_queries: usize,
    dim: usize,
    k: usize,
    metric: String,
    results: Vec<Vec<i64>>,
}

/// On-disk JSON cache of ground-truth ids.
///
/// Only ids are stored. Entries whose shape or metric disagree with the request
/// are treated as misses.
#[derive(Debug, Clone)]
pub struct GroundTruthCache {
    dir: PathBuf,
}

impl GroundTruthCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{CACHE_PREFIX}{key}.json"))
    }

    /// Load a cached entry, or `None` if missing, unreadable or stale.
    pub fn load(
        &self,
        key: &str,
        dataset: &Dataset,
        k: usize,
        metric: DistanceMetric,
    ) -> Option<Vec<GroundTruth>> {
        let bytes = fs::read(self.path(key)).ok()?;
        let cached: CachedGroundTruth = match serde_json::from_slice(&bytes) {
            Ok(c) => c,
            Err(e) => {
                warn!(key, error = %e, "ignoring unreadable ground-truth cache entry");
                return None;
            }
        };
        let fresh = cached.version == CACHE_VERSION
            && cached.n == dataset.n
            && cached.n_queries == dataset.n_queries
            && cached.dim == dataset.dim
            && cached.k == k
            && cached.metric == metric.as_str();
        if !fresh {
            debug!(key, "stale ground-truth cache entry");
            return None;
        }
        Some(cached.results.into_iter().map(GroundTruth::from_ids).collect())
    }

    /// Persist ground-truth ids under `key`.
    pub fn save(
        &self,
        key: &str,
        dataset: &Dataset,
        k: usize,
        metric: DistanceMetric,
        ground_truth: &[GroundTruth],
    ) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let cached = CachedGroundTruth {
            version: CACHE_VERSION,
            n: dataset.n,
            n_queries: dataset.n_queries,
            dim: dataset.dim,
            k,
            metric: metric.as_str().to_string(),
            results: ground_truth.iter().map(|gt| gt.ids.clone()).collect(),
        };
        fs::write(self.path(key), serde_json::to_vec_pretty(&cached)?)?;
        Ok(())
    }

    /// Remove every cache file in the directory.
    pub fn clear(&self) -> Result<usize> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut removed = 0;
        for entry in entries {
            let path = entry?.path();
            let is_cache = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(CACHE_PREFIX) && n.ends_with(".json"));
            if is_cache {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Source of ground truth for evaluation runs.
///
/// Uses the dataset's shipped neighbors when present; otherwise computes them by
/// brute force, once per distinct dataset content.
#[derive(Debug, Default)]
pub struct GroundTruthOracle {
    memo: Mutex<HashMap<String, Arc<Vec<GroundTruth>>>>,
    disk: Option<GroundTruthCache>,
}

impl GroundTruthOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also persist computed ground truth under `dir`.
    pub fn with_disk_cache(mut self, dir: impl Into<PathBuf>) -> Self {
        self.disk = Some(GroundTruthCache::new(dir));
        self
    }

    /// Number of distinct computations held in memory.
    pub fn memoized(&self) -> usize {
        self.memo.lock().len()
    }

    /// Ground truth for `dataset` at `k` under `metric`.
    pub fn ground_truth(
        &self,
        dataset: &Dataset,
        k: usize,
        metric: DistanceMetric,
    ) -> Result<Arc<Vec<GroundTruth>>> {
        if let Some(shipped) = &dataset.ground_truth {
            return Ok(Arc::new(shipped.clone()));
        }

        let key = cache_key(&dataset.vectors, &dataset.queries, dataset.dim, k, metric);
        if let Some(hit) = self.memo.lock().get(&key) {
            debug!(dataset = %dataset.name, key, "reusing ground truth");
            return Ok(Arc::clone(hit));
        }

        let ground_truth = match self
            .disk
            .as_ref()
            .and_then(|disk| disk.load(&key, dataset, k, metric))
        {
            Some(cached) => {
                info!(dataset = %dataset.name, key, "loaded ground truth from cache");
                cached
            }
            None => {
                info!(
                    dataset = %dataset.name,
                    n = dataset.n,
                    n_queries = dataset.n_queries,
                    k,
                    "computing ground truth by brute force"
                );
                let computed = compute_ground_truth(
                    &dataset.vectors,
                    &dataset.queries,
                    dataset.dim,
                    k,
                    metric,
                )?;
                if let Some(disk) = &self.disk {
                    if let Err(e) = disk.save(&key, dataset, k, metric, &computed) {
                        warn!(key, error = %e, "failed to write ground-truth cache");
                    }
                }
                computed
            }
        };

        let shared = Arc::new(ground_truth);
        self.memo.lock().insert(key, Arc::clone(&shared));
        Ok(shared)
    }
}
