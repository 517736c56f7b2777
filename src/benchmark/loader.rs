//! Real benchmark datasets in the TEXMEX `.fvecs` / `.ivecs` formats.
//!
//! Each record is a little-endian `i32` dimension followed by that many 4-byte
//! values (`f32` for fvecs, `i32` for ivecs). Files live under
//! `<testdata>/embeddings/`.
//!
//! | Dataset | Size | Dim | Queries | Source |
//! |---------|------|-----|---------|--------|
//! | SIFT10K | 10K | 128 | 100 | subset of SIFT1M |
//! | SIFT1M | 1M | 128 | 10K | INRIA Texmex |
//! | GIST1M | 1M | 960 | 1K | INRIA Texmex |

use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::datasets::Dataset;
use super::metrics::GroundTruth;
use crate::error::{EvalError, Result};

/// Environment variable overriding the testdata root.
pub const TESTDATA_ENV: &str = "ANNEVAL_TESTDATA";

/// Default testdata root, relative to the working directory.
pub const DEFAULT_TESTDATA: &str = "testdata";

/// Source of named datasets.
///
/// A missing dataset must be reported as [`EvalError::DatasetUnavailable`] so the
/// orchestrator can turn it into a skip.
pub trait DatasetProvider: Send + Sync {
    fn load(&self, name: &str) -> Result<Dataset>;
}

/// Catalog entry for a known dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub base_file: &'static str,
    pub query_file: &'static str,
    pub ground_truth_file: &'static str,
    pub n: usize,
    pub n_queries: usize,
    pub dim: usize,
}

/// Standard datasets the file provider knows how to find.
pub const KNOWN_DATASETS: &[DatasetInfo] = &[
    DatasetInfo {
        name: "SIFT10K",
        description: "10K SIFT descriptors (subset of SIFT1M)",
        base_file: "sift10k_base.fvecs",
        query_file: "sift10k_query.fvecs",
        ground_truth_file: "sift10k_groundtruth.ivecs",
        n: 10_000,
        n_queries: 100,
        dim: 128,
    },
    DatasetInfo {
        name: "SIFT1M",
        description: "1M SIFT descriptors (128-dim)",
        base_file: "sift1m_base.fvecs",
        query_file: "sift1m_query.fvecs",
        ground_truth_file: "sift1m_groundtruth.ivecs",
        n: 1_000_000,
        n_queries: 10_000,
        dim: 128,
    },
    DatasetInfo {
        name: "GIST1M",
        description: "1M GIST descriptors (960-dim)",
        base_file: "gist1m_base.fvecs",
        query_file: "gist1m_query.fvecs",
        ground_truth_file: "gist1m_groundtruth.ivecs",
        n: 1_000_000,
        n_queries: 1_000,
        dim: 960,
    },
];

/// Look up a catalog entry by name.
pub fn dataset_info(name: &str) -> Option<&'static DatasetInfo> {
    KNOWN_DATASETS.iter().find(|d| d.name == name)
}

/// Loads catalog datasets from `<root>/embeddings/`.
#[derive(Debug, Clone)]
pub struct FvecsProvider {
    root: PathBuf,
}

impl FvecsProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root from `ANNEVAL_TESTDATA`, falling back to `testdata/`.
    pub fn from_env() -> Self {
        let root = std::env::var_os(TESTDATA_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TESTDATA));
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, file: &str) -> PathBuf {
        self.root.join("embeddings").join(file)
    }
}

impl Default for FvecsProvider {
    fn default() -> Self {
        Self::from_env()
    }
}

impl DatasetProvider for FvecsProvider {
    fn load(&self, name: &str) -> Result<Dataset> {
        let info = dataset_info(name).ok_or_else(|| EvalError::DatasetUnavailable {
            name: name.to_string(),
            reason: "unknown dataset".into(),
        })?;

        let unavailable = |e: EvalError| match e {
            EvalError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                EvalError::DatasetUnavailable {
                    name: name.to_string(),
                    reason: io.to_string(),
                }
            }
            other => other,
        };

        let (vectors, dim) = read_fvecs(&self.path(info.base_file)).map_err(unavailable)?;
        let (queries, query_dim) = read_fvecs(&self.path(info.query_file)).map_err(unavailable)?;
        if dim != query_dim {
            return Err(EvalError::DimensionMismatch {
                expected: dim,
                actual: query_dim,
            });
        }
        let neighbors = read_ivecs(&self.path(info.ground_truth_file)).map_err(unavailable)?;

        let mut dataset = Dataset::from_flat(name, vectors, queries, dim)?;
        if neighbors.len() < dataset.n_queries {
            return Err(EvalError::MalformedDataset {
                path: self.path(info.ground_truth_file).display().to_string(),
                reason: format!(
                    "{} ground-truth rows for {} queries",
                    neighbors.len(),
                    dataset.n_queries
                ),
            });
        }
        dataset.ground_truth = Some(
            neighbors
                .into_iter()
                .take(dataset.n_queries)
                .map(GroundTruth::from_ids)
                .collect(),
        );
        debug!(
            dataset = name,
            n = dataset.n,
            n_queries = dataset.n_queries,
            dim = dataset.dim,
            "loaded dataset"
        );
        Ok(dataset)
    }
}

/// Provider over datasets already held in memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryProvider {
    datasets: HashMap<String, Dataset>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, dataset: Dataset) {
        self.datasets.insert(dataset.name.clone(), dataset);
    }

    pub fn with(mut self, dataset: Dataset) -> Self {
        self.insert(dataset);
        self
    }
}

impl DatasetProvider for InMemoryProvider {
    fn load(&self, name: &str) -> Result<Dataset> {
        self.datasets
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::DatasetUnavailable {
                name: name.to_string(),
                reason: "not registered".into(),
            })
    }
}

/// Split a vecs file into `(dim, payload)` records, all with the same dimension.
fn read_records(path: &Path) -> Result<(Vec<[u8; 4]>, usize)> {
    let bytes = fs::read(path)?;
    let malformed = |reason: String| EvalError::MalformedDataset {
        path: path.display().to_string(),
        reason,
    };
    if bytes.is_empty() {
        return Ok((Vec::new(), 0));
    }
    if bytes.len() < 4 {
        return Err(malformed("truncated header".into()));
    }
    let dim = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if dim <= 0 {
        return Err(malformed(format!("invalid dimension {dim}")));
    }
    let dim = dim as usize;
    let record = 4 * (dim + 1);
    if bytes.len() % record != 0 {
        return Err(malformed(format!(
            "file size {} is not a multiple of record size {record}",
            bytes.len()
        )));
    }

    let mut words = Vec::with_capacity(bytes.len() / record * dim);
    for (i, rec) in bytes.chunks_exact(record).enumerate() {
        let d = i32::from_le_bytes([rec[0], rec[1], rec[2], rec[3]]);
        if d as usize != dim {
            return Err(malformed(format!(
                "dimension mismatch at record {i}: expected {dim}, got {d}"
            )));
        }
        words.extend(
            rec[4..]
                .chunks_exact(4)
                .map(|w| [w[0], w[1], w[2], w[3]]),
        );
    }
    Ok((words, dim))
}

/// Read an `.fvecs` file into a flat buffer. Returns `(vectors, dim)`.
pub fn read_fvecs(path: &Path) -> Result<(Vec<f32>, usize)> {
    let (words, dim) = read_records(path)?;
    Ok((words.into_iter().map(f32::from_le_bytes).collect(), dim))
}

/// Read an `.ivecs` file into one id list per row.
pub fn read_ivecs(path: &Path) -> Result<Vec<Vec<i64>>> {
    let (words, dim) = read_records(path)?;
    if dim == 0 {
        return Ok(Vec::new());
    }
    Ok(words
        .chunks_exact(dim)
        .map(|row| row.iter().map(|w| i32::from_le_bytes(*w) as i64).collect())
        .collect())
}

/// Write a flat buffer as `.fvecs`.
pub fn write_fvecs(path: &Path, vectors: &[f32], dim: usize) -> Result<()> {
    crate::ann::row_count(vectors, dim)?;
    let mut out = BufWriter::new(fs::File::create(path)?);
    for row in vectors.chunks_exact(dim) {
        out.write_all(&(dim as i32).to_le_bytes())?;
        for v in row {
            out.write_all(&v.to_le_bytes())?;
        }
    }
    out.flush()?;
    Ok(())
}

/// Write id rows as `.ivecs`. Every row must have the same length.
pub fn write_ivecs(path: &Path, rows: &[Vec<i64>]) -> Result<()> {
    let k = rows.first().map_or(0, Vec::len);
    let mut out = BufWriter::new(fs::File::create(path)?);
    for (i, row) in rows.iter().enumerate() {
        if row.len() != k {
            return Err(EvalError::InvalidParameter(format!(
                "row {i} has {} ids, expected {k}",
                row.len()
            )));
        }
        out.write_all(&(k as i32).to_le_bytes())?;
        for &id in row {
            let id = i32::try_from(id).map_err(|_| {
                EvalError::InvalidParameter(format!("id {id} does not fit in ivecs"))
            })?;
            out.write_all(&id.to_le_bytes())?;
        }
    }
    out.flush()?;
    Ok(())
}
