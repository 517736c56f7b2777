//! Capability traits for indexes under test.
//!
//! The harness never looks inside an index. Anything that can report its shape,
//! optionally train, accept a flat buffer of vectors and answer k-NN queries can
//! be evaluated, whether it is exact, graph-based, clustered or quantized.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::benchmark::metrics::SearchResult;
use crate::distance::DistanceMetric;
use crate::error::{EvalError, Result};

/// Unified trait for every index the harness can evaluate.
///
/// Vectors are passed as flat row-major buffers: `n * dimension()` floats.
pub trait SearchIndex: Send + Sync {
    /// Human-readable algorithm name for logs.
    fn name(&self) -> String {
        "index".to_string()
    }

    /// Vector dimension.
    fn dimension(&self) -> usize;

    /// Number of vectors currently stored.
    fn ntotal(&self) -> usize;

    /// Whether the index is ready to accept vectors.
    ///
    /// Indexes without a training phase are always trained.
    fn is_trained(&self) -> bool {
        true
    }

    /// Train on a flat buffer of vectors.
    fn train(&mut self, _vectors: &[f32]) -> Result<()> {
        Ok(())
    }

    /// Insert a flat buffer of vectors. Ids are assigned sequentially from `ntotal()`.
    fn add(&mut self, vectors: &[f32]) -> Result<()>;

    /// Search one query vector for its `k` nearest neighbors, closest first.
    ///
    /// May return fewer than `k` results (e.g. when the index holds fewer vectors).
    fn search(&self, query: &[f32], k: usize) -> Result<SearchResult>;

    /// Approximate resident size in bytes, if the index can tell.
    fn size_bytes(&self) -> Option<usize> {
        None
    }

    /// Release resources held outside Rust ownership (files, native handles).
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: SearchIndex + ?Sized> SearchIndex for Box<T> {
    fn name(&self) -> String {
        (**self).name()
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn ntotal(&self) -> usize {
        (**self).ntotal()
    }

    fn is_trained(&self) -> bool {
        (**self).is_trained()
    }

    fn train(&mut self, vectors: &[f32]) -> Result<()> {
        (**self).train(vectors)
    }

    fn add(&mut self, vectors: &[f32]) -> Result<()> {
        (**self).add(vectors)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<SearchResult> {
        (**self).search(query, k)
    }

    fn size_bytes(&self) -> Option<usize> {
        (**self).size_bytes()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// An index that accepts inserts and queries from several threads at once.
///
/// The harness imposes no locking discipline of its own: whatever the
/// implementation does internally is what the concurrent load runner measures.
pub trait SharedIndex: Sync {
    /// Vector dimension.
    fn dimension(&self) -> usize;

    /// Number of vectors currently stored.
    fn ntotal(&self) -> usize;

    /// Insert a flat buffer of vectors.
    fn add(&self, vectors: &[f32]) -> Result<()>;

    /// Search one query vector.
    fn search(&self, query: &[f32], k: usize) -> Result<SearchResult>;
}

/// Single-writer / many-reader sharing for any [`SearchIndex`].
impl<I: SearchIndex> SharedIndex for RwLock<I> {
    fn dimension(&self) -> usize {
        self.read().dimension()
    }

    fn ntotal(&self) -> usize {
        self.read().ntotal()
    }

    fn add(&self, vectors: &[f32]) -> Result<()> {
        self.write().add(vectors)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<SearchResult> {
        self.read().search(query, k)
    }
}

impl<S: SharedIndex + Send + ?Sized> SharedIndex for Arc<S> {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn ntotal(&self) -> usize {
        (**self).ntotal()
    }

    fn add(&self, vectors: &[f32]) -> Result<()> {
        (**self).add(vectors)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<SearchResult> {
        (**self).search(query, k)
    }
}

/// Deferred construction of an index under test.
///
/// A configuration holds a builder rather than an index so that every run gets a
/// fresh instance sized for the dataset it ends up with.
pub trait IndexBuilder: Send + Sync {
    /// Name used in reports and serialized configurations.
    fn name(&self) -> &str;

    /// Construct a new, empty index.
    fn build(&self, dimension: usize, metric: DistanceMetric) -> Result<Box<dyn SearchIndex>>;
}

/// [`IndexBuilder`] backed by a closure.
pub struct FnBuilder<F> {
    name: String,
    build: F,
}

impl<F> FnBuilder<F>
where
    F: Fn(usize, DistanceMetric) -> Result<Box<dyn SearchIndex>> + Send + Sync,
{
    pub fn new(name: impl Into<String>, build: F) -> Self {
        Self {
            name: name.into(),
            build,
        }
    }
}

impl<F> IndexBuilder for FnBuilder<F>
where
    F: Fn(usize, DistanceMetric) -> Result<Box<dyn SearchIndex>> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn build(&self, dimension: usize, metric: DistanceMetric) -> Result<Box<dyn SearchIndex>> {
        (self.build)(dimension, metric)
    }
}

impl std::fmt::Debug for dyn IndexBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexBuilder")
            .field("name", &self.name())
            .finish()
    }
}

/// Wrap a closure as a shareable builder.
pub fn builder_fn<F>(name: impl Into<String>, build: F) -> Arc<dyn IndexBuilder>
where
    F: Fn(usize, DistanceMetric) -> Result<Box<dyn SearchIndex>> + Send + Sync + 'static,
{
    Arc::new(FnBuilder::new(name, build))
}

/// Number of `dim`-sized rows in a flat buffer.
pub fn row_count(vectors: &[f32], dim: usize) -> Result<usize> {
    if dim == 0 {
        return Err(EvalError::InvalidParameter("dimension must be > 0".into()));
    }
    if vectors.len() % dim != 0 {
        return Err(EvalError::InvalidParameter(format!(
            "buffer of {} floats is not a multiple of dimension {dim}",
            vectors.len()
        )));
    }
    Ok(vectors.len() / dim)
}
