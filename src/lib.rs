//! anneval: recall and latency evaluation for approximate nearest neighbor indexes.
//!
//! Any index implementing [`SearchIndex`] can be measured against exact ground
//! truth computed by brute force:
//!
//! - `ann/`: capability traits and the exact [`FlatIndex`]
//! - `benchmark/`: metrics, datasets, ground truth, the run pipeline, sweeps and
//!   concurrent load
//!
//! ```rust,ignore
//! use anneval::benchmark::{Evaluator, QualityTargets, TestConfiguration};
//!
//! let config = TestConfiguration::new("IVF100_nprobe8", ivf_builder)
//!     .with_dataset("SIFT10K")
//!     .with_training(Some(5_000))
//!     .with_quality(QualityTargets::new(0.0, 0.90, 0.0))
//!     .skip_if_no_data(true);
//! let result = Evaluator::new().run_recall_test(&config);
//! println!("{}", result.summary());
//! ```
//!
//! # What the numbers mean
//!
//! ## Recall depends on the ground truth's K
//!
//! Recall@K is clamped to `min(K, |truth|, |observed|)`. Ground truth computed at
//! K=10 cannot tell you Recall@100: the value reported is Recall@10.
//!
//! ## Latency excludes everything but the search call
//!
//! Per-query timings wrap only `search`. Metric computation, logging and result
//! copying happen outside the timed region, so QPS here is an upper bound on what
//! a serving path achieves.
//!
//! ## Memory is best effort
//!
//! Footprint is the process RSS delta around build and populate on Linux, or the
//! index's own estimate elsewhere. Allocator caching makes small deltas noisy.

pub mod ann;
pub mod benchmark;
pub mod distance;
pub mod error;

// Re-exports
pub use ann::{FlatIndex, IndexBuilder, SearchIndex, SharedIndex};
pub use distance::DistanceMetric;
pub use error::{EvalError, Result};
