//! Evaluation harness for ANN indexes.
//!
//! Measures index quality across three dimensions:
//!
//! - **Accuracy**: recall@k, precision@k, MRR, NDCG against exact ground truth
//! - **Speed**: per-query latency percentiles, QPS
//! - **Memory**: process RSS growth or the index's own estimate
//!
//! | Entry point | Input | Output |
//! |-------------|-------|--------|
//! | [`Evaluator::run_recall_test`] | one configuration | [`TestResult`] |
//! | [`Evaluator::run_parameter_sweep`] | ordered configurations | [`SweepReport`] |
//! | [`Evaluator::run_comparison`] | builders + one dataset | [`SweepReport`] |
//! | [`run_concurrent_load`] | shared index + streams | [`StreamingReport`] |
//!
//! # Standard Datasets
//!
//! | Dataset | Size | Dim | Queries | Distance |
//! |---------|------|-----|---------|----------|
//! | SIFT10K | 10K | 128 | 100 | L2 |
//! | SIFT1M | 1M | 128 | 10K | L2 |
//! | GIST1M | 1M | 960 | 1K | L2 |
//!
//! Files are read from `$ANNEVAL_TESTDATA/embeddings/` (default `testdata/`).
//!
//! Reference: <http://corpus-texmex.irisa.fr/>

pub mod config;
pub mod datasets;
pub mod ground_truth;
pub mod latency;
pub mod loader;
pub mod memory;
pub mod metrics;
pub mod orchestrator;
pub mod streaming;
pub mod sweep;

pub use config::{
    DataSource, PerformanceTargets, QualityTargets, TestConfiguration, STANDARD_TARGETS,
};
pub use datasets::{generate_synthetic, DataDistribution, Dataset, SyntheticSpec};
pub use ground_truth::{compute_ground_truth, GroundTruthCache, GroundTruthOracle};
pub use latency::{measure_latencies, PerformanceMetrics};
pub use loader::{DatasetProvider, FvecsProvider, InMemoryProvider};
pub use memory::MemoryTracker;
pub use metrics::{
    calculate_all_metrics, mean_reciprocal_rank, ndcg_at_k, precision_at_k, recall_at_k,
    GroundTruth, RecallMetrics, SearchResult,
};
pub use orchestrator::{
    measure_qps, run_recall_test, search_with_timing, Evaluator, TestResult, TestStatus, Violation,
};
pub use streaming::{run_concurrent_load, LoadIssue, StreamingConfig, StreamingReport};
pub use sweep::{run_parameter_sweep, SweepReport};
