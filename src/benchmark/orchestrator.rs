//! Single-configuration evaluation pipeline.
//!
//! A run walks through fixed stages and never goes back:
//!
//! 1. acquire the dataset and its ground truth
//! 2. build a fresh index
//! 3. train it, if the configuration asks for training
//! 4. insert the corpus
//! 5. measure the footprint (best effort)
//! 6. search every query, timing only the search call
//! 7. compute recall and latency metrics
//! 8. check every declared target, collecting all violations
//! 9. assemble the [`TestResult`] and close the index
//!
//! A stage error ends the run with the error attached to the result and no metrics.
//! A missing dataset (with `skip_if_no_data`) or an index refusing to train on too
//! little data marks the run skipped instead.

use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};
use tracing::{debug, info, warn};

use super::config::{DataSource, PerformanceTargets, QualityTargets, TestConfiguration};
use super::datasets::{generate_synthetic, Dataset};
use super::ground_truth::GroundTruthOracle;
use super::latency::{measure_latencies, PerformanceMetrics};
use super::loader::{DatasetProvider, FvecsProvider};
use super::memory::{measure_index_memory, MemoryTracker};
use super::metrics::{calculate_all_metrics, GroundTruth, RecallMetrics, SearchResult};
use crate::ann::{row_count, SearchIndex};
use crate::error::{EvalError, Result, Stage};

/// A measured value that missed its target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Violation {
    Recall { at: usize, measured: f64, min: f64 },
    P99Latency { measured: Duration, max: Duration },
    Qps { measured: f64, min: f64 },
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Violation::Recall { at, measured, min } => {
                write!(f, "Recall@{at} {measured:.4} below target {min:.4}")
            }
            Violation::P99Latency { measured, max } => {
                write!(f, "P99 latency {measured:?} exceeds target {max:?}")
            }
            Violation::Qps { measured, min } => {
                write!(f, "QPS {measured:.0} below target {min:.0}")
            }
        }
    }
}

/// Check every non-zero target. All violations are returned, in a fixed order.
pub fn validate_targets(
    quality: &QualityTargets,
    performance: &PerformanceTargets,
    metrics: &RecallMetrics,
    perf: &PerformanceMetrics,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    for (at, measured, min) in [
        (1, metrics.recall_1, quality.min_recall_1),
        (10, metrics.recall_10, quality.min_recall_10),
        (100, metrics.recall_100, quality.min_recall_100),
    ] {
        if min > 0.0 && measured < min {
            violations.push(Violation::Recall { at, measured, min });
        }
    }
    if !performance.max_p99_latency.is_zero() && perf.p99_latency > performance.max_p99_latency {
        violations.push(Violation::P99Latency {
            measured: perf.p99_latency,
            max: performance.max_p99_latency,
        });
    }
    if performance.min_qps > 0.0 && perf.qps < performance.min_qps {
        violations.push(Violation::Qps {
            measured: perf.qps,
            min: performance.min_qps,
        });
    }
    violations
}

/// Outcome class of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TestStatus {
    Passed,
    /// Measured, but at least one target was missed.
    Failed,
    Skipped,
    /// A stage failed; no metrics were computed.
    Error,
}

/// Everything a run produced.
#[derive(Debug, Serialize)]
pub struct TestResult {
    pub config: TestConfiguration,
    /// Name of the dataset actually used, once acquired.
    pub dataset: Option<String>,
    pub metrics: RecallMetrics,
    pub performance: PerformanceMetrics,
    /// Best-effort footprint of the populated index.
    pub memory_bytes: u64,
    /// Wall time of build, train and populate.
    pub build_time: Duration,
    pub passed: bool,
    pub violations: Vec<Violation>,
    /// Reason the run was skipped.
    pub skipped: Option<String>,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<EvalError>,
}

fn serialize_error<S: Serializer>(
    error: &Option<EvalError>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

impl TestResult {
    fn new(config: &TestConfiguration) -> Self {
        Self {
            config: config.clone(),
            dataset: None,
            metrics: RecallMetrics::default(),
            performance: PerformanceMetrics::default(),
            memory_bytes: 0,
            build_time: Duration::ZERO,
            passed: false,
            violations: Vec::new(),
            skipped: None,
            error: None,
        }
    }

    pub fn status(&self) -> TestStatus {
        if self.skipped.is_some() {
            TestStatus::Skipped
        } else if self.error.is_some() {
            TestStatus::Error
        } else if self.passed {
            TestStatus::Passed
        } else {
            TestStatus::Failed
        }
    }

    /// Whether metrics were measured (passed or failed on targets).
    pub fn is_comparable(&self) -> bool {
        matches!(self.status(), TestStatus::Passed | TestStatus::Failed)
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        match self.status() {
            TestStatus::Skipped => format!(
                "{}: skipped ({})",
                self.config.name,
                self.skipped.as_deref().unwrap_or_default()
            ),
            TestStatus::Error => format!(
                "{}: error ({})",
                self.config.name,
                self.error.as_ref().map(ToString::to_string).unwrap_or_default()
            ),
            status => format!(
                "{}: {} | {} | {} | mem={:.1}MB",
                self.config.name,
                if status == TestStatus::Passed { "PASS" } else { "FAIL" },
                self.metrics,
                self.performance,
                self.memory_bytes as f64 / (1024.0 * 1024.0)
            ),
        }
    }
}

/// Search every query against `index`, timing each search call alone.
///
/// `queries` is a flat buffer of `index.dimension()`-sized rows. The first failing
/// query aborts the whole pass.
pub fn search_with_timing<I: SearchIndex + ?Sized>(
    index: &I,
    queries: &[f32],
    k: usize,
) -> Result<(Vec<SearchResult>, Vec<Duration>)> {
    let dim = index.dimension();
    let n_queries = row_count(queries, dim)?;
    let mut results = Vec::with_capacity(n_queries);
    let mut latencies = Vec::with_capacity(n_queries);

    for (i, query) in queries.chunks_exact(dim).enumerate() {
        let start = Instant::now();
        let res = index.search(query, k);
        let elapsed = start.elapsed();
        let res = res.map_err(|e| EvalError::QueryFailed {
            query: i,
            reason: e.to_string(),
        })?;
        results.push(res);
        latencies.push(elapsed);
    }
    Ok((results, latencies))
}

/// Sustained throughput: cycle through `queries` for `duration`.
///
/// Stops at the first failed search. Returns 0 for an empty query set.
pub fn measure_qps<I: SearchIndex + ?Sized>(
    index: &I,
    queries: &[f32],
    k: usize,
    duration: Duration,
) -> f64 {
    let dim = index.dimension();
    if dim == 0 || queries.len() < dim {
        return 0.0;
    }
    let rows: Vec<&[f32]> = queries.chunks_exact(dim).collect();

    let start = Instant::now();
    let mut executed = 0usize;
    while start.elapsed() < duration {
        if index.search(rows[executed % rows.len()], k).is_err() {
            break;
        }
        executed += 1;
    }

    let elapsed = start.elapsed().as_secs_f64();
    if elapsed > 0.0 {
        executed as f64 / elapsed
    } else {
        0.0
    }
}

/// Runs configurations against datasets from a provider.
///
/// Holds the ground-truth oracle, so every run through the same evaluator shares
/// exact results for identical data.
pub struct Evaluator {
    provider: Box<dyn DatasetProvider>,
    oracle: GroundTruthOracle,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    /// Evaluator reading `.fvecs` datasets from the testdata root.
    pub fn new() -> Self {
        Self::with_provider(FvecsProvider::from_env())
    }

    pub fn with_provider(provider: impl DatasetProvider + 'static) -> Self {
        Self {
            provider: Box::new(provider),
            oracle: GroundTruthOracle::new(),
        }
    }

    pub fn with_oracle(mut self, oracle: GroundTruthOracle) -> Self {
        self.oracle = oracle;
        self
    }

    pub fn oracle(&self) -> &GroundTruthOracle {
        &self.oracle
    }

    /// Acquire the configuration's dataset and evaluate against it.
    pub fn run_recall_test(&self, config: &TestConfiguration) -> TestResult {
        let mut result = TestResult::new(config);
        info!(
            config = %config.name,
            index = config.builder.name(),
            source = %config.source.label(),
            "starting recall test"
        );
        let outcome = self
            .acquire(config)
            .and_then(|dataset| self.evaluate(config, &dataset, &mut result));
        finish(config, &mut result, outcome);
        result
    }

    /// Evaluate `config` against an already loaded dataset, ignoring its source.
    pub fn run_on_dataset(&self, config: &TestConfiguration, dataset: &Dataset) -> TestResult {
        let mut result = TestResult::new(config);
        info!(config = %config.name, dataset = %dataset.name, "starting recall test");
        let outcome = self.evaluate(config, dataset, &mut result);
        finish(config, &mut result, outcome);
        result
    }

    fn acquire(&self, config: &TestConfiguration) -> Result<Dataset> {
        let dataset = match &config.source {
            DataSource::Named(name) => self.provider.load(name),
            DataSource::Synthetic(spec) => generate_synthetic(spec),
        }
        .and_then(|ds| ds.validate().map(|()| ds))
        .map_err(|e| e.at(Stage::Acquire))?;
        info!(
            config = %config.name,
            dataset = %dataset.name,
            n = dataset.n,
            n_queries = dataset.n_queries,
            dim = dataset.dim,
            "dataset ready"
        );
        Ok(dataset)
    }

    fn evaluate(
        &self,
        config: &TestConfiguration,
        dataset: &Dataset,
        result: &mut TestResult,
    ) -> Result<()> {
        result.dataset = Some(dataset.name.clone());
        dataset.validate().map_err(|e| e.at(Stage::Acquire))?;
        if config.k == 0 {
            return Err(EvalError::InvalidParameter("k must be > 0".into()).at(Stage::Acquire));
        }
        let ground_truth = self
            .oracle
            .ground_truth(dataset, config.k, config.metric)
            .map_err(|e| e.at(Stage::Acquire))?;

        let build_start = Instant::now();
        let mut index = config
            .builder
            .build(dataset.dim, config.metric)
            .map_err(|e| e.at(Stage::Build))?;
        debug!(config = %config.name, index = %index.name(), "index built");

        let outcome = measure(
            config,
            dataset,
            &ground_truth[..dataset.n_queries],
            &mut *index,
            build_start,
            result,
        );
        if let Err(e) = index.close() {
            warn!(config = %config.name, error = %e, "failed to close index");
        }
        outcome
    }
}

/// Stages 3 to 8 on a freshly built index.
fn measure(
    config: &TestConfiguration,
    dataset: &Dataset,
    ground_truth: &[GroundTruth],
    index: &mut dyn SearchIndex,
    build_start: Instant,
    result: &mut TestResult,
) -> Result<()> {
    let mut tracker = MemoryTracker::started();

    if config.needs_training {
        let n_train = match config.train_size {
            Some(size) if size > 0 => size.min(dataset.n),
            _ => dataset.n,
        };
        info!(config = %config.name, n_train, "training");
        index
            .train(&dataset.vectors[..n_train * dataset.dim])
            .map_err(|e| e.at(Stage::Train))?;
        if !index.is_trained() {
            return Err(EvalError::NotTrained.at(Stage::Train));
        }
    }

    info!(config = %config.name, n = dataset.n, "populating");
    index
        .add(&dataset.vectors)
        .map_err(|e| e.at(Stage::Populate))?;
    if index.ntotal() != dataset.n {
        return Err(EvalError::CountMismatch {
            expected: dataset.n,
            actual: index.ntotal(),
        }
        .at(Stage::Populate));
    }
    result.build_time = build_start.elapsed();
    result.memory_bytes = measure_index_memory(&*index, &mut tracker);

    info!(config = %config.name, n_queries = dataset.n_queries, k = config.k, "searching");
    let (results, latencies) = search_with_timing(&*index, &dataset.queries, config.k)
        .map_err(|e| e.at(Stage::Search))?;

    result.metrics = calculate_all_metrics(ground_truth, &results, config.k);
    result.performance = measure_latencies(&latencies);
    info!(
        config = %config.name,
        recall_10 = result.metrics.recall_10,
        qps = result.performance.qps,
        p99_us = result.performance.p99_latency.as_micros() as u64,
        "measured"
    );

    result.violations = validate_targets(
        &config.quality,
        &config.performance,
        &result.metrics,
        &result.performance,
    );
    for violation in &result.violations {
        warn!(config = %config.name, %violation, "target missed");
    }
    Ok(())
}

fn finish(config: &TestConfiguration, result: &mut TestResult, outcome: Result<()>) {
    match outcome {
        Ok(()) => {
            result.passed = result.violations.is_empty();
            info!(config = %config.name, passed = result.passed, "recall test finished");
        }
        Err(e) if skips(config, &e) => {
            info!(config = %config.name, reason = %e, "recall test skipped");
            result.skipped = Some(e.to_string());
            result.metrics = RecallMetrics::default();
            result.performance = PerformanceMetrics::default();
        }
        Err(e) => {
            warn!(config = %config.name, error = %e, "recall test errored");
            result.error = Some(e);
            result.metrics = RecallMetrics::default();
            result.performance = PerformanceMetrics::default();
            result.violations.clear();
        }
    }
}

fn skips(config: &TestConfiguration, err: &EvalError) -> bool {
    err.is_skip_condition()
        && (config.skip_if_no_data || !matches!(err.root(), EvalError::DatasetUnavailable { .. }))
}

/// Run one configuration with a default [`Evaluator`].
pub fn run_recall_test(config: &TestConfiguration) -> TestResult {
    Evaluator::new().run_recall_test(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ann::{FlatBuilder, FlatIndex};
    use crate::benchmark::datasets::{DataDistribution, SyntheticSpec};
    use crate::distance::DistanceMetric;

    #[test]
    fn all_violations_reported() {
        let quality = QualityTargets::new(0.9, 0.9, 0.0);
        let performance = PerformanceTargets {
            max_p99_latency: Duration::from_millis(1),
            min_qps: 1000.0,
        };
        let metrics = RecallMetrics {
            recall_1: 0.5,
            recall_10: 0.95,
            recall_100: 0.1,
            ..Default::default()
        };
        let perf = measure_latencies(&[Duration::from_millis(5)]);
        let violations = validate_targets(&quality, &performance, &metrics, &perf);
        assert_eq!(violations.len(), 3);
        assert!(matches!(violations[0], Violation::Recall { at: 1, .. }));
        assert!(matches!(violations[1], Violation::P99Latency { .. }));
        assert!(matches!(violations[2], Violation::Qps { .. }));
        assert_eq!(violations[0].to_string(), "Recall@1 0.5000 below target 0.9000");
    }

    #[test]
    fn zero_targets_are_unchecked() {
        let perf = measure_latencies(&[Duration::from_secs(10)]);
        let violations = validate_targets(
            &QualityTargets::default(),
            &PerformanceTargets::default(),
            &RecallMetrics::default(),
            &perf,
        );
        assert!(violations.is_empty());
    }

    #[test]
    fn timed_search_returns_one_entry_per_query() {
        let mut index = FlatIndex::new(2, DistanceMetric::L2);
        index.add(&[0.0, 0.0, 1.0, 1.0, 2.0, 2.0]).unwrap();
        let (results, latencies) = search_with_timing(&index, &[0.1, 0.1, 1.9, 1.9], 1).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(latencies.len(), 2);
        assert_eq!(results[0].ids, vec![0]);
        assert_eq!(results[1].ids, vec![2]);
    }

    #[test]
    fn measure_qps_handles_empty_queries() {
        let index = FlatIndex::new(2, DistanceMetric::L2);
        assert_eq!(measure_qps(&index, &[], 1, Duration::from_millis(10)), 0.0);
    }

    #[test]
    fn flat_index_has_perfect_recall() {
        let config = TestConfiguration::new("flat", FlatBuilder::shared())
            .with_synthetic(SyntheticSpec::new(500, 16, 20, DataDistribution::GaussianClustered))
            .with_quality(QualityTargets::preset("high-precision").unwrap());
        let result = Evaluator::new().run_recall_test(&config);
        assert_eq!(result.status(), TestStatus::Passed, "{}", result.summary());
        assert_eq!(result.metrics.recall_10, 1.0);
        assert!(result.performance.n_samples > 0);
    }
}
