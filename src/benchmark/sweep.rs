//! Parameter sweeps: many configurations, one comparison table.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::config::TestConfiguration;
use super::datasets::Dataset;
use super::latency::round_micros;
use super::orchestrator::{Evaluator, TestResult, TestStatus};
use crate::ann::IndexBuilder;

/// Results of a sweep, in input order.
#[derive(Debug, Serialize)]
pub struct SweepReport {
    pub name: String,
    pub results: Vec<TestResult>,
}

impl SweepReport {
    /// Results with measured metrics (passed or failed on targets).
    pub fn comparable(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| r.is_comparable())
    }

    pub fn count(&self, status: TestStatus) -> usize {
        self.results.iter().filter(|r| r.status() == status).count()
    }

    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.status() == TestStatus::Passed)
    }

    /// Comparison table, one row per configuration.
    ///
    /// Measured rows are marked `✓` or `✗`; skipped and errored rows carry no
    /// numbers.
    pub fn table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{} Parameter Sweep Summary:", self.name);
        let _ = writeln!(
            out,
            "  {:<28} {:>10} {:>10} {:>10} {:>10} {:>10}",
            "Configuration", "Recall@1", "Recall@10", "Recall@100", "QPS", "P99"
        );
        let _ = writeln!(out, "{}", "-".repeat(85));
        for result in &self.results {
            let name = &result.config.name;
            let _ = match result.status() {
                TestStatus::Skipped => writeln!(out, "- {name:<28} {:>10}", "SKIP"),
                TestStatus::Error => writeln!(out, "! {name:<28} {:>10}", "ERROR"),
                status => writeln!(
                    out,
                    "{} {:<28} {:>10.4} {:>10.4} {:>10.4} {:>10.0} {:>10}",
                    if status == TestStatus::Passed { "✓" } else { "✗" },
                    name,
                    result.metrics.recall_1,
                    result.metrics.recall_10,
                    result.metrics.recall_100,
                    result.performance.qps,
                    format!("{:?}", round_micros(result.performance.p99_latency)),
                ),
            };
        }
        out
    }
}

impl std::fmt::Display for SweepReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.table())
    }
}

impl Evaluator {
    /// Run every configuration in order. A failing configuration never stops the
    /// sweep.
    pub fn run_parameter_sweep(&self, name: &str, configs: &[TestConfiguration]) -> SweepReport {
        info!(sweep = name, n_configs = configs.len(), "starting parameter sweep");
        let results: Vec<TestResult> = configs
            .iter()
            .map(|config| self.run_recall_test(config))
            .collect();
        let report = SweepReport {
            name: name.to_string(),
            results,
        };
        info!(
            sweep = name,
            passed = report.count(TestStatus::Passed),
            failed = report.count(TestStatus::Failed),
            skipped = report.count(TestStatus::Skipped),
            errors = report.count(TestStatus::Error),
            "parameter sweep finished\n{}",
            report.table()
        );
        report
    }

    /// Evaluate several index builders on one dataset with ground truth computed
    /// once.
    pub fn run_comparison(
        &self,
        dataset: &Dataset,
        k: usize,
        builders: &[Arc<dyn IndexBuilder>],
    ) -> SweepReport {
        let results = builders
            .iter()
            .map(|builder| {
                let config = TestConfiguration::new(builder.name(), Arc::clone(builder))
                    .with_dataset(dataset.name.clone())
                    .with_k(k);
                self.run_on_dataset(&config, dataset)
            })
            .collect();
        SweepReport {
            name: format!("{} comparison", dataset.name),
            results,
        }
    }
}

/// Sweep with a default [`Evaluator`].
pub fn run_parameter_sweep(name: &str, configs: &[TestConfiguration]) -> SweepReport {
    Evaluator::new().run_parameter_sweep(name, configs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ann::{builder_fn, FlatBuilder};
    use crate::benchmark::datasets::{generate_synthetic, DataDistribution, SyntheticSpec};
    use crate::error::EvalError;

    fn spec() -> SyntheticSpec {
        SyntheticSpec::new(300, 8, 10, DataDistribution::Uniform)
    }

    #[test]
    fn table_marks_each_row() {
        let broken = builder_fn("broken", |_, _| Err(EvalError::Index("no".into())));
        let configs = vec![
            TestConfiguration::new("flat", FlatBuilder::shared()).with_synthetic(spec()),
            TestConfiguration::new("broken", broken).with_synthetic(spec()),
            TestConfiguration::new("missing", FlatBuilder::shared())
                .with_dataset("nowhere")
                .skip_if_no_data(true),
        ];
        let evaluator = Evaluator::with_provider(crate::benchmark::loader::InMemoryProvider::new());
        let report = evaluator.run_parameter_sweep("mixed", &configs);
        let table = report.table();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3 + 3);
        assert!(lines[3].starts_with("✓ flat"));
        assert!(lines[4].starts_with("! broken") && lines[4].ends_with("ERROR"));
        assert!(lines[5].starts_with("- missing") && lines[5].ends_with("SKIP"));
        assert_eq!(report.comparable().count(), 1);
    }

    #[test]
    fn comparison_shares_ground_truth() {
        let dataset = generate_synthetic(&spec()).unwrap();
        let evaluator = Evaluator::new();
        let builders = vec![FlatBuilder::shared(), FlatBuilder::shared()];
        let report = evaluator.run_comparison(&dataset, 5, &builders);
        assert_eq!(report.results.len(), 2);
        assert!(report.all_passed());
        assert_eq!(evaluator.oracle().memoized(), 1);
    }
}
