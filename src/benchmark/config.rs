//! Declarative description of one evaluation run.
//!
//! Configurations are plain values: cheap to clone, serializable for reports, and
//! holding a builder rather than an index so construction happens per run.
//!
//! ```rust,ignore
//! let config = TestConfiguration::new("IVF100_nprobe8", ivf_builder)
//!     .with_dataset("SIFT10K")
//!     .with_training(Some(5_000))
//!     .with_quality(QualityTargets::preset("balanced").unwrap())
//!     .skip_if_no_data(true);
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, Serializer};

use super::datasets::SyntheticSpec;
use crate::ann::IndexBuilder;
use crate::distance::DistanceMetric;
use crate::error::Result;

/// Where a run gets its vectors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DataSource {
    /// A catalog dataset fetched through a [`DatasetProvider`](super::loader::DatasetProvider).
    Named(String),
    /// Generated on the fly.
    Synthetic(SyntheticSpec),
}

impl DataSource {
    pub fn label(&self) -> String {
        match self {
            DataSource::Named(name) => name.clone(),
            DataSource::Synthetic(spec) => spec.label(),
        }
    }
}

/// Minimum recall targets. A zero target is not checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct QualityTargets {
    pub min_recall_1: f64,
    pub min_recall_10: f64,
    pub min_recall_100: f64,
}

impl QualityTargets {
    pub fn new(min_recall_1: f64, min_recall_10: f64, min_recall_100: f64) -> Self {
        Self {
            min_recall_1,
            min_recall_10,
            min_recall_100,
        }
    }

    /// Named preset: `high-precision`, `balanced`, `high-throughput` or `approximate`.
    pub fn preset(name: &str) -> Option<Self> {
        STANDARD_TARGETS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|&(_, t)| t)
    }
}

/// Recommended recall targets per use case.
pub const STANDARD_TARGETS: &[(&str, QualityTargets)] = &[
    (
        "high-precision",
        QualityTargets {
            min_recall_1: 0.99,
            min_recall_10: 0.99,
            min_recall_100: 0.98,
        },
    ),
    (
        "balanced",
        QualityTargets {
            min_recall_1: 0.95,
            min_recall_10: 0.95,
            min_recall_100: 0.90,
        },
    ),
    (
        "high-throughput",
        QualityTargets {
            min_recall_1: 0.80,
            min_recall_10: 0.85,
            min_recall_100: 0.80,
        },
    ),
    (
        "approximate",
        QualityTargets {
            min_recall_1: 0.70,
            min_recall_10: 0.75,
            min_recall_100: 0.70,
        },
    ),
];

/// Latency and throughput targets. Zero values are not checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PerformanceTargets {
    pub max_p99_latency: Duration,
    pub min_qps: f64,
}

/// One evaluation run.
#[derive(Debug, Clone, Serialize)]
pub struct TestConfiguration {
    /// Identifier used in logs and sweep tables (e.g. `HNSW_M32_ef64`).
    pub name: String,
    #[serde(serialize_with = "serialize_builder")]
    pub builder: Arc<dyn IndexBuilder>,
    pub needs_training: bool,
    /// Train on the first `train_size` vectors; `None` or `Some(0)` trains on the
    /// whole corpus.
    pub train_size: Option<usize>,
    pub source: DataSource,
    pub quality: QualityTargets,
    pub performance: PerformanceTargets,
    /// Neighbors retrieved per query.
    pub k: usize,
    pub metric: DistanceMetric,
    /// Treat a missing named dataset as a skip instead of an error.
    pub skip_if_no_data: bool,
}

fn serialize_builder<S: Serializer>(
    builder: &Arc<dyn IndexBuilder>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(builder.name())
}

impl TestConfiguration {
    /// Configuration with a default synthetic source, k = 10, L2 and no targets.
    pub fn new(name: impl Into<String>, builder: Arc<dyn IndexBuilder>) -> Self {
        Self {
            name: name.into(),
            builder,
            needs_training: false,
            train_size: None,
            source: DataSource::Synthetic(SyntheticSpec::default()),
            quality: QualityTargets::default(),
            performance: PerformanceTargets::default(),
            k: 10,
            metric: DistanceMetric::L2,
            skip_if_no_data: false,
        }
    }

    pub fn with_dataset(mut self, name: impl Into<String>) -> Self {
        self.source = DataSource::Named(name.into());
        self
    }

    pub fn with_synthetic(mut self, spec: SyntheticSpec) -> Self {
        self.source = DataSource::Synthetic(spec);
        self
    }

    /// Require training, on `train_size` vectors or the whole corpus (`None`, `Some(0)`).
    pub fn with_training(mut self, train_size: Option<usize>) -> Self {
        self.needs_training = true;
        self.train_size = train_size;
        self
    }

    pub fn with_quality(mut self, quality: QualityTargets) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_performance(mut self, performance: PerformanceTargets) -> Self {
        self.performance = performance;
        self
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn skip_if_no_data(mut self, skip: bool) -> Self {
        self.skip_if_no_data = skip;
        self
    }

    /// Pretty JSON for reports.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ann::FlatBuilder;
    use crate::benchmark::datasets::DataDistribution;

    #[test]
    fn presets_exist() {
        let balanced = QualityTargets::preset("balanced").unwrap();
        assert_eq!(balanced.min_recall_10, 0.95);
        assert!(QualityTargets::preset("nope").is_none());
        assert_eq!(STANDARD_TARGETS.len(), 4);
    }

    #[test]
    fn serializes_builder_by_name() {
        let config = TestConfiguration::new("flat", FlatBuilder::shared())
            .with_synthetic(SyntheticSpec::new(10, 4, 2, DataDistribution::Normalized))
            .with_training(Some(5));
        let json: serde_json::Value = serde_json::from_str(&config.to_json().unwrap()).unwrap();
        assert_eq!(json["builder"], "Flat");
        assert_eq!(json["needs_training"], true);
        assert_eq!(json["train_size"], 5);
        assert_eq!(json["source"]["Synthetic"]["n"], 10);
    }

    #[test]
    fn source_labels() {
        assert_eq!(DataSource::Named("SIFT10K".into()).label(), "SIFT10K");
        let spec = SyntheticSpec::new(10, 4, 2, DataDistribution::Uniform);
        assert_eq!(DataSource::Synthetic(spec.clone()).label(), spec.label());
    }
}
