//! Concurrent insert + search against one shared index.

use std::time::Duration;

use parking_lot::RwLock;

use anneval::ann::{FlatIndex, SearchIndex};
use anneval::benchmark::{
    generate_synthetic, run_concurrent_load, DataDistribution, StreamingConfig, SyntheticSpec,
};
use anneval::distance::DistanceMetric;

fn seeded_index(dim: usize, initial: usize) -> RwLock<FlatIndex> {
    let ds = generate_synthetic(&SyntheticSpec::new(initial, dim, 1, DataDistribution::Normalized))
        .unwrap();
    let mut index = FlatIndex::new(dim, DistanceMetric::L2);
    index.add(&ds.vectors).unwrap();
    RwLock::new(index)
}

fn stream(n: usize, dim: usize, seed: u64) -> Vec<f32> {
    let spec = SyntheticSpec {
        seed,
        ..SyntheticSpec::new(n, dim, 0, DataDistribution::Normalized)
    };
    generate_synthetic(&spec).unwrap().vectors
}

#[test]
fn short_load_reaches_most_of_target() {
    let dim = 16;
    let index = seeded_index(dim, 500);
    let config = StreamingConfig::default()
        .with_duration(Duration::from_secs(1))
        .with_rates(200, 50)
        .with_k(10);
    let inserts = stream(400, dim, 7);
    let queries = stream(20, dim, 8);

    let report = run_concurrent_load(&index, &inserts, &queries, &config).unwrap();

    assert_eq!(report.errors(), 0);
    assert_eq!(report.final_ntotal, 500 + report.inserted as usize);
    // Generous bounds: CI machines stall.
    assert!(report.inserted >= 150, "{report}");
    assert!(report.inserted <= 200, "{report}");
    assert!(report.queried >= 35, "{report}");
    assert!(report.queried <= 50, "{report}");
    assert_eq!(report.performance.n_samples as u64, report.queried);
    assert!(report.performance.p99_latency <= report.performance.max_latency);
}

#[test]
fn insert_stream_exhaustion_stops_inserts() {
    let dim = 8;
    let index = seeded_index(dim, 10);
    let config = StreamingConfig::default()
        .with_duration(Duration::from_millis(500))
        .with_rates(200, 20);
    let inserts = stream(5, dim, 3);
    let queries = stream(4, dim, 4);

    let report = run_concurrent_load(&index, &inserts, &queries, &config).unwrap();
    assert_eq!(report.inserted, 5);
    assert_eq!(report.final_ntotal, 15);
    assert!(report
        .assess()
        .iter()
        .any(|issue| issue.to_string().starts_with("insert throughput too low")));
}

#[test]
#[ignore] // Run with: cargo test --test streaming_load -- --ignored
fn sustained_ten_second_load() {
    let dim = 64;
    let index = seeded_index(dim, 5_000);
    let config = StreamingConfig::default();
    let inserts = stream(config.target_inserts() as usize, dim, 11);
    let queries = stream(config.target_queries() as usize, dim, 12);

    let report = run_concurrent_load(&index, &inserts, &queries, &config).unwrap();
    println!("{report}");
    assert!(report.assess().is_empty(), "{:?}", report.assess());
    assert_eq!(report.final_ntotal, 5_000 + report.inserted as usize);
}
