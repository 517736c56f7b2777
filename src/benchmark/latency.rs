//! Latency percentiles and throughput.

use std::time::Duration;

use serde::Serialize;

/// Latency distribution and throughput derived from per-operation durations.
///
/// Invariant for non-empty input: `min <= p50 <= p95 <= p99 <= max`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub p50_latency: Duration,
    pub p95_latency: Duration,
    pub p99_latency: Duration,
    pub min_latency: Duration,
    pub max_latency: Duration,
    pub avg_latency: Duration,
    /// Operations per second implied by the average latency.
    pub qps: f64,
    /// Sum of all measured durations.
    pub total_time: Duration,
    pub n_samples: usize,
}

impl PerformanceMetrics {
    /// Compute statistics over a set of durations.
    ///
    /// Percentile `p` is taken at index `floor(n * p / 100)` of the sorted samples,
    /// clamped to the last element. Empty input yields an all-zero record.
    pub fn from_latencies(latencies: &[Duration]) -> Self {
        let n = latencies.len();
        if n == 0 {
            return Self::default();
        }

        let mut sorted = latencies.to_vec();
        sorted.sort_unstable();

        let percentile = |p: usize| sorted[(n * p / 100).min(n - 1)];

        let total: Duration = sorted.iter().sum();
        let avg = Duration::from_nanos((total.as_nanos() / n as u128) as u64);
        let avg_secs = avg.as_secs_f64();
        let qps = if avg_secs > 0.0 { 1.0 / avg_secs } else { 0.0 };

        Self {
            p50_latency: percentile(50),
            p95_latency: percentile(95),
            p99_latency: percentile(99),
            min_latency: sorted[0],
            max_latency: sorted[n - 1],
            avg_latency: avg,
            qps,
            total_time: total,
            n_samples: n,
        }
    }
}

impl std::fmt::Display for PerformanceMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "QPS={:.0}, P50={:?}, P95={:?}, P99={:?}, Avg={:?}",
            self.qps,
            round_micros(self.p50_latency),
            round_micros(self.p95_latency),
            round_micros(self.p99_latency),
            round_micros(self.avg_latency),
        )
    }
}

/// Round a duration to whole microseconds for display.
pub fn round_micros(d: Duration) -> Duration {
    Duration::from_micros(((d.as_nanos() + 500) / 1_000) as u64)
}

/// Shorthand for [`PerformanceMetrics::from_latencies`].
pub fn measure_latencies(latencies: &[Duration]) -> PerformanceMetrics {
    PerformanceMetrics::from_latencies(latencies)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn five_sample_scenario() {
        let perf = measure_latencies(&[ms(10), ms(20), ms(30), ms(40), ms(50)]);
        assert_eq!(perf.p50_latency, ms(30));
        assert_eq!(perf.min_latency, ms(10));
        assert_eq!(perf.max_latency, ms(50));
        assert_eq!(perf.avg_latency, ms(30));
        assert_eq!(perf.total_time, ms(150));
        assert!((perf.qps - 33.333).abs() < 0.01);
    }

    #[test]
    fn unsorted_input_gives_same_percentiles() {
        let a = measure_latencies(&[ms(50), ms(10), ms(40), ms(20), ms(30)]);
        let b = measure_latencies(&[ms(10), ms(20), ms(30), ms(40), ms(50)]);
        assert_eq!(a, b);
    }

    #[test]
    fn single_sample() {
        let perf = measure_latencies(&[ms(7)]);
        for d in [
            perf.p50_latency,
            perf.p95_latency,
            perf.p99_latency,
            perf.min_latency,
            perf.max_latency,
            perf.avg_latency,
        ] {
            assert_eq!(d, ms(7));
        }
    }

    #[test]
    fn percentiles_over_hundred_samples() {
        // n=100: index = p, so p99 lands on the last element
        let samples: Vec<Duration> = (1..=100).map(ms).collect();
        let perf = measure_latencies(&samples);
        assert_eq!(perf.p50_latency, ms(51));
        assert_eq!(perf.p95_latency, ms(96));
        assert_eq!(perf.p99_latency, ms(100));
    }

    #[test]
    fn empty_and_zero_durations() {
        assert_eq!(measure_latencies(&[]), PerformanceMetrics::default());
        let zero = measure_latencies(&[Duration::ZERO; 3]);
        assert_eq!(zero.qps, 0.0);
        assert_eq!(zero.n_samples, 3);
    }

    #[test]
    fn display_rounds_to_micros() {
        let perf = measure_latencies(&[Duration::from_nanos(1_499)]);
        assert!(perf.to_string().contains("P50=1µs"), "{perf}");
    }
}
