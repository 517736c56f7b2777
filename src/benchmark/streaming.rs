//! Sustained concurrent inserts and queries against one shared index.
//!
//! Two scoped threads run for a fixed wall-clock duration, each paced by its own
//! ticker: one inserts a single vector per tick, the other runs a single query per
//! tick. Counters are atomics and query latencies go into a mutex-guarded buffer,
//! all owned by the run. Both threads stop by polling elapsed time; there is no
//! other cancellation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use super::latency::{measure_latencies, PerformanceMetrics};
use crate::ann::{row_count, SharedIndex};
use crate::error::{EvalError, Result};

/// Achieved counts must reach this percentage of the target.
pub const MIN_THROUGHPUT_PERCENT: u64 = 95;

/// Load shape for [`run_concurrent_load`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StreamingConfig {
    pub duration: Duration,
    /// Target inserts per second.
    pub insert_rate: u32,
    /// Target queries per second.
    pub query_rate: u32,
    pub k: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(10),
            insert_rate: 1000,
            query_rate: 100,
            k: 10,
        }
    }
}

impl StreamingConfig {
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_rates(mut self, insert_rate: u32, query_rate: u32) -> Self {
        self.insert_rate = insert_rate;
        self.query_rate = query_rate;
        self
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Inserts expected over the whole duration.
    pub fn target_inserts(&self) -> u64 {
        (self.insert_rate as f64 * self.duration.as_secs_f64()) as u64
    }

    /// Queries expected over the whole duration.
    pub fn target_queries(&self) -> u64 {
        (self.query_rate as f64 * self.duration.as_secs_f64()) as u64
    }
}

/// Problem found by [`StreamingReport::assess`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoadIssue {
    Errors { inserts: u64, queries: u64 },
    InsertsBelowTarget { achieved: u64, target: u64 },
    QueriesBelowTarget { achieved: u64, target: u64 },
}

impl std::fmt::Display for LoadIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadIssue::Errors { inserts, queries } => {
                write!(f, "{inserts} insert errors, {queries} query errors")
            }
            LoadIssue::InsertsBelowTarget { achieved, target } => {
                write!(f, "insert throughput too low: {achieved} (target ~{target})")
            }
            LoadIssue::QueriesBelowTarget { achieved, target } => {
                write!(f, "query throughput too low: {achieved} (target ~{target})")
            }
        }
    }
}

/// What a concurrent load run achieved.
#[derive(Debug, Clone, Serialize)]
pub struct StreamingReport {
    pub config: StreamingConfig,
    /// Measured wall time, from start until both threads joined.
    pub elapsed: Duration,
    pub inserted: u64,
    pub queried: u64,
    pub insert_errors: u64,
    pub query_errors: u64,
    /// Achieved inserts per second.
    pub insert_rate: f64,
    /// Achieved queries per second.
    pub query_rate: f64,
    /// Element count of the index after the run.
    pub final_ntotal: usize,
    /// Latency statistics over successful queries.
    pub performance: PerformanceMetrics,
}

impl StreamingReport {
    pub fn errors(&self) -> u64 {
        self.insert_errors + self.query_errors
    }

    /// Errors and counts short of the target rates.
    pub fn assess(&self) -> Vec<LoadIssue> {
        let mut issues = Vec::new();
        if self.errors() > 0 {
            issues.push(LoadIssue::Errors {
                inserts: self.insert_errors,
                queries: self.query_errors,
            });
        }
        let target = self.config.target_inserts();
        if self.inserted < target * MIN_THROUGHPUT_PERCENT / 100 {
            issues.push(LoadIssue::InsertsBelowTarget {
                achieved: self.inserted,
                target,
            });
        }
        let target = self.config.target_queries();
        if self.queried < target * MIN_THROUGHPUT_PERCENT / 100 {
            issues.push(LoadIssue::QueriesBelowTarget {
                achieved: self.queried,
                target,
            });
        }
        issues
    }
}

impl std::fmt::Display for StreamingReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} inserts ({:.0}/s), {} queries ({:.0}/s), {} errors, final size {} | {}",
            self.inserted,
            self.insert_rate,
            self.queried,
            self.query_rate,
            self.errors(),
            self.final_ntotal,
            self.performance
        )
    }
}

/// Absolute-deadline pacing. Missed ticks are dropped rather than replayed in a
/// burst; one overdue tick fires immediately.
struct Ticker {
    interval: Duration,
    next: Instant,
}

impl Ticker {
    fn new(rate: u32) -> Self {
        let interval = Duration::from_secs(1) / rate;
        Self {
            interval,
            next: Instant::now() + interval,
        }
    }

    fn wait(&mut self) {
        let now = Instant::now();
        if self.next > now {
            thread::sleep(self.next - now);
        }
        self.next += self.interval;
        let now = Instant::now();
        if self.next < now {
            self.next = now;
        }
    }
}

/// Drive `index` with concurrent inserts and queries for `config.duration`.
///
/// Inserts consume `inserts` one row per tick and stop early if it runs out.
/// Queries cycle through `queries`. Both buffers are flat rows of
/// `index.dimension()` floats.
pub fn run_concurrent_load<S: SharedIndex + ?Sized>(
    index: &S,
    inserts: &[f32],
    queries: &[f32],
    config: &StreamingConfig,
) -> Result<StreamingReport> {
    if config.insert_rate == 0 || config.query_rate == 0 {
        return Err(EvalError::InvalidParameter("rates must be > 0".into()));
    }
    let dim = index.dimension();
    let n_inserts = row_count(inserts, dim)?;
    let n_queries = row_count(queries, dim)?;
    if n_queries == 0 {
        return Err(EvalError::InvalidParameter("query stream is empty".into()));
    }
    let initial = index.ntotal();
    info!(
        initial,
        n_inserts,
        insert_rate = config.insert_rate,
        query_rate = config.query_rate,
        duration_ms = config.duration.as_millis() as u64,
        "starting concurrent load"
    );

    let inserted = AtomicU64::new(0);
    let insert_errors = AtomicU64::new(0);
    let queried = AtomicU64::new(0);
    let query_errors = AtomicU64::new(0);
    let latencies = Mutex::new(Vec::with_capacity(config.target_queries() as usize));

    let start = Instant::now();
    thread::scope(|s| {
        s.spawn(|| {
            let mut ticker = Ticker::new(config.insert_rate);
            let mut rows = inserts.chunks_exact(dim);
            while start.elapsed() < config.duration {
                ticker.wait();
                if start.elapsed() >= config.duration {
                    break;
                }
                let Some(row) = rows.next() else { break };
                match index.add(row) {
                    Ok(()) => inserted.fetch_add(1, Ordering::Relaxed),
                    Err(_) => insert_errors.fetch_add(1, Ordering::Relaxed),
                };
            }
        });

        s.spawn(|| {
            let mut ticker = Ticker::new(config.query_rate);
            let mut rows = queries.chunks_exact(dim).cycle();
            while start.elapsed() < config.duration {
                ticker.wait();
                if start.elapsed() >= config.duration {
                    break;
                }
                let Some(query) = rows.next() else { break };
                let t0 = Instant::now();
                let res = index.search(query, config.k);
                let latency = t0.elapsed();
                match res {
                    Ok(_) => {
                        queried.fetch_add(1, Ordering::Relaxed);
                        latencies.lock().push(latency);
                    }
                    Err(_) => {
                        query_errors.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        });
    });
    let elapsed = start.elapsed();

    let secs = elapsed.as_secs_f64().max(f64::EPSILON);
    let inserted = inserted.into_inner();
    let queried = queried.into_inner();
    let report = StreamingReport {
        config: *config,
        elapsed,
        inserted,
        queried,
        insert_errors: insert_errors.into_inner(),
        query_errors: query_errors.into_inner(),
        insert_rate: inserted as f64 / secs,
        query_rate: queried as f64 / secs,
        final_ntotal: index.ntotal(),
        performance: measure_latencies(&latencies.into_inner()),
    };

    if report.errors() > 0 {
        warn!(
            insert_errors = report.insert_errors,
            query_errors = report.query_errors,
            "errors during concurrent load"
        );
    }
    info!(%report, "concurrent load finished");
    Ok(report)
}
