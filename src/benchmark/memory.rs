//! Best-effort memory footprint of an index under test.
//!
//! Two sources, neither exact:
//! - Process RSS growth between `start()` and `finish()` (Linux only).
//! - The index's own `size_bytes()` estimate.
//!
//! RSS sees allocations a native index makes outside the Rust heap, so it is
//! preferred when available.

use crate::ann::SearchIndex;

/// RSS samples taken around the build and populate stages.
///
/// Every field is `None` on platforms where RSS cannot be read.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryTracker {
    pub baseline: Option<u64>,
    /// Highest sample seen so far, baseline included.
    pub peak: Option<u64>,
    pub last: Option<u64>,
}

impl MemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker with its baseline already sampled.
    pub fn started() -> Self {
        let mut tracker = Self::new();
        tracker.start();
        tracker
    }

    pub fn start(&mut self) {
        self.baseline = current_rss();
        self.peak = self.baseline;
        self.last = None;
    }

    /// Sample RSS and fold it into the peak.
    pub fn checkpoint(&mut self) {
        if let Some(rss) = current_rss() {
            self.last = Some(rss);
            self.peak = Some(self.peak.map_or(rss, |p| p.max(rss)));
        }
    }

    pub fn finish(&mut self) {
        self.checkpoint();
    }

    /// Growth from baseline to the last sample; `None` if it did not grow.
    pub fn allocated(&self) -> Option<u64> {
        Self::growth(self.baseline, self.last)
    }

    /// Growth from baseline to the peak.
    pub fn peak_allocated(&self) -> Option<u64> {
        Self::growth(self.baseline, self.peak)
    }

    fn growth(from: Option<u64>, to: Option<u64>) -> Option<u64> {
        to?.checked_sub(from?).filter(|&d| d > 0)
    }
}

/// Resident set size of this process.
#[cfg(target_os = "linux")]
pub fn current_rss() -> Option<u64> {
    const PAGE_SIZE: u64 = 4096;
    // second field of statm is resident pages
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let resident: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(resident * PAGE_SIZE)
}

#[cfg(not(target_os = "linux"))]
pub fn current_rss() -> Option<u64> {
    None
}

/// Footprint of a populated index, in bytes.
///
/// `tracker` should have been started before the index was populated. Returns 0
/// when nothing could be measured.
pub fn measure_index_memory<I: SearchIndex + ?Sized>(
    index: &I,
    tracker: &mut MemoryTracker,
) -> u64 {
    tracker.finish();
    tracker
        .allocated()
        .or_else(|| index.size_bytes().map(|b| b as u64))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ann::FlatIndex;
    use crate::distance::DistanceMetric;

    #[test]
    fn tracker_without_growth_reports_none() {
        let shrunk = MemoryTracker {
            baseline: Some(1000),
            peak: Some(1000),
            last: Some(900),
        };
        assert_eq!(shrunk.allocated(), None);
        assert_eq!(shrunk.peak_allocated(), None);

        let grew = MemoryTracker {
            baseline: Some(1000),
            peak: Some(5000),
            last: Some(3000),
        };
        assert_eq!(grew.allocated(), Some(2000));
        assert_eq!(grew.peak_allocated(), Some(4000));
    }

    #[test]
    fn falls_back_to_index_estimate() {
        let mut index = FlatIndex::new(4, DistanceMetric::L2);
        index.add(&[0.0; 40]).unwrap();
        // No baseline, so no RSS delta.
        let mut tracker = MemoryTracker::new();
        assert_eq!(measure_index_memory(&index, &mut tracker), 160);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn rss_is_readable_on_linux() {
        assert!(current_rss().unwrap() > 0);
    }
}
