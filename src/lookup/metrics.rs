//! Rolling in-process lookup metrics.
//!
//! Counters plus a bounded window of recent latencies. Percentiles are
//! computed over the window on demand; the window is sized so the p99 of
//! any recent 100-query burst is observable.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Number of recent latency samples retained.
const LATENCY_WINDOW: usize = 1024;

/// Point-in-time metrics view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupMetricsSnapshot {
    /// Total lookups served.
    pub total_queries: u64,
    /// Cache hits.
    pub cache_hits: u64,
    /// Cache misses.
    pub cache_misses: u64,
    /// Current cache entry count.
    pub cache_size: usize,
    /// Median latency, microseconds.
    pub latency_p50_us: u64,
    /// 95th percentile latency, microseconds.
    pub latency_p95_us: u64,
    /// 99th percentile latency, microseconds.
    pub latency_p99_us: u64,
}

/// Thread-safe rolling metrics.
pub struct LookupMetrics {
    total: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    latencies_us: Mutex<Vec<u64>>,
}

impl LookupMetrics {
    /// Fresh metrics.
    pub fn new() -> Self {
        Self {
            total: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            latencies_us: Mutex::new(Vec::with_capacity(LATENCY_WINDOW)),
        }
    }

    /// Record a cache hit with its latency.
    pub fn record_hit(&self, latency: Duration) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.push_latency(latency);
    }

    /// Record a cache miss with its latency.
    pub fn record_miss(&self, latency: Duration) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.push_latency(latency);
    }

    fn push_latency(&self, latency: Duration) {
        let mut window = self.latencies_us.lock();
        if window.len() == LATENCY_WINDOW {
            window.remove(0);
        }
        window.push(latency.as_micros() as u64);
    }

    /// Current snapshot (cache size supplied by the owner).
    pub fn snapshot(&self, cache_size: usize) -> LookupMetricsSnapshot {
        let mut window = self.latencies_us.lock().clone();
        window.sort_unstable();
        LookupMetricsSnapshot {
            total_queries: self.total.load(Ordering::Relaxed),
            cache_hits: self.hits.load(Ordering::Relaxed),
            cache_misses: self.misses.load(Ordering::Relaxed),
            cache_size,
            latency_p50_us: percentile(&window, 50),
            latency_p95_us: percentile(&window, 95),
            latency_p99_us: percentile(&window, 99),
        }
    }
}

impl Default for LookupMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Nearest-rank percentile over a sorted window; 0 for an empty window.
fn percentile(sorted: &[u64], pct: u32) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = ((pct as usize * sorted.len()).div_ceil(100)).max(1);
    sorted[rank - 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = LookupMetrics::new();
        metrics.record_miss(Duration::from_micros(100));
        metrics.record_hit(Duration::from_micros(10));
        let snap = metrics.snapshot(1);
        assert_eq!(snap.total_queries, 2);
        assert_eq!(snap.cache_hits, 1);
        assert_eq!(snap.cache_misses, 1);
        assert_eq!(snap.cache_size, 1);
    }

    #[test]
    fn test_percentiles_over_window() {
        let metrics = LookupMetrics::new();
        for us in 1..=100u64 {
            metrics.record_miss(Duration::from_micros(us));
        }
        let snap = metrics.snapshot(0);
        assert_eq!(snap.latency_p50_us, 50);
        assert_eq!(snap.latency_p95_us, 95);
        assert_eq!(snap.latency_p99_us, 99);
    }

    #[test]
    fn test_window_is_bounded() {
        let metrics = LookupMetrics::new();
        for us in 0..(LATENCY_WINDOW as u64 + 100) {
            metrics.record_miss(Duration::from_micros(us));
        }
        assert_eq!(metrics.latencies_us.lock().len(), LATENCY_WINDOW);
        // Oldest samples were dropped: the window starts at 100.
        assert_eq!(metrics.latencies_us.lock()[0], 100);
    }

    #[test]
    fn test_empty_window_percentiles_are_zero() {
        let metrics = LookupMetrics::new();
        let snap = metrics.snapshot(0);
        assert_eq!(snap.latency_p50_us, 0);
        assert_eq!(snap.latency_p99_us, 0);
    }
}
