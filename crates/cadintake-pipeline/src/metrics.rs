//! Preview pipeline counters.
//!
//! Counters are atomics; conversion latencies are kept in a bounded ring
//! for percentile reporting.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Maximum number of latency samples retained.
const MAX_LATENCY_SAMPLES: usize = 1000;

/// Thread-safe counters for [`PreviewService`](crate::preview::PreviewService).
#[derive(Debug, Default)]
pub struct PreviewMetrics {
    requests: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    rejected: AtomicU64,
    coalesced: AtomicU64,
    conversions_started: AtomicU64,
    conversions_succeeded: AtomicU64,
    conversions_failed: AtomicU64,
    conversions_timed_out: AtomicU64,
    conversions_cancelled: AtomicU64,
    input_bytes: AtomicU64,
    output_bytes: AtomicU64,
    latencies: Mutex<VecDeque<Duration>>,
}

impl PreviewMetrics {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// A request arrived carrying `input_bytes` of content.
    pub fn record_request(&self, input_bytes: u64) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.input_bytes.fetch_add(input_bytes, Ordering::Relaxed);
    }

    /// A request joined a conversion already in flight.
    pub fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self, output_bytes: u64) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
        self.output_bytes.fetch_add(output_bytes, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Content was refused before conversion (unsupported or invalid STEP).
    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_conversion_started(&self) {
        self.conversions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_conversion_succeeded(&self, elapsed: Duration, output_bytes: u64) {
        self.conversions_succeeded.fetch_add(1, Ordering::Relaxed);
        self.output_bytes.fetch_add(output_bytes, Ordering::Relaxed);
        self.push_latency(elapsed);
    }

    pub fn record_conversion_failed(&self) {
        self.conversions_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Timeouts also count as failures.
    pub fn record_conversion_timed_out(&self) {
        self.conversions_timed_out.fetch_add(1, Ordering::Relaxed);
        self.conversions_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_conversion_cancelled(&self) {
        self.conversions_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    fn push_latency(&self, elapsed: Duration) {
        let mut samples = self
            .latencies
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if samples.len() == MAX_LATENCY_SAMPLES {
            samples.pop_front();
        }
        samples.push_back(elapsed);
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> PreviewMetricsSnapshot {
        let mut sorted: Vec<Duration> = self
            .latencies
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .copied()
            .collect();
        sorted.sort_unstable();

        PreviewMetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            conversions_started: self.conversions_started.load(Ordering::Relaxed),
            conversions_succeeded: self.conversions_succeeded.load(Ordering::Relaxed),
            conversions_failed: self.conversions_failed.load(Ordering::Relaxed),
            conversions_timed_out: self.conversions_timed_out.load(Ordering::Relaxed),
            conversions_cancelled: self.conversions_cancelled.load(Ordering::Relaxed),
            input_bytes: self.input_bytes.load(Ordering::Relaxed),
            output_bytes: self.output_bytes.load(Ordering::Relaxed),
            latency_p50_ms: percentile_ms(&sorted, 50),
            latency_p95_ms: percentile_ms(&sorted, 95),
            latency_p99_ms: percentile_ms(&sorted, 99),
            latency_samples: sorted.len(),
        }
    }
}

/// Nearest-rank percentile of an ascending sample list, in milliseconds.
fn percentile_ms(sorted: &[Duration], pct: usize) -> Option<u64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (sorted.len() * pct).div_ceil(100).max(1);
    sorted.get(rank - 1).map(|d| d.as_millis() as u64)
}

/// Serializable view of [`PreviewMetrics`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewMetricsSnapshot {
    pub requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub rejected: u64,
    pub coalesced: u64,
    pub conversions_started: u64,
    pub conversions_succeeded: u64,
    pub conversions_failed: u64,
    pub conversions_timed_out: u64,
    pub conversions_cancelled: u64,
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub latency_p50_ms: Option<u64>,
    pub latency_p95_ms: Option<u64>,
    pub latency_p99_ms: Option<u64>,
    pub latency_samples: usize,
}
