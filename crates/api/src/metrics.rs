use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// In-process counters for the query endpoint. Degraded means the outcome
/// carried at least one stage error; the query itself still succeeded.
pub struct Metrics {
    total_queries: AtomicUsize,
    degraded_queries: AtomicUsize,
    generation_failures: AtomicUsize,
    total_query_time_us: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            total_queries: AtomicUsize::new(0),
            degraded_queries: AtomicUsize::new(0),
            generation_failures: AtomicUsize::new(0),
            total_query_time_us: AtomicU64::new(0),
        })
    }

    pub fn record_query(
        &self,
        duration: std::time::Duration,
        degraded: bool,
        generation_failed: bool,
    ) {
        self.total_queries.fetch_add(1, Ordering::Relaxed);
        self.total_query_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        if degraded {
            self.degraded_queries.fetch_add(1, Ordering::Relaxed);
        }
        if generation_failed {
            self.generation_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.total_queries.load(Ordering::Relaxed);
        let total_us = self.total_query_time_us.load(Ordering::Relaxed);
        MetricsSnapshot {
            total_queries: total,
            degraded_queries: self.degraded_queries.load(Ordering::Relaxed),
            generation_failures: self.generation_failures.load(Ordering::Relaxed),
            avg_query_time_ms: if total > 0 {
                total_us as f64 / total as f64 / 1000.0
            } else {
                0.0
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub total_queries: usize,
    pub degraded_queries: usize,
    pub generation_failures: usize,
    pub avg_query_time_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn snapshot_reflects_recorded_queries() {
        let metrics = Metrics::new();
        metrics.record_query(Duration::from_millis(10), false, false);
        metrics.record_query(Duration::from_millis(30), true, true);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_queries, 2);
        assert_eq!(snapshot.degraded_queries, 1);
        assert_eq!(snapshot.generation_failures, 1);
        assert!((snapshot.avg_query_time_ms - 20.0).abs() < 1.0);
    }
}
