use crate::metrics::summary::{MetricsSummary, round_to};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSample {
    pub latency_seconds: f64,
    pub byte_size: u64,
}

/// Per-run accumulator of network exchanges. Clones share the same samples.
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    samples: Arc<Mutex<Vec<MetricsSample>>>,
    start_time: Arc<Instant>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            samples: Arc::new(Mutex::new(Vec::new())),
            start_time: Arc::new(Instant::now()),
        }
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, latency: Duration, byte_size: usize) {
        self.record_raw(latency.as_secs_f64(), byte_size as i64);
    }

    /// Negative inputs are clamped to zero.
    pub fn record_raw(&self, latency_seconds: f64, byte_size: i64) {
        let sample = MetricsSample {
            latency_seconds: latency_seconds.max(0.0),
            byte_size: byte_size.max(0) as u64,
        };
        self.lock().push(sample);
    }

    pub fn samples(&self) -> Vec<MetricsSample> {
        self.lock().clone()
    }

    pub fn request_count(&self) -> u64 {
        self.lock().len() as u64
    }

    pub fn summarize(&self) -> MetricsSummary {
        let samples = self.lock();
        let requests = samples.len() as u64;
        let bytes = samples.iter().map(|s| s.byte_size).sum();
        let total_latency: f64 = samples.iter().map(|s| s.latency_seconds).sum();

        let avg_latency_ms = if requests > 0 {
            total_latency / requests as f64 * 1000.0
        } else {
            0.0
        };

        MetricsSummary {
            requests,
            bytes,
            avg_latency_ms: round_to(avg_latency_ms, 2),
            total_latency_seconds: round_to(total_latency, 3),
            elapsed_seconds: round_to(self.start_time.elapsed().as_secs_f64(), 2),
        }
    }

    // Appends never leave the vector half-written, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Vec<MetricsSample>> {
        self.samples.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
