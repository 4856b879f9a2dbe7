use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSummary {
    pub requests: u64,
    pub bytes: u64,
    pub avg_latency_ms: f64,
    pub total_latency_seconds: f64,
    pub elapsed_seconds: f64,
}

/// One row of the per-method network comparison table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    #[serde(rename = "Method")]
    pub method: String,
    #[serde(rename = "Bandwidth(KB)")]
    pub bandwidth_kb: f64,
    #[serde(rename = "Time(s)")]
    pub time_seconds: f64,
    #[serde(rename = "#Requests")]
    pub requests: u64,
    #[serde(rename = "Avg Latency(ms)")]
    pub avg_latency_ms: f64,
}

impl ComparisonRow {
    pub fn new(method: &str, summary: &MetricsSummary) -> Self {
        Self {
            method: method.to_string(),
            bandwidth_kb: round_to(summary.bytes as f64 / 1024.0, 2),
            time_seconds: summary.elapsed_seconds,
            requests: summary.requests,
            avg_latency_ms: summary.avg_latency_ms,
        }
    }
}

pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
