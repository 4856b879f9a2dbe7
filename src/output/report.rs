//! Per-run network reports and the cross-run merge.

use crate::error::{Error, Result};
use crate::metrics::{ComparisonRow, MetricsSummary};
use crate::proxy::Route;
use crate::record::RunScenario;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const COMPARISON_FILE: &str = "scrape_network_metrics.csv";
pub const SUMMARY_FILE: &str = "scrape_metrics_summary.json";

/// Machine-readable digest of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(flatten)]
    pub route: Route,
    pub scenario: RunScenario,
    /// Keyed by method tag, e.g. `API_TOR`.
    pub runs: BTreeMap<String, MetricsSummary>,
    pub common_rows: usize,
    pub union_rows: usize,
}

impl RunSummary {
    pub fn comparison_rows(&self) -> Vec<ComparisonRow> {
        self.runs
            .iter()
            .map(|(method, summary)| ComparisonRow::new(method, summary))
            .collect()
    }
}

/// A comparison row tagged with the summary file it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedRow {
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
    #[serde(rename = "Scenario")]
    pub scenario: RunScenario,
    #[serde(rename = "Source")]
    pub source: String,
}

impl MergedRow {
    fn new(row: ComparisonRow, scenario: RunScenario, source: String) -> Self {
        Self {
            method: row.method,
            bandwidth_kb: row.bandwidth_kb,
            time_seconds: row.time_seconds,
            requests: row.requests,
            avg_latency_ms: row.avg_latency_ms,
            scenario,
            source,
        }
    }
}

pub fn write_comparison(path: &Path, rows: &[ComparisonRow]) -> Result<()> {
    write_csv(path, rows)
}

pub fn write_summary(path: &Path, summary: &RunSummary) -> Result<()> {
    let body = serde_json::to_string_pretty(summary)?;
    fs::write(path, body)?;
    log::info!("Wrote run summary to {}", path.display());
    Ok(())
}

pub fn read_summary(path: &Path) -> Result<RunSummary> {
    let body = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    Ok(serde_json::from_str(&body)?)
}

/// Both report files of a run into `dir`; returns their paths.
pub fn write_run_reports(dir: &Path, summary: &RunSummary) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(dir)?;
    let comparison = dir.join(COMPARISON_FILE);
    let json = dir.join(SUMMARY_FILE);
    write_comparison(&comparison, &summary.comparison_rows())?;
    write_summary(&json, summary)?;
    Ok((comparison, json))
}

/// Comparison rows of several runs (baseline, multithread, proxy, ...) in
/// input order.
pub fn merge_summaries(paths: &[PathBuf]) -> Result<Vec<MergedRow>> {
    let mut merged = Vec::new();
    for path in paths {
        let summary = read_summary(path)?;
        let source = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        merged.extend(
            summary
                .comparison_rows()
                .into_iter()
                .map(|row| MergedRow::new(row, summary.scenario, source.clone())),
        );
    }
    Ok(merged)
}

pub fn write_merged(path: &Path, rows: &[MergedRow]) -> Result<()> {
    write_csv(path, rows)
}

fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    log::info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(route: Route, scenario: RunScenario) -> RunSummary {
        let mut runs = BTreeMap::new();
        runs.insert(
            "API".to_string(),
            MetricsSummary {
                requests: 3,
                bytes: 3072,
                avg_latency_ms: 120.5,
                total_latency_seconds: 0.362,
                elapsed_seconds: 1.5,
            },
        );
        runs.insert(
            "BS4".to_string(),
            MetricsSummary {
                requests: 31,
                bytes: 512_000,
                avg_latency_ms: 80.0,
                total_latency_seconds: 2.48,
                elapsed_seconds: 9.25,
            },
        );
        RunSummary {
            route,
            scenario,
            runs,
            common_rows: 12,
            union_rows: 48,
        }
    }

    #[test]
    fn summary_json_shape() {
        let value = serde_json::to_value(summary(
            Route::Tor {
                proxy_url: "socks5h://127.0.0.1:9050".into(),
            },
            RunScenario::ProxyTor,
        ))
        .unwrap();
        assert_eq!(value["route"], "tor");
        assert_eq!(value["proxy_url"], "socks5h://127.0.0.1:9050");
        assert_eq!(value["scenario"], "proxy_tor");
        assert_eq!(value["runs"]["API"]["avgLatencyMs"], 120.5);
        assert_eq!(value["common_rows"], 12);
    }

    #[test]
    fn reports_written_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let original = summary(Route::Direct, RunScenario::Baseline);
        let (csv_path, json_path) = write_run_reports(dir.path(), &original).unwrap();

        assert_eq!(read_summary(&json_path).unwrap(), original);

        let body = fs::read_to_string(csv_path).unwrap();
        let mut lines = body.lines();
        assert_eq!(
            lines.next(),
            Some("Method,Bandwidth(KB),Time(s),#Requests,Avg Latency(ms)")
        );
        assert_eq!(lines.next(), Some("API,3.0,1.5,3,120.5"));
        assert_eq!(lines.next(), Some("BS4,500.0,9.25,31,80.0"));
    }

    #[test]
    fn merge_concatenates_runs_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let baseline = dir.path().join("baseline.json");
        let tor = dir.path().join("tor.json");
        write_summary(&baseline, &summary(Route::Direct, RunScenario::Baseline)).unwrap();
        write_summary(
            &tor,
            &summary(
                Route::Tor {
                    proxy_url: "socks5h://127.0.0.1:9050".into(),
                },
                RunScenario::ProxyTor,
            ),
        )
        .unwrap();

        let rows = merge_summaries(&[baseline, tor]).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].source, "baseline");
        assert_eq!(rows[3].source, "tor");
        assert_eq!(rows[3].scenario, RunScenario::ProxyTor);

        let out = dir.path().join("all.csv");
        write_merged(&out, &rows).unwrap();
        let header = fs::read_to_string(out).unwrap();
        assert!(header.starts_with(
            "Method,Bandwidth(KB),Time(s),#Requests,Avg Latency(ms),Scenario,Source"
        ));
    }

    #[test]
    fn merge_reports_missing_file() {
        let missing = PathBuf::from("/nonexistent/summary.json");
        assert!(matches!(merge_summaries(&[missing]), Err(Error::Config(_))));
    }
}
