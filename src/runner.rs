//! One full comparison run: route selection, every requested strategy side
//! by side, then the cross-strategy join.

use crate::config::schema::{ProxyMode, ScraperConfig};
use crate::error::Result;
use crate::join::{join_by_id, union_distinct};
use crate::metrics::{MetricsCollector, MetricsSummary};
use crate::navigation::Navigator;
use crate::output::report::RunSummary;
use crate::proxy::{ProxyRouter, Route};
use crate::record::{MovieRecord, RunScenario, StrategyKind, method_tag};
use crate::renderer::ChromiumDriver;
use crate::scheduler::{Pacing, Scheduler};
use crate::selector::SelectorSet;
use crate::strategy::{ApiStrategy, BrowserStrategy, CollectLimits, HtmlStrategy, collect};
use crate::transport::Transport;
use futures::future::join_all;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct StrategyRun {
    pub kind: StrategyKind,
    pub method: String,
    pub records: Vec<MovieRecord>,
    pub summary: MetricsSummary,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub route: Route,
    pub scenario: RunScenario,
    pub runs: Vec<StrategyRun>,
    /// Movies every strategy found, rows from the first strategy.
    pub common: Vec<MovieRecord>,
    pub union: Vec<MovieRecord>,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            route: self.route.clone(),
            scenario: self.scenario,
            runs: self
                .runs
                .iter()
                .map(|run| (run.method.clone(), run.summary.clone()))
                .collect(),
            common_rows: self.common.len(),
            union_rows: self.union.len(),
        }
    }
}

/// Scenario label for the route the run actually got.
pub fn resolve_scenario(requested: RunScenario, mode: ProxyMode, route: &Route) -> RunScenario {
    match (mode, route.is_tor()) {
        (_, true) => RunScenario::ProxyTor,
        (ProxyMode::Tor, false) => RunScenario::ProxyDirect,
        (ProxyMode::None, false) if requested == RunScenario::ProxyTor => RunScenario::ProxyDirect,
        (ProxyMode::None, false) => requested,
    }
}

pub struct Runner {
    config: ScraperConfig,
    selectors: Arc<SelectorSet>,
    multi: Option<Arc<MultiProgress>>,
}

impl Runner {
    pub fn new(config: ScraperConfig) -> Self {
        let selectors = Arc::new(config.selectors.clone());
        Self {
            config,
            selectors,
            multi: None,
        }
    }

    /// Show one progress bar per strategy.
    pub fn with_progress(mut self, multi: Arc<MultiProgress>) -> Self {
        self.multi = Some(multi);
        self
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    pub async fn run(&self) -> Result<RunReport> {
        self.config.check_credentials()?;

        let route = ProxyRouter::new(self.config.proxy.clone()).select().await;
        let scenario = resolve_scenario(self.config.scenario, self.config.proxy.mode, &route);
        log::info!("Run '{}' on {} route ({})", self.config.name, route, scenario);

        let transport = Transport::new(&self.config.transport, &route, self.config.max_workers())?;

        let mut kinds: Vec<StrategyKind> = Vec::new();
        for kind in &self.config.strategies {
            if !kinds.contains(kind) {
                kinds.push(*kind);
            }
        }

        let runs = join_all(
            kinds
                .iter()
                .map(|&kind| self.run_strategy(kind, &route, scenario, &transport)),
        )
        .await;

        let sets: Vec<Vec<MovieRecord>> = runs.iter().map(|run| run.records.clone()).collect();
        let common = join_by_id(&sets);
        let union = union_distinct(&sets);
        log::info!(
            "{} movies common to all strategies, {} distinct overall",
            common.len(),
            union.len()
        );

        Ok(RunReport {
            route,
            scenario,
            runs,
            common,
            union,
        })
    }

    async fn run_strategy(
        &self,
        kind: StrategyKind,
        route: &Route,
        scenario: RunScenario,
        transport: &Transport,
    ) -> StrategyRun {
        let method = method_tag(kind, route, scenario);
        let metrics = MetricsCollector::new();
        let transport = transport.with_metrics(metrics.clone());
        let progress = self.progress_bar(&method);

        let records = match self
            .collect_with(kind, route, &method, transport, &metrics, progress.as_ref())
            .await
        {
            Ok(records) => records,
            Err(e) => {
                log::error!("[{}] could not start: {}", method, e);
                Vec::new()
            }
        };

        if records.is_empty() {
            log::warn!("[{}] produced no records", method);
        } else {
            log::info!("[{}] collected {} records", method, records.len());
        }
        if let Some(pb) = progress {
            pb.finish_with_message(format!("{} records", records.len()));
        }

        StrategyRun {
            kind,
            method,
            records,
            summary: metrics.summarize(),
        }
    }

    async fn collect_with(
        &self,
        kind: StrategyKind,
        route: &Route,
        method: &str,
        transport: Transport,
        metrics: &MetricsCollector,
        progress: Option<&ProgressBar>,
    ) -> Result<Vec<MovieRecord>> {
        let config = &self.config;
        let pacing = Pacing::from(&config.pacing);
        let limits = CollectLimits {
            target: config.max_records,
            max_pages: config.max_pages,
            page_pacing: pacing,
        };

        match kind {
            StrategyKind::Api => {
                let api_key = config.api_key.clone().unwrap_or_default();
                let strategy =
                    ApiStrategy::new(transport, config.endpoints.clone(), api_key, method);
                let scheduler = Scheduler::new(config.workers.api, pacing);
                Ok(collect(&strategy, &scheduler, limits, progress).await)
            }
            StrategyKind::Html => {
                let strategy = HtmlStrategy::new(
                    transport,
                    &config.endpoints.site_base,
                    self.selectors.clone(),
                    method,
                )?;
                let scheduler = Scheduler::new(config.workers.html, pacing);
                Ok(collect(&strategy, &scheduler, limits, progress).await)
            }
            StrategyKind::Browser => {
                let driver = ChromiumDriver::launch(&config.navigation, route).await?;
                let navigator = Navigator::new(driver, &config.navigation, metrics.clone());
                let strategy = BrowserStrategy::new(
                    navigator,
                    transport,
                    &config.endpoints.site_base,
                    self.selectors.clone(),
                    method,
                )?;
                // one tab, one worker
                let scheduler = Scheduler::new(1, pacing);
                let records = collect(&strategy, &scheduler, limits, progress).await;
                strategy.into_navigator().into_driver().shutdown().await;
                Ok(records)
            }
        }
    }

    fn progress_bar(&self, method: &str) -> Option<ProgressBar> {
        let multi = self.multi.as_ref()?;
        let pb = multi.add(ProgressBar::new(self.config.max_records as u64));
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix:>12} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map(|s| s.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb.set_prefix(method.to_string());
        Some(pb)
    }
}
