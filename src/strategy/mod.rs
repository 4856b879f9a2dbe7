//! Fetch strategies and the pagination driver they share.

pub mod api;
pub mod browser;
pub mod html;

use crate::error::Result;
use crate::record::{MovieRecord, StrategyKind};
use crate::scheduler::{Pacing, Scheduler};
use async_trait::async_trait;
use indicatif::ProgressBar;
use std::collections::HashSet;

pub use api::ApiStrategy;
pub use browser::BrowserStrategy;
pub use html::HtmlStrategy;

/// A detail item discovered on a listing page.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: Option<i64>,
    pub url: String,
    /// Already-complete record, when the listing carried every field.
    pub seed: Option<MovieRecord>,
}

impl Candidate {
    pub fn from_url(id: Option<i64>, url: String) -> Self {
        Self {
            id,
            url,
            seed: None,
        }
    }

    fn dedup_key(&self) -> String {
        match self.id {
            Some(id) => format!("id:{id}"),
            None => self.url.clone(),
        }
    }
}

#[async_trait]
pub trait FetchStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// One-time setup before the first listing page.
    async fn prepare(&self) -> Result<()> {
        Ok(())
    }

    async fn list_candidates(&self, page: u32) -> Result<Vec<Candidate>>;

    async fn fetch_detail(&self, candidate: Candidate) -> Result<MovieRecord>;
}

/// Limits for one [`collect`] run.
#[derive(Debug, Clone, Copy)]
pub struct CollectLimits {
    pub target: usize,
    pub max_pages: u32,
    pub page_pacing: Pacing,
}

/// Walks listing pages from 1 upward and fans detail fetches out to the
/// scheduler until `target` records are in hand or the source runs dry.
///
/// Item failures are logged and skipped. A failed listing page ends the run
/// with whatever was collected so far.
pub async fn collect(
    strategy: &dyn FetchStrategy,
    scheduler: &Scheduler,
    limits: CollectLimits,
    progress: Option<&ProgressBar>,
) -> Vec<MovieRecord> {
    let kind = strategy.kind();
    let mut records: Vec<MovieRecord> = Vec::with_capacity(limits.target);
    let mut seen = HashSet::new();

    log::debug!(
        "[{}] collecting up to {} records with {} workers",
        kind,
        limits.target,
        scheduler.workers()
    );
    if let Err(e) = strategy.prepare().await {
        log::warn!("[{}] setup failed: {}", kind, e);
    }

    for page in 1..=limits.max_pages {
        if records.len() >= limits.target {
            break;
        }

        let candidates = match strategy.list_candidates(page).await {
            Ok(candidates) => candidates,
            Err(e) => {
                log::warn!("[{}] listing page {} failed, stopping: {}", kind, page, e);
                break;
            }
        };

        if candidates.is_empty() {
            log::info!("[{}] source exhausted at page {}", kind, page);
            break;
        }

        let needed = limits.target - records.len();
        let fresh: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| seen.insert(c.dedup_key()))
            .take(needed)
            .collect();
        log::debug!("[{}] page {}: {} new candidates", kind, page, fresh.len());

        let batch = scheduler
            .dispatch(fresh, |candidate| async move {
                let url = candidate.url.clone();
                match strategy.fetch_detail(candidate).await {
                    Ok(record) => {
                        if let Some(pb) = progress {
                            pb.inc(1);
                        }
                        Some(record)
                    }
                    Err(e) => {
                        log::warn!("[{}] skipping {}: {}", kind, url, e);
                        None
                    }
                }
            })
            .await;
        records.extend(batch);

        if records.len() < limits.target && page < limits.max_pages {
            limits.page_pacing.pause().await;
        }
    }

    records.truncate(limits.target);
    records
}
