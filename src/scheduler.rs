use crate::config::schema::PacingConfig;
use futures::stream::StreamExt;
use rand::Rng;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;

/// Polite delay between requests: a fixed base plus random jitter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pacing {
    pub base: Duration,
    pub jitter: Duration,
}

impl Pacing {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn next_delay(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.base;
        }
        self.base + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }

    pub async fn pause(&self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }
}

impl From<&PacingConfig> for Pacing {
    fn from(config: &PacingConfig) -> Self {
        Self {
            base: Duration::from_millis(config.delay_ms),
            jitter: Duration::from_millis(config.jitter_ms),
        }
    }
}

/// Bounded fan-out/fan-in of work items.
///
/// Each item is handed to exactly one worker; results come back in completion
/// order, not submission order. `None` results are dropped.
pub struct Scheduler {
    workers: usize,
    pacing: Pacing,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl Scheduler {
    pub fn new(workers: usize, pacing: Pacing) -> Self {
        Self {
            workers: workers.max(1),
            pacing,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Highest number of items that were in flight at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub async fn dispatch<T, R, F, Fut>(&self, items: Vec<T>, work: F) -> Vec<R>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = Option<R>>,
    {
        if items.is_empty() {
            return Vec::new();
        }

        let (items_tx, items_rx) = mpsc::channel(items.len());
        let (results_tx, mut results_rx) = mpsc::channel(self.workers * 2);

        for item in items {
            // capacity equals the item count, so this never waits
            if items_tx.send(item).await.is_err() {
                break;
            }
        }
        drop(items_tx);

        let work = &work;
        let workers = async move {
            tokio_stream::wrappers::ReceiverStream::new(items_rx)
                .for_each_concurrent(self.workers, |item| {
                    let results_tx = results_tx.clone();
                    async move {
                        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                        self.peak.fetch_max(now_active, Ordering::SeqCst);

                        if let Some(result) = work(item).await {
                            let _ = results_tx.send(result).await;
                        }

                        self.pacing.pause().await;
                        self.active.fetch_sub(1, Ordering::SeqCst);
                    }
                })
                .await;
            // results_tx dropped here so the collector below can finish
        };

        let collector = async {
            let mut results = Vec::new();
            while let Some(result) = results_rx.recv().await {
                results.push(result);
            }
            results
        };

        let ((), results) = tokio::join!(workers, collector);
        log::debug!("Scheduler finished batch with {} results", results.len());
        results
    }
}
