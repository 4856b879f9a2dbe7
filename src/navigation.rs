//! Timeout-bounded page navigation for the headless-browser strategy.
//!
//! ```text
//! Idle --Start--> Loading --Completed--> Loaded
//!                    |  \--TimedOut---> Partial   (DOM snapshot kept)
//!                    |--DriverError{retries_left}--> Loading
//!                    \--DriverError{exhausted}----> Failed
//! ```

use crate::config::schema::NavigationConfig;
use crate::metrics::MetricsCollector;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::{sleep, timeout};

/// Upper bound on `stop()` plus the DOM read after a timed-out load.
pub const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct DriverError(pub String);

/// One browser tab, as seen by the state machine.
#[async_trait]
pub trait PageDriver: Send {
    async fn goto(&mut self, url: &str) -> Result<(), DriverError>;
    /// Halt any in-flight loading (`window.stop()`).
    async fn stop(&mut self) -> Result<(), DriverError>;
    async fn page_source(&mut self) -> Result<String, DriverError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
    Idle,
    Loading { attempt: u32 },
    Loaded,
    Partial,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavEvent {
    Start,
    Completed,
    TimedOut,
    DriverError { retries_left: bool },
}

impl NavState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, NavState::Loaded | NavState::Partial | NavState::Failed)
    }

    /// Transition table. Events that make no sense in a state leave it unchanged.
    pub fn on(self, event: NavEvent) -> NavState {
        match (self, event) {
            (NavState::Idle, NavEvent::Start) => NavState::Loading { attempt: 1 },
            (NavState::Loading { .. }, NavEvent::Completed) => NavState::Loaded,
            (NavState::Loading { .. }, NavEvent::TimedOut) => NavState::Partial,
            (NavState::Loading { attempt }, NavEvent::DriverError { retries_left: true }) => {
                NavState::Loading {
                    attempt: attempt + 1,
                }
            }
            (NavState::Loading { .. }, NavEvent::DriverError { retries_left: false }) => {
                NavState::Failed
            }
            (state, _) => state,
        }
    }
}

/// Terminal result of one navigation. `html` is present for `Loaded` and
/// `Partial`, absent for `Failed`.
#[derive(Debug, Clone)]
pub struct Navigation {
    pub state: NavState,
    pub html: Option<String>,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl Navigation {
    pub fn succeeded(&self) -> bool {
        matches!(self.state, NavState::Loaded | NavState::Partial)
    }
}

pub struct Navigator<D: PageDriver> {
    driver: D,
    timeout: Duration,
    retry_budget: u32,
    retry_delay: Duration,
    snapshot_timeout: Duration,
    metrics: MetricsCollector,
}

impl<D: PageDriver> Navigator<D> {
    pub fn new(driver: D, config: &NavigationConfig, metrics: MetricsCollector) -> Self {
        Self {
            driver,
            timeout: Duration::from_secs(config.timeout_secs),
            retry_budget: config.retry_budget,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            snapshot_timeout: SNAPSHOT_TIMEOUT,
            metrics,
        }
    }

    pub fn with_timings(mut self, timeout: Duration, retry_delay: Duration) -> Self {
        self.timeout = timeout;
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_snapshot_timeout(mut self, snapshot_timeout: Duration) -> Self {
        self.snapshot_timeout = snapshot_timeout;
        self
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Never fails: errors end in `NavState::Failed`, timeouts in `NavState::Partial`.
    pub async fn navigate(&mut self, url: &str) -> Navigation {
        let mut state = NavState::Idle.on(NavEvent::Start);
        let mut last_error = None;
        let mut attempts = 0;

        while let NavState::Loading { attempt } = state {
            attempts = attempt;
            let start = Instant::now();

            let event = match timeout(self.timeout, self.driver.goto(url)).await {
                Ok(Ok(())) => match self.driver.page_source().await {
                    Ok(html) => {
                        self.metrics.record(start.elapsed(), html.len());
                        log::debug!("Loaded {} on attempt {}", url, attempt);
                        return self.finish(state.on(NavEvent::Completed), Some(html), attempts, None);
                    }
                    Err(e) => {
                        self.metrics.record(start.elapsed(), 0);
                        last_error = Some(e.0);
                        NavEvent::DriverError {
                            retries_left: attempt <= self.retry_budget,
                        }
                    }
                },
                Err(_elapsed) => {
                    let html = self.snapshot(url).await;
                    self.metrics.record(start.elapsed(), html.len());
                    log::info!(
                        "Navigation to {} timed out after {:?}; using partial DOM ({} bytes)",
                        url,
                        self.timeout,
                        html.len()
                    );
                    return self.finish(state.on(NavEvent::TimedOut), Some(html), attempts, None);
                }
                Ok(Err(e)) => {
                    self.metrics.record(start.elapsed(), 0);
                    log::warn!("Navigation to {} failed (attempt {}): {}", url, attempt, e);
                    last_error = Some(e.0);
                    NavEvent::DriverError {
                        retries_left: attempt <= self.retry_budget,
                    }
                }
            };

            state = state.on(event);
            if matches!(state, NavState::Loading { .. }) {
                sleep(self.retry_delay).await;
            }
        }

        self.finish(state, None, attempts, last_error)
    }

    /// Halts loading and reads whatever DOM is there. A tab that does not
    /// answer within `snapshot_timeout` yields an empty snapshot.
    async fn snapshot(&mut self, url: &str) -> String {
        match timeout(self.snapshot_timeout, self.driver.stop()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::debug!("window.stop() failed on {}: {}", url, e),
            Err(_) => log::debug!("window.stop() did not return on {}", url),
        }
        match timeout(self.snapshot_timeout, self.driver.page_source()).await {
            Ok(Ok(html)) => html,
            Ok(Err(e)) => {
                log::debug!("No partial DOM for {}: {}", url, e);
                String::new()
            }
            Err(_) => {
                log::warn!("Tab stopped responding on {}; partial DOM is empty", url);
                String::new()
            }
        }
    }

    fn finish(
        &self,
        state: NavState,
        html: Option<String>,
        attempts: u32,
        last_error: Option<String>,
    ) -> Navigation {
        Navigation {
            state,
            html,
            attempts,
            last_error,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Scripted behavior for one `goto` call.
    #[derive(Debug, Clone)]
    pub enum Step {
        Load(String),
        Hang { partial: String },
        /// Hangs like `Hang`, and the tab then ignores `stop` and DOM reads too.
        Stuck,
        Fail(String),
    }

    /// Plays back `Step`s in order; repeats the last one when the script runs out.
    #[derive(Clone, Default)]
    pub struct ScriptedDriver {
        script: Arc<Mutex<VecDeque<Step>>>,
        current: Option<Step>,
        pub visited: Arc<Mutex<Vec<String>>>,
        pub stops: Arc<Mutex<u32>>,
    }

    impl ScriptedDriver {
        pub fn new(steps: Vec<Step>) -> Self {
            Self {
                script: Arc::new(Mutex::new(steps.into())),
                ..Self::default()
            }
        }

        fn next_step(&mut self) -> Step {
            let mut script = self.script.lock().unwrap();
            let step = if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                script.front().cloned().unwrap_or(Step::Fail("empty script".into()))
            };
            self.current = Some(step.clone());
            step
        }
    }

    #[async_trait]
    impl PageDriver for ScriptedDriver {
        async fn goto(&mut self, url: &str) -> Result<(), DriverError> {
            self.visited.lock().unwrap().push(url.to_string());
            match self.next_step() {
                Step::Load(_) => Ok(()),
                Step::Hang { .. } | Step::Stuck => {
                    sleep(Duration::from_secs(30)).await;
                    Ok(())
                }
                Step::Fail(msg) => Err(DriverError(msg)),
            }
        }

        async fn stop(&mut self) -> Result<(), DriverError> {
            *self.stops.lock().unwrap() += 1;
            if matches!(self.current, Some(Step::Stuck)) {
                sleep(Duration::from_secs(30)).await;
            }
            Ok(())
        }

        async fn page_source(&mut self) -> Result<String, DriverError> {
            match &self.current {
                Some(Step::Stuck) => {
                    sleep(Duration::from_secs(30)).await;
                    Ok("<html>too late</html>".into())
                }
                Some(Step::Load(html)) => Ok(html.clone()),
                Some(Step::Hang { partial }) => Ok(partial.clone()),
                _ => Ok(String::new()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{ScriptedDriver, Step};
    use super::*;

    fn navigator(driver: ScriptedDriver, budget: u32, metrics: &MetricsCollector) -> Navigator<ScriptedDriver> {
        let config = NavigationConfig {
            retry_budget: budget,
            ..NavigationConfig::default()
        };
        Navigator::new(driver, &config, metrics.clone())
            .with_timings(Duration::from_millis(100), Duration::from_millis(1))
    }

    #[test]
    fn transition_table() {
        let loading = NavState::Idle.on(NavEvent::Start);
        assert_eq!(loading, NavState::Loading { attempt: 1 });
        assert_eq!(loading.on(NavEvent::Completed), NavState::Loaded);
        assert_eq!(loading.on(NavEvent::TimedOut), NavState::Partial);
        assert_eq!(
            loading.on(NavEvent::DriverError { retries_left: true }),
            NavState::Loading { attempt: 2 }
        );
        assert_eq!(
            loading.on(NavEvent::DriverError { retries_left: false }),
            NavState::Failed
        );
        assert_eq!(NavState::Idle.on(NavEvent::Completed), NavState::Idle);
        for terminal in [NavState::Loaded, NavState::Partial, NavState::Failed] {
            assert!(terminal.is_terminal());
            assert_eq!(terminal.on(NavEvent::Start), terminal);
        }
    }

    #[tokio::test]
    async fn completed_load_is_loaded() {
        let metrics = MetricsCollector::new();
        let driver = ScriptedDriver::new(vec![Step::Load("<html>ok</html>".into())]);
        let nav = navigator(driver, 2, &metrics).navigate("http://x/").await;
        assert_eq!(nav.state, NavState::Loaded);
        assert_eq!(nav.html.as_deref(), Some("<html>ok</html>"));
        assert_eq!(metrics.request_count(), 1);
        assert_eq!(metrics.summarize().bytes, 15);
    }

    #[tokio::test]
    async fn timeout_is_partial_not_error() {
        let metrics = MetricsCollector::new();
        let driver = ScriptedDriver::new(vec![Step::Hang {
            partial: "<html><h2>half</h2>".into(),
        }]);
        let stops = driver.stops.clone();
        let nav = navigator(driver, 2, &metrics).navigate("http://slow/").await;
        assert_eq!(nav.state, NavState::Partial);
        assert!(nav.succeeded());
        assert_eq!(nav.html.as_deref(), Some("<html><h2>half</h2>"));
        assert_eq!(nav.attempts, 1);
        assert_eq!(*stops.lock().unwrap(), 1);
        assert_eq!(metrics.request_count(), 1);
    }

    #[tokio::test]
    async fn unresponsive_tab_still_ends_partial() {
        let metrics = MetricsCollector::new();
        let driver = ScriptedDriver::new(vec![Step::Stuck]);
        let stops = driver.stops.clone();
        let started = Instant::now();
        let nav = navigator(driver, 2, &metrics)
            .with_snapshot_timeout(Duration::from_millis(50))
            .navigate("http://stuck/")
            .await;
        assert_eq!(nav.state, NavState::Partial);
        assert_eq!(nav.html.as_deref(), Some(""));
        assert_eq!(nav.attempts, 1);
        assert_eq!(*stops.lock().unwrap(), 1);
        assert_eq!(metrics.request_count(), 1);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn errors_retry_then_fail() {
        let metrics = MetricsCollector::new();
        let driver = ScriptedDriver::new(vec![Step::Fail("net::ERR_PROXY".into())]);
        let visited = driver.visited.clone();
        let nav = navigator(driver, 2, &metrics).navigate("http://down/").await;
        assert_eq!(nav.state, NavState::Failed);
        assert!(nav.html.is_none());
        assert_eq!(nav.attempts, 3);
        assert_eq!(visited.lock().unwrap().len(), 3);
        assert_eq!(metrics.request_count(), 3);
        assert_eq!(nav.last_error.as_deref(), Some("net::ERR_PROXY"));
    }

    #[tokio::test]
    async fn retry_recovers() {
        let metrics = MetricsCollector::new();
        let driver = ScriptedDriver::new(vec![
            Step::Fail("reset".into()),
            Step::Load("<p>second</p>".into()),
        ]);
        let nav = navigator(driver, 1, &metrics).navigate("http://flaky/").await;
        assert_eq!(nav.state, NavState::Loaded);
        assert_eq!(nav.attempts, 2);
        assert_eq!(metrics.request_count(), 2);
    }

    #[tokio::test]
    async fn zero_budget_fails_after_one_attempt() {
        let metrics = MetricsCollector::new();
        let driver = ScriptedDriver::new(vec![Step::Fail("boom".into())]);
        let nav = navigator(driver, 0, &metrics).navigate("http://down/").await;
        assert_eq!(nav.state, NavState::Failed);
        assert_eq!(nav.attempts, 1);
    }
}
