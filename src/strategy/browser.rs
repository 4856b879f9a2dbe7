use super::html::{listing_url, parse_site, resolve_links};
use super::{Candidate, FetchStrategy};
use crate::error::{Error, Result};
use crate::navigation::{Navigator, PageDriver};
use crate::normalize::canonicalize;
use crate::record::{MovieRecord, StrategyKind};
use crate::selector::SelectorSet;
use crate::transport::Transport;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use url::Url;

/// Rendered pages through a single browser tab.
///
/// The tab is shared, so navigations are serialized behind a mutex; run it
/// with a one-worker scheduler. Detail pages the browser cannot load are
/// retried once over plain HTTP on the same route.
pub struct BrowserStrategy<D: PageDriver> {
    navigator: Mutex<Navigator<D>>,
    fallback: Transport,
    site: Url,
    selectors: Arc<SelectorSet>,
    method: String,
}

impl<D: PageDriver> BrowserStrategy<D> {
    pub fn new(
        navigator: Navigator<D>,
        fallback: Transport,
        site_base: &str,
        selectors: Arc<SelectorSet>,
        method: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            navigator: Mutex::new(navigator),
            fallback,
            site: parse_site(site_base)?,
            selectors,
            method: method.into(),
        })
    }

    pub fn into_navigator(self) -> Navigator<D> {
        self.navigator.into_inner()
    }

    async fn render(&self, url: &str) -> std::result::Result<String, String> {
        let nav = self.navigator.lock().await.navigate(url).await;
        if nav.succeeded() {
            Ok(nav.html.unwrap_or_default())
        } else {
            Err(format!(
                "navigation failed after {} attempts: {}",
                nav.attempts,
                nav.last_error.unwrap_or_else(|| "unknown error".to_string())
            ))
        }
    }
}

#[async_trait]
impl<D: PageDriver> FetchStrategy for BrowserStrategy<D> {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Browser
    }

    async fn list_candidates(&self, page: u32) -> Result<Vec<Candidate>> {
        let url = listing_url(&self.site, page)?;
        let html = self.render(&url).await.map_err(Error::Browser)?;
        let hrefs = self.selectors.extract_listing(&html);
        Ok(resolve_links(&self.site, hrefs))
    }

    async fn fetch_detail(&self, candidate: Candidate) -> Result<MovieRecord> {
        let html = match self.render(&candidate.url).await {
            Ok(html) => html,
            Err(reason) => {
                log::warn!(
                    "{}; falling back to HTTP for {}",
                    reason,
                    candidate.url
                );
                self.fallback.fetch(&candidate.url).await?.body
            }
        };
        let raw = self.selectors.extract_detail(&html, candidate.id, &candidate.url);
        Ok(canonicalize(raw, &self.method))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{NavigationConfig, TransportConfig};
    use crate::metrics::MetricsCollector;
    use crate::navigation::testing::{ScriptedDriver, Step};
    use crate::proxy::Route;
    use crate::record::Rating;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DETAIL: &str = r#"<html><body>
        <h2 class="title"><a href="/movie/7">Seven</a></h2>
        <span class="release">09/22/1995 (US)</span>
        <div class="user_score_chart" data-percent="84"></div>
        <div class="overview"><p>Two detectives.</p></div>
    </body></html>"#;

    fn strategy(
        steps: Vec<Step>,
        site: &str,
        metrics: &MetricsCollector,
    ) -> BrowserStrategy<ScriptedDriver> {
        let nav_config = NavigationConfig {
            retry_budget: 1,
            ..NavigationConfig::default()
        };
        let navigator = Navigator::new(ScriptedDriver::new(steps), &nav_config, metrics.clone())
            .with_timings(Duration::from_millis(100), Duration::from_millis(1));
        let transport_config = TransportConfig {
            retry_attempts: 1,
            ..TransportConfig::default()
        };
        let fallback = Transport::new(&transport_config, &Route::Direct, 1)
            .unwrap()
            .with_metrics(metrics.clone());
        BrowserStrategy::new(navigator, fallback, site, Arc::new(SelectorSet::default()), "Selenium")
            .unwrap()
    }

    #[tokio::test]
    async fn rendered_detail_is_extracted() {
        let metrics = MetricsCollector::new();
        let s = strategy(vec![Step::Load(DETAIL.into())], "http://site.test", &metrics);
        let record = s
            .fetch_detail(Candidate::from_url(Some(7), "http://site.test/movie/7".into()))
            .await
            .unwrap();
        assert_eq!(record.title, "Seven");
        assert_eq!(record.release_date, "1995-09-22");
        assert_eq!(record.rating, Rating::Score(8.4));
        assert_eq!(record.genres, "N/A");
        assert_eq!(record.method, "Selenium");
        assert_eq!(metrics.request_count(), 1);
    }

    #[tokio::test]
    async fn partial_dom_still_yields_a_record() {
        let metrics = MetricsCollector::new();
        let s = strategy(
            vec![Step::Hang {
                partial: r#"<h2 class="title">Half Loaded</h2>"#.into(),
            }],
            "http://site.test",
            &metrics,
        );
        let record = s
            .fetch_detail(Candidate::from_url(Some(9), "http://site.test/movie/9".into()))
            .await
            .unwrap();
        assert_eq!(record.title, "Half Loaded");
        assert_eq!(record.rating, Rating::Missing);
    }

    #[tokio::test]
    async fn failed_navigation_falls_back_to_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/7"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DETAIL))
            .expect(1)
            .mount(&server)
            .await;

        let metrics = MetricsCollector::new();
        let s = strategy(vec![Step::Fail("net::ERR_TIMED_OUT".into())], &server.uri(), &metrics);
        let url = format!("{}/movie/7", server.uri());
        let record = s
            .fetch_detail(Candidate::from_url(Some(7), url.clone()))
            .await
            .unwrap();

        assert_eq!(record.title, "Seven");
        assert_eq!(record.source_url, url);
        // two browser attempts plus one HTTP request
        assert_eq!(metrics.request_count(), 3);
    }

    #[tokio::test]
    async fn failed_listing_is_an_error() {
        let metrics = MetricsCollector::new();
        let s = strategy(vec![Step::Fail("boom".into())], "http://site.test", &metrics);
        assert!(matches!(s.list_candidates(1).await, Err(Error::Browser(_))));
    }

    #[tokio::test]
    async fn listing_is_rendered_and_resolved() {
        let listing = r#"<div class="card style_1"><h2><a href="/movie/11-star-wars">Star Wars</a></h2></div>"#;
        let metrics = MetricsCollector::new();
        let s = strategy(vec![Step::Load(listing.into())], "http://site.test", &metrics);
        let candidates = s.list_candidates(3).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, Some(11));
        assert_eq!(candidates[0].url, "http://site.test/movie/11-star-wars");

        let driver = s.into_navigator().into_driver();
        assert_eq!(
            *driver.visited.lock().unwrap(),
            vec!["http://site.test/movie?page=3".to_string()]
        );
    }
}
