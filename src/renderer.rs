//! Chromium page driver using chromiumoxide.

use crate::config::schema::NavigationConfig;
use crate::error::{Error, Result};
use crate::navigation::{DriverError, PageDriver};
use crate::proxy::Route;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Headroom between the page-load timeout and the CDP command timeout.
const REQUEST_TIMEOUT_MARGIN: Duration = Duration::from_secs(15);

/// CDP command timeout. Must outlast the navigator's own timeout so a slow
/// load ends `Partial` instead of as a driver error.
pub fn request_timeout(config: &NavigationConfig) -> Duration {
    Duration::from_secs(config.timeout_secs) + REQUEST_TIMEOUT_MARGIN
}

pub struct ChromiumDriver {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromiumDriver {
    /// Launch one browser instance with a single tab, routed like the rest of the run.
    pub async fn launch(config: &NavigationConfig, route: &Route) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .window_size(1920, 1080)
            .request_timeout(request_timeout(config))
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--dns-prefetch-disable")
            .arg("--disable-client-side-phishing-detection")
            .arg("--blink-settings=imagesEnabled=false");

        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &config.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        if let Some(proxy_arg) = route.browser_proxy_arg() {
            builder = builder.arg(proxy_arg);
        }

        let browser_config = builder
            .build()
            .map_err(|e| Error::Browser(format!("failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| Error::Browser(format!("failed to launch Chromium: {}", e)))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    log::debug!("Chromium handler event error: {}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| Error::Browser(format!("failed to open tab: {}", e)))?;

        log::info!("Chromium launched (headless: {}, route: {})", config.headless, route);

        Ok(Self {
            browser,
            page,
            handler,
        })
    }

    pub async fn shutdown(mut self) {
        if let Err(e) = self.browser.close().await {
            log::warn!("Chromium did not close cleanly: {}", e);
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
    }
}

#[async_trait]
impl PageDriver for ChromiumDriver {
    async fn goto(&mut self, url: &str) -> std::result::Result<(), DriverError> {
        self.page
            .goto(url)
            .await
            .map(|_| ())
            .map_err(|e| DriverError(format!("navigation failed: {}", e)))
    }

    async fn stop(&mut self) -> std::result::Result<(), DriverError> {
        self.page
            .evaluate("window.stop()")
            .await
            .map(|_| ())
            .map_err(|e| DriverError(e.to_string()))
    }

    async fn page_source(&mut self) -> std::result::Result<String, DriverError> {
        let result = self
            .page
            .evaluate("document.documentElement.outerHTML")
            .await
            .map_err(|e| DriverError(format!("failed to read DOM: {}", e)))?;

        result
            .into_value::<String>()
            .map_err(|e| DriverError(format!("failed to convert DOM: {:?}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsCollector;
    use crate::navigation::{NavState, Navigator};

    #[test]
    fn command_timeout_outlasts_page_load() {
        let config = NavigationConfig::default();
        assert!(request_timeout(&config) > Duration::from_secs(config.timeout_secs));

        let short = NavigationConfig {
            timeout_secs: 1,
            ..NavigationConfig::default()
        };
        assert_eq!(request_timeout(&short), Duration::from_secs(16));
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_navigates_data_url() {
        let config = NavigationConfig::default();
        let driver = ChromiumDriver::launch(&config, &Route::Direct)
            .await
            .expect("failed to launch Chromium");
        let metrics = MetricsCollector::new();
        let mut navigator = Navigator::new(driver, &config, metrics.clone());

        let nav = navigator
            .navigate("data:text/html,<h2 class=\"title\">Hello</h2>")
            .await;
        assert_eq!(nav.state, NavState::Loaded);
        assert!(nav.html.unwrap_or_default().contains("Hello"));
        assert_eq!(metrics.request_count(), 1);

        navigator.into_driver().shutdown().await;
    }
}
