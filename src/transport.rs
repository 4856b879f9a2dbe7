//! Pooled HTTP transport with a retry policy for transient failures.
//!
//! Every attempt that reaches the wire is recorded in the bound
//! [`MetricsCollector`], so a fetch that needed three attempts counts as
//! three requests.

use crate::config::schema::TransportConfig;
use crate::error::Result;
use crate::metrics::MetricsCollector;
use crate::proxy::Route;
use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;

pub const TRANSIENT_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transient failure fetching {url}: {reason}")]
    Transient {
        url: String,
        reason: String,
        status: Option<u16>,
    },

    #[error("permanent failure fetching {url}: {reason}")]
    Permanent {
        url: String,
        reason: String,
        status: Option<u16>,
    },
}

impl TransportError {
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Transient { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Transient { status, .. } | TransportError::Permanent { status, .. } => {
                *status
            }
        }
    }

    fn exhausted(self, attempts: u32) -> Self {
        match self {
            TransportError::Transient {
                url,
                reason,
                status,
            } => TransportError::Permanent {
                url,
                reason: format!("gave up after {attempts} attempts: {reason}"),
                status,
            },
            permanent => permanent,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): base, 2*base, 4*base, ...
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.backoff_base.saturating_mul(1u32 << exponent)
    }
}

#[derive(Debug, Clone)]
pub struct Fetched {
    pub body: String,
    pub byte_size: usize,
    pub latency: Duration,
    pub status: u16,
}

#[derive(Debug, Clone)]
pub struct Transport {
    client: Client,
    retry: RetryPolicy,
    timeout: Duration,
    metrics: MetricsCollector,
}

impl Transport {
    /// One pooled client per route, sized for `pool_size` concurrent workers.
    pub fn new(config: &TransportConfig, route: &Route, pool_size: usize) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let language = HeaderValue::from_str(&config.accept_language)
            .map_err(|e| crate::error::Error::Config(format!("accept_language: {}", e)))?;
        headers.insert(ACCEPT_LANGUAGE, language);

        let timeout = Duration::from_secs(config.timeout_secs);
        let mut builder = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(timeout)
            .pool_max_idle_per_host(pool_size.max(1));

        if let Route::Tor { proxy_url } = route {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
        }

        Ok(Self {
            client: builder.build()?,
            retry: RetryPolicy {
                max_attempts: config.retry_attempts.max(1),
                backoff_base: Duration::from_millis(config.backoff_base_ms),
            },
            timeout,
            metrics: MetricsCollector::new(),
        })
    }

    /// Same connection pool, samples recorded into `metrics`.
    pub fn with_metrics(&self, metrics: MetricsCollector) -> Self {
        Self {
            metrics,
            ..self.clone()
        }
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub async fn fetch(&self, url: &str) -> std::result::Result<Fetched, TransportError> {
        self.fetch_with_timeout(url, self.timeout).await
    }

    pub async fn fetch_with_timeout(
        &self,
        url: &str,
        timeout: Duration,
    ) -> std::result::Result<Fetched, TransportError> {
        let mut attempt = 1;
        loop {
            match self.attempt(url, timeout).await {
                Ok(fetched) => return Ok(fetched),
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    let wait = self.retry.backoff(attempt);
                    log::warn!(
                        "{} (attempt {}/{}), retrying in {:?}",
                        e,
                        attempt,
                        self.retry.max_attempts,
                        wait
                    );
                    sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.exhausted(attempt)),
            }
        }
    }

    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> std::result::Result<T, TransportError> {
        let fetched = self.fetch(url).await?;
        serde_json::from_str(&fetched.body).map_err(|e| TransportError::Permanent {
            url: url.to_string(),
            reason: format!("malformed JSON: {}", e),
            status: Some(fetched.status),
        })
    }

    async fn attempt(
        &self,
        url: &str,
        timeout: Duration,
    ) -> std::result::Result<Fetched, TransportError> {
        let start = Instant::now();

        let response = match self.client.get(url).timeout(timeout).send().await {
            Ok(response) => response,
            Err(e) => {
                // a refused connection never put a request on the wire
                if !e.is_connect() {
                    self.metrics.record(start.elapsed(), 0);
                }
                return Err(classify_error(url, &e));
            }
        };

        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                self.metrics.record(start.elapsed(), 0);
                return Err(classify_error(url, &e));
            }
        };
        let latency = start.elapsed();
        self.metrics.record(latency, body.len());
        log::debug!("GET {} -> {} ({} bytes, {:?})", url, status, body.len(), latency);

        if !status.is_success() {
            return Err(classify_status(url, status));
        }

        Ok(Fetched {
            byte_size: body.len(),
            body: String::from_utf8_lossy(&body).into_owned(),
            latency,
            status: status.as_u16(),
        })
    }
}

pub fn classify_status(url: &str, status: StatusCode) -> TransportError {
    let code = status.as_u16();
    let reason = format!("HTTP {}", status);
    if TRANSIENT_STATUSES.contains(&code) {
        TransportError::Transient {
            url: url.to_string(),
            reason,
            status: Some(code),
        }
    } else {
        TransportError::Permanent {
            url: url.to_string(),
            reason,
            status: Some(code),
        }
    }
}

fn classify_error(url: &str, e: &reqwest::Error) -> TransportError {
    let reason = e.to_string();
    if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() {
        TransportError::Transient {
            url: url.to_string(),
            reason,
            status: None,
        }
    } else {
        TransportError::Permanent {
            url: url.to_string(),
            reason,
            status: None,
        }
    }
}
