use crate::config::schema::{ProxyConfig, ProxyMode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The network path a run actually uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "route", rename_all = "lowercase")]
pub enum Route {
    Direct,
    Tor { proxy_url: String },
}

impl Route {
    pub fn is_tor(&self) -> bool {
        matches!(self, Route::Tor { .. })
    }

    /// Chromium expects `socks5://`; it resolves names through the proxy anyway.
    pub fn browser_proxy_arg(&self) -> Option<String> {
        match self {
            Route::Direct => None,
            Route::Tor { proxy_url } => Some(format!(
                "--proxy-server={}",
                proxy_url.replacen("socks5h://", "socks5://", 1)
            )),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Direct => f.write_str("direct"),
            Route::Tor { proxy_url } => write!(f, "tor ({})", proxy_url),
        }
    }
}

pub struct ProxyRouter {
    config: ProxyConfig,
}

impl ProxyRouter {
    pub fn new(config: ProxyConfig) -> Self {
        Self { config }
    }

    /// Resolves the requested mode to a usable route. A Tor request whose
    /// probe fails degrades to [`Route::Direct`] for the whole run.
    pub async fn select(&self) -> Route {
        match self.config.mode {
            ProxyMode::None => Route::Direct,
            ProxyMode::Tor => match self.probe().await {
                Ok(()) => {
                    log::info!("Proxy reachable, routing through {}", self.config.tor_url);
                    Route::Tor {
                        proxy_url: self.config.tor_url.clone(),
                    }
                }
                Err(reason) => {
                    log::warn!(
                        "Proxy {} not usable ({}); falling back to direct route",
                        self.config.tor_url,
                        reason
                    );
                    Route::Direct
                }
            },
        }
    }

    async fn probe(&self) -> Result<(), String> {
        let proxy = reqwest::Proxy::all(self.config.tor_url.as_str())
            .map_err(|e| format!("invalid proxy url: {}", e))?;
        let client = reqwest::Client::builder()
            .proxy(proxy)
            .timeout(Duration::from_secs(self.config.probe_timeout_secs))
            .build()
            .map_err(|e| e.to_string())?;

        let response = client
            .get(&self.config.check_url)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("check endpoint answered {}", response.status()))
        }
    }
}
