use crate::error::{Error, Result};
use crate::record::{RunScenario, StrategyKind};
use crate::selector::SelectorSet;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ScraperConfig {
    #[validate(length(min = 1))]
    pub name: String,

    /// Credential for the API strategy. Never defaulted.
    pub api_key: Option<String>,

    #[validate(range(min = 1, max = 100000))]
    pub max_records: usize,

    #[validate(range(min = 1))]
    pub max_pages: u32,

    #[validate(length(min = 1))]
    pub strategies: Vec<StrategyKind>,

    pub scenario: RunScenario,

    #[validate]
    pub workers: WorkerConfig,

    pub pacing: PacingConfig,

    #[validate]
    pub endpoints: EndpointConfig,

    #[validate]
    pub transport: TransportConfig,

    #[validate]
    pub navigation: NavigationConfig,

    #[validate]
    pub proxy: ProxyConfig,

    pub selectors: SelectorSet,

    pub output: OutputConfig,

    /// Optional path to a parent configuration file to inherit from
    pub extends: Option<String>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            name: "moviecrawl".to_string(),
            api_key: None,
            max_records: 30,
            max_pages: 500,
            strategies: StrategyKind::ALL.to_vec(),
            scenario: RunScenario::default(),
            workers: WorkerConfig::default(),
            pacing: PacingConfig::default(),
            endpoints: EndpointConfig::default(),
            transport: TransportConfig::default(),
            navigation: NavigationConfig::default(),
            proxy: ProxyConfig::default(),
            selectors: SelectorSet::default(),
            output: OutputConfig::default(),
            extends: None,
        }
    }
}

impl ScraperConfig {
    pub fn wants(&self, kind: StrategyKind) -> bool {
        self.strategies.contains(&kind)
    }

    /// Largest worker pool of the run; sizes the shared connection pool.
    pub fn max_workers(&self) -> usize {
        self.workers.api.max(self.workers.html).max(1)
    }

    pub fn check_credentials(&self) -> Result<()> {
        let has_key = self
            .api_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false);
        if self.wants(StrategyKind::Api) && !has_key {
            return Err(Error::Config(
                "the API strategy needs an api_key (config file, SCRAPER_API_KEY or TMDB_API_KEY)"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct WorkerConfig {
    #[validate(range(min = 1, max = 256))]
    pub api: usize,
    #[validate(range(min = 1, max = 256))]
    pub html: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { api: 10, html: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub delay_ms: u64,
    pub jitter_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            delay_ms: 250,
            jitter_ms: 250,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EndpointConfig {
    #[validate(url)]
    pub api_base: String,
    #[validate(url)]
    pub site_base: String,
    pub image_base: String,
    pub language: String,
    /// Also call `/movie/{id}` per listed item instead of trusting the listing.
    pub api_details: bool,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.themoviedb.org/3".to_string(),
            site_base: "https://www.themoviedb.org".to_string(),
            image_base: "https://image.tmdb.org/t/p/w500".to_string(),
            language: "en-US".to_string(),
            api_details: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TransportConfig {
    #[validate(range(min = 1))]
    pub timeout_secs: u64,
    #[validate(range(min = 1, max = 20))]
    pub retry_attempts: u32,
    pub backoff_base_ms: u64,
    pub user_agent: String,
    pub accept_language: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            retry_attempts: 4,
            backoff_base_ms: 500,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36"
                .to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct NavigationConfig {
    #[validate(range(min = 1))]
    pub timeout_secs: u64,
    #[validate(range(max = 10))]
    pub retry_budget: u32,
    pub retry_delay_ms: u64,
    pub headless: bool,
    pub chrome_executable: Option<String>,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            retry_budget: 2,
            retry_delay_ms: 3000,
            headless: true,
            chrome_executable: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyMode {
    #[default]
    None,
    Tor,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ProxyConfig {
    pub mode: ProxyMode,
    pub tor_url: String,
    #[validate(url)]
    pub check_url: String,
    #[validate(range(min = 1))]
    pub probe_timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            mode: ProxyMode::None,
            tor_url: "socks5h://127.0.0.1:9050".to_string(),
            check_url: "https://check.torproject.org/api/ip".to_string(),
            probe_timeout_secs: 12,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutputConfig {
    Console,
    Json {
        #[serde(default = "default_output_dir")]
        dir: String,
    },
    Csv {
        #[serde(default = "default_output_dir")]
        dir: String,
    },
    Sqlite {
        path: String,
        #[serde(default = "default_table_name")]
        table: String,
    },
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig::Csv {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> String {
    ".".to_string()
}

fn default_table_name() -> String {
    "movies".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(ScraperConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_target_is_rejected() {
        let config = ScraperConfig {
            max_records: 0,
            ..ScraperConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_workers_is_rejected() {
        let mut config = ScraperConfig::default();
        config.workers.html = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn api_needs_a_key() {
        let mut config = ScraperConfig::default();
        assert!(config.check_credentials().is_err());

        config.api_key = Some("k".into());
        assert!(config.check_credentials().is_ok());

        config.api_key = None;
        config.strategies = vec![StrategyKind::Html];
        assert!(config.check_credentials().is_ok());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: ScraperConfig = serde_yaml::from_str(
            "max_records: 5\nproxy:\n  mode: tor\noutput:\n  type: json\n",
        )
        .unwrap();
        assert_eq!(config.max_records, 5);
        assert_eq!(config.proxy.mode, ProxyMode::Tor);
        assert_eq!(config.proxy.probe_timeout_secs, 12);
        assert_eq!(config.workers.api, 10);
        assert!(matches!(config.output, OutputConfig::Json { ref dir } if dir == "."));
    }
}
