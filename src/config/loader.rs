use crate::config::schema::{ProxyMode, ScraperConfig};
use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use validator::Validate;

const ENV_PREFIX: &str = "SCRAPER";
const LEGACY_KEY_VAR: &str = "TMDB_API_KEY";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads a file (with `extends` inheritance) and applies environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<ScraperConfig> {
        let mut visited = HashSet::new();
        let value = Self::load_with_inheritance(path.as_ref(), &mut visited)?;
        let mut config: ScraperConfig = serde_json::from_value(value)?;
        config.extends = None;
        Self::finish(config)
    }

    /// Defaults plus environment overrides, for runs without a config file.
    pub fn from_env() -> Result<ScraperConfig> {
        Self::finish(ScraperConfig::default())
    }

    fn finish(mut config: ScraperConfig) -> Result<ScraperConfig> {
        let env = config::Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;
        Self::apply_overrides(&mut config, &env)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var(LEGACY_KEY_VAR).ok().filter(|k| !k.is_empty());
        }

        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(config: &mut ScraperConfig, env: &config::Config) -> Result<()> {
        if let Ok(key) = env.get_string("api_key") {
            config.api_key = Some(key);
        }
        if let Ok(max) = env.get_int("max_records") {
            config.max_records = usize::try_from(max)
                .map_err(|_| Error::Config(format!("max_records must be positive, got {}", max)))?;
        }
        if let Ok(mode) = env.get_string("proxy_mode") {
            config.proxy.mode = match mode.to_ascii_lowercase().as_str() {
                "none" => ProxyMode::None,
                "tor" => ProxyMode::Tor,
                other => {
                    return Err(Error::Config(format!("unknown proxy mode '{}'", other)));
                }
            };
        }
        if let Ok(headless) = env.get_bool("headless") {
            config.navigation.headless = headless;
        }
        Ok(())
    }

    fn load_with_inheritance(path: &Path, visited: &mut HashSet<PathBuf>) -> Result<Value> {
        let path = fs::canonicalize(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        if visited.contains(&path) {
            return Err(Error::Config(format!(
                "Circular inheritance detected involving {}",
                path.display()
            )));
        }
        visited.insert(path.clone());

        let config = Self::load_file(&path)?;

        let parent = match config.get("extends").and_then(Value::as_str) {
            Some(parent_path_str) => {
                let parent_path = path
                    .parent()
                    .ok_or_else(|| {
                        Error::Config(format!(
                            "Cannot determine parent directory for {}",
                            path.display()
                        ))
                    })?
                    .join(parent_path_str);
                Some(Self::load_with_inheritance(&parent_path, visited)?)
            }
            None => None,
        };

        Ok(match parent {
            Some(parent) => merge_values(parent, config),
            None => config,
        })
    }

    fn load_file(path: &Path) -> Result<Value> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&content)?),
            Some("toml") => Ok(toml::from_str(&content)?),
            _ => Err(Error::Config(format!(
                "Unsupported file extension: {}",
                path.display()
            ))),
        }
    }
}

/// Child keys win; nested tables merge key by key.
fn merge_values(parent: Value, child: Value) -> Value {
    match (parent, child) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                let merged = match base.remove(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            Value::Object(base)
        }
        (_, child) => child,
    }
}
