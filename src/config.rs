//! TOML configuration for the `rgk` client.
//!
//! ```toml
//! [service]
//! base_url = "http://localhost:5050"
//! timeout_secs = 30
//!
//! [query]
//! top_k = 5
//!
//! [session]
//! owner = "alice"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub service: ServiceConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

/// Identity supplied by the login collaborator. `--owner` overrides it.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SessionConfig {
    #[serde(default)]
    pub owner: Option<String>,
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_top_k() -> usize {
    5
}

pub const DEFAULT_BASE_URL: &str = "http://localhost:5050";

impl Config {
    /// Defaults used when no config file is present.
    pub fn minimal() -> Self {
        Self {
            service: ServiceConfig {
                base_url: DEFAULT_BASE_URL.to_string(),
                timeout_secs: default_timeout_secs(),
            },
            query: QueryConfig::default(),
            session: SessionConfig::default(),
        }
    }

    /// The service base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.service.base_url.trim_end_matches('/')
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    let base = config.service.base_url.trim();
    if base.is_empty() {
        anyhow::bail!("service.base_url must not be empty");
    }
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        anyhow::bail!(
            "service.base_url must start with http:// or https://, got '{}'",
            base
        );
    }

    if config.service.timeout_secs == 0 {
        anyhow::bail!("service.timeout_secs must be > 0");
    }

    if config.query.top_k == 0 {
        anyhow::bail!("query.top_k must be >= 1");
    }

    Ok(config)
}
