use std::collections::HashSet;
use std::path::Path;

use chrono::Duration;
use serde::Deserialize;

use crate::news::FeedSource;

pub const DEFAULT_ENDPOINT: &str = "https://api.rss2json.com/v1/api.json";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Cache time-to-live in minutes
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: i64,
    /// Number of items kept after ranking
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// Number of items requested from each source
    #[serde(default = "default_items_per_source")]
    pub items_per_source: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub mode: FetchMode,
    #[serde(default)]
    pub service: ServiceConfig,
    pub feeds: Vec<FeedSource>,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// Go through the feed-to-JSON conversion service
    #[default]
    Conversion,
    /// Download and parse feeds directly
    Direct,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
        }
    }
}

fn default_ttl_minutes() -> i64 {
    60
}

fn default_max_items() -> usize {
    10
}

fn default_items_per_source() -> usize {
    5
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Cache time-to-live; errors when `ttl_minutes` overflows a duration.
    pub fn ttl(&self) -> anyhow::Result<Duration> {
        Duration::try_minutes(self.ttl_minutes)
            .ok_or_else(|| anyhow::anyhow!("ttl_minutes {} is out of range", self.ttl_minutes))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.ttl_minutes <= 0 {
            anyhow::bail!("ttl_minutes must be positive");
        }
        self.ttl()?;
        if self.max_items == 0 {
            anyhow::bail!("max_items must be positive");
        }

        let mut names = HashSet::new();
        for feed in &self.feeds {
            if feed.name.trim().is_empty() || feed.url.trim().is_empty() {
                anyhow::bail!("feed entries need a name and a url");
            }
            if !names.insert(feed.name.as_str()) {
                anyhow::bail!("duplicate feed name '{}'", feed.name);
            }
        }

        Ok(())
    }
}
