//! Configuration loading: `~/.tradelens/config.toml` plus env overrides.
//!
//! Resolution order for the config directory: `TRADELENS_CONFIG_DIR` env →
//! `~/.tradelens`. A missing config file yields defaults; a file that exists
//! but does not parse is a real error.

use crate::api::transport::RetryConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level TradeLens client configuration, loaded from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Workspace directory — computed from home, not serialized.
    #[serde(skip)]
    pub workspace_dir: PathBuf,
    /// Path to config.toml — computed from home, not serialized.
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Base URL of the trading-journal backend.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Bearer token for the backend. Overridden by `TRADELENS_API_TOKEN`.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Retry behavior for AI requests (`[reliability]`).
    #[serde(default)]
    pub reliability: ReliabilityConfig,

    /// Analysis cache behavior (`[cache]`).
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Retry settings: attempts and backoff (`[reliability]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliabilityConfig {
    /// Attempts per request before failing.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// One backoff unit in milliseconds.
    #[serde(default = "default_backoff_unit_ms")]
    pub backoff_unit_ms: u64,
}

/// Analysis cache settings (`[cache]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Disable to skip the disk mirror entirely.
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// Mirror file override; default is `ai-analysis-cache.json` in the
    /// workspace directory.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_api_url() -> String {
    "https://api.tradelens.app".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_unit_ms() -> u64 {
    1000
}

fn default_cache_enabled() -> bool {
    true
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_unit_ms: default_backoff_unit_ms(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            file: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_dir: PathBuf::new(),
            config_path: PathBuf::new(),
            api_url: default_api_url(),
            api_token: None,
            reliability: ReliabilityConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration, falling back to defaults when no file exists.
    pub fn load() -> Result<Self> {
        let config_dir = resolve_config_dir()?;
        let config_path = config_dir.join("config.toml");

        let mut config = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read {}", config_path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("failed to parse {}", config_path.display()))?
        } else {
            Config::default()
        };

        config.config_path = config_path;
        config.workspace_dir = config_dir.join("workspace");

        if let Ok(token) = std::env::var("TRADELENS_API_TOKEN") {
            let token = token.trim();
            if !token.is_empty() {
                config.api_token = Some(token.to_string());
            }
        }

        Ok(config)
    }

    /// Retry settings in transport form.
    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.reliability.max_attempts,
            backoff_unit: Duration::from_millis(self.reliability.backoff_unit_ms),
        }
    }

    /// Mirror path for the analysis cache, honoring the `[cache]` override.
    /// `None` when mirroring is disabled.
    pub fn cache_mirror_path(&self) -> Option<PathBuf> {
        if !self.cache.enabled {
            return None;
        }
        Some(
            self.cache
                .file
                .clone()
                .unwrap_or_else(|| self.workspace_dir.join("ai-analysis-cache.json")),
        )
    }
}

fn resolve_config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("TRADELENS_CONFIG_DIR") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }

    let base = directories::BaseDirs::new().context("could not determine home directory")?;
    Ok(base.home_dir().join(".tradelens"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.api_url, "https://api.tradelens.app");
        assert!(config.api_token.is_none());
        assert_eq!(config.reliability.max_attempts, 3);
        assert_eq!(config.reliability.backoff_unit_ms, 1000);
        assert!(config.cache.enabled);
    }

    #[test]
    fn parses_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            api_url = "https://staging.tradelens.app"

            [reliability]
            max_attempts = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.api_url, "https://staging.tradelens.app");
        assert_eq!(config.reliability.max_attempts, 5);
        assert_eq!(config.reliability.backoff_unit_ms, 1000);
        assert!(config.cache.enabled);
    }

    #[test]
    fn cache_can_be_disabled() {
        let config: Config = toml::from_str(
            r#"
            [cache]
            enabled = false
            "#,
        )
        .unwrap();
        assert!(config.cache_mirror_path().is_none());
    }

    #[test]
    fn cache_file_override_wins() {
        let config: Config = toml::from_str(
            r#"
            [cache]
            file = "/tmp/custom-cache.json"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.cache_mirror_path().unwrap(),
            PathBuf::from("/tmp/custom-cache.json")
        );
    }

    #[test]
    fn retry_maps_to_transport_form() {
        let config = Config {
            reliability: ReliabilityConfig {
                max_attempts: 4,
                backoff_unit_ms: 250,
            },
            ..Config::default()
        };

        let retry = config.retry();
        assert_eq!(retry.max_attempts, 4);
        assert_eq!(retry.backoff_unit, Duration::from_millis(250));
    }
}
