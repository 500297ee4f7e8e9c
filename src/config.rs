//! Configuration loading.
//!
//! Configuration is loaded from TOML with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.smartspend/config.toml` (user)
//! 3. `/etc/smartspend/config.toml` (system)
//!
//! Every section is optional. When no file exists the defaults apply.
//! The API token is read from [`TOKEN_ENV_VAR`], never from the file.

use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::advisor::client::{ApiClientConfig, DEFAULT_BASE_URL};
use crate::cache::{CacheConfig, LocalCache};
use crate::queue::QueueConfig;
use crate::rate_limit::RateLimitConfig;
use crate::retry::RetryConfig;
use crate::{Result, SmartSpendError};

/// Environment variable holding the bearer token for the AI endpoints.
pub const TOKEN_ENV_VAR: &str = "SMARTSPEND_API_TOKEN";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub rate_limit: RateLimitSection,
    #[serde(default)]
    pub queue: QueueSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub retry: RetrySection,
}

/// AI endpoint settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds (default: 10).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Durable cache directory (default: platform cache dir).
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            cache_dir: None,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout() -> u64 {
    10
}

/// Limiter applied to AI calls.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSection {
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    #[serde(default = "default_window")]
    pub window_secs: u64,
    #[serde(default = "default_burst")]
    pub burst_allowance: u32,
    #[serde(default = "default_true")]
    pub bypass_admin: bool,
    #[serde(default)]
    pub bypass_authenticated: bool,
    /// Seconds between sweeps of expired counters (default: 300).
    #[serde(default = "default_sweep")]
    pub sweep_interval_secs: u64,
    /// User ids treated as admins.
    #[serde(default)]
    pub admin_ids: Vec<String>,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window(),
            burst_allowance: default_burst(),
            bypass_admin: true,
            bypass_authenticated: false,
            sweep_interval_secs: default_sweep(),
            admin_ids: Vec::new(),
        }
    }
}

fn default_max_requests() -> u32 {
    10
}

fn default_window() -> u64 {
    60
}

fn default_burst() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

fn default_sweep() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueSection {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_min_delay")]
    pub min_delay_ms: u64,
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            min_delay_ms: default_min_delay(),
        }
    }
}

fn default_concurrency() -> usize {
    3
}

fn default_min_delay() -> u64 {
    100
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            ttl_secs: default_ttl(),
        }
    }
}

fn default_capacity() -> usize {
    100
}

fn default_ttl() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_delay")]
    pub delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_attempts(),
            delay_ms: default_delay(),
        }
    }
}

fn default_attempts() -> u32 {
    3
}

fn default_delay() -> u64 {
    1000
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// An explicit path that does not exist is an error. Without one, the
    /// first existing user or system file is used, else the defaults.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            SmartSpendError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        Self::parse(&content).map_err(|e| match e {
            SmartSpendError::Configuration(msg) => {
                SmartSpendError::Configuration(format!("{path:?}: {msg}"))
            }
            other => other,
        })
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            SmartSpendError::Configuration(format!("Failed to parse config: {e}"))
        })
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(SmartSpendError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".smartspend").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/smartspend/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// Client settings, with the token taken from [`TOKEN_ENV_VAR`].
    pub fn api_client(&self) -> ApiClientConfig {
        let mut config = ApiClientConfig::new(self.api.base_url.clone())
            .timeout(Duration::from_secs(self.api.timeout_secs))
            .cache_dir(
                self.api
                    .cache_dir
                    .clone()
                    .unwrap_or_else(LocalCache::default_dir),
            );
        if let Ok(token) = std::env::var(TOKEN_ENV_VAR) {
            if !token.is_empty() {
                config = config.auth_token(token);
            }
        }
        config
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        let section = &self.rate_limit;
        RateLimitConfig::new("ai")
            .max_requests(section.max_requests)
            .window(Duration::from_secs(section.window_secs))
            .burst_allowance(section.burst_allowance)
            .bypass_admin(section.bypass_admin)
            .bypass_authenticated(section.bypass_authenticated)
    }

    pub fn admin_ids(&self) -> HashSet<String> {
        self.rate_limit.admin_ids.iter().cloned().collect()
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.rate_limit.sweep_interval_secs)
    }

    pub fn queue(&self) -> QueueConfig {
        QueueConfig::new()
            .concurrency(self.queue.concurrency)
            .min_delay(Duration::from_millis(self.queue.min_delay_ms))
    }

    pub fn cache(&self) -> CacheConfig {
        CacheConfig::new()
            .max_entries(self.cache.capacity)
            .ttl(Duration::from_secs(self.cache.ttl_secs))
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig::new()
            .max_attempts(self.retry.max_attempts)
            .delay(Duration::from_millis(self.retry.delay_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.api.timeout_secs, 10);
        assert_eq!(config.rate_limit.max_requests, 10);
        assert_eq!(config.rate_limit.burst_allowance, 2);
        assert_eq!(config.queue.concurrency, 3);
        assert_eq!(config.cache.capacity, 100);
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn parses_all_sections() {
        let config = Config::parse(
            r#"
            [api]
            base_url = "https://app.example.com"
            timeout_secs = 5
            cache_dir = "/tmp/spend"

            [rate_limit]
            max_requests = 3
            window_secs = 1
            burst_allowance = 0
            admin_ids = ["root"]

            [queue]
            concurrency = 1
            min_delay_ms = 0

            [cache]
            capacity = 50
            ttl_secs = 60

            [retry]
            max_attempts = 5
            delay_ms = 10
            "#,
        )
        .unwrap();

        let limit = config.rate_limit();
        assert_eq!(limit.max_requests, 3);
        assert_eq!(limit.window, Duration::from_secs(1));
        assert!(config.admin_ids().contains("root"));
        assert_eq!(config.queue().concurrency, 1);
        assert_eq!(config.cache().max_entries, 50);
        assert_eq!(config.retry().delay, Duration::from_millis(10));
        assert_eq!(
            config.api_client().cache_dir,
            PathBuf::from("/tmp/spend")
        );
    }

    #[test]
    fn invalid_toml_is_configuration_error() {
        let err = Config::parse("[queue\nconcurrency = 1").unwrap_err();
        assert!(matches!(err, SmartSpendError::Configuration(_)));
    }

    #[test]
    fn missing_explicit_path_is_error() {
        let err = Config::load(Some(Path::new("/nonexistent/smartspend.toml"))).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }
}
