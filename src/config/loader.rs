//! Configuration Loader
//!
//! Loads and validates configuration from TOML files matching config.toml structure.

use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::application::TrackerSettings;
use crate::crawler::{ExponentialBackoff, FixedDelay, RetryPolicy, DEFAULT_PAGE_SIZE};

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub rpc: RpcSection,
    #[serde(default)]
    pub crawler: CrawlerSection,
    #[serde(default)]
    pub retry: RetrySection,
    pub storage: StorageSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Solana RPC configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct RpcSection {
    /// RPC endpoint (use private RPC for production)
    pub url: String,
    /// Commitment level: "processed", "confirmed", "finalized"
    #[serde(default = "default_commitment")]
    pub commitment: String,
    /// Per-request timeout enforced by the RPC client
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl RpcSection {
    /// Get RPC URL with environment variable override
    /// Checks SOLANA_RPC_URL env var first, falls back to config value
    pub fn get_url(&self) -> String {
        std::env::var("SOLANA_RPC_URL").unwrap_or_else(|_| self.url.clone())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Crawler configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerSection {
    /// Signatures per page (gateway maximum is 1000)
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Number of first buyers tracked per token
    #[serde(default = "default_holder_quota")]
    pub holder_quota: usize,
    /// Seconds between balance refresh cycles
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

impl Default for CrawlerSection {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            holder_quota: default_holder_quota(),
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

/// Retry configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    /// "fixed" or "exponential"
    #[serde(default = "default_retry_strategy")]
    pub strategy: String,
    /// Total attempts per gateway call, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Pause before a retry (base pause for exponential)
    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,
    /// Cap for exponential pauses
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
    /// Randomize exponential pauses down to half
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            strategy: default_retry_strategy(),
            max_attempts: default_max_attempts(),
            delay_secs: default_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
            jitter: false,
        }
    }
}

impl RetrySection {
    /// Build the configured policy
    pub fn policy(&self) -> Arc<dyn RetryPolicy> {
        match self.strategy.as_str() {
            "exponential" => Arc::new(ExponentialBackoff {
                base: Duration::from_secs(self.delay_secs),
                max_delay: Duration::from_secs(self.max_delay_secs),
                max_attempts: self.max_attempts,
                jitter: self.jitter,
            }),
            _ => Arc::new(FixedDelay {
                delay: Duration::from_secs(self.delay_secs),
                max_attempts: self.max_attempts,
            }),
        }
    }
}

/// Storage configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    /// SQLite database file
    pub database_path: String,
}

impl StorageSection {
    /// Database path with HOLDER_CRAWLER_DB override and ~ expanded
    pub fn get_database_path(&self) -> String {
        let raw = std::env::var("HOLDER_CRAWLER_DB").unwrap_or_else(|_| self.database_path.clone());
        shellexpand::tilde(&raw).to_string()
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_commitment() -> String {
    "confirmed".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_holder_quota() -> usize {
    50
}

fn default_refresh_interval_secs() -> u64 {
    300
}

fn default_retry_strategy() -> String {
    "fixed".to_string()
}

fn default_max_attempts() -> u32 {
    2
}

fn default_delay_secs() -> u64 {
    5
}

fn default_max_delay_secs() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc.url.is_empty() {
            return Err(ConfigError::ValidationError(
                "rpc.url cannot be empty".to_string(),
            ));
        }

        if !matches!(self.rpc.commitment.as_str(), "processed" | "confirmed" | "finalized") {
            return Err(ConfigError::ValidationError(format!(
                "rpc.commitment must be processed, confirmed or finalized, got {}",
                self.rpc.commitment
            )));
        }

        if self.crawler.page_size == 0 || self.crawler.page_size > DEFAULT_PAGE_SIZE {
            return Err(ConfigError::ValidationError(format!(
                "crawler.page_size must be 1-{}, got {}",
                DEFAULT_PAGE_SIZE, self.crawler.page_size
            )));
        }

        if self.crawler.holder_quota == 0 {
            return Err(ConfigError::ValidationError(
                "crawler.holder_quota must be > 0".to_string(),
            ));
        }

        if self.crawler.refresh_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "crawler.refresh_interval_secs must be > 0".to_string(),
            ));
        }

        if !matches!(self.retry.strategy.as_str(), "fixed" | "exponential") {
            return Err(ConfigError::ValidationError(format!(
                "retry.strategy must be fixed or exponential, got {}",
                self.retry.strategy
            )));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be >= 1".to_string(),
            ));
        }

        if self.storage.database_path.is_empty() {
            return Err(ConfigError::ValidationError(
                "storage.database_path cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl From<&Config> for TrackerSettings {
    fn from(config: &Config) -> Self {
        TrackerSettings {
            page_size: config.crawler.page_size,
            holder_quota: config.crawler.holder_quota,
            refresh_interval: Duration::from_secs(config.crawler.refresh_interval_secs),
        }
    }
}
