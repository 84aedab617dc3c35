//! Configuration for the Redis-backed substrate.

use access_cache_core::CacheError;
use serde::Deserialize;

fn default_pool_size() -> usize {
    16
}
fn default_connect_timeout() -> u64 {
    5
}
fn default_command_timeout() -> u64 {
    2
}

/// Configuration for connecting to the Redis (or Redis-protocol-compatible)
/// substrate.
///
/// Can be deserialized from `application.yaml`-style configuration;
/// `url` is required, everything else defaults.
///
/// ```yaml
/// access_cache:
///   url: "redis://127.0.0.1:6379"
///   pool_size: 16        # default: 16
///   connect_timeout_secs: 5   # default: 5
///   command_timeout_secs: 2   # default: 2
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct SubstrateConfig {
    /// The Redis connection URL (e.g. "redis://127.0.0.1:6379").
    pub url: String,
    /// Maximum number of pooled connections. Default: 16.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Connection timeout in seconds. Default: 5.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Per-command timeout in seconds. Default: 2.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

impl SubstrateConfig {
    /// Create a new configuration pointing at `url`, with default pool and
    /// timeout settings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pool_size: default_pool_size(),
            connect_timeout_secs: default_connect_timeout(),
            command_timeout_secs: default_command_timeout(),
        }
    }

    /// Set the maximum pool size.
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    /// Set the connection timeout in seconds.
    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    /// Set the per-command timeout in seconds.
    pub fn with_command_timeout(mut self, secs: u64) -> Self {
        self.command_timeout_secs = secs;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.url.is_empty() {
            return Err(CacheError::Config("url cannot be empty".into()));
        }
        if self.pool_size == 0 {
            return Err(CacheError::Config("pool_size must be at least 1".into()));
        }
        Ok(())
    }
}
