//! Runtime configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config.
//!
//! ```json
//! {
//!   "cache": { "normal_ttl_secs": 300, "constrained_ttl_secs": 900 },
//!   "discovery": { "page_size": 20 }
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::TtlPolicy;
use crate::discovery::{DiscoveryFilters, DEFAULT_PAGE_SIZE};

/// Error type for configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The config is not valid JSON for this schema.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Cache freshness settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL on a normal network, in seconds.
    pub normal_ttl_secs: u64,
    /// TTL on a constrained network, in seconds.
    pub constrained_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            normal_ttl_secs: TtlPolicy::DEFAULT_NORMAL.as_secs(),
            constrained_ttl_secs: TtlPolicy::DEFAULT_CONSTRAINED.as_secs(),
        }
    }
}

impl CacheConfig {
    /// Converts to a [`TtlPolicy`].
    #[must_use]
    pub const fn ttl_policy(&self) -> TtlPolicy {
        TtlPolicy::new(
            Duration::from_secs(self.normal_ttl_secs),
            Duration::from_secs(self.constrained_ttl_secs),
        )
    }
}

/// Discovery feed settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Profiles per page.
    pub page_size: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Cache settings.
    pub cache: CacheConfig,
    /// Discovery settings.
    pub discovery: DiscoveryConfig,
}

impl CoreConfig {
    /// Parses and validates a JSON config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON or
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`Self::from_json`].
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero TTL, a zero page size, or
    /// a constrained TTL shorter than the normal one.
    pub fn validate(&self) -> ConfigResult<()> {
        let cache = &self.cache;
        if cache.normal_ttl_secs == 0 || cache.constrained_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "cache TTLs must be greater than zero".to_string(),
            ));
        }
        if cache.constrained_ttl_secs < cache.normal_ttl_secs {
            return Err(ConfigError::Invalid(format!(
                "constrained_ttl_secs ({}) must not be shorter than normal_ttl_secs ({})",
                cache.constrained_ttl_secs, cache.normal_ttl_secs
            )));
        }
        if self.discovery.page_size == 0 {
            return Err(ConfigError::Invalid(
                "page_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Default discovery filters using the configured page size.
    #[must_use]
    pub fn default_filters(&self) -> DiscoveryFilters {
        DiscoveryFilters::with_page_size(self.discovery.page_size)
    }
}
