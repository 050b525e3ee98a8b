//! Cache configuration.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use searsia_core::error::{Result, SearsiaError};

/// Environment variable for [`CacheConfig::initial_ttl_ms`].
pub const ENV_INITIAL_TTL_MS: &str = "SEARSIA_INITIAL_TTL_MS";
/// Environment variable for [`CacheConfig::statistics_dir`].
pub const ENV_STATISTICS_DIR: &str = "SEARSIA_STATISTICS_DIR";
/// Environment variable for [`CacheConfig::max_background_refreshes`].
pub const ENV_MAX_BACKGROUND_REFRESHES: &str = "SEARSIA_MAX_BACKGROUND_REFRESHES";

const DEFAULT_STATISTICS_DIR: &str = "statistics";

/// Cache configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Running-average TTL (ms) of a resource before any entry has been measured
    pub initial_ttl_ms: u64,
    /// Directory that receives one statistics file per resource
    pub statistics_dir: PathBuf,
    /// Upper bound on in-flight background refreshes (None = unbounded, 0 = disabled)
    pub max_background_refreshes: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            initial_ttl_ms: 0,
            statistics_dir: PathBuf::from(DEFAULT_STATISTICS_DIR),
            max_background_refreshes: None,
        }
    }
}

impl CacheConfig {
    /// Creates a config with the given initial TTL.
    pub fn with_initial_ttl_ms(initial_ttl_ms: u64) -> Self {
        Self {
            initial_ttl_ms,
            ..Default::default()
        }
    }

    /// Sets the statistics directory.
    pub fn statistics_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.statistics_dir = dir.into();
        self
    }

    /// Bounds the number of concurrent background refreshes. Zero disables them.
    ///
    /// Values above [`Semaphore::MAX_PERMITS`] are clamped when the cache is built.
    pub fn max_background_refreshes(mut self, limit: usize) -> Self {
        self.max_background_refreshes = Some(limit);
        self
    }

    /// Reads the configuration from the process environment.
    ///
    /// Unset variables keep their defaults; unparsable ones are an error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_INITIAL_TTL_MS) {
            config.initial_ttl_ms = parse_var(ENV_INITIAL_TTL_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_STATISTICS_DIR) {
            if !value.trim().is_empty() {
                config.statistics_dir = PathBuf::from(value.trim());
            }
        }
        if let Some(value) = lookup(ENV_MAX_BACKGROUND_REFRESHES) {
            let limit: usize = parse_var(ENV_MAX_BACKGROUND_REFRESHES, &value)?;
            if limit > Semaphore::MAX_PERMITS {
                return Err(SearsiaError::ConfigError(format!(
                    "{ENV_MAX_BACKGROUND_REFRESHES}={value:?}: at most {} allowed",
                    Semaphore::MAX_PERMITS
                )));
            }
            config.max_background_refreshes = Some(limit);
        }

        Ok(config)
    }

    /// Renders the configuration as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| SearsiaError::ConfigError(format!("{key}={value:?}: {e}")))
}
