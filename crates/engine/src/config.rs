//! Catalog configuration.
//!
//! Both structs have sensible [`Default`]s and can be overridden from the
//! environment:
//!
//! | Variable                                     | Effect                                 |
//! |----------------------------------------------|----------------------------------------|
//! | `CATALOG_STORE_SERIALIZED`                   | `true` selects serialized-preferred mode |
//! | `CATALOG_CACHE_READ_TIMEOUT_MS`              | bound on a single snapshot read        |
//! | `CATALOG_MIN_SERIALIZED_FETCH_INTERVAL_SECS` | staleness re-check interval, `0` = every lookup, `off` = never, unset = 10 s |
//! | `CATALOG_DEFAULT_OWNER`                      | default task owner                     |
//! | `CATALOG_DEFAULT_QUEUE`                      | default task queue                     |
//! | `CATALOG_DEFAULT_POOL`                       | default task pool                      |
//! | `CATALOG_DEFAULT_RETRIES`                    | default retry count                    |
//! | `CATALOG_DEFAULT_RETRY_DELAY_SECS`           | default retry delay                    |

use std::str::FromStr;
use std::time::Duration;

use crate::EngineError;

// Environment variable names
const ENV_STORE_SERIALIZED: &str = "CATALOG_STORE_SERIALIZED";
const ENV_CACHE_READ_TIMEOUT_MS: &str = "CATALOG_CACHE_READ_TIMEOUT_MS";
const ENV_MIN_FETCH_INTERVAL_SECS: &str = "CATALOG_MIN_SERIALIZED_FETCH_INTERVAL_SECS";
const ENV_DEFAULT_OWNER: &str = "CATALOG_DEFAULT_OWNER";
const ENV_DEFAULT_QUEUE: &str = "CATALOG_DEFAULT_QUEUE";
const ENV_DEFAULT_POOL: &str = "CATALOG_DEFAULT_POOL";
const ENV_DEFAULT_RETRIES: &str = "CATALOG_DEFAULT_RETRIES";
const ENV_DEFAULT_RETRY_DELAY_SECS: &str = "CATALOG_DEFAULT_RETRY_DELAY_SECS";

// Default configuration values
const DEFAULT_CACHE_READ_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_MIN_FETCH_INTERVAL_SECS: u64 = 10;
const DEFAULT_OWNER: &str = "airflow";
const DEFAULT_QUEUE: &str = "default";
const DEFAULT_POOL: &str = "default_pool";
const DEFAULT_RETRIES: u32 = 0;
const DEFAULT_RETRY_DELAY_SECS: u64 = 300;

// ---------------------------------------------------------------------------
// CatalogMode
// ---------------------------------------------------------------------------

/// Where the catalog resolves workflows from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CatalogMode {
    /// Only definitions registered in memory are served.
    #[default]
    Direct,
    /// Memory first, then the serialization cache, populating memory on hit.
    SerializedPreferred,
}

// ---------------------------------------------------------------------------
// CatalogConfig
// ---------------------------------------------------------------------------

/// Tuning knobs for the workflow catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    pub mode: CatalogMode,
    /// A snapshot read slower than this counts as a cache miss.
    pub cache_read_timeout: Duration,
    /// In serialized-preferred mode, how long a memory entry is trusted before
    /// the store's last-updated timestamp is checked again. `None` disables
    /// the re-check.
    pub min_serialized_fetch_interval: Option<Duration>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            mode: CatalogMode::Direct,
            cache_read_timeout: Duration::from_millis(DEFAULT_CACHE_READ_TIMEOUT_MS),
            min_serialized_fetch_interval: Some(Duration::from_secs(
                DEFAULT_MIN_FETCH_INTERVAL_SECS,
            )),
        }
    }
}

impl CatalogConfig {
    pub fn serialized() -> Self {
        Self {
            mode: CatalogMode::SerializedPreferred,
            ..Self::default()
        }
    }

    /// Load from process environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, EngineError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_vars<F>(var: F) -> Result<Self, EngineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = var(ENV_STORE_SERIALIZED) {
            config.mode = if parse_bool(ENV_STORE_SERIALIZED, &raw)? {
                CatalogMode::SerializedPreferred
            } else {
                CatalogMode::Direct
            };
        }

        if let Some(raw) = var(ENV_CACHE_READ_TIMEOUT_MS) {
            config.cache_read_timeout =
                Duration::from_millis(parse_value(ENV_CACHE_READ_TIMEOUT_MS, &raw)?);
        }

        if let Some(raw) = var(ENV_MIN_FETCH_INTERVAL_SECS) {
            config.min_serialized_fetch_interval = if raw.trim().eq_ignore_ascii_case("off") {
                None
            } else {
                Some(Duration::from_secs(parse_value(ENV_MIN_FETCH_INTERVAL_SECS, &raw)?))
            };
        }

        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// OperatorDefaults
// ---------------------------------------------------------------------------

/// Task field defaults applied when neither the workflow source nor the task
/// sets a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorDefaults {
    pub owner: String,
    pub queue: String,
    pub pool: String,
    pub retries: u32,
    pub retry_delay: Duration,
}

impl Default for OperatorDefaults {
    fn default() -> Self {
        Self {
            owner: DEFAULT_OWNER.to_string(),
            queue: DEFAULT_QUEUE.to_string(),
            pool: DEFAULT_POOL.to_string(),
            retries: DEFAULT_RETRIES,
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
        }
    }
}

impl OperatorDefaults {
    /// Load from process environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, EngineError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_vars<F>(var: F) -> Result<Self, EngineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut defaults = Self::default();

        if let Some(owner) = var(ENV_DEFAULT_OWNER) {
            defaults.owner = owner;
        }
        if let Some(queue) = var(ENV_DEFAULT_QUEUE) {
            defaults.queue = queue;
        }
        if let Some(pool) = var(ENV_DEFAULT_POOL) {
            defaults.pool = pool;
        }
        if let Some(raw) = var(ENV_DEFAULT_RETRIES) {
            defaults.retries = parse_value(ENV_DEFAULT_RETRIES, &raw)?;
        }
        if let Some(raw) = var(ENV_DEFAULT_RETRY_DELAY_SECS) {
            defaults.retry_delay = Duration::from_secs(parse_value(ENV_DEFAULT_RETRY_DELAY_SECS, &raw)?);
        }

        Ok(defaults)
    }
}

fn parse_value<T>(field: &str, raw: &str) -> Result<T, EngineError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| EngineError::InvalidConfig {
        field: field.to_string(),
        message: format!("'{raw}': {e}"),
    })
}

fn parse_bool(field: &str, raw: &str) -> Result<bool, EngineError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(EngineError::InvalidConfig {
            field: field.to_string(),
            message: format!("'{raw}' is not a boolean"),
        }),
    }
}
