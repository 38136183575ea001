//! # Store Configuration
//!
//! Environment-driven settings for processes that open the storefront
//! database (the seed and operator binaries, or an embedding service).
//!
//! | Variable | Default |
//! |----------|---------|
//! | `RUPANTORII_DB_PATH` | `./rupantorii.db` |
//! | `RUPANTORII_DB_MAX_CONNECTIONS` | `5` |
//! | `RUPANTORII_LOW_STOCK_THRESHOLD` | `10` |
//! | `RUPANTORII_ORDER_PREFIX` | `RUP` |
//! | `RUPANTORII_PAGE_LIMIT` | `20` (max 100) |

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use rupantorii_core::{DEFAULT_ORDER_PREFIX, DEFAULT_PAGE_LIMIT, LOW_STOCK_THRESHOLD, MAX_PAGE_LIMIT};

use crate::pool::DbConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub database_path: PathBuf,

    pub max_connections: u32,

    /// Stock strictly below this is reported as low.
    pub low_stock_threshold: i64,

    pub order_prefix: String,

    /// Default page size for order listings.
    pub page_limit: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            database_path: PathBuf::from("./rupantorii.db"),
            max_connections: 5,
            low_stock_threshold: LOW_STOCK_THRESHOLD,
            order_prefix: DEFAULT_ORDER_PREFIX.to_string(),
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl StoreConfig {
    /// Loads configuration from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = StoreConfig::default();

        let config = StoreConfig {
            database_path: lookup("RUPANTORII_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),

            max_connections: parse_or(&lookup, "RUPANTORII_DB_MAX_CONNECTIONS", defaults.max_connections)?,

            low_stock_threshold: parse_or(&lookup, "RUPANTORII_LOW_STOCK_THRESHOLD", defaults.low_stock_threshold)?,

            order_prefix: lookup("RUPANTORII_ORDER_PREFIX")
                .map(|p| p.trim().to_string())
                .unwrap_or(defaults.order_prefix),

            page_limit: parse_or(&lookup, "RUPANTORII_PAGE_LIMIT", defaults.page_limit)?,
        };

        if config.max_connections == 0 {
            return Err(ConfigError::InvalidValue("RUPANTORII_DB_MAX_CONNECTIONS".to_string()));
        }

        if config.low_stock_threshold < 0 {
            return Err(ConfigError::InvalidValue("RUPANTORII_LOW_STOCK_THRESHOLD".to_string()));
        }

        if config.page_limit == 0 || config.page_limit > MAX_PAGE_LIMIT {
            return Err(ConfigError::InvalidValue("RUPANTORII_PAGE_LIMIT".to_string()));
        }

        if config.order_prefix.is_empty() {
            return Err(ConfigError::MissingRequired("RUPANTORII_ORDER_PREFIX".to_string()));
        }

        Ok(config)
    }

    /// Pool configuration for [`crate::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path.clone())
            .max_connections(self.max_connections)
            .order_number_prefix(self.order_prefix.clone())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
