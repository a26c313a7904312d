//! Service configuration.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use promo_core::dedupe::{DEFAULT_CAPACITY, DEFAULT_WINDOW};
use promo_core::MAX_PAGE_SIZE;
use serde::Serialize;

/// Highest supported currency precision.
pub const MAX_CURRENCY_DECIMALS: u8 = 4;

/// Promo API configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceConfig {
    /// Address the HTTP server binds to
    pub bind_addr: SocketAddr,

    /// SQLite database file
    pub db_path: String,

    /// SQLite pool size
    pub db_max_connections: u32,

    /// Fractional digits of the store currency
    pub currency_decimals: u8,

    /// Window in which a repeated "add bundle" is ignored
    pub dedupe_window: Duration,

    /// Maximum remembered "add bundle" keys
    pub dedupe_capacity: usize,

    /// Upper bound for `per_page` in rule listings
    pub max_page_size: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            db_path: "./promo.db".to_string(),
            db_max_connections: 4,
            currency_decimals: 2,
            dedupe_window: DEFAULT_WINDOW,
            dedupe_capacity: DEFAULT_CAPACITY,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary lookup (the environment in
    /// production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ServiceConfig::default();

        let config = ServiceConfig {
            bind_addr: parse_or(&lookup, "PROMO_BIND_ADDR", defaults.bind_addr)?,

            db_path: lookup("PROMO_DB_PATH")
                .filter(|p| !p.trim().is_empty())
                .unwrap_or(defaults.db_path),

            db_max_connections: parse_or(&lookup, "PROMO_DB_MAX_CONNECTIONS", defaults.db_max_connections)?,

            currency_decimals: parse_or(&lookup, "PROMO_CURRENCY_DECIMALS", defaults.currency_decimals)?,

            dedupe_window: parse_or(
                &lookup,
                "PROMO_DEDUPE_WINDOW_MS",
                defaults.dedupe_window.as_millis() as u64,
            )
            .map(Duration::from_millis)?,

            dedupe_capacity: parse_or(&lookup, "PROMO_DEDUPE_CAPACITY", defaults.dedupe_capacity)?,

            max_page_size: parse_or(&lookup, "PROMO_MAX_PAGE_SIZE", defaults.max_page_size)?,
        };

        if config.currency_decimals > MAX_CURRENCY_DECIMALS {
            return Err(ConfigError::InvalidValue("PROMO_CURRENCY_DECIMALS".to_string()));
        }
        if config.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue("PROMO_DB_MAX_CONNECTIONS".to_string()));
        }
        if config.dedupe_capacity == 0 {
            return Err(ConfigError::InvalidValue("PROMO_DEDUPE_CAPACITY".to_string()));
        }
        if config.max_page_size == 0 {
            return Err(ConfigError::InvalidValue("PROMO_MAX_PAGE_SIZE".to_string()));
        }

        Ok(config)
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
