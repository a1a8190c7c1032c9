//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::domain::MAX_AMOUNT;
use crate::engine::EngineSettings;

/// Where accounts and the ledger live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Postgres,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" => Ok(Self::Postgres),
            _ => Err(ConfigError::InvalidValue("STORAGE_BACKEND")),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub storage_backend: StorageBackend,

    /// Database connection URL; required for the postgres backend
    pub database_url: Option<String>,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Flat commission credited to an Agent per processed transaction
    pub agent_commission: Decimal,

    /// Fraction in [0, 1) withheld on exchange
    pub exchange_commission_rate: Decimal,

    /// Max wait for an account lock per attempt
    pub lock_timeout: Duration,

    pub store_max_retries: u32,

    /// Lifetime of a login session
    pub session_ttl: Duration,
}

/// Longest accepted session lifetime (one year)
const MAX_SESSION_TTL_SECS: u64 = 365 * 24 * 60 * 60;

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: &str,
) -> Result<T, ConfigError> {
    lookup(name)
        .unwrap_or_else(|| default.to_string())
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(name))
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from any variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let storage_backend: StorageBackend = parse_or(&lookup, "STORAGE_BACKEND", "memory")?;

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        if storage_backend == StorageBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::MissingEnv("DATABASE_URL"));
        }

        let database_max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", "10")?;
        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = parse_or(&lookup, "PORT", "3000")?;
        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string());

        let agent_commission: Decimal = parse_or(&lookup, "AGENT_COMMISSION", "1")?;
        if agent_commission.is_sign_negative() || agent_commission > MAX_AMOUNT {
            return Err(ConfigError::InvalidValue("AGENT_COMMISSION"));
        }

        let exchange_commission_rate: Decimal =
            parse_or(&lookup, "EXCHANGE_COMMISSION_RATE", "0")?;
        if exchange_commission_rate.is_sign_negative() || exchange_commission_rate >= Decimal::ONE
        {
            return Err(ConfigError::InvalidValue("EXCHANGE_COMMISSION_RATE"));
        }

        let lock_timeout_ms: u64 = parse_or(&lookup, "LOCK_TIMEOUT_MS", "2000")?;
        if lock_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue("LOCK_TIMEOUT_MS"));
        }

        let store_max_retries: u32 = parse_or(&lookup, "STORE_MAX_RETRIES", "3")?;
        if store_max_retries == 0 {
            return Err(ConfigError::InvalidValue("STORE_MAX_RETRIES"));
        }

        let session_ttl_secs: u64 = parse_or(&lookup, "SESSION_TTL_SECS", "86400")?;
        if session_ttl_secs == 0 || session_ttl_secs > MAX_SESSION_TTL_SECS {
            return Err(ConfigError::InvalidValue("SESSION_TTL_SECS"));
        }

        Ok(Self {
            storage_backend,
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            agent_commission,
            exchange_commission_rate,
            lock_timeout: Duration::from_millis(lock_timeout_ms),
            store_max_retries,
            session_ttl: Duration::from_secs(session_ttl_secs),
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            agent_commission: self.agent_commission,
            exchange_commission_rate: self.exchange_commission_rate,
            lock_timeout: self.lock_timeout,
            store_max_retries: self.store_max_retries,
            session_ttl: self.session_ttl,
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
