//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::time::Duration;

use crate::jobs::JobSchedulerConfig;
use crate::registration::RetryPolicy;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Attempts per registration before a lost race is reported as full
    pub registration_max_attempts: u32,

    /// Base backoff between registration attempts
    pub retry_backoff_ms: u64,

    /// Seat audit interval in seconds, 0 disables the audit
    pub seat_audit_interval_secs: u64,

    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = parse_or("DATABASE_MAX_CONNECTIONS", 10)?;

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = parse_or("PORT", 3000)?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let registration_max_attempts = parse_or("REGISTRATION_MAX_ATTEMPTS", 3)?;
        if registration_max_attempts == 0 {
            return Err(ConfigError::InvalidValue("REGISTRATION_MAX_ATTEMPTS"));
        }

        let retry_backoff_ms = check_backoff(parse_or("RETRY_BACKOFF_MS", 50)?)?;

        let seat_audit_interval_secs = parse_or("SEAT_AUDIT_INTERVAL_SECS", 300)?;

        let log_format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("text") | Err(_) => LogFormat::Text,
            Ok(_) => return Err(ConfigError::InvalidValue("LOG_FORMAT")),
        };

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            registration_max_attempts,
            retry_backoff_ms,
            seat_audit_interval_secs,
            log_format,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.registration_max_attempts,
            Duration::from_millis(self.retry_backoff_ms),
        )
    }

    /// Job configuration, or `None` when the seat audit is disabled
    pub fn job_config(&self) -> Option<JobSchedulerConfig> {
        (self.seat_audit_interval_secs > 0).then(|| JobSchedulerConfig {
            seat_audit_interval: Duration::from_secs(self.seat_audit_interval_secs),
        })
    }
}

/// Longest accepted base backoff between registration attempts
const MAX_RETRY_BACKOFF_MS: u64 = 60_000;

fn check_backoff(ms: u64) -> Result<u64, ConfigError> {
    if ms > MAX_RETRY_BACKOFF_MS {
        return Err(ConfigError::InvalidValue("RETRY_BACKOFF_MS"));
    }
    Ok(ms)
}

fn parse_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue(key)),
        Err(_) => Ok(default),
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
