//! RPC gateway configuration.
//!
//! Configuration is loaded from `GATEWAY_`-prefixed environment variables.
//! Every setting has a default so the gateway starts with no environment at
//! all; invalid values are fatal.

use crate::auth::jwks::{
    KeySetProviderOptions, DEFAULT_CACHE_TTL_SECONDS, DEFAULT_FAILURE_BACKOFF,
    DEFAULT_FETCH_TIMEOUT_SECONDS, DEFAULT_MAX_STALE_SECONDS,
};
use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default JWKS endpoint of the identity provider.
pub const DEFAULT_JWKS_URL: &str = "http://localhost:3001/api/auth/jwks";

/// Default server hostname.
pub const DEFAULT_SERVER_HOSTNAME: &str = "localhost";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 1323;

/// Default background key refresh interval in seconds.
///
/// Shorter than the cache TTL so requests rarely see an expired cache.
pub const DEFAULT_JWKS_REFRESH_INTERVAL_SECONDS: u64 = 240;

/// Default whole-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Default graceful shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECONDS: u64 = 5;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// RPC gateway configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the identity provider's JWKS endpoint.
    pub jwks_url: String,

    /// Hostname the HTTP server binds to.
    pub server_hostname: String,

    /// Port the HTTP server binds to.
    pub server_port: u16,

    /// How long a fetched key set is considered fresh.
    pub jwks_cache_ttl: Duration,

    /// Interval of the background key refresh task.
    pub jwks_refresh_interval: Duration,

    /// Maximum age of a key set served while the JWKS endpoint is failing.
    /// Zero disables stale serving.
    pub jwks_max_stale: Duration,

    /// Timeout for one JWKS HTTP request.
    pub jwks_fetch_timeout: Duration,

    /// Leeway for `exp`, `nbf` and `iat` validation.
    pub jwt_clock_skew: Duration,

    /// Whole-request timeout applied by the router.
    pub request_timeout: Duration,

    /// Upper bound on draining in-flight requests at shutdown.
    pub shutdown_timeout: Duration,

    pub log_format: LogFormat,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid JWKS URL: {0}")]
    InvalidJwksUrl(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("Invalid server hostname: {0}")]
    InvalidHostname(String),

    #[error("Invalid server port: {0}")]
    InvalidPort(String),

    #[error("Invalid duration configuration: {0}")]
    InvalidDuration(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid log format: {0}")]
    InvalidLogFormat(String),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jwks_url: DEFAULT_JWKS_URL.to_string(),
            server_hostname: DEFAULT_SERVER_HOSTNAME.to_string(),
            server_port: DEFAULT_SERVER_PORT,
            jwks_cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS),
            jwks_refresh_interval: Duration::from_secs(DEFAULT_JWKS_REFRESH_INTERVAL_SECONDS),
            jwks_max_stale: Duration::from_secs(DEFAULT_MAX_STALE_SECONDS),
            jwks_fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECONDS),
            jwt_clock_skew: DEFAULT_CLOCK_SKEW,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS),
            shutdown_timeout: Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECONDS),
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let jwks_url = match vars.get("GATEWAY_JWKS_URL") {
            Some(value) if value.trim().is_empty() => {
                return Err(ConfigError::InvalidJwksUrl(
                    "GATEWAY_JWKS_URL must not be empty".to_string(),
                ));
            }
            Some(value) => value.trim().to_string(),
            None => defaults.jwks_url,
        };

        let server_hostname = match vars.get("GATEWAY_SERVER_HOSTNAME") {
            Some(value) if value.trim().is_empty() => {
                return Err(ConfigError::InvalidHostname(
                    "GATEWAY_SERVER_HOSTNAME must not be empty".to_string(),
                ));
            }
            Some(value) => value.trim().to_string(),
            None => defaults.server_hostname,
        };

        let server_port = match vars.get("GATEWAY_SERVER_PORT") {
            Some(value_str) => parse_port(value_str)?,
            None => defaults.server_port,
        };

        let jwks_cache_ttl = positive_seconds(vars, "GATEWAY_JWKS_CACHE_TTL_SECONDS")?
            .unwrap_or(defaults.jwks_cache_ttl);
        let jwks_refresh_interval =
            positive_seconds(vars, "GATEWAY_JWKS_REFRESH_INTERVAL_SECONDS")?
                .unwrap_or(defaults.jwks_refresh_interval);
        let jwks_fetch_timeout = positive_seconds(vars, "GATEWAY_JWKS_FETCH_TIMEOUT_SECONDS")?
            .unwrap_or(defaults.jwks_fetch_timeout);
        let request_timeout = positive_seconds(vars, "GATEWAY_REQUEST_TIMEOUT_SECONDS")?
            .unwrap_or(defaults.request_timeout);
        let shutdown_timeout = positive_seconds(vars, "GATEWAY_SHUTDOWN_TIMEOUT_SECONDS")?
            .unwrap_or(defaults.shutdown_timeout);

        // Zero is allowed here and disables stale serving
        let jwks_max_stale = match vars.get("GATEWAY_JWKS_MAX_STALE_SECONDS") {
            Some(value_str) => Duration::from_secs(parse_seconds(
                "GATEWAY_JWKS_MAX_STALE_SECONDS",
                value_str,
            )?),
            None => defaults.jwks_max_stale,
        };

        // Parse JWT clock skew tolerance with validation
        let jwt_clock_skew = if let Some(value_str) = vars.get("GATEWAY_JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.trim().parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "GATEWAY_JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value <= 0 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "GATEWAY_JWT_CLOCK_SKEW_SECONDS must be positive, got {}",
                    value
                )));
            }

            if value.unsigned_abs() > MAX_CLOCK_SKEW.as_secs() {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "GATEWAY_JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            Duration::from_secs(value.unsigned_abs())
        } else {
            defaults.jwt_clock_skew
        };

        let log_format = match vars.get("GATEWAY_LOG_FORMAT").map(|v| v.trim().to_ascii_lowercase())
        {
            None => defaults.log_format,
            Some(value) if value == "pretty" => LogFormat::Pretty,
            Some(value) if value == "json" => LogFormat::Json,
            Some(value) => {
                return Err(ConfigError::InvalidLogFormat(format!(
                    "GATEWAY_LOG_FORMAT must be 'pretty' or 'json', got '{}'",
                    value
                )));
            }
        };

        Ok(Config {
            jwks_url,
            server_hostname,
            server_port,
            jwks_cache_ttl,
            jwks_refresh_interval,
            jwks_max_stale,
            jwks_fetch_timeout,
            jwt_clock_skew,
            request_timeout,
            shutdown_timeout,
            log_format,
        })
    }

    /// `host:port` string the HTTP server binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_hostname, self.server_port)
    }

    /// Key set provider tuning derived from this configuration.
    pub fn key_set_options(&self) -> KeySetProviderOptions {
        KeySetProviderOptions {
            cache_ttl: self.jwks_cache_ttl,
            max_stale: self.jwks_max_stale,
            fetch_timeout: self.jwks_fetch_timeout,
            failure_backoff: DEFAULT_FAILURE_BACKOFF,
        }
    }

    /// How long the guard waits for the key set before giving up.
    ///
    /// One fetch timeout plus a second of slack for a refresh that is
    /// already in flight.
    pub fn key_set_wait_timeout(&self) -> Duration {
        self.jwks_fetch_timeout + Duration::from_secs(1)
    }
}

fn parse_port(value_str: &str) -> Result<u16, ConfigError> {
    let value: i64 = value_str.trim().parse().map_err(|e| {
        ConfigError::InvalidPort(format!(
            "GATEWAY_SERVER_PORT must be a valid integer, got '{}': {}",
            value_str, e
        ))
    })?;

    if value <= 0 {
        return Err(ConfigError::InvalidPort(format!(
            "GATEWAY_SERVER_PORT must be positive, got {}",
            value
        )));
    }

    u16::try_from(value).map_err(|_| {
        ConfigError::InvalidPort(format!(
            "GATEWAY_SERVER_PORT must not exceed 65535, got {}",
            value
        ))
    })
}

fn parse_seconds(name: &str, value_str: &str) -> Result<u64, ConfigError> {
    value_str.trim().parse().map_err(|e| {
        ConfigError::InvalidDuration(format!(
            "{} must be a valid non-negative integer, got '{}': {}",
            name, value_str, e
        ))
    })
}

fn positive_seconds(
    vars: &HashMap<String, String>,
    name: &str,
) -> Result<Option<Duration>, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(None);
    };

    let value = parse_seconds(name, value_str)?;
    if value == 0 {
        return Err(ConfigError::InvalidDuration(format!(
            "{} must be greater than 0",
            name
        )));
    }

    Ok(Some(Duration::from_secs(value)))
}
