//! Runtime configuration.

use std::env;
use std::time::Duration;

use crate::auth::password::DEFAULT_BCRYPT_COST;

/// Default PostgreSQL connection URL.
pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost:5432/warden";

/// Default login-session lifetime: 30 days.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// Default interval between sweeps: 5 minutes.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

/// Default retention of redeemed authorization codes: 1 day.
pub const DEFAULT_CODE_RETENTION_SECS: i64 = 24 * 60 * 60;

/// Configuration shared by the library components and the CLI.
#[derive(Clone, Debug)]
pub struct WardenConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Maximum number of pooled connections.
    pub max_connections: u32,
    /// Store access-token signatures as SHA-384 digests.
    pub hash_signatures: bool,
    /// bcrypt cost for new password hashes.
    pub bcrypt_cost: u32,
    /// Lifetime of a login session.
    pub session_ttl: chrono::Duration,
    /// How often the background sweeper runs.
    pub sweep_interval: Duration,
    /// How long inactive authorization codes are kept for replay detection.
    pub code_retention: chrono::Duration,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.into(),
            max_connections: 5,
            hash_signatures: true,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            session_ttl: chrono::Duration::seconds(DEFAULT_SESSION_TTL_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            code_retention: chrono::Duration::seconds(DEFAULT_CODE_RETENTION_SECS),
        }
    }
}

impl WardenConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                     | Default                              |
    /// |------------------------------|--------------------------------------|
    /// | `DATABASE_URL`               | `postgres://localhost:5432/warden`   |
    /// | `WARDEN_MAX_CONNECTIONS`     | `5`                                  |
    /// | `WARDEN_HASH_SIGNATURES`     | `true`                               |
    /// | `WARDEN_BCRYPT_COST`         | `10`                                 |
    /// | `WARDEN_SESSION_TTL_SECS`    | `2592000`                            |
    /// | `WARDEN_SWEEP_INTERVAL_SECS` | `300`                                |
    /// | `WARDEN_CODE_RETENTION_SECS` | `86400`                              |
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`WardenConfig::from_env`], reading values through `get`.
    ///
    /// Durations that do not fit a `chrono::Duration`, and a zero sweep
    /// interval, count as unparseable.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse = |key: &str| get(key).map(|v| v.trim().to_string());
        Self {
            database_url: get("DATABASE_URL").unwrap_or(defaults.database_url),
            max_connections: parse("WARDEN_MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_connections),
            hash_signatures: parse("WARDEN_HASH_SIGNATURES")
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.hash_signatures),
            bcrypt_cost: parse("WARDEN_BCRYPT_COST")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.bcrypt_cost),
            session_ttl: parse("WARDEN_SESSION_TTL_SECS")
                .and_then(|v| v.parse::<i64>().ok())
                .and_then(chrono::Duration::try_seconds)
                .unwrap_or(defaults.session_ttl),
            sweep_interval: parse("WARDEN_SWEEP_INTERVAL_SECS")
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            code_retention: parse("WARDEN_CODE_RETENTION_SECS")
                .and_then(|v| v.parse::<i64>().ok())
                .and_then(chrono::Duration::try_seconds)
                .unwrap_or(defaults.code_retention),
        }
    }
}

/// Accepts `true/false`, `1/0`, `yes/no`, `on/off` in any case.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
