//! Application configuration loaded from environment variables.
//!
//! Fail-fast: required variables must be present and valid or the service
//! refuses to start with a clear message. Obviously insecure tokens are
//! allowed only in development mode.

use std::env;
use std::time::Duration;

use thiserror::Error;

/// Placeholder tokens that must never reach production.
const INSECURE_TOKENS: &[&str] = &["changeme", "dev", "test", "secret"];

/// Application environment mode.
///
/// In `Production`, insecure placeholder secrets refuse startup; in
/// `Development` they only warn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Production,
}

impl AppEnvironment {
    /// Parse from the `APP_ENV` environment variable value.
    /// Defaults to `Development` if unset or unrecognized.
    pub fn from_env_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    #[must_use]
    pub fn is_production(&self) -> bool {
        *self == Self::Production
    }
}

impl std::fmt::Display for AppEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {name}: {value}")]
    InvalidVar { name: &'static str, value: String },

    #[error("Insecure value for {0} refused in production (set APP_ENV=development to override)")]
    InsecureInProduction(&'static str),
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub app_env: AppEnvironment,
    pub rust_log: String,
    /// Shared secret the broker signs webhook bodies with.
    pub broker_hmac_secret: String,
    /// Token a second operator presents for destructive DLQ operations.
    pub two_eyes_token: String,
    pub dlq_capacity: usize,
    pub idempotency_ttl: Duration,
    /// Re-delivery target for DLQ replays; absent means a no-op downstream.
    pub downstream_url: Option<String>,
    /// Browser origins allowed on the admin surface; empty means none.
    pub cors_origins: Vec<String>,
}

impl Config {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let app_env =
            AppEnvironment::from_env_str(&env::var("APP_ENV").unwrap_or_default());

        let broker_hmac_secret = require("BROKER_HMAC_SECRET")?;
        let two_eyes_token = require("TWO_EYES_TOKEN")?;

        for (name, value) in [
            ("BROKER_HMAC_SECRET", &broker_hmac_secret),
            ("TWO_EYES_TOKEN", &two_eyes_token),
        ] {
            if INSECURE_TOKENS.contains(&value.to_lowercase().as_str()) {
                if app_env.is_production() {
                    return Err(ConfigError::InsecureInProduction(name));
                }
                tracing::warn!(target: "security", var = name, "Insecure placeholder value (allowed in development)");
            }
        }

        let cors_origins = parse_cors_origins(
            &env::var("CORS_ORIGINS").unwrap_or_default(),
            app_env,
        )?;

        let port = parse_or("PORT", 8080u16)?;
        let dlq_capacity = parse_or("DLQ_CAPACITY", 1000usize)?;
        let idempotency_ttl_secs = parse_or("IDEMPOTENCY_TTL_SECS", 24 * 60 * 60u64)?;

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port,
            app_env,
            rust_log: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            broker_hmac_secret,
            two_eyes_token,
            dlq_capacity,
            idempotency_ttl: Duration::from_secs(idempotency_ttl_secs),
            downstream_url: env::var("DOWNSTREAM_URL").ok().filter(|v| !v.is_empty()),
            cors_origins,
        })
    }
}

/// Parse the comma-separated `CORS_ORIGINS` list. A wildcard origin is
/// refused in production.
fn parse_cors_origins(raw: &str, app_env: AppEnvironment) -> Result<Vec<String>, ConfigError> {
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(ToString::to_string)
        .collect();

    if app_env.is_production() && origins.iter().any(|o| o == "*") {
        return Err(ConfigError::InsecureInProduction("CORS_ORIGINS"));
    }

    Ok(origins)
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingVar(name)),
    }
}

fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(v) => v.parse().map_err(|_| ConfigError::InvalidVar {
            name,
            value: v.clone(),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_env_parsing() {
        assert!(AppEnvironment::from_env_str("production").is_production());
        assert!(AppEnvironment::from_env_str("PROD").is_production());
        assert!(!AppEnvironment::from_env_str("development").is_production());
        assert!(!AppEnvironment::from_env_str("").is_production());
        assert!(!AppEnvironment::from_env_str("staging").is_production());
    }

    #[test]
    fn test_cors_origins_parsing() {
        let origins =
            parse_cors_origins("https://a.example, https://b.example,", AppEnvironment::Production)
                .unwrap();
        assert_eq!(origins, vec!["https://a.example", "https://b.example"]);
        assert!(parse_cors_origins("", AppEnvironment::Production)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_wildcard_cors_refused_in_production() {
        assert!(parse_cors_origins("*", AppEnvironment::Production).is_err());
        assert!(parse_cors_origins("*", AppEnvironment::Development).is_ok());
    }

    #[test]
    fn test_insecure_token_list_is_lowercase() {
        for token in INSECURE_TOKENS {
            assert_eq!(*token, token.to_lowercase());
        }
    }
}
