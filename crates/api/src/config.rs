//! Application configuration loaded from environment variables.

use domain::{EnginePolicy, FailurePolicy};
use thiserror::Error;

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable required in this environment is not set.
    #[error("{0} must be set when APP_ENV=production")]
    Missing(&'static str),

    /// A variable is set to a value that cannot be used.
    #[error("invalid value '{value}' for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `pretty` or `json` (default: `pretty`)
/// - `APP_ENV`: deployment environment (default: `"development"`)
/// - `DATABASE_URL`: PostgreSQL URL; required in production, otherwise the
///   in-memory store is used when absent
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `10`)
/// - `GUEST_CUSTOMER_POLICY`, `LEDGER_POLICY`, `RESTOCK_POLICY`: `strict`
///   or `best_effort`
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub environment: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub policy: EnginePolicy,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup`, which returns a variable's value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match var("PORT") {
            Some(value) => value.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: "PORT",
                value,
                reason: e.to_string(),
            })?,
            None => defaults.port,
        };

        let log_format = match var("LOG_FORMAT") {
            Some(value) => match value.trim().to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" | "text" => LogFormat::Pretty,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "LOG_FORMAT",
                        value,
                        reason: "expected 'pretty' or 'json'".to_string(),
                    });
                }
            },
            None => defaults.log_format,
        };

        let database_max_connections = match var("DATABASE_MAX_CONNECTIONS") {
            Some(value) => match value.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "DATABASE_MAX_CONNECTIONS",
                        value,
                        reason: "expected a positive integer".to_string(),
                    });
                }
            },
            None => defaults.database_max_connections,
        };

        let policy_var = |name: &'static str, default: FailurePolicy| match var(name) {
            Some(value) => value.parse::<FailurePolicy>().map_err(|e| ConfigError::Invalid {
                name,
                value,
                reason: e.to_string(),
            }),
            None => Ok(default),
        };
        let policy = EnginePolicy {
            guest_customer: policy_var("GUEST_CUSTOMER_POLICY", defaults.policy.guest_customer)?,
            ledger: policy_var("LEDGER_POLICY", defaults.policy.ledger)?,
            restock: policy_var("RESTOCK_POLICY", defaults.policy.restock)?,
        };

        let config = Self {
            host: var("HOST").unwrap_or(defaults.host),
            port,
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format,
            environment: var("APP_ENV").unwrap_or(defaults.environment),
            database_url: var("DATABASE_URL"),
            database_max_connections,
            policy,
        };

        if config.is_production() && config.database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        Ok(config)
    }

    /// Returns true when running with `APP_ENV=production`.
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            environment: "development".to_string(),
            database_url: None,
            database_max_connections: 10,
            policy: EnginePolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.database_url.is_none());
        assert_eq!(config.policy, EnginePolicy::default());
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.addr(), "0.0.0.0:3000");
        assert!(!config.is_production());
    }

    #[test]
    fn test_addr_formatting() {
        let config = load(&[("HOST", "127.0.0.1"), ("PORT", "8080")]).unwrap();
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let err = load(&[("PORT", "http")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));
    }

    #[test]
    fn test_production_requires_database_url() {
        let err = load(&[("APP_ENV", "production")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));

        let config = load(&[
            ("APP_ENV", "production"),
            ("DATABASE_URL", "postgres://shop@db/shop"),
        ])
        .unwrap();
        assert!(config.is_production());
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://shop@db/shop")
        );
    }

    #[test]
    fn test_policies_and_log_format() {
        let config = load(&[
            ("RESTOCK_POLICY", "best_effort"),
            ("LEDGER_POLICY", "strict"),
            ("GUEST_CUSTOMER_POLICY", "strict"),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap();
        assert_eq!(config.policy.restock, FailurePolicy::BestEffort);
        assert_eq!(config.policy.ledger, FailurePolicy::Strict);
        assert_eq!(config.policy.guest_customer, FailurePolicy::Strict);
        assert_eq!(config.log_format, LogFormat::Json);

        let err = load(&[("RESTOCK_POLICY", "sometimes")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "RESTOCK_POLICY",
                ..
            }
        ));
    }
}
