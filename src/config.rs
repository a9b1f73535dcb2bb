use std::env;
use std::str::FromStr;
use std::time::Duration;

use bigdecimal::{BigDecimal, Zero};
use thiserror::Error;

use crate::db::PoolSettings;
use crate::domain::cart::TaxPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: StoreBackend,
    /// Required for the Postgres backend only.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub pool: PoolSettings,
    pub tax: TaxPolicy,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("APP_STORE").as_deref() {
            None | Some("postgres") => StoreBackend::Postgres,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "APP_STORE",
                    value: other.to_string(),
                })
            }
        };

        let database_url = lookup("DATABASE_URL");
        if backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(&lookup, "PORT", 8080u16)?;

        let defaults = PoolSettings::default();
        let max_size = parse_or(&lookup, "DB_POOL_MAX_SIZE", defaults.max_size)?;
        let timeout_ms: u64 = parse_or(&lookup, "DB_STATEMENT_TIMEOUT_MS", 5_000)?;
        let statement_timeout = (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms));

        let rate = parse_or(&lookup, "ORDER_TAX_RATE", BigDecimal::zero())?;
        if rate < BigDecimal::zero() {
            return Err(ConfigError::Invalid {
                name: "ORDER_TAX_RATE",
                value: rate.to_string(),
            });
        }

        Ok(Self {
            backend,
            database_url,
            host,
            port,
            pool: PoolSettings {
                max_size,
                statement_timeout,
            },
            tax: TaxPolicy::new(rate),
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn postgres_backend_requires_database_url() {
        let err = config(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn defaults_apply() {
        let cfg = config(&[("DATABASE_URL", "postgres://localhost/shop")]).expect("config");
        assert_eq!(cfg.backend, StoreBackend::Postgres);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.pool, PoolSettings::default());
        assert_eq!(cfg.tax, TaxPolicy::none());
    }

    #[test]
    fn memory_backend_needs_no_database() {
        let cfg = config(&[("APP_STORE", "memory"), ("PORT", "9090")]).expect("config");
        assert_eq!(cfg.backend, StoreBackend::Memory);
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.port, 9090);
    }

    #[test]
    fn tax_rate_is_parsed_as_decimal() {
        let cfg = config(&[("APP_STORE", "memory"), ("ORDER_TAX_RATE", "0.21")]).expect("config");
        assert_eq!(cfg.tax.rate(), &BigDecimal::from_str("0.21").expect("decimal"));
    }

    #[test]
    fn zero_timeout_disables_statement_timeout() {
        let cfg = config(&[("APP_STORE", "memory"), ("DB_STATEMENT_TIMEOUT_MS", "0")])
            .expect("config");
        assert_eq!(cfg.pool.statement_timeout, None);
    }

    #[test]
    fn invalid_values_are_reported_by_name() {
        let err = config(&[("APP_STORE", "memory"), ("PORT", "eighty")]).unwrap_err();
        assert_eq!(err.to_string(), "PORT has an invalid value 'eighty'");

        let err = config(&[("APP_STORE", "memory"), ("ORDER_TAX_RATE", "-0.1")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "ORDER_TAX_RATE", .. }));

        let err = config(&[("APP_STORE", "sqlite")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "APP_STORE", .. }));
    }
}
