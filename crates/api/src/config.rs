//! Application configuration loaded from environment variables.

use std::time::Duration;

use payment::{DEFAULT_PRODUCT_CODE, GatewayConfig};
use settlement::SmtpSettings;
use thiserror::Error;

/// Errors raised while reading the environment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Server configuration.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL` or `DB_URI`: PostgreSQL connection string; the in-memory
///   store is used when unset
/// - `SMTP_HOST`, `SMTP_PORT` (default `587`), `SMTP_USER`, `SMTP_PASS`,
///   `SMTP_FROM_NAME`, `SMTP_FROM_EMAIL`: mail relay; notifications are only
///   logged when `SMTP_HOST` is unset
/// - `ESEWA_SECRET_KEY` (required), `ESEWA_MERCHANT_ID`,
///   `ESEWA_INITIATE_URL`, `ESEWA_VERIFY_URL`, `ESEWA_SUCCESS_URL`,
///   `ESEWA_FAILURE_URL`, `GATEWAY_TIMEOUT_SECS` (default `10`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub smtp: Option<SmtpSettings>,
    pub gateway: GatewayConfig,
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = parse_or(&var, "PORT", 3000)?;
        let database_url = var("DATABASE_URL").or_else(|| var("DB_URI"));

        let smtp = match var("SMTP_HOST") {
            Some(host) => {
                let from_email = var("SMTP_FROM_EMAIL")
                    .or_else(|| var("SMTP_USER"))
                    .ok_or(ConfigError::Missing("SMTP_FROM_EMAIL"))?;
                Some(SmtpSettings {
                    host,
                    port: parse_or(&var, "SMTP_PORT", 587)?,
                    username: var("SMTP_USER").unwrap_or_default(),
                    password: var("SMTP_PASS").unwrap_or_default(),
                    from_name: var("SMTP_FROM_NAME").unwrap_or_else(|| "Store".to_string()),
                    from_email,
                    timeout: Duration::from_secs(parse_or(&var, "SMTP_TIMEOUT_SECS", 10)?),
                })
            }
            None => None,
        };

        let secret_key =
            var("ESEWA_SECRET_KEY").ok_or(ConfigError::Missing("ESEWA_SECRET_KEY"))?;
        let mut gateway = GatewayConfig::sandbox(secret_key);
        gateway.product_code =
            var("ESEWA_MERCHANT_ID").unwrap_or_else(|| DEFAULT_PRODUCT_CODE.to_string());
        if let Some(url) = var("ESEWA_INITIATE_URL") {
            gateway.initiate_url = url;
        }
        if let Some(url) = var("ESEWA_VERIFY_URL") {
            gateway.verify_url = url;
        }
        if let Some(url) = var("ESEWA_SUCCESS_URL") {
            gateway.success_url = url;
        }
        if let Some(url) = var("ESEWA_FAILURE_URL") {
            gateway.failure_url = url;
        }
        let timeout_secs: u64 = parse_or(&var, "GATEWAY_TIMEOUT_SECS", 10)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "GATEWAY_TIMEOUT_SECS",
                value: "0".to_string(),
            });
        }
        gateway.timeout = Duration::from_secs(timeout_secs);

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            log_level: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            database_url,
            smtp,
            gateway,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T, F>(var: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
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
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = load(&[("ESEWA_SECRET_KEY", "secret")]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert!(config.database_url.is_none());
        assert!(config.smtp.is_none());
        assert_eq!(config.gateway.product_code, "EPAYTEST");
        assert_eq!(config.gateway.timeout, Duration::from_secs(10));
        assert_eq!(config.addr(), "0.0.0.0:3000");
    }

    #[test]
    fn test_secret_key_is_required() {
        assert_eq!(
            load(&[]).unwrap_err(),
            ConfigError::Missing("ESEWA_SECRET_KEY")
        );
        assert_eq!(
            load(&[("ESEWA_SECRET_KEY", "  ")]).unwrap_err(),
            ConfigError::Missing("ESEWA_SECRET_KEY")
        );
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("ESEWA_SECRET_KEY", "secret"),
            ("ESEWA_MERCHANT_ID", "SHOP01"),
            ("ESEWA_VERIFY_URL", "http://gateway/status"),
            ("GATEWAY_TIMEOUT_SECS", "3"),
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("DB_URI", "postgres://localhost/shop"),
        ])
        .unwrap();
        assert_eq!(config.addr(), "127.0.0.1:8080");
        assert_eq!(config.gateway.product_code, "SHOP01");
        assert_eq!(config.gateway.verify_url, "http://gateway/status");
        assert_eq!(config.gateway.timeout, Duration::from_secs(3));
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/shop")
        );
    }

    #[test]
    fn test_invalid_numbers() {
        assert!(matches!(
            load(&[("ESEWA_SECRET_KEY", "s"), ("PORT", "http")]),
            Err(ConfigError::Invalid { key: "PORT", .. })
        ));
        assert!(matches!(
            load(&[("ESEWA_SECRET_KEY", "s"), ("GATEWAY_TIMEOUT_SECS", "0")]),
            Err(ConfigError::Invalid {
                key: "GATEWAY_TIMEOUT_SECS",
                ..
            })
        ));
    }

    #[test]
    fn test_smtp_settings() {
        let config = load(&[
            ("ESEWA_SECRET_KEY", "s"),
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_PORT", "465"),
            ("SMTP_USER", "mailer@example.com"),
            ("SMTP_PASS", "pw"),
        ])
        .unwrap();
        let smtp = config.smtp.unwrap();
        assert_eq!(smtp.port, 465);
        assert_eq!(smtp.from_email, "mailer@example.com");
        assert_eq!(smtp.from_name, "Store");
    }
}
