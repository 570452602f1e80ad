//! CLI configuration
//!
//! A JSON file with three optional sections. Every field has a default, so
//! running without `--config` is the same as loading `{}`. Credentials are
//! never read from the file, only from the environment.

use oco_gateway::GatewayConfig;
use oco_gateway::adapters::binance::TESTNET_BASE_URL;
use oco_order_manager::ManagerConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const API_KEY_ENV: &str = "BINANCE_API_KEY";
pub const API_SECRET_ENV: &str = "BINANCE_API_SECRET";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Missing credential: set {0}")]
    MissingCredential(&'static str),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub gateway: GatewaySection,
    pub manager: ManagerSection,
    pub log_level: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            gateway: GatewaySection::default(),
            manager: ManagerSection::default(),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySection {
    pub base_url: String,
    pub recv_window_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            base_url: TESTNET_BASE_URL.to_string(),
            recv_window_ms: 5_000,
            request_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerSection {
    pub poll_interval_ms: u64,
    pub call_timeout_ms: u64,
    pub max_retries: u32,
    /// First retry delay; doubled per attempt
    pub retry_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub max_inconclusive_polls: u32,
    pub monitor_deadline_secs: Option<u64>,
    pub reduce_only_legs: bool,
    /// Distance between stop and default limit price of a stop-limit order
    pub stop_limit_offset_pct: Decimal,
}

impl Default for ManagerSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: 3_000,
            call_timeout_ms: 5_000,
            max_retries: 3,
            retry_backoff_ms: 500,
            max_backoff_ms: 8_000,
            max_inconclusive_polls: 5,
            monitor_deadline_secs: None,
            reduce_only_legs: false,
            stop_limit_offset_pct: Decimal::ONE,
        }
    }
}

/// API credentials taken from the environment
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |name: &'static str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingCredential(name))
        };
        Ok(Self {
            api_key: read(API_KEY_ENV)?,
            api_secret: read(API_SECRET_ENV)?,
        })
    }
}

/// Load CLI configuration from a JSON file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Load configuration from a JSON string
pub fn load_config_from_str(json: &str) -> Result<CliConfig, ConfigError> {
    let config: CliConfig = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
}

impl CliConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let manager = &self.manager;
        if manager.poll_interval_ms == 0 {
            return Err(invalid("manager.poll_interval_ms", "must be positive"));
        }
        if manager.call_timeout_ms == 0 {
            return Err(invalid("manager.call_timeout_ms", "must be positive"));
        }
        if manager.max_inconclusive_polls == 0 {
            return Err(invalid("manager.max_inconclusive_polls", "must be positive"));
        }
        if manager.max_backoff_ms < manager.retry_backoff_ms {
            return Err(invalid(
                "manager.max_backoff_ms",
                "must not be below retry_backoff_ms",
            ));
        }
        let pct = manager.stop_limit_offset_pct;
        if pct <= Decimal::ZERO || pct >= Decimal::ONE_HUNDRED {
            return Err(invalid(
                "manager.stop_limit_offset_pct",
                format!("must be between 0 and 100, got {pct}"),
            ));
        }
        if url_scheme_ok(&self.gateway.base_url) {
            Ok(())
        } else {
            Err(invalid("gateway.base_url", "must be an http(s) URL"))
        }
    }

    pub fn gateway_config(&self, credentials: Credentials) -> GatewayConfig {
        GatewayConfig {
            base_url: self.gateway.base_url.trim_end_matches('/').to_string(),
            api_key: credentials.api_key,
            api_secret: credentials.api_secret,
            recv_window_ms: self.gateway.recv_window_ms,
            request_timeout: Duration::from_millis(self.gateway.request_timeout_ms),
        }
    }

    pub fn manager_config(&self) -> ManagerConfig {
        let m = &self.manager;
        ManagerConfig {
            poll_interval: Duration::from_millis(m.poll_interval_ms),
            call_timeout: Duration::from_millis(m.call_timeout_ms),
            max_retries: m.max_retries,
            retry_backoff: Duration::from_millis(m.retry_backoff_ms),
            max_backoff: Duration::from_millis(m.max_backoff_ms),
            max_inconclusive_polls: m.max_inconclusive_polls,
            monitor_deadline: m.monitor_deadline_secs.map(Duration::from_secs),
            reduce_only_legs: m.reduce_only_legs,
            stop_limit_offset: m.stop_limit_offset_pct / Decimal::ONE_HUNDRED,
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

fn url_scheme_ok(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = load_config_from_str("{}").unwrap();
        assert_eq!(config, CliConfig::default());
        assert_eq!(config.gateway.base_url, "https://testnet.binancefuture.com");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_defaults_match_manager_defaults() {
        let manager = CliConfig::default().manager_config();
        let expected = ManagerConfig::default();
        assert_eq!(manager.poll_interval, expected.poll_interval);
        assert_eq!(manager.call_timeout, expected.call_timeout);
        assert_eq!(manager.max_retries, expected.max_retries);
        assert_eq!(manager.max_inconclusive_polls, expected.max_inconclusive_polls);
        assert_eq!(manager.stop_limit_offset, dec!(0.01));
    }

    #[test]
    fn test_partial_sections() {
        let config = load_config_from_str(
            r#"{
                "manager": { "poll_interval_ms": 1000, "monitor_deadline_secs": 600 },
                "log_level": "debug"
            }"#,
        )
        .unwrap();

        let manager = config.manager_config();
        assert_eq!(manager.poll_interval, Duration::from_secs(1));
        assert_eq!(manager.monitor_deadline, Some(Duration::from_secs(600)));
        assert_eq!(manager.max_retries, 3);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.gateway.recv_window_ms, 5_000);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = load_config_from_str(r#"{ "manager": { "poll_interval_ms": 0 } }"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { field: "manager.poll_interval_ms", .. }
        ));

        let err = load_config_from_str(r#"{ "manager": { "stop_limit_offset_pct": 150 } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = load_config_from_str(r#"{ "gateway": { "base_url": "ftp://x" } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "gateway.base_url", .. }));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            load_config_from_str("{ not json"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_credentials_lookup() {
        let creds = Credentials::from_lookup(|name| match name {
            API_KEY_ENV => Some("key".to_string()),
            API_SECRET_ENV => Some(" secret ".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(creds.api_key, "key");
        assert_eq!(creds.api_secret, "secret");

        let missing = Credentials::from_lookup(|name| match name {
            API_KEY_ENV => Some("key".to_string()),
            _ => Some(String::new()),
        });
        assert!(matches!(
            missing,
            Err(ConfigError::MissingCredential(API_SECRET_ENV))
        ));
    }

    #[test]
    fn test_gateway_config_keeps_credentials_out_of_file() {
        let config = load_config_from_str(
            r#"{ "gateway": { "base_url": "https://fapi.example.com/", "request_timeout_ms": 2500 } }"#,
        )
        .unwrap();
        let gateway = config.gateway_config(Credentials {
            api_key: "k".to_string(),
            api_secret: "s".to_string(),
        });
        assert_eq!(gateway.base_url, "https://fapi.example.com");
        assert_eq!(gateway.request_timeout, Duration::from_millis(2500));
        assert!(gateway.has_credentials());
        assert!(!gateway.is_testnet());
    }
}
