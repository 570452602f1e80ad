//! Error types for the gateway crate

use oco_ports::GatewayError;
use std::time::Duration;
use thiserror::Error;

/// REST-level errors inside the futures client
#[derive(Error, Debug)]
pub enum RestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {code} - {msg}")]
    Api { status: u16, code: i64, msg: String },

    #[error("Rate limited by exchange (HTTP {status})")]
    RateLimited {
        status: u16,
        retry_after: Option<Duration>,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Missing credentials: {0}")]
    Credentials(&'static str),
}

/// Convert infrastructure RestError to the port-level GatewayError
impl From<RestError> for GatewayError {
    fn from(err: RestError) -> Self {
        match err {
            RestError::Http(e) if e.is_timeout() => GatewayError::Timeout,
            RestError::Http(e) => match e.status() {
                Some(status) => GatewayError::from_http_status(status.as_u16(), 0, e.to_string()),
                None => GatewayError::Network(e.to_string()),
            },
            RestError::Api { status, code, msg } => {
                GatewayError::from_http_status(status, code, msg)
            }
            RestError::RateLimited { retry_after, .. } => GatewayError::RateLimited { retry_after },
            RestError::Parse(msg) => GatewayError::Decode(msg),
            RestError::Url(e) => GatewayError::Network(e.to_string()),
            RestError::Credentials(what) => GatewayError::Auth(what.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_mapping() {
        let err: GatewayError = RestError::Api {
            status: 400,
            code: -2013,
            msg: "Order does not exist.".to_string(),
        }
        .into();
        assert!(err.is_not_found());

        let err: GatewayError = RestError::Api {
            status: 502,
            code: 0,
            msg: "bad gateway".to_string(),
        }
        .into();
        assert!(err.is_transient());
    }

    #[test]
    fn test_rate_limit_keeps_retry_after() {
        let err: GatewayError = RestError::RateLimited {
            status: 429,
            retry_after: Some(Duration::from_secs(2)),
        }
        .into();
        assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_missing_credentials_is_auth() {
        let err: GatewayError = RestError::Credentials("api secret").into();
        assert!(matches!(err, GatewayError::Auth(_)));
    }
}
