use std::time::Duration;
use thiserror::Error;

/// Failures reported by an exchange gateway
///
/// Variants are classified as transient (worth retrying) or terminal using
/// HTTP-status-like rules, see [`GatewayError::is_transient`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rejected by exchange ({code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Could not decode exchange response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Map an HTTP status and venue error payload onto the taxonomy
    pub fn from_http_status(status: u16, code: i64, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            // -2011 unknown order on cancel, -2013 order does not exist on query
            _ if code == -2011 || code == -2013 => GatewayError::OrderNotFound(message),
            401 | 403 => GatewayError::Auth(message),
            408 => GatewayError::Timeout,
            418 | 429 => GatewayError::RateLimited { retry_after: None },
            500..=599 => GatewayError::Server { status, message },
            _ => GatewayError::Rejected { code, message },
        }
    }

    /// Whether the failure is inconclusive and the call may be retried
    ///
    /// `OrderNotFound` is terminal here; pollers that tolerate the venue's
    /// eventual consistency treat it as inconclusive themselves.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::Timeout
                | GatewayError::Network(_)
                | GatewayError::RateLimited { .. }
                | GatewayError::Server { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::OrderNotFound(_))
    }

    /// Suggested wait before retrying, when the venue provided one
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GatewayError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;
