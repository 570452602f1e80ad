use std::fmt;
use std::time::Duration;

/// Futures testnet REST endpoint
pub const TESTNET_BASE_URL: &str = "https://testnet.binancefuture.com";

/// Connection and credential context for the futures REST client
///
/// Built once at startup and handed to the client; business logic never
/// touches it afterwards.
#[derive(Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: String,
    pub api_secret: String,
    /// Validity window for signed requests, in milliseconds
    pub recv_window_ms: u64,
    /// Hard HTTP timeout for a single request
    pub request_timeout: Duration,
}

impl GatewayConfig {
    /// Testnet configuration with the given credentials
    pub fn testnet(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn is_testnet(&self) -> bool {
        self.base_url.contains("testnet")
    }

    pub fn has_credentials(&self) -> bool {
        !self.api_key.is_empty() && !self.api_secret.is_empty()
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: TESTNET_BASE_URL.to_string(),
            api_key: String::new(),
            api_secret: String::new(),
            recv_window_ms: 5_000,
            request_timeout: Duration::from_secs(10),
        }
    }
}

// Keep secrets out of logs
impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("api_secret", &"***")
            .field("recv_window_ms", &self.recv_window_ms)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

fn redact(key: &str) -> String {
    match key.len() {
        0 => "<unset>".to_string(),
        n if n <= 8 => "***".to_string(),
        n => match (key.get(..4), key.get(n - 4..)) {
            (Some(head), Some(tail)) => format!("{head}***{tail}"),
            _ => "***".to_string(),
        },
    }
}
