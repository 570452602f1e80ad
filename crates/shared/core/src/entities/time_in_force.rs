use serde::{Deserialize, Serialize};

/// Time-in-force sent with limit orders
///
/// Only good-till-canceled is used: both the take-profit leg and plain
/// limit orders rest until filled or cancelled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    #[default]
    GTC,
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::GTC => "GTC",
        }
    }
}
