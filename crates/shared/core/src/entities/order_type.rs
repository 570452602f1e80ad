use serde::{Deserialize, Serialize};

/// Order types used against the futures venue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    /// Execute at current market price
    Market,
    /// Execute at specified price or better
    Limit,
    /// Limit order triggered when price reaches stop price (venue type `STOP`)
    #[serde(rename = "STOP")]
    StopLimit,
    /// Market order triggered when price reaches stop price
    StopMarket,
}

impl OrderType {
    /// Venue spelling of the order type
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
            OrderType::StopLimit => "STOP",
            OrderType::StopMarket => "STOP_MARKET",
        }
    }

    /// Parse the venue spelling
    pub fn from_venue(s: &str) -> Option<Self> {
        match s {
            "MARKET" => Some(OrderType::Market),
            "LIMIT" => Some(OrderType::Limit),
            "STOP" => Some(OrderType::StopLimit),
            "STOP_MARKET" => Some(OrderType::StopMarket),
            _ => None,
        }
    }

    pub fn requires_price(&self) -> bool {
        matches!(self, OrderType::Limit | OrderType::StopLimit)
    }

    pub fn requires_stop_price(&self) -> bool {
        matches!(self, OrderType::StopLimit | OrderType::StopMarket)
    }
}
