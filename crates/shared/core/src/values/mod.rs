use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Price value - uses Decimal for precision
pub type Price = Decimal;

/// Quantity value - uses Decimal for precision
pub type Quantity = Decimal;

/// Timestamp in UTC
pub type Timestamp = DateTime<Utc>;

/// Symbol identifier for a futures contract (e.g. `BTCUSDT`)
pub type Symbol = String;

/// Exchange-assigned order identifier, kept as the venue renders it
pub type ExchangeOrderId = String;
