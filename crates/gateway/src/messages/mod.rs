//! Wire message types for the futures REST schema
//!
//! These mirror the venue's JSON payloads and convert into the
//! venue-neutral report types of `oco-ports`.

pub mod account;
pub mod order;

pub use account::{BalanceEntry, PositionRisk, TickerPrice};
pub use order::{ApiErrorBody, FuturesOrder, NewOrderParams};
