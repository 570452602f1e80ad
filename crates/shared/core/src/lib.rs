//! OCO Core Domain
//!
//! Pure domain types for the OCO futures trading client.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod entities;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{
    AssetBalance, OrderRequest, OrderStatus, OrderType, PositionSnapshot, Side, TimeInForce,
    ValidationError,
};
pub use values::{ExchangeOrderId, Price, Quantity, Symbol, Timestamp};
