//! USDⓈ-M futures REST adapter
//!
//! Talks to the `/fapi` endpoints with HMAC-SHA256 signed query strings.
//! Credentials live in [`GatewayConfig`] and never leave this module.

mod client;
mod config;
mod signing;

pub use client::BinanceFuturesClient;
pub use config::{GatewayConfig, TESTNET_BASE_URL};
pub use signing::sign_query;
