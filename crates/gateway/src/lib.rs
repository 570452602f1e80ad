//! OCO Gateway
//!
//! Exchange Gateway implementations for the OCO futures client. Provides:
//! - A signed REST adapter for USDⓈ-M futures (`/fapi` endpoints)
//! - Wire message types for that REST schema
//! - An in-memory simulated venue with fault injection, for tests and
//!   `--simulate` runs
//!
//! ## Architecture
//!
//! ```text
//!  Order Manager / CLI
//!         │  ExchangeGateway (port)
//!    ┌────▼──────────────────────────┐
//!    │ Gateway                       │
//!    │  ├── BinanceFuturesClient ────┼──► HTTPS (signed query strings)
//!    │  └── SimulatedExchange        │    in-memory book, scripted faults
//!    └───────────────────────────────┘
//! ```
//!
//! Both adapters implement [`oco_ports::ExchangeGateway`]; callers never see
//! connection or credential state.

pub mod adapters;
pub mod error;
pub mod messages;

// Re-export commonly used types
pub use adapters::{
    binance::{BinanceFuturesClient, GatewayConfig},
    simulator::{FaultRule, SimFault, SimOperation, SimulatedExchange},
};
pub use error::RestError;
