//! Exchange adapters
//!
//! Adapters translate the [`oco_ports::ExchangeGateway`] port into a concrete
//! venue: the real futures REST API, or the in-memory simulator.

pub mod binance;
pub mod simulator;

pub use binance::BinanceFuturesClient;
pub use simulator::SimulatedExchange;
