//! Simulated exchange adapter
//!
//! An in-memory futures venue implementing the gateway port. Orders rest
//! until a price move (or an explicit script call) fills or cancels them,
//! and faults can be injected per operation to reproduce timeouts, rate
//! limits, eventual consistency and fill/cancel races.

mod exchange;
mod faults;

pub use exchange::SimulatedExchange;
pub use faults::{FaultRule, SimFault, SimOperation};
