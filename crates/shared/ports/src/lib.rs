//! OCO Ports
//!
//! Port definitions (traits) for the OCO futures trading client.
//! These define the boundaries between order-management logic and the
//! exchange / time infrastructure.

mod clock;
mod error;
mod gateway;

pub use clock::Clock;
pub use error::{GatewayError, GatewayResult};
pub use gateway::{CancelAck, ExchangeGateway, OrderAck, OrderReport};
