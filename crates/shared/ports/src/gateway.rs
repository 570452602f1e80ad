use async_trait::async_trait;
use oco_core::{
    AssetBalance, ExchangeOrderId, OrderRequest, OrderStatus, OrderType, PositionSnapshot, Price,
    Quantity, Side, Timestamp,
};
use serde::{Deserialize, Serialize};

use crate::error::GatewayResult;

/// Acknowledgement of an accepted order submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    pub exchange_order_id: ExchangeOrderId,
    pub client_order_id: Option<String>,
    pub status: OrderStatus,
}

/// Point-in-time view of one order on the exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReport {
    pub exchange_order_id: ExchangeOrderId,
    pub client_order_id: Option<String>,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub quantity: Quantity,
    pub filled_quantity: Quantity,
    /// Average fill price, zero or absent until something fills
    pub avg_price: Option<Price>,
    pub price: Option<Price>,
    pub stop_price: Option<Price>,
    /// Exchange-side time of the last state change
    pub updated_at: Option<Timestamp>,
}

/// Result of a cancel request that the exchange accepted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelAck {
    pub exchange_order_id: ExchangeOrderId,
    /// Status after the cancel; `Filled` when the order completed first
    pub status: OrderStatus,
    pub filled_quantity: Quantity,
}

/// Port for the authenticated exchange connection
///
/// Implementations hold their own connection and credential state; callers
/// only ever see this read-only surface. The venue is assumed rate-limited,
/// occasionally slow, and eventually consistent: a just-placed order may not
/// show up in [`get_order_status`](ExchangeGateway::get_order_status) yet.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Connectivity check
    async fn ping(&self) -> GatewayResult<()>;

    async fn submit_order(&self, request: &OrderRequest) -> GatewayResult<OrderAck>;

    async fn get_order_status(
        &self,
        symbol: &str,
        exchange_order_id: &str,
    ) -> GatewayResult<OrderReport>;

    /// Look an order up by the client id it was submitted with.
    /// `Ok(None)` means the exchange has no such order.
    async fn find_order_by_client_id(
        &self,
        symbol: &str,
        client_order_id: &str,
    ) -> GatewayResult<Option<OrderReport>>;

    async fn cancel_order(&self, symbol: &str, exchange_order_id: &str)
    -> GatewayResult<CancelAck>;

    async fn get_open_orders(&self, symbol: Option<&str>) -> GatewayResult<Vec<OrderReport>>;

    /// Position for one symbol; a flat position is returned with zero quantity
    async fn get_position(&self, symbol: &str) -> GatewayResult<PositionSnapshot>;

    /// All non-flat positions
    async fn get_positions(&self) -> GatewayResult<Vec<PositionSnapshot>>;

    async fn get_balance(&self) -> GatewayResult<Vec<AssetBalance>>;

    async fn get_symbol_price(&self, symbol: &str) -> GatewayResult<Price>;

    /// Gateway name for logs
    fn name(&self) -> &str {
        "ExchangeGateway"
    }
}
