//! Single-order passthrough
//!
//! Plain market/limit/stop orders go straight to the gateway: one call under
//! the call timeout, no retry, no monitoring. The call's own result is
//! authoritative.

use log::info;
use oco_core::{OrderRequest, Price, Quantity, Side};
use oco_ports::{CancelAck, ExchangeGateway, OrderAck, OrderReport};
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::config::ManagerConfig;
use crate::error::Result;
use crate::retry::RetryPolicy;

pub struct OrderPassthrough {
    gateway: Arc<dyn ExchangeGateway>,
    retry: RetryPolicy,
    stop_limit_offset: Decimal,
}

impl OrderPassthrough {
    pub fn new(gateway: Arc<dyn ExchangeGateway>, config: &ManagerConfig) -> Self {
        Self {
            gateway,
            retry: RetryPolicy::from_config(config),
            stop_limit_offset: config.stop_limit_offset,
        }
    }

    /// Validate and submit one order
    pub async fn place(&self, request: OrderRequest) -> Result<OrderAck> {
        request.validate()?;
        info!(
            "Passthrough {} {} {} {}",
            request.order_type.as_str(),
            request.side,
            request.quantity,
            request.symbol
        );
        let ack = self.retry.once(self.gateway.submit_order(&request)).await?;
        Ok(ack)
    }

    pub async fn market(&self, symbol: &str, side: Side, quantity: Quantity) -> Result<OrderAck> {
        self.place(OrderRequest::market(symbol, side, quantity)).await
    }

    pub async fn limit(
        &self,
        symbol: &str,
        side: Side,
        quantity: Quantity,
        price: Price,
    ) -> Result<OrderAck> {
        self.place(OrderRequest::limit(symbol, side, quantity, price))
            .await
    }

    /// Stop-limit order; without a limit price one is derived from the stop
    pub async fn stop_limit(
        &self,
        symbol: &str,
        side: Side,
        quantity: Quantity,
        stop_price: Price,
        limit_price: Option<Price>,
    ) -> Result<OrderAck> {
        let limit_price = limit_price
            .unwrap_or_else(|| default_limit_price(side, stop_price, self.stop_limit_offset));
        self.place(OrderRequest::stop_limit(
            symbol,
            side,
            quantity,
            stop_price,
            limit_price,
        ))
        .await
    }

    pub async fn cancel(&self, symbol: &str, exchange_order_id: &str) -> Result<CancelAck> {
        let ack = self
            .retry
            .once(self.gateway.cancel_order(symbol, exchange_order_id))
            .await?;
        info!("Order {} cancelled ({})", exchange_order_id, ack.status);
        Ok(ack)
    }

    pub async fn status(&self, symbol: &str, exchange_order_id: &str) -> Result<OrderReport> {
        Ok(self
            .retry
            .once(self.gateway.get_order_status(symbol, exchange_order_id))
            .await?)
    }
}

/// Limit price placed `offset` beyond the stop: below it for sells, above
/// it for buys
pub fn default_limit_price(side: Side, stop_price: Price, offset: Decimal) -> Price {
    let factor = match side {
        Side::Sell => Decimal::ONE - offset,
        Side::Buy => Decimal::ONE + offset,
    };
    (stop_price * factor).normalize()
}
