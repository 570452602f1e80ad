use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{OrderType, Side, TimeInForce};
use crate::values::{Price, Quantity, Symbol};

/// Field-level validation failures, raised before anything reaches the exchange
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Symbol must not be empty")]
    EmptySymbol,

    #[error("Quantity must be positive, got {0}")]
    NonPositiveQuantity(Decimal),

    #[error("{field} must be positive, got {value}")]
    NonPositivePrice { field: &'static str, value: Decimal },

    #[error("{order_type} order requires a {field}")]
    MissingField {
        order_type: &'static str,
        field: &'static str,
    },

    #[error("Inconsistent prices: {0}")]
    InconsistentPrices(String),
}

/// Order submission request in venue-neutral form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Quantity,
    /// Required for Limit and StopLimit orders
    pub price: Option<Price>,
    /// Required for StopLimit and StopMarket orders
    pub stop_price: Option<Price>,
    /// Ignored for market and stop-market orders
    pub time_in_force: TimeInForce,
    pub reduce_only: bool,
    /// Client-assigned id, echoed by the exchange and usable for lookups
    pub client_order_id: Option<String>,
}

impl OrderRequest {
    /// Create a market order request
    pub fn market(symbol: impl Into<Symbol>, side: Side, quantity: Quantity) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type: OrderType::Market,
            quantity,
            price: None,
            stop_price: None,
            time_in_force: TimeInForce::GTC,
            reduce_only: false,
            client_order_id: None,
        }
    }

    /// Create a GTC limit order request
    pub fn limit(symbol: impl Into<Symbol>, side: Side, quantity: Quantity, price: Price) -> Self {
        Self {
            order_type: OrderType::Limit,
            price: Some(price),
            ..Self::market(symbol, side, quantity)
        }
    }

    /// Create a stop-limit order request (venue type `STOP`)
    pub fn stop_limit(
        symbol: impl Into<Symbol>,
        side: Side,
        quantity: Quantity,
        stop_price: Price,
        limit_price: Price,
    ) -> Self {
        Self {
            order_type: OrderType::StopLimit,
            price: Some(limit_price),
            stop_price: Some(stop_price),
            ..Self::market(symbol, side, quantity)
        }
    }

    /// Create a stop-market order request
    pub fn stop_market(
        symbol: impl Into<Symbol>,
        side: Side,
        quantity: Quantity,
        stop_price: Price,
    ) -> Self {
        Self {
            order_type: OrderType::StopMarket,
            stop_price: Some(stop_price),
            ..Self::market(symbol, side, quantity)
        }
    }

    pub fn with_client_order_id(mut self, id: impl Into<String>) -> Self {
        self.client_order_id = Some(id.into());
        self
    }

    pub fn with_reduce_only(mut self, reduce_only: bool) -> Self {
        self.reduce_only = reduce_only;
        self
    }

    /// Validate the request based on order type requirements
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.symbol.trim().is_empty() {
            return Err(ValidationError::EmptySymbol);
        }
        if self.quantity <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveQuantity(self.quantity));
        }

        let type_name = self.order_type.as_str();
        match (self.order_type.requires_price(), self.price) {
            (true, None) => {
                return Err(ValidationError::MissingField {
                    order_type: type_name,
                    field: "price",
                });
            }
            (_, Some(price)) if price <= Decimal::ZERO => {
                return Err(ValidationError::NonPositivePrice {
                    field: "price",
                    value: price,
                });
            }
            _ => {}
        }
        match (self.order_type.requires_stop_price(), self.stop_price) {
            (true, None) => {
                return Err(ValidationError::MissingField {
                    order_type: type_name,
                    field: "stop price",
                });
            }
            (_, Some(stop)) if stop <= Decimal::ZERO => {
                return Err(ValidationError::NonPositivePrice {
                    field: "stop price",
                    value: stop,
                });
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_market_order_needs_no_price() {
        let order = OrderRequest::market("BTCUSDT", Side::Buy, dec!(0.01));
        assert!(order.validate().is_ok());
        assert!(order.price.is_none());
    }

    #[test]
    fn test_limit_order_requires_price() {
        let mut order = OrderRequest::limit("BTCUSDT", Side::Sell, dec!(0.01), dec!(70000));
        assert!(order.validate().is_ok());

        order.price = None;
        assert_eq!(
            order.validate(),
            Err(ValidationError::MissingField {
                order_type: "LIMIT",
                field: "price"
            })
        );
    }

    #[test]
    fn test_stop_limit_requires_both_prices() {
        let order =
            OrderRequest::stop_limit("BTCUSDT", Side::Sell, dec!(0.01), dec!(65000), dec!(64350));
        assert!(order.validate().is_ok());

        let mut missing_stop = order.clone();
        missing_stop.stop_price = None;
        assert!(matches!(
            missing_stop.validate(),
            Err(ValidationError::MissingField {
                field: "stop price",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_non_positive_values() {
        let zero_qty = OrderRequest::market("BTCUSDT", Side::Buy, Decimal::ZERO);
        assert_eq!(
            zero_qty.validate(),
            Err(ValidationError::NonPositiveQuantity(Decimal::ZERO))
        );

        let negative_stop = OrderRequest::stop_market("BTCUSDT", Side::Sell, dec!(1), dec!(-5));
        assert!(matches!(
            negative_stop.validate(),
            Err(ValidationError::NonPositivePrice { .. })
        ));

        let blank = OrderRequest::market("  ", Side::Buy, dec!(1));
        assert_eq!(blank.validate(), Err(ValidationError::EmptySymbol));
    }

    #[test]
    fn test_serialization_uses_venue_spelling() {
        let order = OrderRequest::stop_market("BTCUSDT", Side::Sell, dec!(0.01), dec!(65000));
        let json = serde_json::to_string(&order).unwrap();
        assert!(json.contains("\"STOP_MARKET\""));
        assert!(json.contains("\"SELL\""));
    }
}
