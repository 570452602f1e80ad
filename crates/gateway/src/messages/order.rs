//! Order message types

use chrono::{DateTime, Utc};
use oco_core::{OrderRequest, OrderStatus, OrderType, Side};
use oco_ports::{CancelAck, GatewayError, OrderAck, OrderReport};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Query parameters for `POST /fapi/v1/order`, in the order they are signed
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderParams {
    pairs: Vec<(&'static str, String)>,
}

impl NewOrderParams {
    /// Translate a venue-neutral request into the futures parameter set
    pub fn from_request(request: &OrderRequest) -> Self {
        let mut pairs = vec![
            ("symbol", request.symbol.clone()),
            ("side", request.side.as_str().to_string()),
            ("type", request.order_type.as_str().to_string()),
            ("quantity", request.quantity.normalize().to_string()),
        ];

        if let Some(price) = request.price {
            pairs.push(("price", price.normalize().to_string()));
        }
        if let Some(stop) = request.stop_price {
            pairs.push(("stopPrice", stop.normalize().to_string()));
        }
        // Market-style orders reject a timeInForce parameter
        if request.order_type.requires_price() {
            pairs.push(("timeInForce", request.time_in_force.as_str().to_string()));
        }
        if request.reduce_only {
            pairs.push(("reduceOnly", "true".to_string()));
        }
        if let Some(client_id) = &request.client_order_id {
            pairs.push(("newClientOrderId", client_id.clone()));
        }

        Self { pairs }
    }

    pub fn pairs(&self) -> &[(&'static str, String)] {
        &self.pairs
    }

    pub fn into_pairs(self) -> Vec<(&'static str, String)> {
        self.pairs
    }
}

/// Order payload returned by the order endpoints (place, query, cancel)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuturesOrder {
    pub order_id: i64,
    #[serde(default)]
    pub client_order_id: Option<String>,
    pub symbol: String,
    pub status: String,
    pub side: String,
    #[serde(rename = "type")]
    pub order_type: String,
    pub orig_qty: Decimal,
    #[serde(default)]
    pub executed_qty: Decimal,
    #[serde(default)]
    pub avg_price: Option<Decimal>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub stop_price: Option<Decimal>,
    #[serde(default)]
    pub update_time: Option<i64>,
}

impl FuturesOrder {
    pub fn parsed_status(&self) -> Result<OrderStatus, GatewayError> {
        OrderStatus::from_venue(&self.status)
            .ok_or_else(|| GatewayError::Decode(format!("unknown order status '{}'", self.status)))
    }

    pub fn into_ack(self) -> Result<OrderAck, GatewayError> {
        Ok(OrderAck {
            status: self.parsed_status()?,
            exchange_order_id: self.order_id.to_string(),
            client_order_id: self.client_order_id,
        })
    }

    pub fn into_cancel_ack(self) -> Result<CancelAck, GatewayError> {
        Ok(CancelAck {
            status: self.parsed_status()?,
            exchange_order_id: self.order_id.to_string(),
            filled_quantity: self.executed_qty,
        })
    }

    pub fn into_report(self) -> Result<OrderReport, GatewayError> {
        let status = self.parsed_status()?;
        let side = self.side.parse::<Side>().map_err(GatewayError::Decode)?;
        let order_type = OrderType::from_venue(&self.order_type).ok_or_else(|| {
            GatewayError::Decode(format!("unsupported order type '{}'", self.order_type))
        })?;

        Ok(OrderReport {
            exchange_order_id: self.order_id.to_string(),
            client_order_id: self.client_order_id,
            symbol: self.symbol,
            side,
            order_type,
            status,
            quantity: self.orig_qty,
            filled_quantity: self.executed_qty,
            // The venue reports "0" for zero-valued optional prices
            avg_price: self.avg_price.filter(|p| !p.is_zero()),
            price: self.price.filter(|p| !p.is_zero()),
            stop_price: self.stop_price.filter(|p| !p.is_zero()),
            updated_at: self.update_time.and_then(DateTime::<Utc>::from_timestamp_millis),
        })
    }
}

/// Error payload: `{"code": -2011, "msg": "Unknown order sent."}`
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub code: i64,
    pub msg: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const QUERY_RESPONSE: &str = r#"{
        "avgPrice": "70000.00",
        "clientOrderId": "3f2a9c1e4b7d4e0f8a6b5c4d3e2f1a0b",
        "cumQuote": "700",
        "executedQty": "0.010",
        "orderId": 4056123987,
        "origQty": "0.010",
        "origType": "LIMIT",
        "price": "70000",
        "reduceOnly": false,
        "side": "SELL",
        "positionSide": "BOTH",
        "status": "FILLED",
        "stopPrice": "0",
        "closePosition": false,
        "symbol": "BTCUSDT",
        "time": 1718000000000,
        "timeInForce": "GTC",
        "type": "LIMIT",
        "updateTime": 1718000123456,
        "workingType": "CONTRACT_PRICE",
        "priceProtect": false
    }"#;

    #[test]
    fn test_parse_order_report() {
        let order: FuturesOrder = serde_json::from_str(QUERY_RESPONSE).unwrap();
        let report = order.into_report().unwrap();

        assert_eq!(report.exchange_order_id, "4056123987");
        assert_eq!(report.status, OrderStatus::Filled);
        assert_eq!(report.side, Side::Sell);
        assert_eq!(report.order_type, OrderType::Limit);
        assert_eq!(report.filled_quantity, dec!(0.010));
        assert_eq!(report.avg_price, Some(dec!(70000.00)));
        assert_eq!(report.stop_price, None);
        assert_eq!(
            report.updated_at.map(|t| t.timestamp_millis()),
            Some(1718000123456)
        );
    }

    #[test]
    fn test_unknown_status_is_decode_error() {
        let json = QUERY_RESPONSE.replace("\"FILLED\"", "\"NEW_INSURANCE\"");
        let order: FuturesOrder = serde_json::from_str(&json).unwrap();
        assert!(matches!(order.into_report(), Err(GatewayError::Decode(_))));
    }

    #[test]
    fn test_stop_market_params_omit_time_in_force() {
        let request = OrderRequest::stop_market("BTCUSDT", Side::Sell, dec!(0.010), dec!(65000))
            .with_client_order_id("sl-1")
            .with_reduce_only(true);
        let params = NewOrderParams::from_request(&request);

        assert_eq!(
            params.pairs(),
            &[
                ("symbol", "BTCUSDT".to_string()),
                ("side", "SELL".to_string()),
                ("type", "STOP_MARKET".to_string()),
                ("quantity", "0.01".to_string()),
                ("stopPrice", "65000".to_string()),
                ("reduceOnly", "true".to_string()),
                ("newClientOrderId", "sl-1".to_string()),
            ]
        );
    }

    #[test]
    fn test_limit_params_carry_time_in_force() {
        let request = OrderRequest::limit("BTCUSDT", Side::Sell, dec!(0.01), dec!(70000));
        let params = NewOrderParams::from_request(&request);
        assert!(params.pairs().contains(&("timeInForce", "GTC".to_string())));
        assert!(params.pairs().contains(&("price", "70000".to_string())));
    }
}
