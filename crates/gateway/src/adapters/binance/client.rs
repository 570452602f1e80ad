use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use oco_core::{AssetBalance, OrderRequest, PositionSnapshot, Price};
use oco_ports::{CancelAck, ExchangeGateway, GatewayError, GatewayResult, OrderAck, OrderReport};
use reqwest::{Client, Method, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::config::GatewayConfig;
use super::signing::sign_query;
use crate::error::RestError;
use crate::messages::{ApiErrorBody, BalanceEntry, FuturesOrder, NewOrderParams, PositionRisk, TickerPrice};

type Params = Vec<(&'static str, String)>;

/// REST client for USDⓈ-M futures
///
/// Infrastructure component - handles HTTP communication and request
/// signing. Every signed call carries `timestamp`, `recvWindow` and an
/// HMAC-SHA256 `signature` over the exact query string sent.
#[derive(Clone)]
pub struct BinanceFuturesClient {
    client: Client,
    config: GatewayConfig,
}

impl BinanceFuturesClient {
    pub fn new(config: GatewayConfig) -> Result<Self, RestError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;

        if config.is_testnet() {
            info!("Futures client configured for TESTNET at {}", config.base_url);
        } else {
            warn!(
                "Futures client configured for LIVE trading at {} - use with caution",
                config.base_url
            );
        }

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Build the signed query string for `params`
    fn signed_query(&self, params: Params) -> Result<String, RestError> {
        if !self.config.has_credentials() {
            return Err(RestError::Credentials("api key and secret"));
        }

        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in &params {
            serializer.append_pair(key, value);
        }
        serializer.append_pair("recvWindow", &self.config.recv_window_ms.to_string());
        serializer.append_pair("timestamp", &Utc::now().timestamp_millis().to_string());
        let query = serializer.finish();

        let signature = sign_query(&self.config.api_secret, &query)?;
        Ok(format!("{query}&signature={signature}"))
    }

    async fn signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: Params,
    ) -> Result<T, RestError> {
        let query = self.signed_query(params)?;
        let url = format!("{}{}?{}", self.config.base_url, path, query);
        debug!("{} {}", method, path);

        let resp = self
            .client
            .request(method, &url)
            .header("X-MBX-APIKEY", &self.config.api_key)
            .send()
            .await?;

        self.handle_response(resp).await
    }

    async fn public_get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: Params,
    ) -> Result<T, RestError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}{}", self.config.base_url, path),
            params.iter().map(|(k, v)| (*k, v.as_str())),
        )?;
        debug!("GET {}", path);

        let resp = self.client.get(url).send().await?;
        self.handle_response(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, RestError> {
        let status = resp.status();

        if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(RestError::RateLimited {
                status: status.as_u16(),
                retry_after,
            });
        }

        let text = resp.text().await?;

        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<ApiErrorBody>(&text) {
                return Err(RestError::Api {
                    status: status.as_u16(),
                    code: err.code,
                    msg: err.msg,
                });
            }
            return Err(RestError::Api {
                status: status.as_u16(),
                code: 0,
                msg: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| RestError::Parse(e.to_string()))
    }
}

#[async_trait]
impl ExchangeGateway for BinanceFuturesClient {
    async fn ping(&self) -> GatewayResult<()> {
        let _: serde_json::Value = self.public_get("/fapi/v1/ping", Vec::new()).await?;
        info!("Successfully connected to futures API");
        Ok(())
    }

    async fn submit_order(&self, request: &OrderRequest) -> GatewayResult<OrderAck> {
        info!(
            "Placing {} {} order: {} {}",
            request.order_type.as_str(),
            request.side,
            request.quantity,
            request.symbol
        );
        let params = NewOrderParams::from_request(request).into_pairs();
        let order: FuturesOrder = self.signed(Method::POST, "/fapi/v1/order", params).await?;
        let ack = order.into_ack()?;
        info!("Order placed: orderId={}", ack.exchange_order_id);
        Ok(ack)
    }

    async fn get_order_status(
        &self,
        symbol: &str,
        exchange_order_id: &str,
    ) -> GatewayResult<OrderReport> {
        let params = vec![
            ("symbol", symbol.to_string()),
            ("orderId", exchange_order_id.to_string()),
        ];
        let order: FuturesOrder = self.signed(Method::GET, "/fapi/v1/order", params).await?;
        order.into_report()
    }

    async fn find_order_by_client_id(
        &self,
        symbol: &str,
        client_order_id: &str,
    ) -> GatewayResult<Option<OrderReport>> {
        let params = vec![
            ("symbol", symbol.to_string()),
            ("origClientOrderId", client_order_id.to_string()),
        ];
        match self
            .signed::<FuturesOrder>(Method::GET, "/fapi/v1/order", params)
            .await
            .map_err(GatewayError::from)
        {
            Ok(order) => order.into_report().map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn cancel_order(
        &self,
        symbol: &str,
        exchange_order_id: &str,
    ) -> GatewayResult<CancelAck> {
        let params = vec![
            ("symbol", symbol.to_string()),
            ("orderId", exchange_order_id.to_string()),
        ];
        let order: FuturesOrder = self.signed(Method::DELETE, "/fapi/v1/order", params).await?;
        info!("Order {} cancel accepted", exchange_order_id);
        order.into_cancel_ack()
    }

    async fn get_open_orders(&self, symbol: Option<&str>) -> GatewayResult<Vec<OrderReport>> {
        let params = symbol
            .map(|s| vec![("symbol", s.to_string())])
            .unwrap_or_default();
        let orders: Vec<FuturesOrder> =
            self.signed(Method::GET, "/fapi/v1/openOrders", params).await?;
        info!("Retrieved {} open orders", orders.len());
        orders.into_iter().map(FuturesOrder::into_report).collect()
    }

    async fn get_position(&self, symbol: &str) -> GatewayResult<PositionSnapshot> {
        let params = vec![("symbol", symbol.to_string())];
        let risks: Vec<PositionRisk> =
            self.signed(Method::GET, "/fapi/v2/positionRisk", params).await?;

        Ok(risks
            .into_iter()
            .find(|r| r.symbol == symbol)
            .map(PositionSnapshot::from)
            .unwrap_or_else(|| PositionSnapshot {
                symbol: symbol.to_string(),
                quantity: Decimal::ZERO,
                entry_price: Decimal::ZERO,
                unrealized_pnl: Decimal::ZERO,
                leverage: None,
            }))
    }

    async fn get_positions(&self) -> GatewayResult<Vec<PositionSnapshot>> {
        let risks: Vec<PositionRisk> = self
            .signed(Method::GET, "/fapi/v2/positionRisk", Vec::new())
            .await?;
        let active: Vec<PositionSnapshot> = risks
            .into_iter()
            .map(PositionSnapshot::from)
            .filter(|p| !p.is_flat())
            .collect();
        info!("Retrieved {} active positions", active.len());
        Ok(active)
    }

    async fn get_balance(&self) -> GatewayResult<Vec<AssetBalance>> {
        let entries: Vec<BalanceEntry> = self
            .signed(Method::GET, "/fapi/v2/balance", Vec::new())
            .await?;
        info!("Retrieved account balance");
        Ok(entries.into_iter().map(AssetBalance::from).collect())
    }

    async fn get_symbol_price(&self, symbol: &str) -> GatewayResult<Price> {
        let ticker: TickerPrice = self
            .public_get("/fapi/v1/ticker/price", vec![("symbol", symbol.to_string())])
            .await?;
        Ok(ticker.price)
    }

    fn name(&self) -> &str {
        "BinanceFutures"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_query_layout() {
        let client =
            BinanceFuturesClient::new(GatewayConfig::testnet("key", "secret")).unwrap();
        let query = client
            .signed_query(vec![
                ("symbol", "BTCUSDT".to_string()),
                ("orderId", "42".to_string()),
            ])
            .unwrap();

        assert!(query.starts_with("symbol=BTCUSDT&orderId=42&recvWindow=5000&timestamp="));
        let (unsigned, signature) = query.rsplit_once("&signature=").unwrap();
        assert_eq!(signature, sign_query("secret", unsigned).unwrap());
    }

    #[test]
    fn test_signed_query_requires_credentials() {
        let client = BinanceFuturesClient::new(GatewayConfig::default()).unwrap();
        let err = client.signed_query(Vec::new()).unwrap_err();
        assert!(matches!(err, RestError::Credentials(_)));
    }
}
