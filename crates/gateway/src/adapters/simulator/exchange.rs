//! In-memory futures venue

use async_trait::async_trait;
use chrono::{Duration, Utc};
use log::{debug, info};
use oco_core::{
    AssetBalance, OrderRequest, OrderStatus, OrderType, PositionSnapshot, Price, Side, Timestamp,
};
use oco_ports::{CancelAck, ExchangeGateway, GatewayError, GatewayResult, OrderAck, OrderReport};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;

use super::faults::{FaultRule, SimFault, SimOperation};

#[derive(Debug, Clone)]
struct SimOrder {
    report: OrderReport,
    /// Status queries left before the order becomes visible
    hidden_polls: usize,
}

#[derive(Debug)]
struct SimState {
    orders: HashMap<String, SimOrder>,
    by_client_id: HashMap<String, String>,
    next_order_id: u64,
    faults: Vec<FaultRule>,
    prices: HashMap<String, Price>,
    positions: HashMap<String, PositionSnapshot>,
    balances: Vec<AssetBalance>,
    visibility_lag: usize,
    calls: HashMap<SimOperation, usize>,
    /// Logical event counter used to stamp exchange-side update times
    sequence: i64,
}

impl SimState {
    fn stamp(&mut self, epoch: Timestamp) -> Timestamp {
        self.sequence += 1;
        epoch + Duration::milliseconds(self.sequence)
    }

    fn take_fault(
        &mut self,
        operation: SimOperation,
        order_type: Option<OrderType>,
    ) -> Option<SimFault> {
        self.faults
            .iter_mut()
            .find(|rule| rule.matches(operation, order_type))
            .map(FaultRule::fire)
    }

    fn count(&mut self, operation: SimOperation) {
        *self.calls.entry(operation).or_insert(0) += 1;
    }

    fn fill(&mut self, id: &str, fill_price: Price, epoch: Timestamp) {
        let stamp = self.stamp(epoch);
        let Some(order) = self.orders.get_mut(id) else {
            return;
        };
        if order.report.status.is_terminal() {
            return;
        }
        let remaining = order.report.quantity - order.report.filled_quantity;
        order.report.filled_quantity = order.report.quantity;
        order.report.avg_price = Some(fill_price);
        order.report.status = OrderStatus::Filled;
        order.report.updated_at = Some(stamp);

        let signed = match order.report.side {
            Side::Buy => remaining,
            Side::Sell => -remaining,
        };
        let symbol = order.report.symbol.clone();
        info!("SIM fill: order {} {} {} @ {}", id, order.report.side, remaining, fill_price);
        self.apply_position_change(&symbol, signed, fill_price);
    }

    fn apply_position_change(&mut self, symbol: &str, signed_qty: Decimal, price: Price) {
        let position = self
            .positions
            .entry(symbol.to_string())
            .or_insert_with(|| flat_position(symbol));
        let new_qty = position.quantity + signed_qty;
        let opening = position.quantity.is_zero()
            || (position.quantity.is_sign_positive() == signed_qty.is_sign_positive());

        if new_qty.is_zero() {
            position.entry_price = Decimal::ZERO;
        } else if opening {
            let notional = position.quantity.abs() * position.entry_price + signed_qty.abs() * price;
            position.entry_price = notional / new_qty.abs();
        } else if new_qty.is_sign_positive() != position.quantity.is_sign_positive() {
            // Flipped through zero: the remainder opens at the fill price
            position.entry_price = price;
        }
        position.quantity = new_qty;
    }

    fn set_terminal(&mut self, id: &str, status: OrderStatus, epoch: Timestamp) -> bool {
        let stamp = self.stamp(epoch);
        match self.orders.get_mut(id) {
            Some(order) if !order.report.status.is_terminal() => {
                order.report.status = status;
                order.report.updated_at = Some(stamp);
                true
            }
            _ => false,
        }
    }

    /// Fill every resting order on `symbol` that `price` makes executable
    fn cross(&mut self, symbol: &str, price: Price, epoch: Timestamp) {
        let triggered: Vec<(String, Price)> = self
            .orders
            .iter()
            .filter(|(_, o)| o.report.symbol == symbol && o.report.status.is_active())
            .filter_map(|(id, o)| fill_price_at(&o.report, price).map(|p| (id.clone(), p)))
            .collect();

        for (id, fill_price) in triggered {
            self.fill(&id, fill_price, epoch);
        }
    }
}

/// Price at which `order` executes when the market trades at `price`
fn fill_price_at(order: &OrderReport, price: Price) -> Option<Price> {
    let stop_hit = |stop: Price| match order.side {
        Side::Sell => price <= stop,
        Side::Buy => price >= stop,
    };
    let limit_hit = |limit: Price| match order.side {
        Side::Sell => price >= limit,
        Side::Buy => price <= limit,
    };

    match order.order_type {
        OrderType::Market => Some(price),
        OrderType::Limit => order.price.filter(|l| limit_hit(*l)),
        OrderType::StopMarket => order.stop_price.filter(|s| stop_hit(*s)).map(|_| price),
        OrderType::StopLimit => match (order.stop_price, order.price) {
            (Some(stop), Some(limit)) if stop_hit(stop) => Some(limit),
            _ => None,
        },
    }
}

fn flat_position(symbol: &str) -> PositionSnapshot {
    PositionSnapshot {
        symbol: symbol.to_string(),
        quantity: Decimal::ZERO,
        entry_price: Decimal::ZERO,
        unrealized_pnl: Decimal::ZERO,
        leverage: Some(20),
    }
}

fn unknown_order() -> GatewayError {
    GatewayError::OrderNotFound("Unknown order sent.".to_string())
}

/// Simulated futures exchange
///
/// Thread-safe and cheap to share behind an `Arc`. Script helpers
/// ([`set_price`](Self::set_price), [`force_fill`](Self::force_fill),
/// [`inject`](Self::inject), ...) drive the venue from tests or a
/// `--simulate` session.
pub struct SimulatedExchange {
    state: Mutex<SimState>,
    epoch: Timestamp,
}

impl SimulatedExchange {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState {
                orders: HashMap::new(),
                by_client_id: HashMap::new(),
                next_order_id: 1_000,
                faults: Vec::new(),
                prices: HashMap::new(),
                positions: HashMap::new(),
                balances: vec![AssetBalance {
                    asset: "USDT".to_string(),
                    balance: Decimal::from(10_000),
                    available: Decimal::from(10_000),
                }],
                visibility_lag: 0,
                calls: HashMap::new(),
                sequence: 0,
            }),
            epoch: Utc::now(),
        }
    }

    /// Builder: start with a last-traded price for `symbol`
    pub fn with_price(self, symbol: &str, price: Price) -> Self {
        self.state.lock().prices.insert(symbol.to_string(), price);
        self
    }

    /// Builder: start with an open position
    pub fn with_position(self, symbol: &str, quantity: Decimal, entry_price: Price) -> Self {
        self.state.lock().positions.insert(
            symbol.to_string(),
            PositionSnapshot {
                symbol: symbol.to_string(),
                quantity,
                entry_price,
                unrealized_pnl: Decimal::ZERO,
                leverage: Some(20),
            },
        );
        self
    }

    /// New orders stay invisible to status queries for `polls` queries
    pub fn set_visibility_lag(&self, polls: usize) {
        self.state.lock().visibility_lag = polls;
    }

    /// Add a scripted fault
    pub fn inject(&self, rule: FaultRule) {
        debug!("SIM fault injected: {:?}", rule);
        self.state.lock().faults.push(rule);
    }

    pub fn clear_faults(&self) {
        self.state.lock().faults.clear();
    }

    /// Move the market; resting orders that become executable fill
    pub fn set_price(&self, symbol: &str, price: Price) {
        let mut state = self.state.lock();
        state.prices.insert(symbol.to_string(), price);
        state.cross(symbol, price, self.epoch);
    }

    /// Fill an order regardless of price (at its limit/stop, else last price)
    pub fn force_fill(&self, exchange_order_id: &str) {
        let mut state = self.state.lock();
        let Some(order) = state.orders.get(exchange_order_id) else {
            return;
        };
        let last = state.prices.get(&order.report.symbol).copied();
        let fill_price = order
            .report
            .price
            .or(order.report.stop_price)
            .or(last)
            .unwrap_or(Decimal::ZERO);
        state.fill(exchange_order_id, fill_price, self.epoch);
    }

    /// Cancel an order outside the client (e.g. from the exchange UI)
    pub fn force_cancel(&self, exchange_order_id: &str) -> bool {
        self.state
            .lock()
            .set_terminal(exchange_order_id, OrderStatus::Canceled, self.epoch)
    }

    /// Expire/reject an order outside the client
    pub fn force_reject(&self, exchange_order_id: &str) -> bool {
        self.state
            .lock()
            .set_terminal(exchange_order_id, OrderStatus::Rejected, self.epoch)
    }

    /// Exchange id of the order submitted with `client_order_id`
    pub fn order_id_for_client(&self, client_order_id: &str) -> Option<String> {
        self.state.lock().by_client_id.get(client_order_id).cloned()
    }

    /// Current exchange-side view of an order, bypassing faults and lag
    pub fn order(&self, exchange_order_id: &str) -> Option<OrderReport> {
        self.state
            .lock()
            .orders
            .get(exchange_order_id)
            .map(|o| o.report.clone())
    }

    /// Every order the venue knows about
    pub fn orders(&self) -> Vec<OrderReport> {
        let mut orders: Vec<OrderReport> = self
            .state
            .lock()
            .orders
            .values()
            .map(|o| o.report.clone())
            .collect();
        orders.sort_by(|a, b| a.exchange_order_id.cmp(&b.exchange_order_id));
        orders
    }

    /// Orders still resting on the book
    pub fn live_orders(&self) -> Vec<OrderReport> {
        self.orders()
            .into_iter()
            .filter(|o| o.status.is_active())
            .collect()
    }

    /// Number of calls received for `operation` (including faulted ones)
    pub fn calls(&self, operation: SimOperation) -> usize {
        self.state.lock().calls.get(&operation).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().calls.values().sum()
    }

    fn accept(&self, state: &mut SimState, request: &OrderRequest) -> OrderAck {
        state.next_order_id += 1;
        let id = state.next_order_id.to_string();
        let stamp = state.stamp(self.epoch);
        let report = OrderReport {
            exchange_order_id: id.clone(),
            client_order_id: request.client_order_id.clone(),
            symbol: request.symbol.clone(),
            side: request.side,
            order_type: request.order_type,
            status: OrderStatus::New,
            quantity: request.quantity,
            filled_quantity: Decimal::ZERO,
            avg_price: None,
            price: request.price,
            stop_price: request.stop_price,
            updated_at: Some(stamp),
        };

        if let Some(client_id) = &request.client_order_id {
            state.by_client_id.insert(client_id.clone(), id.clone());
        }
        let hidden_polls = state.visibility_lag;
        state.orders.insert(
            id.clone(),
            SimOrder {
                report,
                hidden_polls,
            },
        );
        debug!(
            "SIM accepted {} {} {} {} as {}",
            request.order_type.as_str(),
            request.side,
            request.quantity,
            request.symbol,
            id
        );

        // Marketable on arrival
        if let Some(last) = state.prices.get(&request.symbol).copied() {
            let executable = state
                .orders
                .get(&id)
                .and_then(|o| fill_price_at(&o.report, last));
            if let Some(fill_price) = executable {
                state.fill(&id, fill_price, self.epoch);
            }
        }

        let status = state
            .orders
            .get(&id)
            .map(|o| o.report.status)
            .unwrap_or(OrderStatus::New);
        OrderAck {
            exchange_order_id: id,
            client_order_id: request.client_order_id.clone(),
            status,
        }
    }
}

impl Default for SimulatedExchange {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeGateway for SimulatedExchange {
    async fn ping(&self) -> GatewayResult<()> {
        Ok(())
    }

    async fn submit_order(&self, request: &OrderRequest) -> GatewayResult<OrderAck> {
        let fault = {
            let mut state = self.state.lock();
            state.count(SimOperation::Submit);

            if let Some(client_id) = &request.client_order_id {
                if state.by_client_id.contains_key(client_id) {
                    return Err(GatewayError::Rejected {
                        code: -4116,
                        message: "ClientOrderId is duplicated.".to_string(),
                    });
                }
            }

            match state.take_fault(SimOperation::Submit, Some(request.order_type)) {
                Some(SimFault::TimeoutAfterAccept) => {
                    self.accept(&mut state, request);
                    return Err(GatewayError::Timeout);
                }
                Some(fault) => Some(fault),
                None => {
                    if request.order_type == OrderType::Market
                        && !state.prices.contains_key(&request.symbol)
                    {
                        return Err(GatewayError::Rejected {
                            code: -1121,
                            message: "Invalid symbol.".to_string(),
                        });
                    }
                    return Ok(self.accept(&mut state, request));
                }
            }
        };

        match fault {
            Some(SimFault::Hang) => std::future::pending().await,
            Some(fault) => Err(fault.to_error().unwrap_or(GatewayError::Timeout)),
            None => Err(GatewayError::Timeout),
        }
    }

    async fn get_order_status(
        &self,
        _symbol: &str,
        exchange_order_id: &str,
    ) -> GatewayResult<OrderReport> {
        let fault = {
            let mut state = self.state.lock();
            state.count(SimOperation::Status);

            let order_type = state
                .orders
                .get(exchange_order_id)
                .map(|o| o.report.order_type);
            match state.take_fault(SimOperation::Status, order_type) {
                Some(fault) => fault,
                None => {
                    let order = state
                        .orders
                        .get_mut(exchange_order_id)
                        .ok_or_else(unknown_order)?;
                    if order.hidden_polls > 0 {
                        order.hidden_polls -= 1;
                        return Err(GatewayError::OrderNotFound(
                            "Order does not exist.".to_string(),
                        ));
                    }
                    return Ok(order.report.clone());
                }
            }
        };

        match fault {
            SimFault::Hang => std::future::pending().await,
            other => Err(other.to_error().unwrap_or(GatewayError::Timeout)),
        }
    }

    async fn find_order_by_client_id(
        &self,
        _symbol: &str,
        client_order_id: &str,
    ) -> GatewayResult<Option<OrderReport>> {
        let fault = {
            let mut state = self.state.lock();
            state.count(SimOperation::FindByClientId);

            let id = state.by_client_id.get(client_order_id).cloned();
            let order_type = id
                .as_ref()
                .and_then(|id| state.orders.get(id))
                .map(|o| o.report.order_type);
            match state.take_fault(SimOperation::FindByClientId, order_type) {
                Some(fault) => fault,
                None => {
                    return Ok(id
                        .and_then(|id| state.orders.get(&id))
                        .map(|o| o.report.clone()));
                }
            }
        };

        match fault {
            SimFault::Hang => std::future::pending().await,
            other => Err(other.to_error().unwrap_or(GatewayError::Timeout)),
        }
    }

    async fn cancel_order(
        &self,
        _symbol: &str,
        exchange_order_id: &str,
    ) -> GatewayResult<CancelAck> {
        let fault = {
            let mut state = self.state.lock();
            state.count(SimOperation::Cancel);

            let order_type = state
                .orders
                .get(exchange_order_id)
                .map(|o| o.report.order_type);
            match state.take_fault(SimOperation::Cancel, order_type) {
                Some(SimFault::FillBeforeCancel) => {
                    let fill_price = state.orders.get(exchange_order_id).and_then(|o| {
                        o.report
                            .price
                            .or(o.report.stop_price)
                            .or_else(|| state.prices.get(&o.report.symbol).copied())
                    });
                    state.fill(
                        exchange_order_id,
                        fill_price.unwrap_or(Decimal::ZERO),
                        self.epoch,
                    );
                    return Err(unknown_order());
                }
                Some(fault) => fault,
                None => {
                    if !state.set_terminal(exchange_order_id, OrderStatus::Canceled, self.epoch) {
                        return Err(unknown_order());
                    }
                    let order = state
                        .orders
                        .get(exchange_order_id)
                        .ok_or_else(unknown_order)?;
                    info!("SIM cancel: order {}", exchange_order_id);
                    return Ok(CancelAck {
                        exchange_order_id: exchange_order_id.to_string(),
                        status: order.report.status,
                        filled_quantity: order.report.filled_quantity,
                    });
                }
            }
        };

        match fault {
            SimFault::Hang => std::future::pending().await,
            other => Err(other.to_error().unwrap_or(GatewayError::Timeout)),
        }
    }

    async fn get_open_orders(&self, symbol: Option<&str>) -> GatewayResult<Vec<OrderReport>> {
        Ok(self
            .live_orders()
            .into_iter()
            .filter(|o| symbol.is_none_or(|s| o.symbol == s))
            .collect())
    }

    async fn get_position(&self, symbol: &str) -> GatewayResult<PositionSnapshot> {
        let state = self.state.lock();
        let mut position = state
            .positions
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| flat_position(symbol));
        if let Some(mark) = state.prices.get(symbol) {
            position.unrealized_pnl = (*mark - position.entry_price) * position.quantity;
        }
        Ok(position)
    }

    async fn get_positions(&self) -> GatewayResult<Vec<PositionSnapshot>> {
        let symbols: Vec<String> = self.state.lock().positions.keys().cloned().collect();
        let mut positions = Vec::new();
        for symbol in symbols {
            let position = self.get_position(&symbol).await?;
            if !position.is_flat() {
                positions.push(position);
            }
        }
        positions.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(positions)
    }

    async fn get_balance(&self) -> GatewayResult<Vec<AssetBalance>> {
        Ok(self.state.lock().balances.clone())
    }

    async fn get_symbol_price(&self, symbol: &str) -> GatewayResult<Price> {
        self.state
            .lock()
            .prices
            .get(symbol)
            .copied()
            .ok_or_else(|| GatewayError::Rejected {
                code: -1121,
                message: "Invalid symbol.".to_string(),
            })
    }

    fn name(&self) -> &str {
        "SimulatedExchange"
    }
}
