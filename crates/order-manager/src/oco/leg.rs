//! One side of an OCO pair and its state machine

use log::warn;
use oco_core::{
    ExchangeOrderId, OrderRequest, OrderStatus, OrderType, Price, Quantity, Side, Symbol,
    Timestamp,
};
use oco_ports::{CancelAck, OrderReport};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Which protective role a leg plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LegKind {
    TakeProfit,
    StopLoss,
}

impl LegKind {
    pub fn sibling(&self) -> LegKind {
        match self {
            LegKind::TakeProfit => LegKind::StopLoss,
            LegKind::StopLoss => LegKind::TakeProfit,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LegKind::TakeProfit => "take-profit",
            LegKind::StopLoss => "stop-loss",
        }
    }
}

impl fmt::Display for LegKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a single leg
///
/// ```text
/// Pending ──► Open ──► Filled | Cancelled | Rejected
///    │                    ▲
///    └────────────────────┘ (rejected or filled on arrival)
/// ```
/// `Unknown` marks a leg whose state could not be established; any definitive
/// observation moves it on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegStatus {
    Pending,
    Open,
    Filled,
    Cancelled,
    Rejected,
    Unknown,
}

impl LegStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LegStatus::Filled | LegStatus::Cancelled | LegStatus::Rejected
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LegStatus::Pending => "PENDING",
            LegStatus::Open => "OPEN",
            LegStatus::Filled => "FILLED",
            LegStatus::Cancelled => "CANCELLED",
            LegStatus::Rejected => "REJECTED",
            LegStatus::Unknown => "UNKNOWN",
        }
    }
}

impl From<OrderStatus> for LegStatus {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::New | OrderStatus::PartiallyFilled => LegStatus::Open,
            OrderStatus::Filled => LegStatus::Filled,
            OrderStatus::Canceled | OrderStatus::Expired => LegStatus::Cancelled,
            OrderStatus::Rejected => LegStatus::Rejected,
        }
    }
}

impl fmt::Display for LegStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A timestamped view of a leg as reported by the exchange
#[derive(Debug, Clone, PartialEq)]
pub struct LegObservation {
    pub status: LegStatus,
    pub filled_quantity: Quantity,
    pub avg_price: Option<Price>,
    /// Exchange-side time of the last change, when reported
    pub exchange_updated_at: Option<Timestamp>,
    /// Local time the observation was received
    pub observed_at: Timestamp,
}

impl LegObservation {
    pub fn from_report(report: &OrderReport, observed_at: Timestamp) -> Self {
        Self {
            status: report.status.into(),
            filled_quantity: report.filled_quantity,
            avg_price: report.avg_price,
            exchange_updated_at: report.updated_at,
            observed_at,
        }
    }

    pub fn from_cancel_ack(ack: &CancelAck, observed_at: Timestamp) -> Self {
        Self {
            status: ack.status.into(),
            filled_quantity: ack.filled_quantity,
            avg_price: None,
            exchange_updated_at: None,
            observed_at,
        }
    }

    /// The order was never seen on the exchange
    pub fn absent(observed_at: Timestamp) -> Self {
        Self {
            status: LegStatus::Cancelled,
            filled_quantity: Decimal::ZERO,
            avg_price: None,
            exchange_updated_at: None,
            observed_at,
        }
    }
}

/// How a leg reacted to an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Changed,
    Unchanged,
    /// Older than what the leg already saw
    Stale,
    /// The leg is terminal; observation ignored
    Frozen,
}

/// One order of an OCO pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLeg {
    pub local_id: Uuid,
    pub kind: LegKind,
    /// Sent as the exchange client order id
    pub client_order_id: String,
    /// Assigned on acceptance, never changes afterwards
    pub exchange_order_id: Option<ExchangeOrderId>,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Quantity,
    pub price: Option<Price>,
    pub stop_price: Option<Price>,
    pub reduce_only: bool,
    pub status: LegStatus,
    pub filled_quantity: Quantity,
    pub avg_price: Option<Price>,
    pub exchange_updated_at: Option<Timestamp>,
    pub last_observed_at: Option<Timestamp>,
    /// Set once this process asked the exchange to cancel the leg
    pub cancel_requested: bool,
}

impl OrderLeg {
    #[allow(clippy::too_many_arguments)]
    fn new(
        kind: LegKind,
        symbol: &str,
        side: Side,
        quantity: Quantity,
        order_type: OrderType,
        price: Option<Price>,
        stop_price: Option<Price>,
        reduce_only: bool,
    ) -> Self {
        let local_id = Uuid::new_v4();
        Self {
            local_id,
            kind,
            client_order_id: local_id.simple().to_string(),
            exchange_order_id: None,
            symbol: symbol.to_string(),
            side,
            order_type,
            quantity,
            price,
            stop_price,
            reduce_only,
            status: LegStatus::Pending,
            filled_quantity: Decimal::ZERO,
            avg_price: None,
            exchange_updated_at: None,
            last_observed_at: None,
            cancel_requested: false,
        }
    }

    /// Take-profit leg: GTC limit at the target price
    pub fn take_profit(
        symbol: &str,
        side: Side,
        quantity: Quantity,
        price: Price,
        reduce_only: bool,
    ) -> Self {
        Self::new(
            LegKind::TakeProfit,
            symbol,
            side,
            quantity,
            OrderType::Limit,
            Some(price),
            None,
            reduce_only,
        )
    }

    /// Stop-loss leg: stop-market triggered at the stop price
    pub fn stop_loss(
        symbol: &str,
        side: Side,
        quantity: Quantity,
        stop_price: Price,
        reduce_only: bool,
    ) -> Self {
        Self::new(
            LegKind::StopLoss,
            symbol,
            side,
            quantity,
            OrderType::StopMarket,
            None,
            Some(stop_price),
            reduce_only,
        )
    }

    /// The venue request for this leg
    pub fn to_request(&self) -> OrderRequest {
        let request = match self.order_type {
            OrderType::Limit => OrderRequest::limit(
                self.symbol.clone(),
                self.side,
                self.quantity,
                self.price.unwrap_or_default(),
            ),
            _ => OrderRequest::stop_market(
                self.symbol.clone(),
                self.side,
                self.quantity,
                self.stop_price.unwrap_or_default(),
            ),
        };
        request
            .with_client_order_id(self.client_order_id.clone())
            .with_reduce_only(self.reduce_only)
    }

    /// Trigger or limit price, whichever defines the leg
    pub fn trigger_price(&self) -> Option<Price> {
        self.stop_price.or(self.price)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Known on the exchange and not yet terminal
    pub fn is_live(&self) -> bool {
        self.exchange_order_id.is_some() && !self.is_terminal()
    }

    /// Record the exchange id; a second, different id is an invariant breach
    pub fn assign_exchange_id(&mut self, id: &str) -> Result<()> {
        match &self.exchange_order_id {
            None => {
                self.exchange_order_id = Some(id.to_string());
                Ok(())
            }
            Some(existing) if existing == id => Ok(()),
            Some(existing) => Err(Error::InvariantViolation(format!(
                "{} leg {} already has exchange id {}, refusing {}",
                self.kind, self.local_id, existing, id
            ))),
        }
    }

    /// Fold an exchange observation into the leg
    ///
    /// Observations older than the last one applied are discarded, and a
    /// terminal leg never changes again.
    pub fn apply_observation(&mut self, observation: &LegObservation) -> Applied {
        if let Some(last) = self.last_observed_at {
            if observation.observed_at < last {
                return Applied::Stale;
            }
        }
        if self.is_terminal() {
            if observation.status != self.status {
                warn!(
                    "{} leg {} is {} but exchange now reports {}; keeping {}",
                    self.kind, self.local_id, self.status, observation.status, self.status
                );
            }
            return Applied::Frozen;
        }

        self.last_observed_at = Some(observation.observed_at);
        let changed = self.status != observation.status
            || self.filled_quantity != observation.filled_quantity;

        self.status = observation.status;
        self.filled_quantity = observation.filled_quantity;
        if observation.avg_price.is_some() {
            self.avg_price = observation.avg_price;
        }
        if observation.exchange_updated_at.is_some() {
            self.exchange_updated_at = observation.exchange_updated_at;
        }

        if changed {
            Applied::Changed
        } else {
            Applied::Unchanged
        }
    }

    /// Mark the leg as undetermined without touching terminal state
    pub fn mark_unknown(&mut self) {
        if !self.is_terminal() && self.status == LegStatus::Pending {
            self.status = LegStatus::Unknown;
        }
    }
}
