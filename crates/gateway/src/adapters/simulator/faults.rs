//! Fault injection rules for the simulated venue

use oco_core::OrderType;
use oco_ports::GatewayError;

/// Gateway operation a fault applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimOperation {
    Submit,
    Status,
    FindByClientId,
    Cancel,
}

/// What goes wrong when a rule fires
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimFault {
    /// The request never reached the venue
    Timeout,
    /// The venue accepted the order but the response was lost (submit only)
    TimeoutAfterAccept,
    /// The call never returns; exercises caller-side timeouts
    Hang,
    Network,
    RateLimited,
    ServerError,
    /// Terminal business rejection with the given message
    Reject(String),
    AuthFailure,
    /// The order fills an instant before the cancel is processed (cancel only)
    FillBeforeCancel,
}

impl SimFault {
    /// The error surfaced to the caller, if the fault produces one directly
    pub(crate) fn to_error(&self) -> Option<GatewayError> {
        match self {
            SimFault::Timeout | SimFault::TimeoutAfterAccept => Some(GatewayError::Timeout),
            SimFault::Network => Some(GatewayError::Network("connection reset".to_string())),
            SimFault::RateLimited => Some(GatewayError::RateLimited { retry_after: None }),
            SimFault::ServerError => Some(GatewayError::Server {
                status: 503,
                message: "service unavailable".to_string(),
            }),
            SimFault::Reject(msg) => Some(GatewayError::Rejected {
                code: -2010,
                message: msg.clone(),
            }),
            SimFault::AuthFailure => Some(GatewayError::Auth("invalid api key".to_string())),
            SimFault::Hang | SimFault::FillBeforeCancel => None,
        }
    }
}

/// One scripted fault: fires on matching calls until its budget is spent
#[derive(Debug, Clone)]
pub struct FaultRule {
    pub operation: SimOperation,
    /// Restrict to orders of this type; `None` matches every order
    pub order_type: Option<OrderType>,
    pub fault: SimFault,
    /// Remaining firings; `None` fires forever
    pub remaining: Option<usize>,
}

impl FaultRule {
    pub fn new(operation: SimOperation, fault: SimFault) -> Self {
        Self {
            operation,
            order_type: None,
            fault,
            remaining: None,
        }
    }

    pub fn for_order_type(mut self, order_type: OrderType) -> Self {
        self.order_type = Some(order_type);
        self
    }

    pub fn times(mut self, count: usize) -> Self {
        self.remaining = Some(count);
        self
    }

    pub(crate) fn matches(&self, operation: SimOperation, order_type: Option<OrderType>) -> bool {
        if self.operation != operation || self.remaining == Some(0) {
            return false;
        }
        match (self.order_type, order_type) {
            (None, _) => true,
            (Some(wanted), Some(actual)) => wanted == actual,
            (Some(_), None) => false,
        }
    }

    /// Consume one firing
    pub(crate) fn fire(&mut self) -> SimFault {
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
        }
        self.fault.clone()
    }
}
