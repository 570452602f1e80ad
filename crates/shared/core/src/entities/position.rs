use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::values::Symbol;

/// Snapshot of an open futures position as reported by the exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub symbol: Symbol,
    /// Signed position size: positive for long, negative for short
    pub quantity: Decimal,
    /// Average entry price
    pub entry_price: Decimal,
    /// Unrealized profit/loss in the margin asset
    pub unrealized_pnl: Decimal,
    /// Leverage, when the venue reports it
    pub leverage: Option<u32>,
}

impl PositionSnapshot {
    pub fn is_flat(&self) -> bool {
        self.quantity.is_zero()
    }

    /// Side of the order that would close this position, if any
    pub fn closing_side(&self) -> Option<crate::Side> {
        if self.quantity > Decimal::ZERO {
            Some(crate::Side::Sell)
        } else if self.quantity < Decimal::ZERO {
            Some(crate::Side::Buy)
        } else {
            None
        }
    }
}
