use oco_core::{Price, Quantity, Side, Symbol, ValidationError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A request to protect an open position with a take-profit/stop-loss pair
///
/// `side` is the closing side: `SELL` protects a long, `BUY` protects a short.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcoRequest {
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: Quantity,
    pub take_profit: Price,
    pub stop_loss: Price,
    /// Entry or mark price the two levels must bracket, when known
    pub reference_price: Option<Price>,
}

impl OcoRequest {
    pub fn new(
        symbol: impl Into<Symbol>,
        side: Side,
        quantity: Quantity,
        take_profit: Price,
        stop_loss: Price,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            take_profit,
            stop_loss,
            reference_price: None,
        }
    }

    pub fn with_reference_price(mut self, price: Price) -> Self {
        self.reference_price = Some(price);
        self
    }

    /// Check the request before anything reaches the exchange
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.symbol.trim().is_empty() {
            return Err(ValidationError::EmptySymbol);
        }
        if self.quantity <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveQuantity(self.quantity));
        }
        for (field, value) in [
            ("take-profit price", self.take_profit),
            ("stop-loss price", self.stop_loss),
        ] {
            if value <= Decimal::ZERO {
                return Err(ValidationError::NonPositivePrice { field, value });
            }
        }
        if let Some(reference) = self.reference_price {
            if reference <= Decimal::ZERO {
                return Err(ValidationError::NonPositivePrice {
                    field: "reference price",
                    value: reference,
                });
            }
        }

        if self.take_profit == self.stop_loss {
            return Err(ValidationError::InconsistentPrices(format!(
                "take-profit and stop-loss are both {}",
                self.take_profit
            )));
        }

        let (tp, sl) = (self.take_profit, self.stop_loss);
        match self.side {
            Side::Sell if tp < sl => {
                return Err(ValidationError::InconsistentPrices(format!(
                    "closing SELL needs take-profit above stop-loss, got {tp} < {sl}"
                )));
            }
            Side::Buy if tp > sl => {
                return Err(ValidationError::InconsistentPrices(format!(
                    "closing BUY needs take-profit below stop-loss, got {tp} > {sl}"
                )));
            }
            _ => {}
        }

        if let Some(reference) = self.reference_price {
            let bracketed = match self.side {
                Side::Sell => tp > reference && reference > sl,
                Side::Buy => tp < reference && reference < sl,
            };
            if !bracketed {
                return Err(ValidationError::InconsistentPrices(format!(
                    "reference price {reference} is not between take-profit {tp} and stop-loss {sl}"
                )));
            }
        }
        Ok(())
    }
}
