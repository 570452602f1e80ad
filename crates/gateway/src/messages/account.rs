//! Account and market message types

use oco_core::{AssetBalance, PositionSnapshot};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Entry of `GET /fapi/v2/balance`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceEntry {
    pub asset: String,
    pub balance: Decimal,
    pub available_balance: Decimal,
}

impl From<BalanceEntry> for AssetBalance {
    fn from(entry: BalanceEntry) -> Self {
        AssetBalance {
            asset: entry.asset,
            balance: entry.balance,
            available: entry.available_balance,
        }
    }
}

/// Entry of `GET /fapi/v2/positionRisk`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRisk {
    pub symbol: String,
    pub position_amt: Decimal,
    pub entry_price: Decimal,
    #[serde(rename = "unRealizedProfit")]
    pub unrealized_profit: Decimal,
    #[serde(default)]
    pub leverage: Option<String>,
}

impl From<PositionRisk> for PositionSnapshot {
    fn from(risk: PositionRisk) -> Self {
        PositionSnapshot {
            symbol: risk.symbol,
            quantity: risk.position_amt,
            entry_price: risk.entry_price,
            unrealized_pnl: risk.unrealized_profit,
            leverage: risk.leverage.and_then(|l| l.parse().ok()),
        }
    }
}

/// `GET /fapi/v1/ticker/price`
#[derive(Debug, Clone, Deserialize)]
pub struct TickerPrice {
    pub symbol: String,
    pub price: Decimal,
}
