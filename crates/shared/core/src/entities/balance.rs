use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Futures wallet balance for one asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetBalance {
    pub asset: String,
    /// Total wallet balance
    pub balance: Decimal,
    /// Amount available for new orders
    pub available: Decimal,
}
