use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trading signal produced by the crossover engine
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

/// Order direction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    /// Exchange wire name ("BUY" / "SELL")
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "BUY",
            TradeSide::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A market order the tracker wants placed
///
/// `quantity` is already truncated to the configured precision.
/// `reference_price` is the close the quantity was sized against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderIntent {
    pub symbol: String,
    pub side: TradeSide,
    pub quantity: f64,
    pub reference_price: f64,
}

/// Gateway answer for a submitted order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderResult {
    pub order_id: Uuid,
    pub success: bool,
    pub filled_quantity: f64,
    pub filled_price: f64,
    pub timestamp: DateTime<Utc>,
}

impl OrderResult {
    pub fn filled(quantity: f64, price: f64) -> Self {
        Self {
            order_id: Uuid::new_v4(),
            success: true,
            filled_quantity: quantity,
            filled_price: price,
            timestamp: Utc::now(),
        }
    }

    pub fn failed() -> Self {
        Self {
            order_id: Uuid::new_v4(),
            success: false,
            filled_quantity: 0.0,
            filled_price: 0.0,
            timestamp: Utc::now(),
        }
    }
}

/// Free balances of the traded pair
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Balances {
    /// Quote asset (e.g. USDT)
    pub quote: f64,
    /// Base asset (e.g. BTC)
    pub base: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_side_wire_names() {
        assert_eq!(TradeSide::Buy.to_string(), "BUY");
        assert_eq!(TradeSide::Sell.as_str(), "SELL");
    }

    #[test]
    fn test_order_result_constructors() {
        let fill = OrderResult::filled(0.002, 50000.0);
        assert!(fill.success);
        assert_eq!(fill.filled_quantity, 0.002);

        let failed = OrderResult::failed();
        assert!(!failed.success);
        assert_eq!(failed.filled_quantity, 0.0);
        assert_ne!(fill.order_id, failed.order_id);
    }
}
