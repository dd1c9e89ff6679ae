use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BotError;
use crate::Result;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PositionSide {
    Flat,
    Long,
}

/// The single position the bot can hold
///
/// Fields are private so the side/amount invariant holds: a flat position
/// has zero amount and zero entry price, a long one a positive amount.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    side: PositionSide,
    amount: f64,
    entry_price: f64,
    entry_time: Option<DateTime<Utc>>,
}

impl Position {
    pub fn flat() -> Self {
        Self {
            side: PositionSide::Flat,
            amount: 0.0,
            entry_price: 0.0,
            entry_time: None,
        }
    }

    /// Open a long position (amount must be positive, price non-negative)
    pub fn long(amount: f64, entry_price: f64) -> Result<Self> {
        Self::long_at(amount, entry_price, Utc::now())
    }

    pub fn long_at(amount: f64, entry_price: f64, entry_time: DateTime<Utc>) -> Result<Self> {
        if !(amount.is_finite() && amount > 0.0) {
            return Err(BotError::OrderRejected(format!(
                "long position needs a positive amount, got {}",
                amount
            )));
        }
        if !(entry_price.is_finite() && entry_price >= 0.0) {
            return Err(BotError::OrderRejected(format!(
                "invalid entry price {}",
                entry_price
            )));
        }

        Ok(Self {
            side: PositionSide::Long,
            amount,
            entry_price,
            entry_time: Some(entry_time),
        })
    }

    pub fn side(&self) -> PositionSide {
        self.side
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn entry_price(&self) -> f64 {
        self.entry_price
    }

    pub fn entry_time(&self) -> Option<DateTime<Utc>> {
        self.entry_time
    }

    pub fn is_flat(&self) -> bool {
        self.side == PositionSide::Flat
    }

    pub fn is_long(&self) -> bool {
        self.side == PositionSide::Long
    }

    /// Mark-to-market P&L in quote currency
    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        match self.side {
            PositionSide::Flat => 0.0,
            PositionSide::Long => (current_price - self.entry_price) * self.amount,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::flat()
    }
}
