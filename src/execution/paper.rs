use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::OrderGateway;
use crate::error::BotError;
use crate::models::{Balances, OrderIntent, OrderResult, TradeSide};
use crate::Result;

/// Starting balances and limits for the simulated account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PaperAccount {
    pub quote_balance: f64,
    pub base_balance: f64,
    /// Smallest order notional (quote currency) the simulated venue accepts
    pub min_notional: f64,
}

impl Default for PaperAccount {
    fn default() -> Self {
        Self {
            quote_balance: 1000.0,
            base_balance: 0.0,
            min_notional: 5.0,
        }
    }
}

/// Order gateway that fills market orders in memory
///
/// Fills happen at the intent's reference price. Orders that exceed the free
/// balance or fall under the minimum notional are rejected the way an
/// exchange would.
pub struct PaperGateway {
    balances: Mutex<Balances>,
    min_notional: f64,
}

impl PaperGateway {
    pub fn new(account: &PaperAccount) -> Self {
        Self {
            balances: Mutex::new(Balances {
                quote: account.quote_balance,
                base: account.base_balance,
            }),
            min_notional: account.min_notional,
        }
    }
}

#[async_trait]
impl OrderGateway for PaperGateway {
    async fn submit_market_order(&self, intent: &OrderIntent) -> Result<OrderResult> {
        if !(intent.quantity.is_finite() && intent.quantity > 0.0) {
            return Err(BotError::OrderRejected(format!(
                "invalid quantity {}",
                intent.quantity
            )));
        }
        if !(intent.reference_price.is_finite() && intent.reference_price > 0.0) {
            return Err(BotError::OrderRejected(format!(
                "no usable price for {} ({})",
                intent.symbol, intent.reference_price
            )));
        }

        let notional = intent.quantity * intent.reference_price;
        if notional < self.min_notional {
            return Err(BotError::OrderRejected(format!(
                "notional {:.2} below minimum {:.2}",
                notional, self.min_notional
            )));
        }

        let mut balances = self
            .balances
            .lock()
            .map_err(|e| BotError::GatewayUnavailable(e.to_string()))?;

        match intent.side {
            TradeSide::Buy => {
                if notional > balances.quote {
                    return Err(BotError::OrderRejected(format!(
                        "insufficient quote balance: need {:.2}, have {:.2}",
                        notional, balances.quote
                    )));
                }
                balances.quote -= notional;
                balances.base += intent.quantity;
            }
            TradeSide::Sell => {
                if intent.quantity > balances.base {
                    return Err(BotError::OrderRejected(format!(
                        "insufficient base balance: need {}, have {}",
                        intent.quantity, balances.base
                    )));
                }
                balances.base -= intent.quantity;
                balances.quote += notional;
            }
        }

        let result = OrderResult::filled(intent.quantity, intent.reference_price);

        tracing::info!(
            order_id = %result.order_id,
            symbol = %intent.symbol,
            side = %intent.side,
            quantity = intent.quantity,
            price = intent.reference_price,
            quote_balance = balances.quote,
            base_balance = balances.base,
            "Paper order filled"
        );

        Ok(result)
    }

    async fn free_balances(&self) -> Result<Balances> {
        self.balances
            .lock()
            .map(|b| *b)
            .map_err(|e| BotError::GatewayUnavailable(e.to_string()))
    }

    fn name(&self) -> &str {
        "paper"
    }
}
