use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::execution::Position;
use crate::models::{Balances, OrderIntent, OrderResult, Signal, TradeSide};

/// Sizing rules applied when turning a signal into an order
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRules {
    /// Quote-currency amount spent on each buy
    pub trade_budget: f64,
    /// Spend this fraction of the free quote balance instead of `trade_budget`
    pub trade_pct: Option<f64>,
    /// Budgets (or free quote, when sizing by fraction) at or below this are never traded
    pub minimum_tradable_value: f64,
    /// Decimal places kept on base-asset quantities
    pub quantity_precision: u32,
}

impl Default for TradeRules {
    fn default() -> Self {
        Self {
            trade_budget: 50.0,
            trade_pct: None,
            minimum_tradable_value: 10.0,
            quantity_precision: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionAction {
    Submit(OrderIntent),
    Skip,
}

#[derive(Debug, Clone)]
pub struct ExecutionDecision {
    pub action: ExecutionAction,
    pub reason: String,
}

impl ExecutionDecision {
    fn skip(reason: impl Into<String>) -> Self {
        Self {
            action: ExecutionAction::Skip,
            reason: reason.into(),
        }
    }

    fn submit(intent: OrderIntent, reason: impl Into<String>) -> Self {
        Self {
            action: ExecutionAction::Submit(intent),
            reason: reason.into(),
        }
    }

    pub fn intent(&self) -> Option<&OrderIntent> {
        match &self.action {
            ExecutionAction::Submit(intent) => Some(intent),
            ExecutionAction::Skip => None,
        }
    }

    pub fn into_intent(self) -> Option<OrderIntent> {
        match self.action {
            ExecutionAction::Submit(intent) => Some(intent),
            ExecutionAction::Skip => None,
        }
    }
}

/// Truncate toward zero at `precision` decimals (never rounds up)
pub fn truncate_quantity(value: f64, precision: u32) -> f64 {
    Decimal::from_f64(value)
        .map(|d| truncate_decimal(d, precision))
        .unwrap_or(0.0)
}

/// Base-asset quantity `budget / price`, truncated at `precision` decimals
pub fn buy_quantity(budget: f64, price: f64, precision: u32) -> f64 {
    let (Some(budget), Some(price)) = (Decimal::from_f64(budget), Decimal::from_f64(price)) else {
        return 0.0;
    };

    budget
        .checked_div(price)
        .map(|qty| truncate_decimal(qty, precision))
        .unwrap_or(0.0)
}

fn truncate_decimal(value: Decimal, precision: u32) -> f64 {
    value
        .round_dp_with_strategy(precision, RoundingStrategy::ToZero)
        .to_f64()
        .unwrap_or(0.0)
}

/// Quote amount a buy may spend, or why no buy is possible
fn buy_budget(rules: &TradeRules, balances: Option<&Balances>) -> Result<f64, String> {
    let Some(pct) = rules.trade_pct else {
        if rules.trade_budget <= rules.minimum_tradable_value {
            return Err(format!(
                "Trade budget {:.2} not above minimum tradable value {:.2}",
                rules.trade_budget, rules.minimum_tradable_value
            ));
        }
        if let Some(balances) = balances {
            if rules.trade_budget > balances.quote {
                return Err(format!(
                    "Free quote {:.2} below trade budget {:.2}",
                    balances.quote, rules.trade_budget
                ));
            }
        }
        return Ok(rules.trade_budget);
    };

    let balances = balances.ok_or_else(|| "Free balance unknown, cannot size buy".to_string())?;

    if truncate_quantity(balances.base, rules.quantity_precision) > 0.0 {
        return Err(format!("Account already holds {} base", balances.base));
    }
    if balances.quote <= rules.minimum_tradable_value {
        return Err(format!(
            "Free quote {:.2} not above minimum tradable value {:.2}",
            balances.quote, rules.minimum_tradable_value
        ));
    }

    Ok(balances.quote * pct)
}

/// Decide what to do with a signal given the current position
///
/// Only FLAT + BUY and LONG + SELL can produce an order; everything else is a
/// no-op. The position itself is never touched here. `balances`, when known,
/// caps both sides at what the account can actually fund or deliver.
pub fn on_signal(
    signal: Signal,
    position: &Position,
    symbol: &str,
    latest_price: f64,
    rules: &TradeRules,
    balances: Option<&Balances>,
) -> ExecutionDecision {
    match signal {
        Signal::Buy => {
            if position.is_long() {
                return ExecutionDecision::skip("Already have open position");
            }

            let budget = match buy_budget(rules, balances) {
                Ok(budget) => budget,
                Err(reason) => return ExecutionDecision::skip(reason),
            };

            if !(latest_price.is_finite() && latest_price > 0.0) {
                return ExecutionDecision::skip(format!("Invalid price {}", latest_price));
            }

            let quantity = buy_quantity(budget, latest_price, rules.quantity_precision);
            if quantity <= 0.0 {
                return ExecutionDecision::skip("Calculated amount is zero, skipping buy");
            }

            ExecutionDecision::submit(
                OrderIntent {
                    symbol: symbol.to_string(),
                    side: TradeSide::Buy,
                    quantity,
                    reference_price: latest_price,
                },
                format!(
                    "Buy signal: {} for {:.2} budget @ {:.4}",
                    quantity, budget, latest_price
                ),
            )
        }

        Signal::Sell => {
            if position.is_flat() {
                return ExecutionDecision::skip("No position to sell");
            }

            let held = match balances {
                Some(balances) => position.amount().min(balances.base),
                None => position.amount(),
            };
            let quantity = truncate_quantity(held, rules.quantity_precision);
            if quantity <= 0.0 {
                return ExecutionDecision::skip(format!(
                    "Sellable amount {} is zero at {} decimals, skipping sell",
                    held, rules.quantity_precision
                ));
            }

            ExecutionDecision::submit(
                OrderIntent {
                    symbol: symbol.to_string(),
                    side: TradeSide::Sell,
                    quantity,
                    reference_price: latest_price,
                },
                format!("Sell signal: closing {} @ {:.4}", quantity, latest_price),
            )
        }

        Signal::Hold => ExecutionDecision::skip("Hold signal"),
    }
}

/// Apply a gateway result to the position
///
/// Failed results leave the position untouched. Zero fill fields fall back
/// to the intent's quantity and reference price. A remainder that truncates
/// to zero at `precision` decimals closes the position.
pub fn on_order_result(
    intent: &OrderIntent,
    result: &OrderResult,
    position: Position,
    precision: u32,
) -> Position {
    if !result.success {
        return position;
    }

    let filled_quantity = if result.filled_quantity > 0.0 {
        result.filled_quantity
    } else {
        intent.quantity
    };
    let filled_price = if result.filled_price > 0.0 {
        result.filled_price
    } else {
        intent.reference_price
    };

    match intent.side {
        TradeSide::Buy => {
            // Accumulate if a buy lands on an existing long (average entry)
            let (amount, entry_price) = if position.is_long() {
                let amount = position.amount() + filled_quantity;
                let cost =
                    position.amount() * position.entry_price() + filled_quantity * filled_price;
                (amount, cost / amount)
            } else {
                (filled_quantity, filled_price)
            };

            Position::long_at(amount, entry_price, result.timestamp).unwrap_or_else(|e| {
                tracing::warn!("Ignoring buy fill: {}", e);
                position
            })
        }

        TradeSide::Sell => {
            if position.is_flat() {
                return position;
            }

            let sold = filled_quantity.min(position.amount());
            let remaining = position.amount() - sold;
            if truncate_quantity(remaining, precision) <= 0.0 {
                return Position::flat();
            }

            let entry_time = position.entry_time().unwrap_or(result.timestamp);
            Position::long_at(remaining, position.entry_price(), entry_time)
                .unwrap_or_else(|_| Position::flat())
        }
    }
}

/// P&L realized by a sell result against the position it closed
pub fn realized_pnl(
    intent: &OrderIntent,
    result: &OrderResult,
    position: &Position,
) -> Option<f64> {
    if !result.success || intent.side != TradeSide::Sell || !position.is_long() {
        return None;
    }

    let sold = if result.filled_quantity > 0.0 {
        result.filled_quantity.min(position.amount())
    } else {
        position.amount()
    };
    let exit_price = if result.filled_price > 0.0 {
        result.filled_price
    } else {
        intent.reference_price
    };

    Some((exit_price - position.entry_price()) * sold)
}

/// Owns the position and the sizing rules for one symbol
pub struct PositionTracker {
    symbol: String,
    rules: TradeRules,
    position: Position,
    total_pnl: f64,
    completed_trades: u32,
}

impl PositionTracker {
    pub fn new(symbol: impl Into<String>, rules: TradeRules) -> Self {
        Self {
            symbol: symbol.into(),
            rules,
            position: Position::flat(),
            total_pnl: 0.0,
            completed_trades: 0,
        }
    }

    /// Process a signal and decide what to do
    pub fn process_signal(
        &self,
        signal: Signal,
        latest_price: f64,
        balances: Option<&Balances>,
    ) -> ExecutionDecision {
        on_signal(
            signal,
            &self.position,
            &self.symbol,
            latest_price,
            &self.rules,
            balances,
        )
    }

    /// Record a gateway result; returns realized P&L when a long was reduced
    pub fn apply_result(&mut self, intent: &OrderIntent, result: &OrderResult) -> Option<f64> {
        let pnl = realized_pnl(intent, result, &self.position);

        let position = std::mem::take(&mut self.position);
        self.position = on_order_result(intent, result, position, self.rules.quantity_precision);

        if let Some(pnl) = pnl {
            self.total_pnl += pnl;
            if self.position.is_flat() {
                self.completed_trades += 1;
            }
        }

        pnl
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn rules(&self) -> &TradeRules {
        &self.rules
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Total realized P&L since start
    pub fn total_pnl(&self) -> f64 {
        self.total_pnl
    }

    pub fn completed_trades(&self) -> u32 {
        self.completed_trades
    }
}
