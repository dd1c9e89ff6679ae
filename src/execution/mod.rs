// Position tracking and order execution module
pub mod executor;
pub mod gateway;
pub mod paper;
pub mod position;

pub use executor::{
    buy_quantity, on_order_result, on_signal, realized_pnl, truncate_quantity, ExecutionAction,
    ExecutionDecision, PositionTracker, TradeRules,
};
pub use gateway::OrderGateway;
pub use paper::{PaperAccount, PaperGateway};
pub use position::{Position, PositionSide};
