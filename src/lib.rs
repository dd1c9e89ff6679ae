// Core modules
pub mod api;
pub mod bot;
pub mod config;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod strategy;

// Re-export commonly used types
pub use api::{BinanceClient, MarketDataSource, ReplayFeed};
pub use bot::{CycleOutcome, RunSummary, RunnerSettings, TradingBot};
pub use config::BotConfig;
pub use error::BotError;
pub use execution::{OrderGateway, PaperGateway, Position, PositionTracker};
pub use models::*;
pub use strategy::Strategy;

// Error handling
pub type Result<T> = std::result::Result<T, BotError>;
