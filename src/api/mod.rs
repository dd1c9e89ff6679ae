pub mod binance;
pub mod replay;

pub use binance::BinanceClient;
pub use replay::ReplayFeed;

use async_trait::async_trait;

use crate::Result;

/// Source of recent candle closes
///
/// Implementations return closes oldest first (most recent last) and fail
/// with `DataUnavailable` on any network or API problem.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn get_recent_closes(&self, symbol: &str, interval: &str, count: usize)
        -> Result<Vec<f64>>;

    /// Source name for logging
    fn name(&self) -> &str;
}
