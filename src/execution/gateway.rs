use async_trait::async_trait;

use crate::models::{Balances, OrderIntent, OrderResult};
use crate::Result;

/// Places market orders on behalf of the tracker
///
/// Errors are `OrderRejected` (the venue said no) or `GatewayUnavailable`
/// (the venue could not be reached).
#[async_trait]
pub trait OrderGateway: Send + Sync {
    async fn submit_market_order(&self, intent: &OrderIntent) -> Result<OrderResult>;

    /// Free quote and base balances for the traded pair
    async fn free_balances(&self) -> Result<Balances>;

    /// Gateway name for logging
    fn name(&self) -> &str;
}
