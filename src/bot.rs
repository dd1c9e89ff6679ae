use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::api::MarketDataSource;
use crate::config::BotConfig;
use crate::error::BotError;
use crate::execution::{ExecutionAction, OrderGateway, PositionTracker};
use crate::models::{Balances, OrderIntent, OrderResult, Signal};
use crate::strategy::{CandleSeries, SmaCrossover, Strategy};
use crate::Result;

/// Loop timing and request sizing
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerSettings {
    pub interval: String,
    pub history_limit: usize,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
}

impl RunnerSettings {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            interval: config.interval.clone(),
            history_limit: config.history_limit(),
            poll_interval: config.poll_interval(),
            request_timeout: config.request_timeout(),
        }
    }
}

/// What one evaluation cycle ended with
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Not enough closes yet for the slow average
    Warmup { have: usize, need: usize },
    /// Signal computed, nothing submitted
    Evaluated {
        signal: Signal,
        price: f64,
        reason: String,
    },
    /// An order was filled and the position updated
    Submitted {
        intent: OrderIntent,
        result: OrderResult,
        realized_pnl: Option<f64>,
    },
    /// Recoverable (or fatal) error; the position is unchanged
    Failed { error: BotError },
}

impl CycleOutcome {
    pub fn is_submitted(&self) -> bool {
        matches!(self, CycleOutcome::Submitted { .. })
    }
}

/// Counters for a finished run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub cycles: u64,
    pub orders: u64,
    pub failures: u64,
}

/// Poll loop tying a market data source, the crossover strategy, the
/// position tracker and an order gateway together for one symbol
pub struct TradingBot {
    market: Arc<dyn MarketDataSource>,
    gateway: Arc<dyn OrderGateway>,
    strategy: Box<dyn Strategy>,
    tracker: PositionTracker,
    settings: RunnerSettings,
}

impl TradingBot {
    pub fn new(
        market: Arc<dyn MarketDataSource>,
        gateway: Arc<dyn OrderGateway>,
        strategy: Box<dyn Strategy>,
        tracker: PositionTracker,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            market,
            gateway,
            strategy,
            tracker,
            settings,
        }
    }

    /// Wire a bot from validated configuration
    pub fn from_config(
        config: &BotConfig,
        market: Arc<dyn MarketDataSource>,
        gateway: Arc<dyn OrderGateway>,
    ) -> Result<Self> {
        config.validate()?;

        let strategy = SmaCrossover::new(config.windows()?).with_warm_start(config.warm_start);
        let tracker = PositionTracker::new(config.symbol.clone(), config.trade_rules());

        Ok(Self::new(
            market,
            gateway,
            Box::new(strategy),
            tracker,
            RunnerSettings::from_config(config),
        ))
    }

    pub fn tracker(&self) -> &PositionTracker {
        &self.tracker
    }

    /// Fetch, compute, decide and (maybe) act once
    ///
    /// Never returns an error: failures are logged here and reported as
    /// `CycleOutcome::Failed` so the caller can keep polling.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let cycle_at = Utc::now();

        match self.evaluate().await {
            Ok(outcome) => outcome,
            Err(BotError::InsufficientData { have, need }) => {
                tracing::info!(
                    symbol = %self.tracker.symbol(),
                    have,
                    need,
                    "Warming up, waiting for more closes"
                );
                CycleOutcome::Warmup { have, need }
            }
            Err(error) => {
                self.log_failure(&error, cycle_at);
                CycleOutcome::Failed { error }
            }
        }
    }

    async fn evaluate(&mut self) -> Result<CycleOutcome> {
        let symbol = self.tracker.symbol().to_string();

        let closes = tokio::time::timeout(
            self.settings.request_timeout,
            self.market.get_recent_closes(
                &symbol,
                &self.settings.interval,
                self.settings.history_limit,
            ),
        )
        .await
        .map_err(|_| {
            BotError::DataUnavailable(format!(
                "{} timed out after {:?}",
                self.market.name(),
                self.settings.request_timeout
            ))
        })??;

        let series = CandleSeries::new(closes);
        let signal = self.strategy.generate_signal(&series)?;
        let price = series.latest().ok_or(BotError::InsufficientData {
            have: 0,
            need: self.strategy.min_candles_required(),
        })?;

        let balances = if self.can_trade(signal) {
            Some(self.free_balances().await?)
        } else {
            None
        };

        let decision = self.tracker.process_signal(signal, price, balances.as_ref());
        let intent = match decision.action {
            ExecutionAction::Submit(intent) => intent,
            ExecutionAction::Skip => {
                let position = self.tracker.position();
                if position.is_long() {
                    tracing::info!(
                        symbol = %symbol,
                        ?signal,
                        price,
                        entry_price = position.entry_price(),
                        unrealized_pnl = position.unrealized_pnl(price),
                        reason = %decision.reason,
                        "No order, holding position"
                    );
                } else {
                    tracing::info!(
                        symbol = %symbol,
                        ?signal,
                        price,
                        reason = %decision.reason,
                        "No order"
                    );
                }
                return Ok(CycleOutcome::Evaluated {
                    signal,
                    price,
                    reason: decision.reason,
                });
            }
        };

        tracing::info!(
            symbol = %symbol,
            side = %intent.side,
            quantity = intent.quantity,
            price,
            gateway = self.gateway.name(),
            reason = %decision.reason,
            "Submitting market order"
        );

        let result = tokio::time::timeout(
            self.settings.request_timeout,
            self.gateway.submit_market_order(&intent),
        )
        .await
        .map_err(|_| {
            BotError::GatewayUnavailable(format!(
                "{} timed out after {:?}",
                self.gateway.name(),
                self.settings.request_timeout
            ))
        })??;

        if !result.success {
            return Err(BotError::OrderRejected(format!(
                "{} reported order {} as not filled",
                self.gateway.name(),
                result.order_id
            )));
        }

        let realized_pnl = self.tracker.apply_result(&intent, &result);
        let position = self.tracker.position();

        match realized_pnl {
            Some(pnl) => tracing::info!(
                symbol = %symbol,
                order_id = %result.order_id,
                pnl,
                total_pnl = self.tracker.total_pnl(),
                trades = self.tracker.completed_trades(),
                "Position closed"
            ),
            None => tracing::info!(
                symbol = %symbol,
                order_id = %result.order_id,
                amount = position.amount(),
                entry_price = position.entry_price(),
                "Position opened"
            ),
        }

        Ok(CycleOutcome::Submitted {
            intent,
            result,
            realized_pnl,
        })
    }

    /// Only BUY while flat and SELL while long can lead to an order
    fn can_trade(&self, signal: Signal) -> bool {
        let position = self.tracker.position();
        match signal {
            Signal::Buy => position.is_flat(),
            Signal::Sell => position.is_long(),
            Signal::Hold => false,
        }
    }

    async fn free_balances(&self) -> Result<Balances> {
        tokio::time::timeout(self.settings.request_timeout, self.gateway.free_balances())
            .await
            .map_err(|_| {
                BotError::GatewayUnavailable(format!(
                    "{} balance lookup timed out after {:?}",
                    self.gateway.name(),
                    self.settings.request_timeout
                ))
            })?
    }

    fn log_failure(&self, error: &BotError, cycle_at: DateTime<Utc>) {
        if error.is_fatal() {
            tracing::error!(
                symbol = %self.tracker.symbol(),
                cycle_at = %cycle_at.to_rfc3339(),
                kind = error.kind(),
                error = %error,
                "Cycle failed"
            );
        } else {
            tracing::warn!(
                symbol = %self.tracker.symbol(),
                cycle_at = %cycle_at.to_rfc3339(),
                kind = error.kind(),
                error = %error,
                "Cycle failed, retrying next tick"
            );
        }
    }

    /// Run one cycle per tick until `shutdown` flips to true
    ///
    /// The first cycle runs immediately. A cycle in progress always finishes
    /// before shutdown is observed. Returns early only on a fatal error.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<RunSummary> {
        let mut ticker = interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut summary = RunSummary::default();

        tracing::info!(
            symbol = %self.tracker.symbol(),
            strategy = self.strategy.name(),
            market = self.market.name(),
            gateway = self.gateway.name(),
            trade_budget = self.tracker.rules().trade_budget,
            trade_pct = ?self.tracker.rules().trade_pct,
            poll_interval = ?self.settings.poll_interval,
            "Trading loop starting"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    summary.cycles += 1;
                    match self.run_cycle().await {
                        CycleOutcome::Submitted { .. } => summary.orders += 1,
                        CycleOutcome::Failed { error } => {
                            summary.failures += 1;
                            if error.is_fatal() {
                                return Err(error);
                            }
                        }
                        _ => {}
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!(
            symbol = %self.tracker.symbol(),
            cycles = summary.cycles,
            orders = summary.orders,
            failures = summary.failures,
            total_pnl = self.tracker.total_pnl(),
            position = ?self.tracker.position().side(),
            "Trading loop stopped"
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ReplayFeed;
    use crate::execution::{PaperAccount, PaperGateway, TradeRules};
    use crate::strategy::{CrossoverWindows, SmaCrossover};
    use async_trait::async_trait;

    struct SlowFeed;

    #[async_trait]
    impl MarketDataSource for SlowFeed {
        async fn get_recent_closes(&self, _: &str, _: &str, _: usize) -> Result<Vec<f64>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![100.0; 10])
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    fn settings(poll_interval: Duration) -> RunnerSettings {
        RunnerSettings {
            interval: "1m".to_string(),
            history_limit: 5,
            poll_interval,
            request_timeout: Duration::from_millis(50),
        }
    }

    fn bot(market: Arc<dyn MarketDataSource>, poll_interval: Duration) -> TradingBot {
        let windows = CrossoverWindows::new(2, 4).unwrap();
        TradingBot::new(
            market,
            Arc::new(PaperGateway::new(&PaperAccount::default())),
            Box::new(SmaCrossover::new(windows)),
            PositionTracker::new("BTC/USDT", TradeRules::default()),
            settings(poll_interval),
        )
    }

    #[tokio::test]
    async fn test_warmup_until_slow_window_filled() {
        let feed = Arc::new(ReplayFeed::new(vec![100.0, 101.0, 102.0, 103.0]));
        let mut bot = bot(feed, Duration::from_secs(1));

        assert_eq!(
            bot.run_cycle().await,
            CycleOutcome::Warmup { have: 1, need: 4 }
        );
        assert_eq!(
            bot.run_cycle().await,
            CycleOutcome::Warmup { have: 2, need: 4 }
        );
        assert_eq!(
            bot.run_cycle().await,
            CycleOutcome::Warmup { have: 3, need: 4 }
        );

        // First full window has no previous averages, so it holds
        match bot.run_cycle().await {
            CycleOutcome::Evaluated { signal, price, .. } => {
                assert_eq!(signal, Signal::Hold);
                assert_eq!(price, 103.0);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_data_unavailable() {
        let mut bot = bot(Arc::new(SlowFeed), Duration::from_secs(1));

        match bot.run_cycle().await {
            CycleOutcome::Failed { error } => {
                assert_eq!(error.kind(), "data_unavailable");
                assert!(error.to_string().contains("timed out"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(bot.tracker().position().is_flat());
    }

    #[tokio::test]
    async fn test_exhausted_feed_keeps_running() {
        let feed = Arc::new(ReplayFeed::new(vec![100.0]));
        let mut bot = bot(feed, Duration::from_secs(1));

        assert!(matches!(bot.run_cycle().await, CycleOutcome::Warmup { .. }));
        assert!(matches!(
            bot.run_cycle().await,
            CycleOutcome::Failed {
                error: BotError::DataUnavailable(_)
            }
        ));
        assert!(matches!(
            bot.run_cycle().await,
            CycleOutcome::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let feed = Arc::new(ReplayFeed::new(vec![100.0; 1000]));
        let mut bot = bot(feed, Duration::from_millis(10));
        let (tx, rx) = watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            tx.send(true).ok();
        });

        let summary = tokio::time::timeout(Duration::from_secs(5), bot.run(rx))
            .await
            .expect("loop did not stop")
            .unwrap();

        assert!(summary.cycles >= 1);
        assert_eq!(summary.orders, 0);
        assert!(bot.tracker().position().is_flat());
    }

    #[tokio::test]
    async fn test_run_returns_immediately_when_already_shut_down() {
        let feed = Arc::new(ReplayFeed::new(vec![100.0]));
        let mut bot = bot(feed, Duration::from_millis(10));
        let (_tx, rx) = watch::channel(true);

        let summary = bot.run(rx).await.unwrap();
        assert_eq!(summary.cycles, 0);
    }
}
