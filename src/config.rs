use config::builder::DefaultState;
use config::ConfigBuilder;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::api::binance::MAX_KLINES_LIMIT;
use crate::error::BotError;
use crate::execution::{PaperAccount, TradeRules};
use crate::strategy::CrossoverWindows;
use crate::Result;

/// Kline intervals accepted by the exchange
pub const VALID_INTERVALS: &[&str] = &[
    "1s", "1m", "3m", "5m", "15m", "30m", "1h", "2h", "4h", "6h", "8h", "12h", "1d", "3d", "1w",
    "1M",
];

const MAX_QUANTITY_PRECISION: u32 = 18;

/// Bot settings, layered from `crossbot.toml`, an optional explicit file and
/// `CROSSBOT_*` environment variables (`__` separates nested keys)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BotConfig {
    /// Trading pair, e.g. "BTC/USDT"
    pub symbol: String,
    /// Kline interval, e.g. "1m"
    pub interval: String,
    pub fast_window: usize,
    pub slow_window: usize,
    /// Quote currency spent per buy
    pub trade_budget: f64,
    /// Size buys as this fraction of the free quote balance instead
    pub trade_pct: Option<f64>,
    pub poll_interval_seconds: u64,
    pub quantity_precision: u32,
    pub minimum_tradable_value: f64,
    /// Closes fetched per cycle (defaults to slow_window + 5)
    pub history_limit: Option<usize>,
    pub request_timeout_seconds: u64,
    /// Seed the previous averages from history on the first cycle
    pub warm_start: bool,
    /// Use the exchange's spot testnet for market data
    pub testnet: bool,
    pub paper: PaperAccount,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            symbol: "BTC/USDT".to_string(),
            interval: "1m".to_string(),
            fast_window: 7,
            slow_window: 25,
            trade_budget: 50.0,
            trade_pct: None,
            poll_interval_seconds: 15,
            quantity_precision: 6,
            minimum_tradable_value: 10.0,
            history_limit: None,
            request_timeout_seconds: 10,
            warm_start: false,
            testnet: true,
            paper: PaperAccount::default(),
        }
    }
}

impl BotConfig {
    /// Builder with the file and environment sources; callers may add overrides
    pub fn builder(path: Option<&Path>) -> ConfigBuilder<DefaultState> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("crossbot").required(false));

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder.add_source(
            config::Environment::with_prefix("CROSSBOT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
    }

    /// Build, deserialize and validate
    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let config: BotConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::from_builder(Self::builder(path))
    }

    /// Reject settings the bot cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            return Err(BotError::Configuration("symbol must not be empty".to_string()));
        }

        if !VALID_INTERVALS.contains(&self.interval.as_str()) {
            return Err(BotError::Configuration(format!(
                "unsupported interval '{}'",
                self.interval
            )));
        }

        CrossoverWindows::new(self.fast_window, self.slow_window)?;

        if !(self.trade_budget.is_finite() && self.trade_budget > 0.0) {
            return Err(BotError::Configuration(format!(
                "trade_budget must be positive, got {}",
                self.trade_budget
            )));
        }

        if let Some(pct) = self.trade_pct {
            if !(pct.is_finite() && pct > 0.0 && pct <= 1.0) {
                return Err(BotError::Configuration(format!(
                    "trade_pct must be in (0, 1], got {}",
                    pct
                )));
            }
        }

        if !(self.minimum_tradable_value.is_finite() && self.minimum_tradable_value >= 0.0) {
            return Err(BotError::Configuration(format!(
                "minimum_tradable_value must be non-negative, got {}",
                self.minimum_tradable_value
            )));
        }

        if self.poll_interval_seconds == 0 {
            return Err(BotError::Configuration(
                "poll_interval_seconds must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout_seconds == 0 {
            return Err(BotError::Configuration(
                "request_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.quantity_precision > MAX_QUANTITY_PRECISION {
            return Err(BotError::Configuration(format!(
                "quantity_precision must be at most {}",
                MAX_QUANTITY_PRECISION
            )));
        }

        let limit = self.history_limit();
        if limit < self.slow_window || limit > MAX_KLINES_LIMIT {
            return Err(BotError::Configuration(format!(
                "history_limit {} must be between slow_window ({}) and {}",
                limit, self.slow_window, MAX_KLINES_LIMIT
            )));
        }

        let paper = &self.paper;
        if [paper.quote_balance, paper.base_balance, paper.min_notional]
            .iter()
            .any(|v| !(v.is_finite() && *v >= 0.0))
        {
            return Err(BotError::Configuration(
                "paper balances and min_notional must be non-negative".to_string(),
            ));
        }

        Ok(())
    }

    pub fn windows(&self) -> Result<CrossoverWindows> {
        CrossoverWindows::new(self.fast_window, self.slow_window)
    }

    pub fn trade_rules(&self) -> TradeRules {
        TradeRules {
            trade_budget: self.trade_budget,
            trade_pct: self.trade_pct,
            minimum_tradable_value: self.minimum_tradable_value,
            quantity_precision: self.quantity_precision,
        }
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit.unwrap_or(self.slow_window + 5)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}
