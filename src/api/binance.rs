use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use super::MarketDataSource;
use crate::error::BotError;
use crate::Result;

const BINANCE_API_BASE: &str = "https://api.binance.com";
const BINANCE_TESTNET_API_BASE: &str = "https://testnet.binance.vision";
const RATE_LIMIT_RPM: u32 = 1200; // Spot request weight per minute
pub const MAX_KLINES_LIMIT: usize = 1000;

// Kline array layout: [open_time, open, high, low, close, volume, ...]
const CLOSE_INDEX: usize = 4;

type BinanceRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Error body returned by Binance on 4xx/5xx
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
    msg: String,
}

/// Binance spot REST client for public market data
///
/// Cloneable; clones share the rate limiter. No retries: a failed request
/// surfaces as `DataUnavailable` and the poll loop tries again next tick.
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    rate_limiter: Arc<BinanceRateLimiter>,
}

impl BinanceClient {
    /// Client for mainnet, or the spot testnet when `testnet` is set
    pub fn new(testnet: bool, timeout: Duration) -> Result<Self> {
        let base_url = if testnet {
            BINANCE_TESTNET_API_BASE
        } else {
            BINANCE_API_BASE
        };
        Self::with_base_url(base_url, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BotError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        let quota = Quota::per_minute(NonZeroU32::new(RATE_LIMIT_RPM).unwrap_or(NonZeroU32::MIN));

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch raw klines, oldest first
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Vec<serde_json::Value>>> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let limit = limit.clamp(1, MAX_KLINES_LIMIT);
        let exchange_symbol = exchange_symbol(symbol);
        let limit_param = limit.to_string();

        self.rate_limiter.until_ready().await;

        tracing::debug!(
            symbol = %exchange_symbol,
            interval,
            limit,
            "Fetching klines"
        );

        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", exchange_symbol.as_str()),
                ("interval", interval),
                ("limit", limit_param.as_str()),
            ])
            .send()
            .await
            .map_err(|e| BotError::DataUnavailable(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = match serde_json::from_str::<ApiErrorBody>(&body) {
                Ok(err) => format!("{} ({})", err.msg, err.code),
                Err(_) => body,
            };
            return Err(BotError::DataUnavailable(format!(
                "Binance API error ({}): {}",
                status, detail
            )));
        }

        response
            .json()
            .await
            .map_err(|e| BotError::DataUnavailable(format!("Failed to parse klines: {}", e)))
    }
}

#[async_trait]
impl MarketDataSource for BinanceClient {
    async fn get_recent_closes(
        &self,
        symbol: &str,
        interval: &str,
        count: usize,
    ) -> Result<Vec<f64>> {
        let klines = self.get_klines(symbol, interval, count).await?;
        parse_closes(&klines)
    }

    fn name(&self) -> &str {
        "binance"
    }
}

/// "BTC/USDT" -> "BTCUSDT"
pub fn exchange_symbol(symbol: &str) -> String {
    symbol
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_uppercase()
}

/// Extract close prices from kline arrays (close is sent as a string)
pub fn parse_closes(klines: &[Vec<serde_json::Value>]) -> Result<Vec<f64>> {
    klines
        .iter()
        .map(|kline| {
            let raw = kline.get(CLOSE_INDEX).ok_or_else(|| {
                BotError::DataUnavailable(format!("Malformed kline: {} fields", kline.len()))
            })?;

            let close = match raw {
                serde_json::Value::String(s) => s.parse::<f64>().ok(),
                serde_json::Value::Number(n) => n.as_f64(),
                _ => None,
            };

            close
                .filter(|c| c.is_finite())
                .ok_or_else(|| BotError::DataUnavailable(format!("Invalid close price: {}", raw)))
        })
        .collect()
}
