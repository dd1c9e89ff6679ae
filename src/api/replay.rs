use async_trait::async_trait;
use std::path::Path;
use std::sync::Mutex;

use super::MarketDataSource;
use crate::error::BotError;
use crate::Result;

/// Market data source that replays a recorded close series
///
/// Every call reveals one more close and returns the trailing `count` of
/// what has been revealed so far, like a live feed advancing one candle per
/// poll. Once the series is used up every call fails with `DataUnavailable`.
pub struct ReplayFeed {
    closes: Vec<f64>,
    revealed: Mutex<usize>,
}

impl ReplayFeed {
    pub fn new(closes: Vec<f64>) -> Self {
        Self {
            closes,
            revealed: Mutex::new(1),
        }
    }

    /// Reveal `warmup` closes on the first call instead of one
    pub fn with_warmup(self, warmup: usize) -> Self {
        let closes = self.closes;
        Self {
            revealed: Mutex::new(warmup.clamp(1, closes.len().max(1))),
            closes,
        }
    }

    /// Load closes from a text file: one price per line, the last
    /// comma-separated field is used, blank lines and `#` comments are
    /// skipped, and a non-numeric first line is treated as a header.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            BotError::Configuration(format!("Failed to read replay file {}: {}", path.display(), e))
        })?;

        let closes = parse_closes(&content)?;
        if closes.is_empty() {
            return Err(BotError::Configuration(format!(
                "Replay file {} contains no prices",
                path.display()
            )));
        }

        Ok(Self::new(closes))
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }
}

#[async_trait]
impl MarketDataSource for ReplayFeed {
    async fn get_recent_closes(
        &self,
        _symbol: &str,
        _interval: &str,
        count: usize,
    ) -> Result<Vec<f64>> {
        let mut revealed = self
            .revealed
            .lock()
            .map_err(|e| BotError::DataUnavailable(e.to_string()))?;

        let end = *revealed;
        if end > self.closes.len() {
            return Err(BotError::DataUnavailable(format!(
                "Replay exhausted after {} closes",
                self.closes.len()
            )));
        }
        *revealed += 1;

        let start = end.saturating_sub(count);
        Ok(self.closes[start..end].to_vec())
    }

    fn name(&self) -> &str {
        "replay"
    }
}

fn parse_closes(content: &str) -> Result<Vec<f64>> {
    let mut closes = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let field = line.rsplit(',').next().unwrap_or(line).trim();
        match field.parse::<f64>() {
            Ok(price) if price.is_finite() && price > 0.0 => closes.push(price),
            Ok(price) => {
                return Err(BotError::Configuration(format!(
                    "Invalid price {} on line {}",
                    price,
                    index + 1
                )))
            }
            Err(_) if index == 0 => continue, // header
            Err(_) => {
                return Err(BotError::Configuration(format!(
                    "Cannot parse price '{}' on line {}",
                    field,
                    index + 1
                )))
            }
        }
    }

    Ok(closes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reveals_one_close_per_call() {
        let feed = ReplayFeed::new(vec![1.0, 2.0, 3.0]);

        assert_eq!(feed.get_recent_closes("X", "1m", 2).await.unwrap(), vec![1.0]);
        assert_eq!(
            feed.get_recent_closes("X", "1m", 2).await.unwrap(),
            vec![1.0, 2.0]
        );
        assert_eq!(
            feed.get_recent_closes("X", "1m", 2).await.unwrap(),
            vec![2.0, 3.0]
        );

        let err = feed.get_recent_closes("X", "1m", 2).await.unwrap_err();
        assert!(matches!(err, BotError::DataUnavailable(_)));
    }

    #[tokio::test]
    async fn test_warmup() {
        let feed = ReplayFeed::new(vec![1.0, 2.0, 3.0, 4.0, 5.0]).with_warmup(4);
        assert_eq!(
            feed.get_recent_closes("X", "1m", 10).await.unwrap(),
            vec![1.0, 2.0, 3.0, 4.0]
        );
        assert_eq!(
            feed.get_recent_closes("X", "1m", 10).await.unwrap(),
            vec![1.0, 2.0, 3.0, 4.0, 5.0]
        );
        assert!(feed.get_recent_closes("X", "1m", 10).await.is_err());
    }

    #[test]
    fn test_parse_closes_formats() {
        let content = "timestamp,close\n\
                       # comment\n\
                       1700000000,100.5\n\
                       \n\
                       1700000060, 101.25\n\
                       102\n";
        assert_eq!(parse_closes(content).unwrap(), vec![100.5, 101.25, 102.0]);
    }

    #[test]
    fn test_parse_closes_rejects_garbage() {
        assert!(parse_closes("100\nabc\n").is_err());
        assert!(parse_closes("100\n-5\n").is_err());
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir()
            .join(format!("crossbot-replay-{}.txt", uuid::Uuid::new_v4()));
        std::fs::write(&path, "100\n101\n102\n").unwrap();

        let feed = ReplayFeed::from_file(&path).unwrap();
        assert_eq!(feed.len(), 3);

        std::fs::remove_file(&path).ok();
        assert!(ReplayFeed::from_file(&path).is_err());
    }
}
