use thiserror::Error;

/// Errors raised by the signal engine, the collaborators and configuration
///
/// Everything except `Configuration` is recoverable: the poll loop logs it
/// and tries again on the next tick.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BotError {
    /// Not enough closes yet to compute the slow average
    #[error("Insufficient data: {have} closes, need {need}")]
    InsufficientData { have: usize, need: usize },

    /// Market data fetch failed (network, API or timeout)
    #[error("Market data unavailable: {0}")]
    DataUnavailable(String),

    /// The gateway refused the order (insufficient funds, below minimum size, ...)
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    /// The gateway could not be reached (network, auth or timeout)
    #[error("Order gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// Invalid settings detected at startup
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl BotError {
    /// Short stable label used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            BotError::InsufficientData { .. } => "insufficient_data",
            BotError::DataUnavailable(_) => "data_unavailable",
            BotError::OrderRejected(_) => "order_rejected",
            BotError::GatewayUnavailable(_) => "gateway_unavailable",
            BotError::Configuration(_) => "configuration",
        }
    }

    /// Only configuration problems stop the bot
    pub fn is_fatal(&self) -> bool {
        matches!(self, BotError::Configuration(_))
    }
}

impl From<config::ConfigError> for BotError {
    fn from(e: config::ConfigError) -> Self {
        BotError::Configuration(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_configuration_is_fatal() {
        assert!(BotError::Configuration("fast >= slow".to_string()).is_fatal());
        assert!(!BotError::InsufficientData { have: 3, need: 25 }.is_fatal());
        assert!(!BotError::DataUnavailable("timeout".to_string()).is_fatal());
        assert!(!BotError::OrderRejected("funds".to_string()).is_fatal());
        assert!(!BotError::GatewayUnavailable("503".to_string()).is_fatal());
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(
            BotError::InsufficientData { have: 1, need: 2 }.kind(),
            "insufficient_data"
        );
        assert_eq!(
            BotError::OrderRejected(String::new()).kind(),
            "order_rejected"
        );
    }

    #[test]
    fn test_insufficient_data_message() {
        let err = BotError::InsufficientData { have: 3, need: 25 };
        assert_eq!(err.to_string(), "Insufficient data: 3 closes, need 25");
    }
}
