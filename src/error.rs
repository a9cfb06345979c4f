use thiserror::Error;

/// Main error type for the line monitor
#[derive(Error, Debug)]
pub enum LineWatchError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // Market data errors
    #[error("Market data unavailable: {0}")]
    MarketDataUnavailable(String),

    #[error("Invalid market data: {0}")]
    InvalidMarketData(String),

    // Notification errors
    #[error("Notification rejected: {0}")]
    NotificationRejected(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl LineWatchError {
    /// Whether the driver may retry the operation that produced this error
    pub fn is_transient(&self) -> bool {
        match self {
            LineWatchError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            LineWatchError::RateLimited { .. } | LineWatchError::MarketDataUnavailable(_) => true,
            _ => false,
        }
    }
}

/// Result type alias for LineWatchError
pub type Result<T> = std::result::Result<T, LineWatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(LineWatchError::MarketDataUnavailable("timeout".into()).is_transient());
        assert!(LineWatchError::RateLimited { retry_after_secs: 3 }.is_transient());
        assert!(!LineWatchError::InvalidMarketData("bad".into()).is_transient());
        assert!(!LineWatchError::Cancelled.is_transient());
    }

    #[test]
    fn test_rate_limited_message() {
        let err = LineWatchError::RateLimited { retry_after_secs: 12 };
        assert_eq!(err.to_string(), "Rate limited: retry after 12s");
    }
}
