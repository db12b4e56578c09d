use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketDataError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Unexpected response shape: {0}")]
    Schema(String),

    #[error("Empty response from {0}")]
    Empty(String),
}

impl MarketDataError {
    /// Whether another attempt against the same provider may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            MarketDataError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => true,
        }
    }
}

impl From<reqwest::Error> for MarketDataError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            MarketDataError::Timeout(e.to_string())
        } else if e.is_decode() {
            MarketDataError::Schema(e.to_string())
        } else {
            MarketDataError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for MarketDataError {
    fn from(e: serde_json::Error) -> Self {
        MarketDataError::Schema(e.to_string())
    }
}
