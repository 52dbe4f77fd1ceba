use thiserror::Error;

/// Faults an adapter recovers from by ending its stream early.
#[derive(Debug, Clone, Error)]
pub enum ScraperError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Timed out: {0}")]
    Timeout(String),
    #[error("Blocked by site: {0}")]
    Blocked(String),
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },
    #[error("HTML parse error: {0}")]
    HtmlParse(String),
    #[error("__NEXT_DATA__ not found")]
    MissingNextData,
    #[error("JSON parse error: {0}")]
    JsonParse(String),
    #[error("Unexpected data shape: {0}")]
    UnexpectedShape(String),
    #[error("Adapter config error: {0}")]
    Config(String),
}

impl ScraperError {
    /// Worth another attempt against the same URL.
    pub fn is_retryable(&self) -> bool {
        match self {
            ScraperError::Network(_) | ScraperError::Timeout(_) => true,
            ScraperError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ScraperError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ScraperError::Timeout(e.to_string())
        } else {
            ScraperError::Network(e.to_string())
        }
    }
}
