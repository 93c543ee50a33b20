use std::io;

#[derive(thiserror::Error, Debug)]
pub enum SniperError {
    #[error("config error: {0}")]
    Config(String),
    #[error("input error: {0}")]
    Input(String),
    #[error("transient network error: {0}")]
    TransientNet(String),
    #[error("timeout")]
    Timeout,
    #[error("enrichment miss: {0}")]
    EnrichmentMiss(String),
    #[error("cache io error: {0}")]
    CacheIo(String),
    #[error("secret missing: {0}")]
    SecretMissing(String),
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<reqwest::Error> for SniperError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SniperError::Timeout
        } else if err.is_connect() || err.is_request() {
            SniperError::TransientNet(err.to_string())
        } else {
            SniperError::EnrichmentMiss(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SniperError {
    fn from(err: serde_json::Error) -> Self {
        SniperError::EnrichmentMiss(err.to_string())
    }
}

impl SniperError {
    /// Transient errors are eligible for retry; everything else fails fast.
    pub fn is_transient(&self) -> bool {
        matches!(self, SniperError::TransientNet(_) | SniperError::Timeout)
    }
}
