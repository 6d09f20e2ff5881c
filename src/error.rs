use thiserror::Error;

/// Failures surfaced by the odds pipeline.
#[derive(Debug, Clone, Error)]
pub enum OddsError {
    /// Network or decode failure talking to the odds provider
    #[error("odds provider unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Read or write failure against the cache store
    #[error("cache store failure: {0}")]
    StoreFailure(String),

    /// Upstream returned games that do not match the expected schema
    #[error("malformed upstream payload: {0}")]
    MalformedUpstreamPayload(String),

    #[error("unknown refresh tier: {0}")]
    UnknownTier(String),
}

impl From<rusqlite::Error> for OddsError {
    fn from(err: rusqlite::Error) -> Self {
        OddsError::StoreFailure(err.to_string())
    }
}

impl From<reqwest::Error> for OddsError {
    fn from(err: reqwest::Error) -> Self {
        OddsError::UpstreamUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OddsError>;
