//! Common error types for the cache service and its clients

use thiserror::Error;

/// Cache error taxonomy
///
/// Every variant is terminal for the call or stream it occurs in; the core
/// performs no internal retry. `Cancelled` is expected (client disconnect or
/// deadline) and is not treated as a failure.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Ticker has no stored record
    #[error("no record for ticker: {0}")]
    NotFound(String),

    /// Backend unavailable, transaction failure, or rejected write
    #[error("store error: {0}")]
    Store(String),

    /// Peer send/receive failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Client disconnect or externally imposed deadline
    #[error("call cancelled")]
    Cancelled,

    /// Ticker key failed validation (empty)
    #[error("invalid ticker: must be non-empty")]
    InvalidTicker,
}

impl CacheError {
    /// Wrap a store backend failure.
    pub fn store(err: impl std::fmt::Display) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<CacheError> for tonic::Status {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::NotFound(ticker) => {
                Self::not_found(format!("no record for ticker: {ticker}"))
            }
            CacheError::Store(msg) => Self::internal(format!("store error: {msg}")),
            CacheError::Transport(msg) => Self::unavailable(msg),
            CacheError::Cancelled => Self::cancelled("call cancelled"),
            CacheError::InvalidTicker => Self::invalid_argument("ticker must be non-empty"),
        }
    }
}

impl From<tonic::Status> for CacheError {
    fn from(status: tonic::Status) -> Self {
        match status.code() {
            tonic::Code::NotFound => Self::NotFound(status.message().to_string()),
            tonic::Code::Cancelled | tonic::Code::DeadlineExceeded => Self::Cancelled,
            tonic::Code::Unavailable | tonic::Code::Aborted => {
                Self::Transport(status.message().to_string())
            }
            tonic::Code::InvalidArgument => Self::InvalidTicker,
            _ => Self::Store(status.message().to_string()),
        }
    }
}
