//! Error types for the storage layer

use thiserror::Error;
use wisp_core::SiteError;

/// Errors that can occur in the storage layer
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for SiteError {
    fn from(error: StoreError) -> Self {
        // Every storage failure is an infrastructure fault from the
        // client's point of view.
        SiteError::Internal(error.to_string())
    }
}
