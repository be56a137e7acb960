//! Error types for the quota client

use thiserror::Error;
use wisp_core::SiteError;

/// Errors that can occur talking to the quota service
#[derive(Error, Debug)]
pub enum QuotaError {
    #[error("you've exceeded the site creation limit of {0} sites per 24 hours")]
    SiteLimitExceeded(u32),

    #[error("you've exceeded the site size limit of {0} bytes")]
    SizeLimitExceeded(u64),

    #[error("quota service request failed: {0}")]
    Transport(String),

    #[error("quota service responded {status}: {body}")]
    BadStatus { status: u16, body: String },

    #[error("undecodable quota service response: {0}")]
    Decode(String),
}

impl From<QuotaError> for SiteError {
    fn from(error: QuotaError) -> Self {
        match error {
            QuotaError::SiteLimitExceeded(_) | QuotaError::SizeLimitExceeded(_) => {
                SiteError::QuotaExceeded(error.to_string())
            }
            QuotaError::Transport(_) | QuotaError::BadStatus { .. } | QuotaError::Decode(_) => {
                SiteError::UpstreamFailure(error.to_string())
            }
        }
    }
}
