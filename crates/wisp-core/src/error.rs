//! Service error taxonomy
//!
//! A single enum covers every failure the site engine can surface to a
//! client. Errors propagate as ordinary `Result`s and are converted to
//! an HTTP response exactly once, at the handler boundary, via
//! `From<SiteError> for Problem`.

use axum::http::{header, HeaderValue, StatusCode};
use thiserror::Error;

use crate::problemdetails::{self, Problem};

/// Errors surfaced by the ephemeral site engine.
#[derive(Error, Debug)]
pub enum SiteError {
    /// Missing credential; the response demands one (401).
    #[error("authentication required: {0}")]
    AuthRequired(String),

    /// Present but invalid or insufficient credential (403).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Malformed request, e.g. token bound to a different site (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing site or file (404). Stale store reads land here too.
    #[error("not found: {0}")]
    NotFound(String),

    /// Method not supported on this route (405).
    #[error("method not allowed (allowed: {allowed})")]
    MethodNotAllowed { allowed: String },

    /// Freshly generated public key already exists (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Upload window has elapsed (410).
    #[error("gone: {0}")]
    Gone(String),

    /// Quota service rejected the operation (429).
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// A dependent service misbehaved (502).
    #[error("upstream failure: {0}")]
    UpstreamFailure(String),

    /// Invariant violation, e.g. signature length mismatch (500).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for site engine operations.
pub type SiteResult<T> = Result<T, SiteError>;

impl From<SiteError> for Problem {
    fn from(error: SiteError) -> Self {
        match error {
            SiteError::AuthRequired(detail) => problemdetails::new(StatusCode::UNAUTHORIZED)
                .with_title("Authentication Required")
                .with_detail(detail)
                .with_header(header::WWW_AUTHENTICATE, HeaderValue::from_static("Basic")),

            SiteError::AuthFailed(detail) => problemdetails::new(StatusCode::FORBIDDEN)
                .with_title("Authentication Failed")
                .with_detail(detail),

            SiteError::BadRequest(detail) => problemdetails::new(StatusCode::BAD_REQUEST)
                .with_title("Bad Request")
                .with_detail(detail),

            SiteError::NotFound(detail) => problemdetails::new(StatusCode::NOT_FOUND)
                .with_title("Not Found")
                .with_detail(detail),

            SiteError::MethodNotAllowed { allowed } => {
                let mut problem = problemdetails::new(StatusCode::METHOD_NOT_ALLOWED)
                    .with_title("Method Not Allowed")
                    .with_detail(format!("allowed methods: {allowed}"));
                if let Ok(value) = HeaderValue::from_str(&allowed) {
                    problem = problem.with_header(header::ALLOW, value);
                }
                problem
            }

            SiteError::Conflict(detail) => problemdetails::new(StatusCode::CONFLICT)
                .with_title("Conflict")
                .with_detail(detail),

            SiteError::Gone(detail) => problemdetails::new(StatusCode::GONE)
                .with_title("Gone")
                .with_detail(detail),

            SiteError::QuotaExceeded(detail) => {
                problemdetails::new(StatusCode::TOO_MANY_REQUESTS)
                    .with_title("Quota Exceeded")
                    .with_detail(detail)
            }

            SiteError::UpstreamFailure(detail) => problemdetails::new(StatusCode::BAD_GATEWAY)
                .with_title("Upstream Failure")
                .with_detail(detail),

            SiteError::Internal(detail) => {
                tracing::error!("internal error: {detail}");
                problemdetails::new(StatusCode::INTERNAL_SERVER_ERROR)
                    .with_title("Internal Server Error")
                    .with_detail(detail)
            }
        }
    }
}
