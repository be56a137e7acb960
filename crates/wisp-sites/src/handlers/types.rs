//! Response DTOs for the site endpoints

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::services::SiteSummary;

/// Response to a successful site creation.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateSiteResponse {
    pub message: String,
    pub public_key: String,
    /// Capability token for uploads. Shown once; treat like a password.
    pub secret_key: String,
    pub url: String,
    pub site_creation: DateTime<Utc>,
    pub site_expiration: DateTime<Utc>,
    /// Uploads are accepted until this instant.
    pub upload_expiration: DateTime<Utc>,
    /// Sites this requester created in the last 24 hours, including
    /// this one.
    pub sites_created_24h: u64,
}

/// Response to a successful file upload.
#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub path: String,
    pub content_type: String,
    pub size: u64,
    pub total_site_size: u64,
}

/// Served for a root request on a site with no index file.
#[derive(Debug, Serialize, ToSchema)]
pub struct RootSummaryResponse {
    pub message: String,
    pub summary: SiteSummary,
}
