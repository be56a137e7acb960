//! HTTP surface for site operations

mod handler;
mod types;

pub use handler::{configure_routes, not_found_fallback, SiteAppState, SitesApiDoc};
pub use types::{CreateSiteResponse, RootSummaryResponse, UploadResponse};
