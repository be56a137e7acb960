//! Site services
//!
//! [`SiteService`] drives the write paths (create a site, upload a
//! file); [`PathResolver`] drives the read path with its fallback
//! chains.

mod resolver;
mod site_service;

pub use resolver::{PathResolver, Resolution, SiteSummary};
pub use site_service::{NewSite, SiteService, UploadOutcome};
