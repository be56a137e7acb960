//! Ephemeral site lifecycle and serving
//!
//! Creation (admission-gated, quota-checked, capability-issuing),
//! uploads under a capability token, and anonymous reads with the
//! index/404 fallback chain. Handlers convert the shared error taxonomy
//! to HTTP exactly once; everything below them speaks `SiteResult`.

pub mod handlers;
pub mod services;

pub use handlers::{configure_routes, SiteAppState, SitesApiDoc};
pub use services::{PathResolver, SiteService};
