//! Authorization without accounts
//!
//! Two mechanisms, neither involving stored identities:
//!
//! - [`CapabilityTokenService`] issues self-contained signed bearer
//!   tokens proving the right to upload to one specific site.
//! - [`admission`] gates anonymous site creation behind a
//!   proof-of-work-style hash threshold.

pub mod admission;
pub mod capability;

pub use admission::check_admission;
pub use capability::{CapabilityClaims, CapabilityTokenService};
