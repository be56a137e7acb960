//! Core types shared across the Wisp crates
//!
//! Hosts the service-wide constants, the error taxonomy that maps onto
//! HTTP responses at the handler boundary, the RFC 7807 problem-details
//! response builder, and a few small utilities. No dependencies on other
//! Wisp crates.

pub mod constants;
pub mod error;
pub mod problemdetails;
pub mod utils;

pub use error::{SiteError, SiteResult};
