//! Quota service client
//!
//! The authoritative rate and size limiter is an external RPC service;
//! this crate specifies its contract ([`QuotaService`]) and provides the
//! HTTP implementation. The core never continues past a quota check it
//! could not evaluate: a rejection maps to 429, any transport or
//! protocol failure maps to 502.

mod client;
mod error;

pub use client::{HttpQuotaClient, QuotaService, SiteCreationCheck};
pub use error::QuotaError;
