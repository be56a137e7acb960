//! Content-addressed storage for ephemeral sites
//!
//! This crate owns the durable state of the platform: uploaded blobs
//! stored under their own content hash, per-site path manifests, site
//! info records and the process-wide secret signing key. Everything sits
//! behind the [`KvBackend`] seam; production uses the Redis
//! implementation, tests use the in-memory one.
//!
//! The backing store is assumed eventually consistent: a write may not
//! be visible to a read from another instance immediately. Callers treat
//! stale reads as ordinary misses.

mod content_store;
mod error;
mod kv;
mod records;

pub use content_store::{content_hash, ContentStore};
pub use error::StoreError;
pub use kv::{KvBackend, MemoryKv, RedisKv};
pub use records::{BlobProvenance, ManifestRecord, SiteInfo, StoredFile};
