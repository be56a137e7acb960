//! Fixed service constants
//!
//! TTLs, limits and key layout shared by the storage, auth and site
//! crates. Values quoted in client-facing errors live here so the error
//! messages and the enforcement logic cannot drift apart.

/// Reserved manifest path holding the site's info record.
///
/// Uploads to this path are rejected; GETs return a computed site
/// summary instead of stored content.
pub const INFO_FILE_NAME: &str = "/.wisp.json";

/// Length of the random alphanumeric site identifier used in URLs.
pub const PUBLIC_KEY_LENGTH: usize = 20;

/// How long a site and its files remain available, in seconds (30 days).
pub const SITE_TTL_SECS: i64 = 30 * 24 * 3600;

/// How long after site creation uploads are accepted, in seconds (1 hour).
pub const UPLOAD_TTL_SECS: i64 = 3600;

/// Per-requester site creation limit enforced by the quota service.
pub const SITES_PER_DAY: u32 = 50;

/// Total per-site size limit enforced by the quota service, in bytes.
pub const MAX_SITE_SIZE: u64 = 30 * 1024 * 1024;

/// HMAC-SHA512 output length. The capability token format depends on
/// this being exactly 64 bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// Literal marker prefixed to capability tokens.
pub const TOKEN_PREFIX: &str = "sk_";

/// Store key of the process-wide secret signing key.
pub const SECRET_KEY_STORE_KEY: &str = "secret-signing-key";

/// Length of the generated secret signing key, in bytes.
pub const SECRET_KEY_LENGTH: usize = 64;

/// Upload request headers starting with this prefix become response
/// header overrides on the stored file.
pub const RESPONSE_HEADER_PREFIX: &str = "response-header-";

/// Admission threshold: 2^234 as a 256-bit big-endian integer.
///
/// A SHA-256 digest of the caller's key must compare at or below this
/// value, which over random keys happens with probability ~2^-22.
pub const AUTH_HASH_THRESHOLD: [u8; 32] = auth_hash_threshold();

const fn auth_hash_threshold() -> [u8; 32] {
    // Bit 234 of a 256-bit big-endian number sits in byte 2.
    let mut threshold = [0u8; 32];
    threshold[2] = 0x04;
    threshold
}
