//! Signed capability tokens
//!
//! A token is `"sk_" + base64(signature || payload)` where the payload
//! is the canonical JSON of [`CapabilityClaims`] and the signature is
//! HMAC-SHA512 over those payload bytes with the process-wide secret
//! key. The 64-byte signature length is a format contract: verification
//! splits the decoded token at exactly that offset.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use wisp_core::constants::{SIGNATURE_LENGTH, SITE_TTL_SECS, TOKEN_PREFIX, UPLOAD_TTL_SECS};
use wisp_core::{SiteError, SiteResult};

type HmacSha512 = Hmac<Sha512>;

/// The logical payload embedded in a capability token. Never stored;
/// reconstructed by verifying the token on each upload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapabilityClaims {
    /// Site this capability grants upload rights to.
    pub public_key: String,
    /// Site creation time, epoch milliseconds.
    pub creation: i64,
}

impl CapabilityClaims {
    pub fn new(public_key: String, creation_time: DateTime<Utc>) -> Self {
        Self {
            public_key,
            creation: creation_time.timestamp_millis(),
        }
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.creation)
            .single()
            .unwrap_or_default()
    }

    /// Uploads are accepted until this instant.
    pub fn upload_deadline(&self) -> DateTime<Utc> {
        self.creation_time() + Duration::seconds(UPLOAD_TTL_SECS)
    }

    /// The site and everything stored for it expire at this instant.
    pub fn site_expiration(&self) -> DateTime<Utc> {
        self.creation_time() + Duration::seconds(SITE_TTL_SECS)
    }
}

/// Issues and verifies capability tokens with the store-resident secret
/// signing key.
pub struct CapabilityTokenService {
    secret: Vec<u8>,
}

impl CapabilityTokenService {
    pub fn new(secret: Vec<u8>) -> Self {
        Self { secret }
    }

    fn mac(&self) -> SiteResult<HmacSha512> {
        HmacSha512::new_from_slice(&self.secret)
            .map_err(|_| SiteError::Internal("invalid secret key length".into()))
    }

    /// Sign claims into a bearer token.
    pub fn sign(&self, claims: &CapabilityClaims) -> SiteResult<String> {
        let payload = serde_json::to_vec(claims)
            .map_err(|e| SiteError::Internal(format!("claims serialization failed: {e}")))?;

        let mut mac = self.mac()?;
        mac.update(&payload);
        let signature = mac.finalize().into_bytes();

        // Format contract: verify() splits at this exact offset.
        if signature.len() != SIGNATURE_LENGTH {
            return Err(SiteError::Internal(format!(
                "signature length {} != {}",
                signature.len(),
                SIGNATURE_LENGTH
            )));
        }

        let mut raw = Vec::with_capacity(SIGNATURE_LENGTH + payload.len());
        raw.extend_from_slice(&signature);
        raw.extend_from_slice(&payload);
        Ok(format!("{TOKEN_PREFIX}{}", URL_SAFE_NO_PAD.encode(raw)))
    }

    /// Verify a token and recover its claims.
    ///
    /// The MAC comparison is constant-time (`Mac::verify_slice`). Every
    /// malformation maps to the same `AuthFailed` so callers cannot
    /// distinguish a bad signature from a truncated token.
    pub fn verify(&self, token: &str) -> SiteResult<CapabilityClaims> {
        let invalid = || SiteError::AuthFailed("invalid capability token".into());

        let encoded = token.strip_prefix(TOKEN_PREFIX).unwrap_or(token);
        let raw = URL_SAFE_NO_PAD
            .decode(encoded.as_bytes())
            .map_err(|_| invalid())?;
        if raw.len() <= SIGNATURE_LENGTH {
            return Err(invalid());
        }
        let (signature, payload) = raw.split_at(SIGNATURE_LENGTH);

        let mut mac = self.mac()?;
        mac.update(payload);
        mac.verify_slice(signature).map_err(|_| invalid())?;

        serde_json::from_slice(payload).map_err(|_| invalid())
    }

    /// Verify a token and bind it to an upload request: the claims must
    /// name the requested site and the upload window must still be open.
    pub fn authorize_upload(
        &self,
        token: &str,
        public_key: &str,
        now: DateTime<Utc>,
    ) -> SiteResult<CapabilityClaims> {
        let claims = self.verify(token)?;
        if claims.public_key != public_key {
            return Err(SiteError::BadRequest(format!(
                "capability token is not valid for site \"{public_key}\""
            )));
        }
        if now > claims.upload_deadline() {
            return Err(SiteError::Gone(format!(
                "the upload window for site \"{public_key}\" has elapsed"
            )));
        }
        Ok(claims)
    }
}
