//! Site creation and upload
//!
//! The write half of the engine. Creation runs the admission gate, the
//! collision pre-check and the quota check before issuing a capability
//! and writing the info record. Upload binds the capability to the
//! requested site, rejects the reserved path, clears quota and then
//! writes the blob and manifest pair.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::info;
use wisp_auth::{check_admission, CapabilityClaims, CapabilityTokenService};
use wisp_core::constants::{INFO_FILE_NAME, PUBLIC_KEY_LENGTH};
use wisp_core::utils::{create_random_string, guess_content_type};
use wisp_core::{SiteError, SiteResult};
use wisp_quota::{QuotaService, SiteCreationCheck};
use wisp_store::{content_hash, BlobProvenance, ContentStore, ManifestRecord, SiteInfo};

/// Outcome of a successful site creation.
#[derive(Debug, Clone)]
pub struct NewSite {
    pub public_key: String,
    /// Capability token granting upload rights; shown to the caller
    /// once, never stored.
    pub secret_key: String,
    pub url: String,
    pub site_creation: DateTime<Utc>,
    pub site_expiration: DateTime<Utc>,
    pub upload_expiration: DateTime<Utc>,
    pub sites_created_24h: u64,
}

/// Outcome of a successful file upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub path: String,
    pub content_type: String,
    pub size: u64,
    pub total_site_size: u64,
}

/// Write-path operations on sites.
pub struct SiteService {
    store: Arc<ContentStore>,
    tokens: Arc<CapabilityTokenService>,
    quota: Arc<dyn QuotaService>,
    /// Public origin used to build site URLs, e.g. `https://wisp.sh`.
    origin: String,
}

impl SiteService {
    pub fn new(
        store: Arc<ContentStore>,
        tokens: Arc<CapabilityTokenService>,
        quota: Arc<dyn QuotaService>,
        origin: String,
    ) -> Self {
        Self {
            store,
            tokens,
            quota,
            origin: origin.trim_end_matches('/').to_string(),
        }
    }

    /// Create a new site.
    pub async fn create_site(
        &self,
        auth_header: Option<&str>,
        user_agent: Option<&str>,
        ip_address: &str,
    ) -> SiteResult<NewSite> {
        let auth_key = check_admission(auth_header)?;

        let Some(user_agent) = user_agent else {
            return Err(SiteError::BadRequest("no \"User-Agent\" header found".into()));
        };

        let public_key = create_random_string(PUBLIC_KEY_LENGTH);

        // Collision in a 36^20 key space shouldn't happen; checked
        // anyway because the consequence would be handing out a
        // capability for someone else's site.
        if self.store.site_exists(&public_key).await? {
            return Err(SiteError::Conflict(
                "site with this public key already exists".into(),
            ));
        }

        let check = SiteCreationCheck {
            public_key: public_key.clone(),
            auth_key,
            user_agent: user_agent.to_string(),
            ip_address: ip_address.to_string(),
        };
        let sites_created_24h = self.quota.check_site_creation(&check).await?;

        info!(
            "creating new site public_key={} sites_created_24h={}",
            public_key, sites_created_24h
        );

        let claims = CapabilityClaims::new(public_key.clone(), Utc::now());
        let secret_key = self.tokens.sign(&claims)?;

        let site_info = SiteInfo {
            url: format!("{}/{}/", self.origin, public_key),
            site_creation: claims.creation_time(),
            site_expiration: claims.site_expiration(),
        };
        self.store.put_site_info(&public_key, &site_info).await?;

        Ok(NewSite {
            public_key,
            secret_key,
            url: site_info.url,
            site_creation: site_info.site_creation,
            site_expiration: site_info.site_expiration,
            upload_expiration: claims.upload_deadline(),
            sites_created_24h,
        })
    }

    /// Upload one file to a site under a capability token.
    pub async fn upload_file(
        &self,
        public_key: &str,
        path: &str,
        token: Option<&str>,
        content_type: Option<String>,
        extra_headers: Vec<(String, String)>,
        body: Bytes,
    ) -> SiteResult<UploadOutcome> {
        let Some(token) = token else {
            return Err(SiteError::AuthRequired(
                "Authorization header required".into(),
            ));
        };
        let claims = self
            .tokens
            .authorize_upload(token, public_key, Utc::now())?;

        if path == INFO_FILE_NAME {
            return Err(SiteError::AuthFailed(format!(
                "overwriting \"{INFO_FILE_NAME}\" is forbidden"
            )));
        }

        let size = body.len() as u64;
        let hash = content_hash(&body);

        // The quota service sees the prospective additional size before
        // anything is written.
        let total_site_size = self.quota.check_new_file(public_key, size).await?;

        let content_type =
            content_type.unwrap_or_else(|| guess_content_type(path).to_string());

        // Blob and manifest both expire with the site; the offsets are
        // set independently from the same capability timestamp.
        let expires_at = claims.site_expiration();
        let record = ManifestRecord::HashReferenced {
            content_hash: hash.clone(),
            content_type: Some(content_type.clone()),
            size,
            extra_headers,
        };
        let provenance = BlobProvenance {
            public_key: public_key.to_string(),
            path: path.to_string(),
        };

        tokio::try_join!(
            self.store.put_blob(&hash, body, expires_at, &provenance),
            self.store
                .put_manifest(public_key, path, &record, expires_at),
        )?;

        info!(
            "uploaded {}{} ({} bytes, total {})",
            public_key, path, size, total_site_size
        );

        Ok(UploadOutcome {
            path: path.to_string(),
            content_type,
            size,
            total_site_size,
        })
    }
}
