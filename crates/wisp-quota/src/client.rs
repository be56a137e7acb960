//! Quota RPC client
//!
//! Two idempotent POST endpoints on a PostgREST-style API. Both answer
//! the new running total on success and JSON `null` when the caller is
//! over the limit. Retries and timeouts are a deployment concern; the
//! client reports transport failures as-is.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};
use wisp_core::constants::{MAX_SITE_SIZE, SITES_PER_DAY};

use crate::error::QuotaError;

/// Parameters of a site-creation quota check.
#[derive(Debug, Clone, Serialize)]
pub struct SiteCreationCheck {
    /// The freshly generated public key of the prospective site.
    pub public_key: String,
    /// The admission key, doubling as the requester's opaque identity.
    pub auth_key: String,
    pub user_agent: String,
    pub ip_address: String,
}

/// The external quota service contract.
#[async_trait]
pub trait QuotaService: Send + Sync {
    /// Count the site against the requester's 24h budget. Returns the
    /// number of sites created by this requester in the last 24 hours.
    async fn check_site_creation(&self, check: &SiteCreationCheck) -> Result<u64, QuotaError>;

    /// Count the prospective additional bytes against the site's size
    /// budget. Returns the new total site size.
    async fn check_new_file(&self, public_key: &str, file_size: u64) -> Result<u64, QuotaError>;
}

/// HTTP implementation of [`QuotaService`].
pub struct HttpQuotaClient {
    client: reqwest::Client,
    root_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct NewSiteRpc<'a> {
    public_key: &'a str,
    auth_key: &'a str,
    max_sites: u32,
    user_agent: &'a str,
    ip_address: &'a str,
}

#[derive(Serialize)]
struct NewFileRpc<'a> {
    public_key: &'a str,
    file_size: u64,
    size_limit: u64,
}

impl HttpQuotaClient {
    pub fn new(root_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            root_url,
            api_key,
        }
    }

    /// POST one RPC function. `Ok(None)` means the service answered with
    /// an empty or `null` body, i.e. the operation was rejected.
    async fn rpc<B: Serialize>(
        &self,
        function: &str,
        body: &B,
    ) -> Result<Option<Value>, QuotaError> {
        let url = format!(
            "{}/rest/v1/rpc/{}",
            self.root_url.trim_end_matches('/'),
            function
        );
        debug!("quota rpc {}", url);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| QuotaError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| QuotaError::Transport(e.to_string()))?;

        if !matches!(status, 200 | 201) {
            error!("quota rpc {} failed: {} {}", function, status, text);
            return Err(QuotaError::BadStatus { status, body: text });
        }

        if text.is_empty() {
            return Ok(None);
        }
        let value: Value =
            serde_json::from_str(&text).map_err(|e| QuotaError::Decode(e.to_string()))?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(value))
    }
}

fn expect_count(value: Value) -> Result<u64, QuotaError> {
    value
        .as_u64()
        .ok_or_else(|| QuotaError::Decode(format!("expected a number, got {value}")))
}

#[async_trait]
impl QuotaService for HttpQuotaClient {
    async fn check_site_creation(&self, check: &SiteCreationCheck) -> Result<u64, QuotaError> {
        let body = NewSiteRpc {
            public_key: &check.public_key,
            auth_key: &check.auth_key,
            max_sites: SITES_PER_DAY,
            user_agent: &check.user_agent,
            ip_address: &check.ip_address,
        };
        match self.rpc("check_new_site", &body).await? {
            Some(value) => expect_count(value),
            None => Err(QuotaError::SiteLimitExceeded(SITES_PER_DAY)),
        }
    }

    async fn check_new_file(&self, public_key: &str, file_size: u64) -> Result<u64, QuotaError> {
        let body = NewFileRpc {
            public_key,
            file_size,
            size_limit: MAX_SITE_SIZE,
        };
        match self.rpc("check_new_file", &body).await? {
            Some(value) => expect_count(value),
            None => Err(QuotaError::SizeLimitExceeded(MAX_SITE_SIZE)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn check() -> SiteCreationCheck {
        SiteCreationCheck {
            public_key: "a1b2c3d4e5f6g7h8i9j0".into(),
            auth_key: "mined-key".into(),
            user_agent: "wisp-test".into(),
            ip_address: "203.0.113.9".into(),
        }
    }

    #[tokio::test]
    async fn site_creation_returns_recent_count() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/check_new_site"))
            .and(header("apikey", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "auth_key": "mined-key",
                "max_sites": SITES_PER_DAY,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("3"))
            .mount(&server)
            .await;

        let client = HttpQuotaClient::new(server.uri(), "test-key".into());
        assert_eq!(client.check_site_creation(&check()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn null_body_means_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/check_new_site"))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .mount(&server)
            .await;

        let client = HttpQuotaClient::new(server.uri(), "test-key".into());
        assert!(matches!(
            client.check_site_creation(&check()).await,
            Err(QuotaError::SiteLimitExceeded(_))
        ));
    }

    #[tokio::test]
    async fn empty_body_means_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/check_new_file"))
            .respond_with(ResponseTemplate::new(201).set_body_string(""))
            .mount(&server)
            .await;

        let client = HttpQuotaClient::new(server.uri(), "test-key".into());
        assert!(matches!(
            client.check_new_file("a1b2c3d4e5f6g7h8i9j0", 1024).await,
            Err(QuotaError::SizeLimitExceeded(_))
        ));
    }

    #[tokio::test]
    async fn new_file_returns_total_size() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/check_new_file"))
            .and(body_partial_json(serde_json::json!({
                "file_size": 2048,
                "size_limit": MAX_SITE_SIZE,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("4096"))
            .mount(&server)
            .await;

        let client = HttpQuotaClient::new(server.uri(), "test-key".into());
        assert_eq!(
            client.check_new_file("a1b2c3d4e5f6g7h8i9j0", 2048).await.unwrap(),
            4096
        );
    }

    #[tokio::test]
    async fn non_success_status_is_upstream_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/check_new_site"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = HttpQuotaClient::new(server.uri(), "test-key".into());
        let error = client.check_site_creation(&check()).await.unwrap_err();
        assert!(matches!(error, QuotaError::BadStatus { status: 500, .. }));

        // And it converts to a 502-class site error, never a quota one.
        let site_error: wisp_core::SiteError = error.into();
        assert!(matches!(
            site_error,
            wisp_core::SiteError::UpstreamFailure(_)
        ));
    }
}
