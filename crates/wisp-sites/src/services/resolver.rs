//! Read-path resolution
//!
//! Maps an incoming GET path onto stored content. The fallback chains
//! are ordered, finite candidate lists evaluated with early exit; each
//! lookup is only issued if the previous one missed, so nothing is
//! fetched speculatively.

use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;
use wisp_core::constants::INFO_FILE_NAME;
use wisp_core::{SiteError, SiteResult};
use wisp_store::{ContentStore, StoredFile};

/// Computed summary of a site: its info record plus an enumeration of
/// its files.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SiteSummary {
    pub url: String,
    pub site_creation: chrono::DateTime<chrono::Utc>,
    pub site_expiration: chrono::DateTime<chrono::Utc>,
    /// All manifest paths of the site, excluding the reserved info path.
    pub files: Vec<String>,
    /// Sum of the listed files' sizes, in bytes.
    pub total_site_size: u64,
}

/// What a GET path resolved to.
#[derive(Debug)]
pub enum Resolution {
    /// A stored file, served with the given status (200, or 404 when a
    /// custom 404 page substitutes for missing content).
    File { file: StoredFile, status: u16 },
    /// The reserved info path: the site summary document.
    Summary(SiteSummary),
    /// Root requested on a site with no index file; not an error.
    RootFallback { message: String, summary: SiteSummary },
}

/// Read-path operations on sites.
pub struct PathResolver {
    store: Arc<ContentStore>,
}

impl PathResolver {
    pub fn new(store: Arc<ContentStore>) -> Self {
        Self { store }
    }

    /// Resolve a GET request path against a site.
    pub async fn resolve(&self, public_key: &str, path: &str) -> SiteResult<Resolution> {
        if path == INFO_FILE_NAME {
            return Ok(Resolution::Summary(self.site_summary(public_key).await?));
        }

        if let Some(file) = self.store.get_file(public_key, path).await? {
            return Ok(Resolution::File { file, status: 200 });
        }

        if path.ends_with('/') {
            for candidate in index_candidates(path) {
                if let Some(file) = self.store.get_file(public_key, &candidate).await? {
                    return Ok(Resolution::File { file, status: 200 });
                }
            }

            if path == "/" {
                return Ok(Resolution::RootFallback {
                    message: format!(
                        "The site \"{public_key}\" has no index file, hence this summary response"
                    ),
                    summary: self.site_summary(public_key).await?,
                });
            }
        }

        // The site's own 404 pages substitute for missing content, with
        // the status still forced to 404.
        for fallback in ["/404.html", "/404.txt"] {
            if let Some(file) = self.store.get_file(public_key, fallback).await? {
                return Ok(Resolution::File { file, status: 404 });
            }
        }

        Err(SiteError::NotFound(format!(
            "file \"{path}\" not found in site \"{public_key}\""
        )))
    }

    /// Build the site summary document served at the reserved path.
    pub async fn site_summary(&self, public_key: &str) -> SiteResult<SiteSummary> {
        let Some(info) = self.store.site_info(public_key).await? else {
            return Err(SiteError::NotFound(format!(
                "site \"{public_key}\" not found"
            )));
        };

        let files = self.store.list_site(public_key).await?;
        let total_site_size = files.iter().map(|(_, size)| size).sum();

        Ok(SiteSummary {
            url: info.url,
            site_creation: info.site_creation,
            site_expiration: info.site_expiration,
            files: files.into_iter().map(|(path, _)| path).collect(),
            total_site_size,
        })
    }
}

/// Index candidates for a directory-style path, in resolution order.
fn index_candidates(path: &str) -> [String; 3] {
    [
        format!("{path}index.html"),
        format!("{}.html", &path[..path.len() - 1]),
        format!("{path}index.json"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::{Duration, Utc};
    use wisp_store::{content_hash, BlobProvenance, ManifestRecord, MemoryKv, SiteInfo};

    const PUBLIC_KEY: &str = "a1b2c3d4e5f6g7h8i9j0";

    async fn site_with_files(files: &[(&str, &[u8])]) -> PathResolver {
        let store = Arc::new(ContentStore::new(Arc::new(MemoryKv::new())));
        let expires = Utc::now() + Duration::days(30);

        store
            .put_site_info(
                PUBLIC_KEY,
                &SiteInfo {
                    url: format!("https://wisp.example/{PUBLIC_KEY}/"),
                    site_creation: Utc::now(),
                    site_expiration: expires,
                },
            )
            .await
            .unwrap();

        for (path, data) in files {
            let hash = content_hash(data);
            store
                .put_blob(
                    &hash,
                    Bytes::copy_from_slice(data),
                    expires,
                    &BlobProvenance {
                        public_key: PUBLIC_KEY.into(),
                        path: path.to_string(),
                    },
                )
                .await
                .unwrap();
            store
                .put_manifest(
                    PUBLIC_KEY,
                    path,
                    &ManifestRecord::HashReferenced {
                        content_hash: hash,
                        content_type: Some("text/html".into()),
                        size: data.len() as u64,
                        extra_headers: Vec::new(),
                    },
                    expires,
                )
                .await
                .unwrap();
        }

        PathResolver::new(store)
    }

    fn expect_file(resolution: Resolution) -> (StoredFile, u16) {
        match resolution {
            Resolution::File { file, status } => (file, status),
            other => panic!("expected a file, got {other:?}"),
        }
    }

    #[test]
    fn test_index_candidates_order() {
        assert_eq!(
            index_candidates("/docs/"),
            [
                "/docs/index.html".to_string(),
                "/docs.html".to_string(),
                "/docs/index.json".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn exact_path_wins() {
        let resolver = site_with_files(&[("/page.html", b"page")]).await;
        let (file, status) = expect_file(resolver.resolve(PUBLIC_KEY, "/page.html").await.unwrap());
        assert_eq!(status, 200);
        assert_eq!(file.content.as_ref(), b"page");
    }

    #[tokio::test]
    async fn root_serves_index_html() {
        let resolver =
            site_with_files(&[("/index.html", b"<h1>home</h1>"), ("/404.html", b"nope")]).await;
        let (file, status) = expect_file(resolver.resolve(PUBLIC_KEY, "/").await.unwrap());
        assert_eq!(status, 200);
        assert_eq!(file.content.as_ref(), b"<h1>home</h1>");
    }

    #[tokio::test]
    async fn directory_falls_back_to_sibling_html() {
        // /docs/ has no index.html, but /docs.html exists.
        let resolver = site_with_files(&[("/docs.html", b"docs page")]).await;
        let (file, status) = expect_file(resolver.resolve(PUBLIC_KEY, "/docs/").await.unwrap());
        assert_eq!(status, 200);
        assert_eq!(file.content.as_ref(), b"docs page");
    }

    #[tokio::test]
    async fn directory_index_json_is_last_resort() {
        let resolver = site_with_files(&[("/api/index.json", b"{}")]).await;
        let (file, status) = expect_file(resolver.resolve(PUBLIC_KEY, "/api/").await.unwrap());
        assert_eq!(status, 200);
        assert_eq!(file.content.as_ref(), b"{}");
    }

    #[tokio::test]
    async fn missing_path_serves_custom_404_with_404_status() {
        let resolver =
            site_with_files(&[("/index.html", b"home"), ("/404.html", b"custom missing")]).await;
        let (file, status) =
            expect_file(resolver.resolve(PUBLIC_KEY, "/missing").await.unwrap());
        assert_eq!(status, 404);
        assert_eq!(file.content.as_ref(), b"custom missing");
    }

    #[tokio::test]
    async fn txt_404_is_tried_after_html() {
        let resolver = site_with_files(&[("/404.txt", b"sorry")]).await;
        let (file, status) =
            expect_file(resolver.resolve(PUBLIC_KEY, "/missing").await.unwrap());
        assert_eq!(status, 404);
        assert_eq!(file.content.as_ref(), b"sorry");
    }

    #[tokio::test]
    async fn no_fallback_at_all_is_not_found() {
        let resolver = site_with_files(&[("/index.html", b"home")]).await;
        let error = resolver.resolve(PUBLIC_KEY, "/missing").await.unwrap_err();
        match error {
            SiteError::NotFound(message) => {
                assert!(message.contains("/missing"));
                assert!(message.contains(PUBLIC_KEY));
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_site_root_is_summary_not_error() {
        let resolver = site_with_files(&[]).await;
        match resolver.resolve(PUBLIC_KEY, "/").await.unwrap() {
            Resolution::RootFallback { message, summary } => {
                assert!(message.contains("no index file"));
                assert!(summary.files.is_empty());
                assert_eq!(summary.total_site_size, 0);
            }
            other => panic!("expected root fallback, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn info_path_returns_summary() {
        let resolver =
            site_with_files(&[("/a.html", b"aaa"), ("/b.html", b"bb")]).await;
        match resolver.resolve(PUBLIC_KEY, INFO_FILE_NAME).await.unwrap() {
            Resolution::Summary(summary) => {
                assert_eq!(summary.files, vec!["/a.html", "/b.html"]);
                assert_eq!(summary.total_site_size, 5);
                assert!(!summary.files.contains(&INFO_FILE_NAME.to_string()));
            }
            other => panic!("expected summary, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_site_summary_is_not_found() {
        let resolver = site_with_files(&[]).await;
        assert!(matches!(
            resolver.resolve("zzzzzzzzzzzzzzzzzzzz", INFO_FILE_NAME).await,
            Err(SiteError::NotFound(_))
        ));
    }
}
