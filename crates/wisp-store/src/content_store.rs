//! Content-addressed store for site files
//!
//! Blobs live under `file:{hash}` with the hash derived from the bytes
//! themselves, so identical uploads from any site collapse into one
//! stored object. Each site has a manifest keyed `site:{pk}:{path}`
//! mapping served paths onto blob references, plus an info record at the
//! reserved path. Blobs are not reference-counted; their lifetime is
//! governed purely by their own TTL.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use wisp_core::constants::{INFO_FILE_NAME, SECRET_KEY_LENGTH, SECRET_KEY_STORE_KEY};

use crate::error::StoreError;
use crate::kv::KvBackend;
use crate::records::{BlobProvenance, ManifestRecord, SiteInfo, StoredFile};

/// Content digest of raw bytes: URL-safe base64 of SHA-256.
pub fn content_hash(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(data))
}

/// Storage operations for sites, manifests and blobs.
pub struct ContentStore {
    kv: Arc<dyn KvBackend>,
}

impl ContentStore {
    pub fn new(kv: Arc<dyn KvBackend>) -> Self {
        Self { kv }
    }

    fn manifest_key(public_key: &str, path: &str) -> String {
        format!("site:{public_key}:{path}")
    }

    fn manifest_prefix(public_key: &str) -> String {
        format!("site:{public_key}:")
    }

    fn blob_key(hash: &str) -> String {
        format!("file:{hash}")
    }

    fn blob_meta_key(hash: &str) -> String {
        format!("file:{hash}:meta")
    }

    /// Write a blob and its provenance record under the content hash.
    ///
    /// Writing identical bytes again lands on the same key with the same
    /// value, so re-uploads are a no-op in effect.
    pub async fn put_blob(
        &self,
        hash: &str,
        data: Bytes,
        expires_at: DateTime<Utc>,
        provenance: &BlobProvenance,
    ) -> Result<(), StoreError> {
        let meta = serde_json::to_vec(provenance)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        debug!("put blob {} ({} bytes)", hash, data.len());
        let blob_key = Self::blob_key(hash);
        let meta_key = Self::blob_meta_key(hash);
        tokio::try_join!(
            self.kv.put(&blob_key, data, Some(expires_at)),
            self.kv.put(&meta_key, Bytes::from(meta), Some(expires_at)),
        )?;
        Ok(())
    }

    /// Write (or overwrite) the manifest entry for one path of one site.
    pub async fn put_manifest(
        &self,
        public_key: &str,
        path: &str,
        record: &ManifestRecord,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let value =
            serde_json::to_vec(record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.kv
            .put(
                &Self::manifest_key(public_key, path),
                Bytes::from(value),
                Some(expires_at),
            )
            .await
    }

    /// Exact-path read of a stored file.
    ///
    /// Dual-mode: a hash-referenced manifest entry needs a second read
    /// for the blob; a legacy entry carries its content inline. A
    /// manifest whose blob has already expired reads as absent, the same
    /// as any other stale store state.
    pub async fn get_file(
        &self,
        public_key: &str,
        path: &str,
    ) -> Result<Option<StoredFile>, StoreError> {
        let key = Self::manifest_key(public_key, path);
        let Some(raw) = self.kv.get(&key).await? else {
            return Ok(None);
        };

        let record: ManifestRecord = match serde_json::from_slice(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!("undecodable manifest record at {}: {}", key, e);
                return Ok(None);
            }
        };

        match record {
            ManifestRecord::HashReferenced {
                content_hash,
                content_type,
                extra_headers,
                ..
            } => {
                let Some(content) = self.kv.get(&Self::blob_key(&content_hash)).await? else {
                    warn!("manifest {} references missing blob {}", key, content_hash);
                    return Ok(None);
                };
                Ok(Some(StoredFile {
                    content,
                    content_type,
                    extra_headers,
                }))
            }
            ManifestRecord::LegacyInline {
                content,
                content_type,
                ..
            } => Ok(Some(StoredFile {
                content: Bytes::from(content),
                content_type,
                extra_headers: Vec::new(),
            })),
        }
    }

    /// Read a site's info record.
    pub async fn site_info(&self, public_key: &str) -> Result<Option<SiteInfo>, StoreError> {
        let key = Self::manifest_key(public_key, INFO_FILE_NAME);
        match self.kv.get(&key).await? {
            Some(raw) => serde_json::from_slice(&raw)
                .map(Some)
                .map_err(|e| StoreError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }

    /// True if the public key is already taken.
    pub async fn site_exists(&self, public_key: &str) -> Result<bool, StoreError> {
        let key = Self::manifest_key(public_key, INFO_FILE_NAME);
        Ok(self.kv.get(&key).await?.is_some())
    }

    /// Write a site's info record, expiring with the site.
    pub async fn put_site_info(&self, public_key: &str, info: &SiteInfo) -> Result<(), StoreError> {
        let value =
            serde_json::to_vec(info).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.kv
            .put(
                &Self::manifest_key(public_key, INFO_FILE_NAME),
                Bytes::from(value),
                Some(info.site_expiration),
            )
            .await
    }

    /// All manifest paths of a site with their sizes, excluding the
    /// reserved info record.
    ///
    /// Entries that vanish between the key scan and the record read are
    /// skipped; so are undecodable records.
    pub async fn list_site(&self, public_key: &str) -> Result<Vec<(String, u64)>, StoreError> {
        let prefix = Self::manifest_prefix(public_key);
        let keys = self.kv.scan(&prefix).await?;

        let paths: Vec<String> = keys
            .into_iter()
            .filter_map(|k| k.strip_prefix(&prefix).map(str::to_string))
            .filter(|p| p != INFO_FILE_NAME)
            .collect();

        let reads = paths.iter().map(|p| {
            let key = Self::manifest_key(public_key, p);
            async move { self.kv.get(&key).await }
        });
        let values = try_join_all(reads).await?;

        let mut files = Vec::with_capacity(paths.len());
        for (path, value) in paths.into_iter().zip(values) {
            let Some(raw) = value else { continue };
            match serde_json::from_slice::<ManifestRecord>(&raw) {
                Ok(record) => files.push((path, record.size())),
                Err(e) => warn!("skipping undecodable manifest for {}: {}", path, e),
            }
        }
        files.sort();
        Ok(files)
    }

    /// Fetch the process-wide secret signing key, creating it on first
    /// use.
    ///
    /// The create path is a read-modify-write: two instances cold
    /// starting concurrently could each generate a key. The conditional
    /// write narrows that window where the backend supports it (Redis
    /// does), and the loser of the race converges on the stored winner;
    /// a backend without a real conditional write keeps the documented
    /// residual risk of a few unverifiable in-flight tokens.
    pub async fn get_or_create_secret_key(&self) -> Result<Vec<u8>, StoreError> {
        if let Some(existing) = self.kv.get(SECRET_KEY_STORE_KEY).await? {
            return Ok(existing.to_vec());
        }

        let mut key = vec![0u8; SECRET_KEY_LENGTH];
        rand::thread_rng().fill_bytes(&mut key);

        if self
            .kv
            .put_if_absent(SECRET_KEY_STORE_KEY, Bytes::from(key.clone()), None)
            .await?
        {
            info!("generated new secret signing key");
            return Ok(key);
        }

        self.kv
            .get(SECRET_KEY_STORE_KEY)
            .await?
            .map(|b| b.to_vec())
            .ok_or_else(|| StoreError::Internal("secret signing key vanished after race".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;
    use chrono::Duration;

    fn store() -> (ContentStore, Arc<MemoryKv>) {
        let kv = Arc::new(MemoryKv::new());
        (ContentStore::new(kv.clone()), kv)
    }

    fn provenance(public_key: &str, path: &str) -> BlobProvenance {
        BlobProvenance {
            public_key: public_key.into(),
            path: path.into(),
        }
    }

    fn in_a_month() -> DateTime<Utc> {
        Utc::now() + Duration::days(30)
    }

    async fn upload(store: &ContentStore, public_key: &str, path: &str, data: &[u8]) -> String {
        let hash = content_hash(data);
        let expires = in_a_month();
        store
            .put_blob(
                &hash,
                Bytes::copy_from_slice(data),
                expires,
                &provenance(public_key, path),
            )
            .await
            .unwrap();
        store
            .put_manifest(
                public_key,
                path,
                &ManifestRecord::HashReferenced {
                    content_hash: hash.clone(),
                    content_type: Some("text/html".into()),
                    size: data.len() as u64,
                    extra_headers: Vec::new(),
                },
                expires,
            )
            .await
            .unwrap();
        hash
    }

    #[tokio::test]
    async fn file_round_trip() {
        let (store, _) = store();
        upload(&store, "site1", "/index.html", b"<h1>hi</h1>").await;

        let file = store.get_file("site1", "/index.html").await.unwrap().unwrap();
        assert_eq!(file.content.as_ref(), b"<h1>hi</h1>");
        assert_eq!(file.content_type.as_deref(), Some("text/html"));
        assert!(store.get_file("site1", "/other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn identical_content_shares_one_blob() {
        let (store, kv) = store();
        let hash_a = upload(&store, "site1", "/a.html", b"same bytes").await;
        let hash_b = upload(&store, "site1", "/b.html", b"same bytes").await;
        assert_eq!(hash_a, hash_b);

        // Two manifest entries, one blob (plus its provenance record).
        assert_eq!(kv.scan("site:site1:").await.unwrap().len(), 2);
        assert_eq!(kv.scan("file:").await.unwrap().len(), 2);

        let files = store.list_site("site1").await.unwrap();
        assert_eq!(
            files,
            vec![("/a.html".to_string(), 10), ("/b.html".to_string(), 10)]
        );
    }

    #[tokio::test]
    async fn legacy_inline_manifest_is_served() {
        let (store, kv) = store();
        kv.put(
            "site:old:/page.txt",
            Bytes::from_static(br#"{"content":"b2xkIGNvbnRlbnQ=","content_type":"text/plain","size":11}"#),
            None,
        )
        .await
        .unwrap();

        let file = store.get_file("old", "/page.txt").await.unwrap().unwrap();
        assert_eq!(file.content.as_ref(), b"old content");
        assert_eq!(file.content_type.as_deref(), Some("text/plain"));
        assert!(file.extra_headers.is_empty());
    }

    #[tokio::test]
    async fn manifest_with_expired_blob_reads_as_absent() {
        let (store, kv) = store();
        upload(&store, "site1", "/index.html", b"content").await;

        // Simulate expiry skew: the blob disappears first.
        let hash = content_hash(b"content");
        kv.put(
            &format!("file:{hash}"),
            Bytes::new(),
            Some(Utc::now() - Duration::seconds(1)),
        )
        .await
        .unwrap();

        assert!(store.get_file("site1", "/index.html").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn site_info_round_trip_and_listing_excludes_it() {
        let (store, _) = store();
        let info = SiteInfo {
            url: "https://wisp.example/abcd/".into(),
            site_creation: Utc::now(),
            site_expiration: in_a_month(),
        };
        store.put_site_info("abcd", &info).await.unwrap();

        assert!(store.site_exists("abcd").await.unwrap());
        assert_eq!(store.site_info("abcd").await.unwrap().unwrap().url, info.url);

        upload(&store, "abcd", "/index.html", b"x").await;
        let files = store.list_site("abcd").await.unwrap();
        assert_eq!(files, vec![("/index.html".to_string(), 1)]);
    }

    #[tokio::test]
    async fn secret_key_is_created_once() {
        let (store, _) = store();
        let first = store.get_or_create_secret_key().await.unwrap();
        let second = store.get_or_create_secret_key().await.unwrap();
        assert_eq!(first.len(), SECRET_KEY_LENGTH);
        assert_eq!(first, second);
    }
}
