//! Persisted record shapes
//!
//! All records are stored as JSON. The manifest record is an exhaustive
//! two-case union rather than a bag of optional fields: old writers
//! stored file content inline in the manifest, current writers store a
//! content-hash reference to a separately stored blob. Untagged serde
//! keeps both shapes readable.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A site's info record, served verbatim as part of the site summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SiteInfo {
    /// Public URL of the site root.
    pub url: String,
    pub site_creation: DateTime<Utc>,
    pub site_expiration: DateTime<Utc>,
}

/// Per-path manifest entry for one file of one site.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ManifestRecord {
    /// Current shape: the content lives in a separate blob record keyed
    /// by its hash.
    HashReferenced {
        content_hash: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        content_type: Option<String>,
        size: u64,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        extra_headers: Vec<(String, String)>,
    },
    /// Legacy shape: the content itself is embedded in the manifest.
    /// Still readable, never written.
    LegacyInline {
        #[serde(with = "base64_bytes")]
        content: Vec<u8>,
        #[serde(skip_serializing_if = "Option::is_none")]
        content_type: Option<String>,
        size: u64,
    },
}

impl ManifestRecord {
    pub fn size(&self) -> u64 {
        match self {
            ManifestRecord::HashReferenced { size, .. } => *size,
            ManifestRecord::LegacyInline { size, .. } => *size,
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        match self {
            ManifestRecord::HashReferenced { content_type, .. } => content_type.as_deref(),
            ManifestRecord::LegacyInline { content_type, .. } => content_type.as_deref(),
        }
    }
}

/// Which site and path last wrote a blob. Stored alongside the blob
/// bytes; informational only, blobs are shared across sites.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlobProvenance {
    pub public_key: String,
    pub path: String,
}

/// A resolved file ready to be served.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub content: Bytes,
    pub content_type: Option<String>,
    pub extra_headers: Vec<(String, String)>,
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_referenced_round_trip() {
        let record = ManifestRecord::HashReferenced {
            content_hash: "abc123".into(),
            content_type: Some("text/html".into()),
            size: 42,
            extra_headers: vec![("cache-control".into(), "no-store".into())],
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(serde_json::from_str::<ManifestRecord>(&json).unwrap(), record);
    }

    #[test]
    fn legacy_record_parses_without_hash() {
        // Shape written by earlier versions: content inline, no hash.
        let json = r#"{"content":"aGVsbG8=","content_type":"text/plain","size":5}"#;
        let record: ManifestRecord = serde_json::from_str(json).unwrap();
        match record {
            ManifestRecord::LegacyInline {
                content,
                content_type,
                size,
            } => {
                assert_eq!(content, b"hello");
                assert_eq!(content_type.as_deref(), Some("text/plain"));
                assert_eq!(size, 5);
            }
            other => panic!("parsed as {other:?}"),
        }
    }

    #[test]
    fn extra_headers_default_to_empty() {
        let json = r#"{"content_hash":"h","size":1}"#;
        let record: ManifestRecord = serde_json::from_str(json).unwrap();
        match record {
            ManifestRecord::HashReferenced {
                extra_headers,
                content_type,
                ..
            } => {
                assert!(extra_headers.is_empty());
                assert!(content_type.is_none());
            }
            other => panic!("parsed as {other:?}"),
        }
    }
}
