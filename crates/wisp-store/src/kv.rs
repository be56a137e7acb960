//! Durable KV backend seam
//!
//! [`KvBackend`] is the only interface the content store uses to talk to
//! the durable store: byte values, optional absolute expiration, prefix
//! listing and a conditional write. [`RedisKv`] is the production
//! implementation; [`MemoryKv`] backs tests and honors expirations so
//! TTL behavior is exercised for real.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use tracing::debug;

use crate::error::StoreError;

/// Byte-oriented durable KV store with per-key absolute expiration.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Fetch a value. Expired or missing keys both read as `None`.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    /// Write a value, optionally expiring at an absolute instant.
    async fn put(
        &self,
        key: &str,
        value: Bytes,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    /// Write a value only if the key does not exist yet. Returns whether
    /// the write happened.
    async fn put_if_absent(
        &self,
        key: &str,
        value: Bytes,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError>;

    /// List all keys starting with the given prefix.
    async fn scan(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// Redis-backed KV store used in production.
#[derive(Clone)]
pub struct RedisKv {
    conn: redis::aio::ConnectionManager,
}

impl RedisKv {
    /// Connect to Redis and build a managed connection.
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Build a SET command with an optional absolute expiration.
    fn set_cmd(key: &str, value: &[u8], expires_at: Option<DateTime<Utc>>) -> redis::Cmd {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(at) = expires_at {
            cmd.arg("EXAT").arg(at.timestamp());
        }
        cmd
    }
}

/// Escape Redis glob metacharacters so a literal prefix matches only
/// itself.
fn escape_pattern(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl KvBackend for RedisKv {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let mut conn = self.conn.clone();
        debug!("KV GET {}", key);
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value.map(Bytes::from))
    }

    async fn put(
        &self,
        key: &str,
        value: Bytes,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        debug!("KV SET {} ({} bytes)", key, value.len());
        let cmd = Self::set_cmd(key, &value, expires_at);
        let _: () = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: Bytes,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        debug!("KV SET NX {}", key);
        let mut cmd = Self::set_cmd(key, &value, expires_at);
        cmd.arg("NX");
        // SET ... NX answers OK when written, nil when the key existed.
        let result: Option<String> = cmd.query_async(&mut conn).await?;
        Ok(result.is_some())
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}*", escape_pattern(prefix));
        debug!("KV KEYS {}", pattern);
        let keys: Vec<String> = conn.keys(&pattern).await?;
        Ok(keys)
    }
}

struct MemoryEntry {
    value: Bytes,
    expires_at: Option<DateTime<Utc>>,
}

impl MemoryEntry {
    fn expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

/// In-memory KV store for tests.
#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvBackend for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let entries = self.entries.lock().unwrap();
        let now = Utc::now();
        Ok(entries
            .get(key)
            .filter(|e| !e.expired(now))
            .map(|e| e.value.clone()))
    }

    async fn put(
        &self,
        key: &str,
        value: Bytes,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(key.to_string(), MemoryEntry { value, expires_at });
        Ok(())
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: Bytes,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        let now = Utc::now();
        if entries.get(key).is_some_and(|e| !e.expired(now)) {
            return Ok(false);
        }
        entries.insert(key.to_string(), MemoryEntry { value, expires_at });
        Ok(true)
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let entries = self.entries.lock().unwrap();
        let now = Utc::now();
        Ok(entries
            .iter()
            .filter(|(k, e)| k.starts_with(prefix) && !e.expired(now))
            .map(|(k, _)| k.clone())
            .collect())
    }
}
