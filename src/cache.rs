//! In-memory blob store implementation.
//!
//! Data is stored in an `RwLock`-protected map and is lost when the store is
//! dropped. Entries carry their insertion timestamp for TTL-based invalidation;
//! expired entries are dropped lazily on access.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::traits::BlobStore;

/// Cache entry with timestamp for TTL-based invalidation.
#[derive(Debug, Clone)]
struct CacheEntry {
    data: Vec<u8>,
    cached_at: DateTime<Utc>,
    ttl: Option<Duration>,
}

impl CacheEntry {
    fn new(data: Vec<u8>, ttl: Option<Duration>) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
            ttl,
        }
    }

    fn is_stale(&self) -> bool {
        match self.ttl {
            Some(ttl) => {
                let age = Utc::now().signed_duration_since(self.cached_at);
                age >= chrono::TimeDelta::from_std(ttl).unwrap_or(chrono::TimeDelta::MAX)
            }
            None => false,
        }
    }
}

/// Simple in-memory cache for testing and development.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryBlobStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (non-expired) entries.
    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries.values().filter(|e| !e.is_stale()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_stale() => return Some(entry.data.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // Stale: drop it under the write lock.
        let mut entries = self.entries.write().await;
        entries.remove(key);
        None
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, ttl: Option<Duration>) {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), CacheEntry::new(bytes, ttl));
    }

    async fn evict(&self, key: &str) {
        let mut entries = self.entries.write().await;
        entries.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_evict() {
        let store = MemoryBlobStore::new();
        store.put("a", b"hello".to_vec(), None).await;
        assert_eq!(store.get("a").await, Some(b"hello".to_vec()));
        assert_eq!(store.len().await, 1);

        store.evict("a").await;
        assert_eq!(store.get("a").await, None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let store = MemoryBlobStore::new();
        store
            .put("a", b"x".to_vec(), Some(Duration::from_secs(0)))
            .await;
        // Zero TTL is immediately stale.
        assert_eq!(store.get("a").await, None);
    }

    #[tokio::test]
    async fn test_missing_key() {
        let store = MemoryBlobStore::new();
        assert_eq!(store.get("missing").await, None);
    }
}
