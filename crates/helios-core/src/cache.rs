//! Injected cache capability for upstream completions.
//!
//! The adapter never talks to a concrete store; it holds an
//! `Arc<dyn InsightCache>` so deployments can swap the in-memory map for a
//! shared store without touching the pipeline.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

/// Read/write-through cache keyed by the serialized request identity.
#[async_trait]
pub trait InsightCache: Send + Sync {
    /// Returns the cached raw completion text, or `None` on miss or expiry.
    async fn get(&self, key: &str) -> Option<String>;
    /// Stores `value` under `key` for `ttl`. Overwrites any prior entry.
    async fn put(&self, key: &str, value: String, ttl: Duration);
}

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// Process-local cache backed by a concurrent map. Expired entries are
/// removed lazily on the next `get` for their key.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InsightCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let expired = match self.entries.get(key) {
            Some(entry) => {
                if Instant::now() < entry.expires_at {
                    return Some(entry.value.clone());
                }
                true
            }
            None => false,
        };
        if expired {
            tracing::trace!(key, "cache entry expired");
            self.entries.remove(key);
        }
        None
    }

    async fn put(&self, key: &str, value: String, ttl: Duration) {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_value_within_ttl() {
        let cache = MemoryCache::new();
        cache
            .put("k", "payload".to_string(), Duration::from_secs(60))
            .await;
        assert_eq!(cache.get("k").await.as_deref(), Some("payload"));
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss() {
        let cache = MemoryCache::new();
        cache.put("k", "payload".to_string(), Duration::ZERO).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn put_overwrites_existing_entry() {
        let cache = MemoryCache::new();
        cache
            .put("k", "first".to_string(), Duration::from_secs(60))
            .await;
        cache
            .put("k", "second".to_string(), Duration::from_secs(60))
            .await;
        assert_eq!(cache.get("k").await.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn unknown_key_is_a_miss() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("absent").await, None);
    }
}
