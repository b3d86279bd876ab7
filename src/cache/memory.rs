// ABOUTME: In-memory response cache with TTL expiry and bounded LRU eviction
// ABOUTME: Includes an optional background cleanup task for expired entries
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Insight Agent

use super::{CacheOptions, Fingerprint, ResponseCache};
use crate::errors::{AppError, AppResult};
use crate::models::InsightPayload;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// In-memory cache entry with expiration
#[derive(Debug, Clone)]
struct CacheEntry {
    data: Vec<u8>,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-memory cache with LRU eviction and optional background cleanup
///
/// `Arc<RwLock<LruCache>>` shares the store between cache operations and the
/// cleanup task. `LruCache` gives O(1) eviction of the least-recently-used
/// entry once the capacity bound is reached; TTL expiry is checked on read
/// and swept periodically so idle entries do not pin memory.
#[derive(Clone)]
pub struct InMemoryCache {
    store: Arc<RwLock<LruCache<String, CacheEntry>>>,
    shutdown_tx: Option<Arc<tokio::sync::mpsc::Sender<()>>>,
}

impl InMemoryCache {
    /// Fallback capacity when options specify zero entries
    const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1024) {
        Some(n) => n,
        None => unreachable!(),
    };

    /// Create a new in-memory cache
    #[must_use]
    pub fn new(options: &CacheOptions) -> Self {
        let capacity = NonZeroUsize::new(options.max_entries).unwrap_or(Self::DEFAULT_CAPACITY);
        let store = Arc::new(RwLock::new(LruCache::new(capacity)));

        let shutdown_tx = if options.enable_background_cleanup {
            let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
            let store_clone = store.clone();
            let cleanup_interval = options.cleanup_interval;

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(cleanup_interval);
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            Self::cleanup_expired(&store_clone).await;
                        }
                        _ = shutdown_rx.recv() => {
                            tracing::debug!("Cache cleanup task received shutdown signal");
                            break;
                        }
                    }
                }
            });

            Some(Arc::new(shutdown_tx))
        } else {
            None
        };

        Self { store, shutdown_tx }
    }

    /// Remove all expired entries from the store
    async fn cleanup_expired(store: &Arc<RwLock<LruCache<String, CacheEntry>>>) {
        let mut store_guard = store.write().await;

        let expired_keys: Vec<String> = store_guard
            .iter()
            .filter_map(|(k, v)| v.is_expired().then(|| k.clone()))
            .collect();

        for key in &expired_keys {
            store_guard.pop(key);
        }

        let removed = expired_keys.len();
        drop(store_guard);
        if removed > 0 {
            tracing::debug!("Cleaned up {} expired cache entries", removed);
        }
    }

    /// Number of live and expired-but-unswept entries currently held
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    /// Whether the cache holds no entries
    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl ResponseCache for InMemoryCache {
    async fn get(&self, key: &Fingerprint) -> AppResult<Option<InsightPayload>> {
        let mut store = self.store.write().await;

        // LruCache::get is mutable (updates access order)
        if let Some(entry) = store.get(key.as_str()) {
            if entry.is_expired() {
                store.pop(key.as_str());
                drop(store);
                return Ok(None);
            }

            let value: InsightPayload = serde_json::from_slice(&entry.data)
                .map_err(|e| AppError::internal(format!("cached entry deserialization: {e}")))?;
            drop(store);
            return Ok(Some(value));
        }
        drop(store);

        Ok(None)
    }

    async fn put(&self, key: &Fingerprint, value: &InsightPayload, ttl: Duration) -> AppResult<()> {
        let serialized = serde_json::to_vec(value)
            .map_err(|e| AppError::internal(format!("cache entry serialization: {e}")))?;
        let entry = CacheEntry::new(serialized, ttl);

        // LruCache evicts the least-recently-used entry automatically on push
        self.store.write().await.push(key.as_str().to_owned(), entry);

        Ok(())
    }

    async fn invalidate(&self, key: &Fingerprint) -> AppResult<()> {
        self.store.write().await.pop(key.as_str());
        Ok(())
    }

    async fn clear_all(&self) -> AppResult<()> {
        self.store.write().await.clear();
        Ok(())
    }
}

impl Drop for InMemoryCache {
    fn drop(&mut self) {
        // The cleanup task exits once every sender clone is gone; try_send
        // hurries it along when this is the last handle.
        if let Some(tx) = &self.shutdown_tx {
            if let Err(e) = tx.try_send(()) {
                tracing::debug!(error = ?e, "Cache shutdown signal send failed (channel likely closed)");
            }
        }
    }
}
