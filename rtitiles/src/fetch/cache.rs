//! Process-wide cache of fetched layer payloads.
//!
//! Backed by `moka::future::Cache`, which is lock-free for reads and safe to
//! use from many fetch tasks at once. Entries are weighted by payload size and
//! evicted LRU-style once the byte budget is exceeded.
//!
//! The cache is a cheap handle: clones share the same storage, so one cache
//! can serve every pyramid in the process. It is cleared wholesale when a
//! pyramid is disposed or its surfaces are rebuilt.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::FutureExt;
use moka::future::Cache;

use super::{BoxFuture, TileFetcher};
use crate::error::FetchError;

/// Hit/miss counters of a [`TextureCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextureCacheStats {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

/// In-memory cache of layer payloads keyed by resource identifier.
#[derive(Clone)]
pub struct TextureCache {
    cache: Cache<String, Bytes>,
    max_size_bytes: u64,
    counters: Arc<Counters>,
}

impl TextureCache {
    /// Create a new cache holding at most `max_size_bytes` of payload.
    pub fn new(max_size_bytes: u64) -> Self {
        let cache = Cache::builder()
            // moka weights are u32; cap very large payloads
            .weigher(|_key: &String, value: &Bytes| -> u32 {
                value.len().min(u32::MAX as usize) as u32
            })
            .max_capacity(max_size_bytes)
            .build();

        Self {
            cache,
            max_size_bytes,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Look up a payload.
    pub async fn get(&self, url: &str) -> Option<Bytes> {
        match self.cache.get(url).await {
            Some(data) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Some(data)
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a payload. Eviction happens automatically.
    pub async fn put(&self, url: &str, data: Bytes) {
        self.cache.insert(url.to_string(), data).await;
        self.cache.run_pending_tasks().await;
    }

    pub fn contains(&self, url: &str) -> bool {
        self.cache.contains_key(url)
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn size_bytes(&self) -> u64 {
        self.cache.weighted_size()
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    pub fn stats(&self) -> TextureCacheStats {
        TextureCacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
        }
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.cache.invalidate_all();
        let _ = self.cache.run_pending_tasks().now_or_never();
    }
}

/// Serves fetches from a [`TextureCache`], falling through to `inner` on a
/// miss and caching successful results.
pub struct CachedFetcher<F> {
    inner: F,
    cache: TextureCache,
}

impl<F: TileFetcher> CachedFetcher<F> {
    pub fn new(inner: F, cache: TextureCache) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &TextureCache {
        &self.cache
    }
}

impl<F: TileFetcher> TileFetcher for CachedFetcher<F> {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, FetchError>> {
        Box::pin(async move {
            if let Some(data) = self.cache.get(url).await {
                tracing::trace!(url, "texture cache hit");
                return Ok(data);
            }
            let data = self.inner.fetch(url).await?;
            self.cache.put(url, data.clone()).await;
            Ok(data)
        })
    }

    fn clear_cache(&self) {
        tracing::debug!(entries = self.cache.entry_count(), "clearing texture cache");
        self.cache.clear();
        self.inner.clear_cache();
    }
}
