//! Blob handles and the blob URL cache
//!
//! A [`BlobUrl`] pairs an opaque `blob:` URL with the bytes it names, so a
//! handle can be passed to whatever consumes it (image decoder, audio player)
//! without another index lookup.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Raw asset bytes with an optional MIME hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    bytes: Bytes,
    mime: Option<&'static str>,
}

impl Blob {
    /// Create a blob.
    pub fn new(bytes: Bytes, mime: Option<&'static str>) -> Self {
        Self { bytes, mime }
    }

    /// The content.
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// MIME hint, if the extension is known.
    pub fn mime(&self) -> Option<&'static str> {
        self.mime
    }

    /// Content length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the blob is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A `blob:` URL handle. Cloning shares the same URL and bytes.
#[derive(Debug, Clone)]
pub struct BlobUrl {
    url: Arc<str>,
    blob: Blob,
}

impl BlobUrl {
    /// Mint a new unique URL for `blob`.
    pub fn create(blob: Blob) -> Self {
        Self {
            url: format!("blob:starassets/{}", Uuid::new_v4()).into(),
            blob,
        }
    }

    /// The URL string.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The blob behind the URL.
    pub fn blob(&self) -> &Blob {
        &self.blob
    }

    /// Whether two handles were minted from the same `create` call.
    pub fn same_handle(&self, other: &BlobUrl) -> bool {
        Arc::ptr_eq(&self.url, &other.url)
    }
}

impl PartialEq for BlobUrl {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for BlobUrl {}

impl std::fmt::Display for BlobUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}

/// A cached handle and when it was last handed out.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The cached handle.
    pub url: BlobUrl,
    /// Last time the handle was returned.
    pub last_access: DateTime<Utc>,
}

/// Cache statistics for debugging
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub created: usize,
}

/// Memoizing path -> [`BlobUrl`] cache.
///
/// Entries are never evicted. `last_access` is maintained so an eviction
/// policy can be layered on later.
#[derive(Debug, Default)]
pub struct BlobCache {
    entries: HashMap<String, CacheEntry>,
    stats: CacheStats,
}

impl BlobCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached handle for `path`, refreshing its last access time.
    pub fn get(&mut self, path: &str) -> Option<BlobUrl> {
        if let Some(entry) = self.entries.get_mut(path) {
            entry.last_access = Utc::now();
            self.stats.hits += 1;
            Some(entry.url.clone())
        } else {
            self.stats.misses += 1;
            None
        }
    }

    /// Mint and cache a handle for `path`.
    pub fn insert(&mut self, path: &str, blob: Blob) -> BlobUrl {
        let url = BlobUrl::create(blob);
        self.stats.created += 1;
        self.entries.insert(
            path.to_string(),
            CacheEntry {
                url: url.clone(),
                last_access: Utc::now(),
            },
        );
        url
    }

    /// Entry for `path` without touching its access time.
    pub fn peek(&self, path: &str) -> Option<&CacheEntry> {
        self.entries.get(path)
    }

    /// Number of cached handles.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hit/miss counters.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}
