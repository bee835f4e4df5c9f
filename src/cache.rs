//! Bounded TTL cache for aggregated results.
//!
//! LRU-evicted at a fixed capacity, with entries expiring on read once
//! their age exceeds the TTL. Keys bind the image content hash to the
//! caller's context tags, so the same file under different hints is a
//! different entry.

use std::num::NonZeroUsize;
use std::path::Path;
use std::time::{Duration, Instant};

use lru::LruCache;
use sha2::{Digest, Sha256};

use crate::types::FinalResult;

/// Cache key for one (image, context) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key from the image bytes and the sorted context tags. An
    /// unreadable file degrades to a path-based key so lookups still
    /// work within one process.
    pub fn for_image(path: &Path, context_tags: &[String]) -> Self {
        let file_hash = match std::fs::read(path) {
            Ok(bytes) => hex::encode(Sha256::digest(&bytes)),
            Err(err) => {
                tracing::debug!(
                    path = %path.display(),
                    error = %err,
                    "hashing path instead of unreadable file"
                );
                hex::encode(Sha256::digest(path.display().to_string().as_bytes()))
            }
        };

        let mut tags: Vec<&str> = context_tags.iter().map(String::as_str).collect();
        tags.sort_unstable();
        let context_hash = hex::encode(Sha256::digest(tags.join(",").as_bytes()));

        Self(format!("aggregated_{file_hash}_{context_hash}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

struct CachedEntry {
    result: FinalResult,
    stored_at: Instant,
}

/// Counters exposed for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub len: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub expirations: u64,
}

pub struct ResultCache {
    entries: LruCache<CacheKey, CachedEntry>,
    ttl: Duration,
    hits: u64,
    misses: u64,
    expirations: u64,
}

impl ResultCache {
    /// A zero capacity is clamped to one entry.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            ttl,
            hits: 0,
            misses: 0,
            expirations: 0,
        }
    }

    /// Look up a fresh entry. Expired entries are evicted on read.
    pub fn get(&mut self, key: &CacheKey) -> Option<FinalResult> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() <= self.ttl => {
                self.hits += 1;
                return Some(entry.result.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.pop(key);
            self.expirations += 1;
        }
        self.misses += 1;
        None
    }

    pub fn insert(&mut self, key: CacheKey, result: FinalResult) {
        self.entries.put(
            key,
            CachedEntry {
                result,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            len: self.entries.len(),
            capacity: self.entries.cap().get(),
            hits: self.hits,
            misses: self.misses,
            expirations: self.expirations,
        }
    }
}
