//! Bounded, time-expiring response cache.
//!
//! Entries are keyed by a fingerprint of the normalised query and its
//! context. Each entry remembers the backend that produced it so callers
//! can refuse answers their access grant does not cover. Expired entries
//! are never returned; they are dropped lazily on the next `put` or an
//! explicit `purge_expired`. Once full, the oldest entry by insertion order
//! is evicted.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::time::Instant;

/// A stored answer and the backend that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedAnswer {
    pub content: String,
    pub source: String,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    answer: CachedAnswer,
    created_at: Instant,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    /// Keys oldest first. Always holds exactly the keys of `entries`.
    order: VecDeque<String>,
}

impl CacheState {
    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        Some(entry)
    }

    fn purge_expired(&mut self, ttl: Duration) -> usize {
        let mut removed = 0;
        // Insertion order is creation order, so expired keys sit at the front.
        while let Some(key) = self.order.front() {
            let expired = self
                .entries
                .get(key)
                .is_none_or(|entry| entry.created_at.elapsed() >= ttl);
            if !expired {
                break;
            }
            if let Some(key) = self.order.pop_front() {
                self.entries.remove(&key);
                removed += 1;
            }
        }
        removed
    }
}

/// In-memory cache of backend answers. Safe to share between concurrent
/// queries; every operation runs under a single lock.
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    capacity: usize,
    state: Mutex<CacheState>,
}

impl ResponseCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fresh answer for `key`, or `None` if absent or expired.
    pub fn get(&self, key: &str) -> Option<CachedAnswer> {
        let state = self.lock();
        state
            .entries
            .get(key)
            .filter(|entry| entry.created_at.elapsed() < self.ttl)
            .map(|entry| entry.answer.clone())
    }

    /// Insert or overwrite the answer `source` gave for `key`. Overwriting
    /// restarts the entry's freshness window and makes it the newest entry.
    pub fn put(
        &self,
        key: impl Into<String>,
        source: impl Into<String>,
        content: impl Into<String>,
    ) {
        let key = key.into();
        let mut state = self.lock();

        state.purge_expired(self.ttl);
        if state.remove(&key).is_none() && state.entries.len() >= self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                state.entries.remove(&oldest);
                tracing::debug!(key = %oldest, "Evicted oldest cache entry");
            }
        }

        state.order.push_back(key.clone());
        state.entries.insert(
            key,
            CacheEntry {
                answer: CachedAnswer {
                    content: content.into(),
                    source: source.into(),
                },
                created_at: Instant::now(),
            },
        );
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn purge_expired(&self) -> usize {
        self.lock().purge_expired(self.ttl)
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.order.clear();
    }
}

/// Cache key for a query and its context.
///
/// The query is lower-cased, whitespace-collapsed and cut to
/// `max_query_chars` characters; the context is serialised as JSON (object
/// keys sorted). The key is the SHA-256 hex digest of both, so it is always
/// 64 characters. Returns `None` for a blank query or an unserialisable
/// context, which callers treat as a cache miss.
pub fn fingerprint(
    query: &str,
    context: &serde_json::Value,
    max_query_chars: usize,
) -> Option<String> {
    let normalized: String = query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .chars()
        .take(max_query_chars)
        .collect();
    if normalized.is_empty() {
        return None;
    }

    let context = match serde_json::to_string(context) {
        Ok(json) => json,
        Err(e) => {
            tracing::debug!(error = %e, "Context not serialisable, skipping cache");
            return None;
        }
    };

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hasher.update([0u8]);
    hasher.update(context.as_bytes());
    Some(format!("{:x}", hasher.finalize()))
}
