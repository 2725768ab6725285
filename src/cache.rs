//! TTL'd snapshot cache fronting the metadata store.
//!
//! Entries are msgpack-encoded entity snapshots keyed by entity id. The cache
//! is an optimization, never an authority: the metadata store remains the
//! source of truth, and writers are expected to refresh or evict entries
//! before reporting success (see [`crate::store::CachedStore`]).

use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;

struct Entry {
    payload: Vec<u8>,
    expires_at: Instant,
}

/// Concurrent key-value cache with a fixed per-entry TTL.
pub struct Cache {
    entries: DashMap<String, Entry>,
    ttl: Duration,
}

impl Cache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Fetch and decode a snapshot. Expired or undecodable entries are
    /// dropped and reported as misses; a miss is never an error.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let payload = {
            let entry = self.entries.get(key)?;
            if entry.expires_at <= Instant::now() {
                drop(entry);
                self.entries.remove(key);
                return None;
            }
            entry.payload.clone()
        };

        match rmp_serde::from_slice(&payload) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Discarding undecodable cache entry");
                self.entries.remove(key);
                None
            }
        }
    }

    /// Store a snapshot under `key`. A serialization failure is logged and
    /// swallowed so a cache write can never fail the triggering operation.
    pub fn put<T: Serialize>(&self, key: &str, value: &T) {
        match rmp_serde::to_vec_named(value) {
            Ok(payload) => {
                self.entries.insert(
                    key.to_string(),
                    Entry {
                        payload,
                        expires_at: Instant::now() + self.ttl,
                    },
                );
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to serialize cache entry");
            }
        }
    }

    /// Drop the entry for `key`, if any.
    pub fn evict(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Whether a live (unexpired) entry exists for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|e| e.expires_at > Instant::now())
    }
}
