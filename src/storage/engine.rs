//! Thread-Safe Sharded Storage Engine
//!
//! The keyspace is split into shards, each behind its own `RwLock`. A command
//! acquires write guards for the shards covering the keys it declared and
//! runs against the resulting [`KeyspaceGuard`], so every command is a single
//! linearizable step for the keys it touches.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//!        ▲                         ▲
//!        └──── KeyspaceGuard ──────┘   (write guards, ascending order)
//! ```
//!
//! Guards are always taken in ascending shard order, which rules out lock
//! cycles between multi-key commands such as MSET and BITOP.

use crate::storage::keyspace::{KeyspaceError, KeyspaceService};
use crate::storage::value::Value;
use bytes::Bytes;
use std::collections::hash_map::Entry as MapEntry;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{PoisonError, RwLock, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::trace;

/// Number of shards for the storage engine.
pub const NUM_SHARDS: usize = 64;

/// Current wall clock time in unix milliseconds.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Determines which shard a key belongs to.
#[inline]
fn shard_index(key: &[u8]) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() as usize) % NUM_SHARDS
}

/// A stored value with its optional absolute expiry.
#[derive(Debug, Clone)]
pub struct Entry {
    pub value: Value,
    /// Expiry in unix milliseconds (None = never expires)
    pub expires_at_ms: Option<u64>,
}

impl Entry {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            expires_at_ms: None,
        }
    }

    #[inline]
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms.is_some_and(|at| now_ms >= at)
    }
}

/// A single shard containing a portion of the keyspace.
#[derive(Debug, Default)]
pub struct Shard {
    entries: HashMap<Bytes, Entry>,
    /// Keys reclaimed by lazy or active expiry
    expired: u64,
}

impl Shard {
    /// Removes `key` if it has expired. Returns `true` if it was reclaimed.
    fn reclaim_if_expired(&mut self, key: &[u8], now_ms: u64) -> bool {
        if self.entries.get(key).is_some_and(|e| e.is_expired(now_ms)) {
            self.entries.remove(key);
            self.expired += 1;
            return true;
        }
        false
    }

    fn live_mut(&mut self, key: &[u8], now_ms: u64) -> Option<&mut Entry> {
        self.reclaim_if_expired(key, now_ms);
        self.entries.get_mut(key)
    }
}

/// The keyspace shared by every client connection.
///
/// Wrap it in an `Arc` and hand a clone to each connection. All access goes
/// through [`StorageEngine::lock`].
pub struct StorageEngine {
    shards: Vec<RwLock<Shard>>,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("shards", &self.shards.len())
            .field("keys", &self.len())
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    pub fn new() -> Self {
        let shards = (0..NUM_SHARDS).map(|_| RwLock::new(Shard::default())).collect();
        Self { shards }
    }

    /// Acquires exclusive access to the shards covering `keys`.
    ///
    /// Duplicate keys and keys sharing a shard are locked once. The guard
    /// only answers for the keys' shards; touching any other key through it
    /// is a programming error and panics.
    pub fn lock<K: AsRef<[u8]>>(&self, keys: &[K]) -> KeyspaceGuard<'_> {
        let mut indices: Vec<usize> = keys.iter().map(|k| shard_index(k.as_ref())).collect();
        indices.sort_unstable();
        indices.dedup();

        let guards = indices
            .into_iter()
            .map(|idx| {
                let guard = self.shards[idx]
                    .write()
                    .unwrap_or_else(PoisonError::into_inner);
                (idx, guard)
            })
            .collect();

        KeyspaceGuard {
            guards,
            now_ms: unix_millis(),
        }
    }

    /// Number of keys currently stored, including expired keys that have
    /// not been reclaimed yet.
    pub fn len(&self) -> u64 {
        self.shards
            .iter()
            .map(|s| s.read().unwrap_or_else(PoisonError::into_inner).entries.len() as u64)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of keys reclaimed by expiry so far.
    pub fn expired_count(&self) -> u64 {
        self.shards
            .iter()
            .map(|s| s.read().unwrap_or_else(PoisonError::into_inner).expired)
            .sum()
    }

    /// Removes every expired key, one shard at a time.
    ///
    /// Returns the number of keys removed.
    pub fn cleanup_expired(&self) -> u64 {
        let now = unix_millis();
        let mut cleaned = 0u64;

        for shard in &self.shards {
            let mut shard = shard.write().unwrap_or_else(PoisonError::into_inner);
            let before = shard.entries.len();

            shard.entries.retain(|_, entry| !entry.is_expired(now));

            let removed = (before - shard.entries.len()) as u64;
            shard.expired += removed;
            cleaned += removed;
        }

        cleaned
    }
}

/// Exclusive access to a set of shards for the duration of one command.
pub struct KeyspaceGuard<'a> {
    /// Sorted by shard index
    guards: Vec<(usize, RwLockWriteGuard<'a, Shard>)>,
    /// Command time, used for every expiry check made through this guard
    now_ms: u64,
}

impl KeyspaceGuard<'_> {
    fn shard_mut(&mut self, key: &[u8]) -> &mut Shard {
        let idx = shard_index(key);
        match self.guards.binary_search_by_key(&idx, |(i, _)| *i) {
            Ok(pos) => &mut *self.guards[pos].1,
            Err(_) => panic!(
                "key {:?} maps to shard {} which is not held by this guard",
                String::from_utf8_lossy(key),
                idx
            ),
        }
    }
}

impl KeyspaceService for KeyspaceGuard<'_> {
    fn get_value(&mut self, key: &[u8]) -> Option<&mut Value> {
        let now = self.now_ms;
        let shard = self.shard_mut(key);
        if shard.reclaim_if_expired(key, now) {
            trace!(key = %String::from_utf8_lossy(key), "Lazily expired key");
        }
        shard.entries.get_mut(key).map(|e| &mut e.value)
    }

    fn set_value(&mut self, key: Bytes, value: Value) -> &mut Value {
        let now = self.now_ms;
        let shard = self.shard_mut(&key);
        match shard.entries.entry(key) {
            MapEntry::Occupied(occupied) => {
                let entry = occupied.into_mut();
                if entry.is_expired(now) {
                    entry.expires_at_ms = None;
                }
                entry.value = value;
                &mut entry.value
            }
            MapEntry::Vacant(vacant) => &mut vacant.insert(Entry::new(value)).value,
        }
    }

    fn clear_expire(&mut self, key: &[u8]) -> bool {
        let now = self.now_ms;
        self.shard_mut(key)
            .live_mut(key, now)
            .is_some_and(|e| e.expires_at_ms.take().is_some())
    }

    fn set_expire(&mut self, key: &[u8], at_ms: u64) -> bool {
        let now = self.now_ms;
        match self.shard_mut(key).live_mut(key, now) {
            Some(entry) => {
                entry.expires_at_ms = Some(at_ms);
                true
            }
            None => false,
        }
    }

    fn get_expire(&mut self, key: &[u8]) -> Result<Option<u64>, KeyspaceError> {
        let now = self.now_ms;
        self.shard_mut(key)
            .live_mut(key, now)
            .map(|e| e.expires_at_ms)
            .ok_or(KeyspaceError::NotExist)
    }

    fn delete(&mut self, key: &[u8]) -> bool {
        let now = self.now_ms;
        let shard = self.shard_mut(key);
        shard.reclaim_if_expired(key, now);
        shard.entries.remove(key).is_some()
    }
}
