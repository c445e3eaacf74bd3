//! C1 — narrow adapter over an ordered, persistent KV engine
//!
//! This is the interface the block store (C2) consumes. The actual LSM
//! engine (WAL, TTL expiry, compaction/GC) is an external collaborator per
//! spec.md §1 — this module only defines the shape of that collaborator and
//! ships two reference adapters: an in-memory one for tests and small
//! repositories, and a thin `sled`-backed one for durable single-node use.

pub mod memory;
#[cfg(feature = "sled")]
pub mod sled_store;

pub use memory::MemoryKv;
#[cfg(feature = "sled")]
pub use sled_store::SledKv;

use crate::error::Result;
use std::time::Duration;

/// A batch of writes applied atomically by [`KvStore::commit_batch`].
///
/// Mirrors the `Batch() -> batch handle` contract of spec.md §4.1: callers
/// accumulate puts/deletes, then commit them as one atomic unit.
#[derive(Debug, Default, Clone)]
pub struct Batch {
    puts: Vec<(Vec<u8>, Vec<u8>)>,
    deletes: Vec<Vec<u8>>,
}

impl Batch {
    /// Start an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a put
    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> &mut Self {
        self.puts.push((key.into(), value.into()));
        self
    }

    /// Queue a delete
    pub fn delete(&mut self, key: impl Into<Vec<u8>>) -> &mut Self {
        self.deletes.push(key.into());
        self
    }

    /// Number of queued operations
    pub fn len(&self) -> usize {
        self.puts.len() + self.deletes.len()
    }

    /// Whether the batch has no queued operations
    pub fn is_empty(&self) -> bool {
        self.puts.is_empty() && self.deletes.is_empty()
    }
}

/// Narrow, ordered, persistent key-value interface (spec.md §4.1)
///
/// Implementations order keys byte-lexicographically, apply each batch
/// atomically, and guarantee durability once `commit_batch`/`put` returns.
/// This crate imposes no policy beyond that contract — it is plumbing.
///
/// Uses `trait_variant` so the trait only requires `Send` off `wasm32`,
/// matching the pattern jacquard-repo's `BlockStore` trait uses for the same
/// reason (`storage/mod.rs`).
#[trait_variant::make(Send)]
pub trait KvStore: Clone {
    /// Fetch a value by key; `None` if absent
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Check key existence without fetching the value
    async fn has(&self, key: &[u8]) -> Result<bool>;

    /// Insert or overwrite a key
    async fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Insert or overwrite a key with an expiry
    ///
    /// Adapters without native TTL support (e.g. `SledKv`) emulate this by
    /// storing the deadline alongside the value and checking it lazily on
    /// read; an expired key behaves as absent but is not necessarily
    /// reclaimed until the next write or explicit GC sweep (external to this
    /// crate, per spec.md §1).
    async fn put_with_ttl(&self, key: &[u8], value: &[u8], ttl: Duration) -> Result<()>;

    /// Remove a key; a no-op (not an error) if the key is absent
    async fn delete(&self, key: &[u8]) -> Result<()>;

    /// Apply a batch of puts/deletes atomically
    async fn commit_batch(&self, batch: Batch) -> Result<()>;

    /// Iterate all (key, value) pairs whose key starts with `prefix`, in
    /// byte-lexicographic order
    ///
    /// `keys_only` lets an implementation skip fetching values it would
    /// otherwise discard (e.g. `AllKeys` in the block store only needs
    /// keys). Returns the full materialized sequence; callers needing
    /// cancellation mid-iteration should check a token between elements.
    async fn iterate(&self, prefix: &[u8], keys_only: bool) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Drop all data — for tests only
    async fn clear(&self) -> Result<()>;
}
