//! `sled`-backed KV adapter
//!
//! `sled` already provides the LSM engine, WAL, and crash durability that
//! spec.md §1 places out of scope for this crate ("The persistent KV engine
//! beneath the block store ... we only consume a narrow KV interface") — this
//! module is exactly that narrow adapter, not a reimplementation of the
//! engine. Grounded on `sled` usage elsewhere in the pack
//! (`txpipe-dolos`, `alpenlabs-alpen` manifests).
//!
//! `sled` has no native per-key TTL, so expiry is emulated by prefixing every
//! stored value with an 8-byte little-endian millisecond deadline (0 =
//! no expiry) and checking it lazily on read, mirroring `MemoryKv`'s lazy
//! expiry policy.

use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{RepoError, Result};
use crate::kv::{Batch, KvStore};

const HEADER_LEN: usize = 8;

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn encode(value: &[u8], deadline_millis: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + value.len());
    buf.extend_from_slice(&deadline_millis.to_le_bytes());
    buf.extend_from_slice(value);
    buf
}

/// Returns `None` if the entry is absent or expired
fn decode(raw: sled::IVec) -> Option<Vec<u8>> {
    if raw.len() < HEADER_LEN {
        return None;
    }
    let mut deadline_bytes = [0u8; HEADER_LEN];
    deadline_bytes.copy_from_slice(&raw[..HEADER_LEN]);
    let deadline = u64::from_le_bytes(deadline_bytes);
    if deadline != 0 && now_millis() >= deadline {
        return None;
    }
    Some(raw[HEADER_LEN..].to_vec())
}

/// Embedded-LSM-backed KV store
#[derive(Clone)]
pub struct SledKv {
    db: sled::Db,
}

impl SledKv {
    /// Open (or create) a sled database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path).map_err(RepoError::storage)?;
        Ok(Self { db })
    }

    /// Open a temporary, process-local sled database (tests, scratch use)
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(RepoError::storage)?;
        Ok(Self { db })
    }
}

impl KvStore for SledKv {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let db = self.db.clone();
        let key = key.to_vec();
        tokio::task::spawn_blocking(move || {
            let raw = db.get(&key).map_err(RepoError::storage)?;
            Ok(raw.and_then(decode))
        })
        .await
        .map_err(RepoError::storage)?
    }

    async fn has(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let db = self.db.clone();
        let key = key.to_vec();
        let encoded = encode(value, 0);
        tokio::task::spawn_blocking(move || db.insert(key, encoded).map(|_| ()))
            .await
            .map_err(RepoError::storage)?
            .map_err(RepoError::storage)
    }

    async fn put_with_ttl(&self, key: &[u8], value: &[u8], ttl: Duration) -> Result<()> {
        let deadline = now_millis() + ttl.as_millis() as u64;
        let db = self.db.clone();
        let key = key.to_vec();
        let encoded = encode(value, deadline.max(1));
        tokio::task::spawn_blocking(move || db.insert(key, encoded).map(|_| ()))
            .await
            .map_err(RepoError::storage)?
            .map_err(RepoError::storage)
    }

    async fn delete(&self, key: &[u8]) -> Result<()> {
        let db = self.db.clone();
        let key = key.to_vec();
        tokio::task::spawn_blocking(move || db.remove(key).map(|_| ()))
            .await
            .map_err(RepoError::storage)?
            .map_err(RepoError::storage)
    }

    async fn commit_batch(&self, batch: Batch) -> Result<()> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let mut sled_batch = sled::Batch::default();
            for (key, value) in batch.puts {
                sled_batch.insert(key, encode(&value, 0));
            }
            for key in batch.deletes {
                sled_batch.remove(key);
            }
            db.apply_batch(sled_batch)
        })
        .await
        .map_err(RepoError::storage)?
        .map_err(RepoError::storage)
    }

    async fn iterate(&self, prefix: &[u8], keys_only: bool) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let db = self.db.clone();
        let prefix = prefix.to_vec();
        tokio::task::spawn_blocking(move || {
            let mut out = Vec::new();
            for item in db.scan_prefix(&prefix) {
                let (k, v) = item.map_err(RepoError::storage)?;
                if let Some(value) = decode(v) {
                    out.push((
                        k.to_vec(),
                        if keys_only { Vec::new() } else { value },
                    ));
                }
            }
            Ok(out)
        })
        .await
        .map_err(RepoError::storage)?
    }

    async fn clear(&self) -> Result<()> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || db.clear())
            .await
            .map_err(RepoError::storage)?
            .map_err(RepoError::storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_and_get() {
        let kv = SledKv::temporary().unwrap();
        kv.put(b"a", b"1").await.unwrap();
        assert_eq!(kv.get(b"a").await.unwrap(), Some(b"1".to_vec()));
    }

    #[tokio::test]
    async fn ttl_expires() {
        let kv = SledKv::temporary().unwrap();
        kv.put_with_ttl(b"a", b"1", Duration::from_millis(5))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(kv.get(b"a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn iterate_prefix() {
        let kv = SledKv::temporary().unwrap();
        kv.put(b"a/1", b"x").await.unwrap();
        kv.put(b"a/2", b"y").await.unwrap();
        kv.put(b"b/1", b"z").await.unwrap();
        let got = kv.iterate(b"a/", false).await.unwrap();
        assert_eq!(got.len(), 2);
    }
}
