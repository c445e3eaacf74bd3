//! In-memory KV adapter, grounded on jacquard-repo's `MemoryBlockStore`
//! (`storage/memory.rs`): a `BTreeMap` behind an `Arc<RwLock<..>>` so clones
//! share the same backing map.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::kv::{Batch, KvStore};

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self) -> bool {
        match self.expires_at {
            Some(deadline) => Instant::now() < deadline,
            None => true,
        }
    }
}

/// In-memory, ordered KV store. Useful for tests and repositories small
/// enough to fit in memory; contents are lost on drop.
#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    entries: Arc<RwLock<BTreeMap<Vec<u8>, Entry>>>,
}

impl MemoryKv {
    /// Create a new, empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKv {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let guard = self.entries.read().unwrap();
        Ok(guard
            .get(key)
            .filter(|e| e.is_live())
            .map(|e| e.value.clone()))
    }

    async fn has(&self, key: &[u8]) -> Result<bool> {
        let guard = self.entries.read().unwrap();
        Ok(guard.get(key).is_some_and(|e| e.is_live()))
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.entries.write().unwrap().insert(
            key.to_vec(),
            Entry {
                value: value.to_vec(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn put_with_ttl(&self, key: &[u8], value: &[u8], ttl: Duration) -> Result<()> {
        self.entries.write().unwrap().insert(
            key.to_vec(),
            Entry {
                value: value.to_vec(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &[u8]) -> Result<()> {
        self.entries.write().unwrap().remove(key);
        Ok(())
    }

    async fn commit_batch(&self, batch: Batch) -> Result<()> {
        let mut guard = self.entries.write().unwrap();
        for (key, value) in batch.puts {
            guard.insert(
                key,
                Entry {
                    value,
                    expires_at: None,
                },
            );
        }
        for key in batch.deletes {
            guard.remove(&key);
        }
        Ok(())
    }

    async fn iterate(&self, prefix: &[u8], keys_only: bool) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let guard = self.entries.read().unwrap();
        Ok(guard
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .filter(|(_, e)| e.is_live())
            .map(|(k, e)| (k.clone(), if keys_only { Vec::new() } else { e.value.clone() }))
            .collect())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().unwrap().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_and_get() {
        let kv = MemoryKv::new();
        kv.put(b"a", b"1").await.unwrap();
        assert_eq!(kv.get(b"a").await.unwrap(), Some(b"1".to_vec()));
        assert_eq!(kv.get(b"missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn ttl_expires() {
        let kv = MemoryKv::new();
        kv.put_with_ttl(b"a", b"1", Duration::from_millis(5))
            .await
            .unwrap();
        assert!(kv.has(b"a").await.unwrap());
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!kv.has(b"a").await.unwrap());
        assert_eq!(kv.get(b"a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn batch_is_atomic_from_callers_view() {
        let kv = MemoryKv::new();
        kv.put(b"x", b"old").await.unwrap();

        let mut batch = Batch::new();
        batch.put(b"x".to_vec(), b"new".to_vec());
        batch.put(b"y".to_vec(), b"1".to_vec());
        batch.delete(b"z".to_vec());
        kv.commit_batch(batch).await.unwrap();

        assert_eq!(kv.get(b"x").await.unwrap(), Some(b"new".to_vec()));
        assert_eq!(kv.get(b"y").await.unwrap(), Some(b"1".to_vec()));
    }

    #[tokio::test]
    async fn iterate_by_prefix_sorted() {
        let kv = MemoryKv::new();
        for k in ["a/1", "a/2", "b/1", "a/0"] {
            kv.put(k.as_bytes(), b"v").await.unwrap();
        }
        let got = kv.iterate(b"a/", false).await.unwrap();
        let keys: Vec<_> = got
            .into_iter()
            .map(|(k, _)| String::from_utf8(k).unwrap())
            .collect();
        assert_eq!(keys, vec!["a/0", "a/1", "a/2"]);
    }

    #[tokio::test]
    async fn clone_shares_storage() {
        let kv1 = MemoryKv::new();
        let kv2 = kv1.clone();
        kv1.put(b"k", b"v").await.unwrap();
        assert!(kv2.has(b"k").await.unwrap());
    }
}
