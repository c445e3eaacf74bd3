//! C2 — content-addressed block store with a decoded-block LRU cache
//!
//! Implements spec.md §4.2's full operation table over a generic `K: KvStore`
//! (C1). Grounded on jacquard-repo's `storage::memory::MemoryBlockStore` for
//! the cache-then-base-store read path, generalized to hold any `KvStore`
//! backend rather than being its own concrete map, since spec.md layers C2
//! strictly atop C1 instead of giving C2 its own storage choices.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use cid::Cid as IpldCid;
use ipld_core::ipld::Ipld;
use lru::LruCache;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::{RepoError, Result};
use crate::kv::{Batch, KvStore};
use crate::storage::link::LinkPrototype;
use crate::storage::selector::Selector;

/// Default decoded-block cache capacity (entry count), per spec.md §4.2
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;
/// Default Prefetch worker count when the caller passes `<= 0`, per spec.md §5
pub const DEFAULT_PREFETCH_WORKERS: usize = 8;

fn kv_key(cid: &IpldCid) -> Vec<u8> {
    cid.to_bytes()
}

/// Recursively collect every CID linked from an IPLD node
///
/// There is no selector-aware pruning here beyond explore-all: every list
/// element and map value is visited. This is the only selector spec.md §4.2
/// requires (§9 Open Questions), so `storage::selector::Selector` is only
/// consulted to reject anything else before traversal starts.
fn collect_links(node: &Ipld, out: &mut Vec<IpldCid>) {
    match node {
        Ipld::Link(cid) => out.push(*cid),
        Ipld::List(items) => items.iter().for_each(|item| collect_links(item, out)),
        Ipld::Map(map) => map.values().for_each(|v| collect_links(v, out)),
        _ => {}
    }
}

/// C2: content-addressed block store over a `K: KvStore` base
pub struct BlockStore<K: KvStore> {
    kv: K,
    cache: Arc<RwLock<LruCache<String, Bytes>>>,
}

impl<K: KvStore> Clone for BlockStore<K> {
    fn clone(&self) -> Self {
        Self {
            kv: self.kv.clone(),
            cache: self.cache.clone(),
        }
    }
}

impl<K: KvStore + 'static> BlockStore<K> {
    /// Construct a block store with the default cache capacity
    pub fn new(kv: K) -> Self {
        Self::with_cache_capacity(kv, DEFAULT_CACHE_CAPACITY)
    }

    /// Construct a block store with an explicit decoded-block cache capacity
    pub fn with_cache_capacity(kv: K, capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            kv,
            cache: Arc::new(RwLock::new(LruCache::new(cap))),
        }
    }

    /// Persist one block, populating the cache
    pub async fn put_block(&self, cid: &IpldCid, data: Bytes) -> Result<()> {
        self.kv.put(&kv_key(cid), &data).await?;
        self.cache.write().unwrap().put(cid.to_string(), data);
        Ok(())
    }

    /// Persist many blocks atomically at C1 granularity
    pub async fn put_blocks(&self, blocks: &[(IpldCid, Bytes)]) -> Result<()> {
        let mut batch = Batch::new();
        for (cid, data) in blocks {
            batch.put(kv_key(cid), data.to_vec());
        }
        self.kv.commit_batch(batch).await?;
        let mut cache = self.cache.write().unwrap();
        for (cid, data) in blocks {
            cache.put(cid.to_string(), data.clone());
        }
        Ok(())
    }

    /// Fetch a block's bytes, consulting the cache first
    pub async fn get_block(&self, cid: &IpldCid) -> Result<Option<Bytes>> {
        let key = cid.to_string();
        if let Some(hit) = self.cache.read().unwrap().peek(&key) {
            return Ok(Some(hit.clone()));
        }
        match self.kv.get(&kv_key(cid)).await? {
            Some(raw) => {
                let data = Bytes::from(raw);
                self.cache.write().unwrap().put(key, data.clone());
                Ok(Some(data))
            }
            None => Ok(None),
        }
    }

    /// Check block existence, consulting the cache first
    pub async fn has_block(&self, cid: &IpldCid) -> Result<bool> {
        if self.cache.read().unwrap().contains(&cid.to_string()) {
            return Ok(true);
        }
        self.kv.has(&kv_key(cid)).await
    }

    /// Size in bytes of the block named by `cid`
    pub async fn get_size(&self, cid: &IpldCid) -> Result<usize> {
        self.get_block(cid)
            .await?
            .map(|b| b.len())
            .ok_or_else(|| RepoError::not_found("block", cid))
    }

    /// Remove a block from base storage and the cache
    pub async fn delete_block(&self, cid: &IpldCid) -> Result<()> {
        self.kv.delete(&kv_key(cid)).await?;
        self.cache.write().unwrap().pop(&cid.to_string());
        Ok(())
    }

    /// Hand a block's bytes to `consumer` without an extra owned copy beyond
    /// the cache/KV layer's own buffer
    pub async fn view<F: FnOnce(&[u8])>(&self, cid: &IpldCid, consumer: F) -> Result<()> {
        let data = self
            .get_block(cid)
            .await?
            .ok_or_else(|| RepoError::not_found("block", cid))?;
        consumer(&data);
        Ok(())
    }

    /// Every CID currently in base storage
    pub async fn all_keys(&self) -> Result<Vec<IpldCid>> {
        let pairs = self.kv.iterate(&[], true).await?;
        pairs
            .into_iter()
            .map(|(k, _)| IpldCid::try_from(k).map_err(RepoError::decode))
            .collect()
    }

    /// Encode `node` under `proto`, store it, and return its CID
    pub async fn put_node<T: Serialize>(&self, node: &T, proto: LinkPrototype) -> Result<IpldCid> {
        let bytes = serde_ipld_dagcbor::to_vec(node).map_err(RepoError::decode)?;
        let cid = proto.cid_for(&bytes)?;
        self.put_block(&cid, Bytes::from(bytes)).await?;
        Ok(cid)
    }

    /// Decode a node as a generic IPLD value
    pub async fn get_node_any(&self, cid: &IpldCid) -> Result<Ipld> {
        let bytes = self
            .get_block(cid)
            .await?
            .ok_or_else(|| RepoError::not_found("node", cid))?;
        serde_ipld_dagcbor::from_slice(&bytes).map_err(RepoError::decode)
    }

    /// Decode a node coerced to a specific Rust type
    pub async fn get_node_as<T: DeserializeOwned>(&self, cid: &IpldCid) -> Result<T> {
        let bytes = self
            .get_block(cid)
            .await?
            .ok_or_else(|| RepoError::not_found("node", cid))?;
        serde_ipld_dagcbor::from_slice(&bytes).map_err(RepoError::decode)
    }

    /// Depth-first traversal under `selector` (explore-all is the only
    /// implemented kind), calling `visit(progress, node)` on each node
    /// reached, including the root
    pub async fn walk<F>(
        &self,
        root: &IpldCid,
        selector: &Selector,
        cancel: &CancellationToken,
        mut visit: F,
    ) -> Result<()>
    where
        F: FnMut(usize, &Ipld) -> Result<()>,
    {
        selector.require_supported()?;
        let mut stack = vec![*root];
        let mut visited = HashSet::new();
        let mut progress = 0usize;
        while let Some(cid) = stack.pop() {
            if cancel.is_cancelled() {
                return Err(RepoError::cancelled());
            }
            if !visited.insert(cid) {
                continue;
            }
            let node = self.get_node_any(&cid).await?;
            visit(progress, &node)?;
            progress += 1;
            let mut links = Vec::new();
            collect_links(&node, &mut links);
            stack.extend(links);
        }
        Ok(())
    }

    /// Every CID visited under `selector` from `root`, in traversal order,
    /// including the root
    pub async fn get_subgraph(
        &self,
        root: &IpldCid,
        selector: &Selector,
        cancel: &CancellationToken,
    ) -> Result<Vec<IpldCid>> {
        selector.require_supported()?;
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![*root];
        while let Some(cid) = stack.pop() {
            if cancel.is_cancelled() {
                return Err(RepoError::cancelled());
            }
            if !visited.insert(cid) {
                continue;
            }
            order.push(cid);
            let node = self.get_node_any(&cid).await?;
            let mut links = Vec::new();
            collect_links(&node, &mut links);
            stack.extend(links.into_iter().rev());
        }
        Ok(order)
    }

    /// Warm the cache with every block reachable under `selector` from
    /// `root`, using `workers` concurrent fetchers (0 ⇒
    /// [`DEFAULT_PREFETCH_WORKERS`])
    pub async fn prefetch(
        &self,
        root: &IpldCid,
        selector: &Selector,
        workers: usize,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        K: Clone + Send + Sync,
    {
        selector.require_supported()?;
        let worker_count = if workers == 0 {
            DEFAULT_PREFETCH_WORKERS
        } else {
            workers
        };

        // Unbounded so a worker emitting a node's links can never block on
        // a channel only the (possibly all-busy) workers themselves drain —
        // a bounded channel shared by every producer and consumer can
        // deadlock the whole pool once every worker is simultaneously stuck
        // in a full `send` with nobody left at `recv`.
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<IpldCid>();
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let visited: Arc<std::sync::Mutex<HashSet<IpldCid>>> =
            Arc::new(std::sync::Mutex::new(HashSet::new()));
        let pending = Arc::new(AtomicUsize::new(0));
        let done = CancellationToken::new();

        visited.lock().unwrap().insert(*root);
        pending.fetch_add(1, Ordering::SeqCst);
        tx.send(*root).map_err(|_| RepoError::cancelled())?;

        let mut handles = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let store = self.clone();
            let rx = rx.clone();
            let tx = tx.clone();
            let visited = visited.clone();
            let pending = pending.clone();
            let done = done.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    let job = {
                        let mut guard = rx.lock().await;
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => return Err(RepoError::cancelled()),
                            _ = done.cancelled() => return Ok(()),
                            job = guard.recv() => job,
                        }
                    };
                    let Some(cid) = job else { return Ok(()) };

                    if let Some(bytes) = store.get_block(&cid).await? {
                        if let Ok(node) = serde_ipld_dagcbor::from_slice::<Ipld>(&bytes) {
                            let mut links = Vec::new();
                            collect_links(&node, &mut links);
                            for link in links {
                                let is_new = visited.lock().unwrap().insert(link);
                                if is_new {
                                    pending.fetch_add(1, Ordering::SeqCst);
                                    if tx.send(link).is_err() {
                                        pending.fetch_sub(1, Ordering::SeqCst);
                                    }
                                }
                            }
                        }
                    }

                    if pending.fetch_sub(1, Ordering::SeqCst) == 1 {
                        done.cancel();
                    }
                }
            }));
        }
        drop(tx);

        for handle in handles {
            match handle.await {
                Ok(result) => result?,
                Err(_) => return Err(RepoError::cancelled()),
            }
        }
        Ok(())
    }

    /// Write every block reachable under `selector` from `root` as a CARv2
    /// stream, fetching (and forwarding) one block at a time rather than
    /// materializing the subgraph's bytes up front
    pub async fn export_car<W>(
        &self,
        root: &IpldCid,
        selector: &Selector,
        writer: W,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        W: tokio::io::AsyncWrite + Unpin + Send,
    {
        let cids = self.get_subgraph(root, selector, cancel).await?;
        crate::car::write_car_v2_streaming(writer, vec![*root], &cids, |cid| async move {
            if cancel.is_cancelled() {
                return Err(RepoError::cancelled());
            }
            self.get_block(&cid)
                .await?
                .ok_or_else(|| RepoError::not_found("block", &cid))
        })
        .await
    }

    /// Read a CAR v1/v2 stream, writing each block it contains to the store
    /// as it is parsed rather than buffering the whole decoded set first;
    /// returns the header's root CIDs
    pub async fn import_car(&self, data: &[u8]) -> Result<Vec<IpldCid>> {
        crate::car::for_each_block(data, |cid, bytes| async move {
            self.put_block(&cid, bytes).await
        })
        .await
    }
}
