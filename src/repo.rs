//! C5 — the repository: records + index + commit chain
//!
//! Grounded on the teacher's top-level `Repository`-shaped orchestration
//! (owning a block store, an index/MST, and a head pointer) though
//! jacquard-repo spreads that across `commit`/`mst` modules rather than one
//! struct; spec.md §4.5 collapses it into a single `Repository<K>` holding
//! `bs`, `index`, and `head`/`prev` behind a `tokio::sync::RwLock`, matching
//! §5's "reader-writer lock over head/prev; Commit takes write, queries take
//! read."

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use cid::Cid as IpldCid;
use ipld_core::ipld::Ipld;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::commit::Commit;
use crate::error::{RepoError, Result};
use crate::index::Index;
use crate::kv::KvStore;
use crate::mst::Entry;
use crate::storage::{BlockStore, LinkPrototype};

struct Head {
    head: Option<IpldCid>,
    prev: Option<IpldCid>,
}

/// The repository: record storage, per-collection index, and commit chain
pub struct Repository<K: KvStore> {
    bs: Arc<BlockStore<K>>,
    index: Index<K>,
    head: RwLock<Head>,
}

impl<K: KvStore + 'static> Repository<K> {
    /// A fresh, empty repository over `bs`
    pub fn new(bs: Arc<BlockStore<K>>) -> Self {
        let index = Index::new(bs.clone());
        Self {
            bs,
            index,
            head: RwLock::new(Head {
                head: None,
                prev: None,
            }),
        }
    }

    /// Reconstruct repository state from a stored commit CID, per spec.md
    /// §4.5's `LoadHead` (`None` ⇒ empty repository)
    pub async fn load_head(bs: Arc<BlockStore<K>>, commit_cid: Option<IpldCid>) -> Result<Self> {
        let index = Index::new(bs.clone());
        let mut head = Head {
            head: None,
            prev: None,
        };

        if let Some(cid) = commit_cid {
            let commit = bs.get_node_as::<Commit>(&cid).await?;
            index.set_root(commit.root).await;
            head.head = Some(cid);
            head.prev = commit.prev;
        }

        Ok(Self {
            bs,
            index,
            head: RwLock::new(head),
        })
    }

    /// The current HEAD commit CID, or `None` for an empty repository
    pub async fn head(&self) -> Option<IpldCid> {
        self.head.read().await.head
    }

    /// The commit CID HEAD's `prev` pointed to, or `None`
    pub async fn prev(&self) -> Option<IpldCid> {
        self.head.read().await.prev
    }

    /// The index's current MST root
    pub async fn root(&self) -> Option<IpldCid> {
        self.index.root().await
    }

    /// Store `node` as a record and index it under `(collection, rkey)`
    ///
    /// Per spec.md §4.5's failure-ordering guarantee: a `PutNode` failure
    /// returns before the index is ever touched.
    pub async fn put_record<T: Serialize>(
        &self,
        collection: &str,
        rkey: &str,
        node: &T,
    ) -> Result<IpldCid> {
        let value_cid = self.bs.put_node(node, LinkPrototype::dag_cbor()).await?;
        self.index.put(collection, rkey, value_cid).await?;
        Ok(value_cid)
    }

    /// Remove `(collection, rkey)` from the index if present
    pub async fn delete_record(&self, collection: &str, rkey: &str) -> Result<bool> {
        let (_, removed) = self.index.delete(collection, rkey).await?;
        Ok(removed)
    }

    /// The value CID stored at `(collection, rkey)`, if any
    pub async fn get_record_cid(&self, collection: &str, rkey: &str) -> Result<Option<IpldCid>> {
        self.index.get(collection, rkey).await
    }

    /// The decoded IPLD node stored at `(collection, rkey)`, if any
    pub async fn get_record(&self, collection: &str, rkey: &str) -> Result<Option<Ipld>> {
        match self.index.get(collection, rkey).await? {
            Some(cid) => Ok(Some(self.bs.get_node_any(&cid).await?)),
            None => Ok(None),
        }
    }

    /// The decoded IPLD node stored at `(collection, rkey)`, coerced to `T`
    pub async fn get_record_as<T: DeserializeOwned>(
        &self,
        collection: &str,
        rkey: &str,
    ) -> Result<Option<T>> {
        match self.index.get(collection, rkey).await? {
            Some(cid) => Ok(Some(self.bs.get_node_as::<T>(&cid).await?)),
            None => Ok(None),
        }
    }

    /// Every record in `collection`, ordered ascending by record key
    pub async fn list_collection(&self, collection: &str) -> Result<Vec<Entry>> {
        self.index.list_collection(collection).await
    }

    /// Seal the current index root into a new commit and advance HEAD
    ///
    /// Per spec.md §4.5: `{root: index.Root(), prev: current head, timestamp:
    /// now}`, stored via `PutNode`; the old head becomes `prev`.
    pub async fn commit(&self) -> Result<IpldCid> {
        let root = self.index.root().await;
        let mut guard = self.head.write().await;
        let timestamp = now_seconds()?;
        let commit = Commit::new(root, guard.head, timestamp);
        let cid = self.bs.put_node(&commit, LinkPrototype::dag_cbor()).await?;
        guard.prev = guard.head;
        guard.head = Some(cid);
        Ok(cid)
    }
}

fn now_seconds() -> Result<i64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .map_err(RepoError::storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    struct Post {
        title: String,
    }

    fn store() -> Arc<BlockStore<MemoryKv>> {
        Arc::new(BlockStore::new(MemoryKv::new()))
    }

    #[tokio::test]
    async fn e1_basic_record_round_trip() {
        let bs = store();
        let repo = Repository::new(bs.clone());

        repo.put_record(
            "posts",
            "a",
            &Post {
                title: "hi".to_string(),
            },
        )
        .await
        .unwrap();
        let c1 = repo.commit().await.unwrap();

        let record: Post = repo.get_record_as("posts", "a").await.unwrap().unwrap();
        assert_eq!(record.title, "hi");

        let listing = repo.list_collection("posts").await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].key, "a");

        let reloaded = Repository::load_head(bs, Some(c1)).await.unwrap();
        let record: Post = reloaded
            .get_record_as("posts", "a")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.title, "hi");
    }

    #[tokio::test]
    async fn e5_commit_chain_links_prev() {
        let bs = store();
        let repo = Repository::new(bs.clone());

        repo.put_record("posts", "a", &Post { title: "1".into() })
            .await
            .unwrap();
        let c1 = repo.commit().await.unwrap();

        repo.put_record("posts", "b", &Post { title: "2".into() })
            .await
            .unwrap();
        let c2 = repo.commit().await.unwrap();

        repo.put_record("posts", "c", &Post { title: "3".into() })
            .await
            .unwrap();
        let c3 = repo.commit().await.unwrap();

        let commit2: Commit = bs.get_node_as(&c2).await.unwrap();
        assert_eq!(commit2.prev, Some(c1));
        let commit3: Commit = bs.get_node_as(&c3).await.unwrap();
        assert_eq!(commit3.prev, Some(c2));

        let at_c2 = Repository::load_head(bs, Some(c2)).await.unwrap();
        assert!(at_c2.get_record_cid("posts", "c").await.unwrap().is_none());
        assert!(at_c2.get_record_cid("posts", "b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn failed_put_never_touches_index() {
        let bs = store();
        let repo = Repository::new(bs.clone());
        let root_before = repo.root().await;

        // empty collection name is rejected before PutNode's result would
        // ever reach index.put
        let err = repo
            .put_record("", "a", &Post { title: "x".into() })
            .await;
        assert!(err.is_err());
        assert_eq!(repo.root().await, root_before);
    }

    #[tokio::test]
    async fn delete_missing_record_reports_not_removed() {
        let repo = Repository::new(store());
        assert!(!repo.delete_record("posts", "z").await.unwrap());
    }
}
