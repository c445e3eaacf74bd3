//! C4 — per-collection namespacing over a single MST
//!
//! Thin layer per spec.md §4.4: composes one MST for the whole repository,
//! namespacing keys as `collection || 0x00 || recordKey`. Grounded on the
//! teacher's `mst::tree::Mst` being the sole state this layer wraps — it
//! never decodes or interprets values, exactly as jacquard-repo's own
//! record-key handling stays opaque to payload shape.

use std::sync::Arc;

use cid::Cid as IpldCid;

use crate::error::{MstError, Result};
use crate::kv::KvStore;
use crate::mst::{Entry, Mst};
use crate::storage::BlockStore;

const SEPARATOR: char = '\0';

fn validate_component(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(MstError::EmptyKey.into());
    }
    if value.contains(SEPARATOR) {
        return Err(MstError::ReservedByte.into());
    }
    let _ = name;
    Ok(())
}

fn namespaced_key(collection: &str, rkey: &str) -> Result<String> {
    validate_component("collection", collection)?;
    validate_component("recordKey", rkey)?;
    Ok(format!("{collection}{SEPARATOR}{rkey}"))
}

/// Composes a per-collection key space over a single repository-wide MST
pub struct Index<K: KvStore> {
    mst: Mst<K>,
}

impl<K: KvStore> Clone for Index<K> {
    fn clone(&self) -> Self {
        Self {
            mst: self.mst.clone(),
        }
    }
}

impl<K: KvStore + 'static> Index<K> {
    /// An empty index over `bs`
    pub fn new(bs: Arc<BlockStore<K>>) -> Self {
        Self { mst: Mst::new(bs) }
    }

    /// An index over `bs` rooted at an existing MST root
    pub fn load(bs: Arc<BlockStore<K>>, root: Option<IpldCid>) -> Self {
        Self {
            mst: Mst::load(bs, root),
        }
    }

    /// Reset the index to a different MST root, per spec.md §4.4's `Load`
    /// passthrough
    pub async fn set_root(&self, root: Option<IpldCid>) {
        self.mst.set_root(root).await
    }

    /// The index's current MST root
    pub async fn root(&self) -> Option<IpldCid> {
        self.mst.root().await
    }

    /// Namespace `(collection, rkey)` and insert into the MST
    pub async fn put(&self, collection: &str, rkey: &str, value: IpldCid) -> Result<IpldCid> {
        let key = namespaced_key(collection, rkey)?;
        self.mst.put(&key, value).await
    }

    /// Namespace `(collection, rkey)` and remove it from the MST if present
    pub async fn delete(&self, collection: &str, rkey: &str) -> Result<(Option<IpldCid>, bool)> {
        let key = namespaced_key(collection, rkey)?;
        self.mst.delete(&key).await
    }

    /// Look up `(collection, rkey)`'s value CID
    pub async fn get(&self, collection: &str, rkey: &str) -> Result<Option<IpldCid>> {
        let key = namespaced_key(collection, rkey)?;
        self.mst.get(&key).await
    }

    /// All entries in `collection`, in ascending record-key order, with the
    /// `collection||0x00` prefix stripped
    ///
    /// Implemented as an unbounded-above MST range starting at
    /// `collection||0x00`, trimmed to the contiguous run sharing that
    /// prefix — equivalent to the half-open `[collection||0x00,
    /// collection||0x01)` range spec.md §4.4 describes, but expressed
    /// through [`Mst::range`]'s closed-interval contract instead of
    /// synthesizing an upper bound.
    pub async fn list_collection(&self, collection: &str) -> Result<Vec<Entry>> {
        validate_component("collection", collection)?;
        let prefix = format!("{collection}{SEPARATOR}");
        let entries = self.mst.range(&prefix, "").await?;
        Ok(entries
            .into_iter()
            .take_while(|e| e.key.starts_with(&prefix))
            .map(|e| Entry {
                key: e.key[prefix.len()..].to_string(),
                value: e.value,
            })
            .collect())
    }
}
