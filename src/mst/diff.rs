//! Structural diff between two MST roots
//!
//! The teacher's `mst::diff` prunes by comparing subtrees positionally
//! (same slot, same CID ⇒ skip) — sound for atproto's fanout tree because
//! shape is purely a function of content. An AVL tree's shape also depends
//! on insertion/deletion history, so two roots with mostly-overlapping
//! keysets can disagree in shape at positions that aren't CID-identical.
//! Pruning positionally here would silently miss changed keys. Instead this
//! does a full in-order scan of both sides (reusing [`crate::mst::cursor`])
//! and a two-pointer merge by key, which is always correct regardless of
//! shape divergence.

use cid::Cid as IpldCid;

use crate::error::Result;
use crate::kv::KvStore;
use crate::mst::cursor::MstCursor;
use crate::mst::Entry;
use crate::storage::{BlockStore, Selector};

/// A single changed key between two tree revisions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// The changed key
    pub key: String,
    /// Its value CID in the old tree
    pub old_value: IpldCid,
    /// Its value CID in the new tree
    pub new_value: IpldCid,
}

/// The result of comparing two MST roots, per spec.md §4.3's "Diff"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MstDiff {
    /// Keys present in the new tree but not the old
    pub added: Vec<Entry>,
    /// Keys present in the old tree but not the new
    pub removed: Vec<Entry>,
    /// Keys present in both trees with different values
    pub changed: Vec<Change>,
    /// Node CIDs reachable only from the old root
    pub touched_left: Vec<IpldCid>,
    /// Node CIDs reachable only from the new root
    pub touched_right: Vec<IpldCid>,
}

/// Compare `old_root` and `new_root`, both over the same block store
pub async fn diff<K: KvStore + 'static>(
    bs: &BlockStore<K>,
    old_root: Option<IpldCid>,
    new_root: Option<IpldCid>,
) -> Result<MstDiff> {
    if old_root == new_root {
        return Ok(MstDiff::default());
    }

    let old_entries = MstCursor::new(bs, old_root, "", "").collect().await?;
    let new_entries = MstCursor::new(bs, new_root, "", "").collect().await?;

    let mut added = Vec::new();
    let mut removed = Vec::new();
    let mut changed = Vec::new();

    let mut i = 0usize;
    let mut j = 0usize;
    while i < old_entries.len() || j < new_entries.len() {
        match (old_entries.get(i), new_entries.get(j)) {
            (Some(old), Some(new)) => match old.key.cmp(&new.key) {
                std::cmp::Ordering::Equal => {
                    if old.value != new.value {
                        changed.push(Change {
                            key: old.key.clone(),
                            old_value: old.value,
                            new_value: new.value,
                        });
                    }
                    i += 1;
                    j += 1;
                }
                std::cmp::Ordering::Less => {
                    removed.push(old.clone());
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    added.push(new.clone());
                    j += 1;
                }
            },
            (Some(old), None) => {
                removed.push(old.clone());
                i += 1;
            }
            (None, Some(new)) => {
                added.push(new.clone());
                j += 1;
            }
            (None, None) => unreachable!(),
        }
    }

    let (touched_left, touched_right) = touched_sets(bs, old_root, new_root).await?;

    Ok(MstDiff {
        added,
        removed,
        changed,
        touched_left,
        touched_right,
    })
}

/// Node CIDs reachable only from one side, via set difference of the two
/// subgraphs
async fn touched_sets<K: KvStore + 'static>(
    bs: &BlockStore<K>,
    old_root: Option<IpldCid>,
    new_root: Option<IpldCid>,
) -> Result<(Vec<IpldCid>, Vec<IpldCid>)> {
    use std::collections::HashSet;
    use tokio_util::sync::CancellationToken;

    let cancel = CancellationToken::new();
    let selector = Selector::default();

    let old_cids: HashSet<IpldCid> = match old_root {
        Some(root) => bs
            .get_subgraph(&root, &selector, &cancel)
            .await?
            .into_iter()
            .collect(),
        None => HashSet::new(),
    };
    let new_cids: HashSet<IpldCid> = match new_root {
        Some(root) => bs
            .get_subgraph(&root, &selector, &cancel)
            .await?
            .into_iter()
            .collect(),
        None => HashSet::new(),
    };

    let touched_left = old_cids.difference(&new_cids).copied().collect();
    let touched_right = new_cids.difference(&old_cids).copied().collect();
    Ok((touched_left, touched_right))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;
    use crate::mst::Mst;
    use crate::storage::link::compute_cid;
    use std::sync::Arc;

    fn val(tag: &str) -> IpldCid {
        compute_cid(tag.as_bytes()).unwrap()
    }

    #[tokio::test]
    async fn diff_detects_added_removed_and_changed() {
        let bs = Arc::new(BlockStore::new(MemoryKv::new()));
        let mst = Mst::new(bs.clone());
        mst.put("a", val("a1")).await.unwrap();
        mst.put("b", val("b1")).await.unwrap();
        let old_root = mst.root().await;

        mst.put("a", val("a2")).await.unwrap();
        mst.delete("b").await.unwrap();
        mst.put("c", val("c1")).await.unwrap();
        let new_root = mst.root().await;

        let result = diff(&bs, old_root, new_root).await.unwrap();
        assert_eq!(result.added.len(), 1);
        assert_eq!(result.added[0].key, "c");
        assert_eq!(result.removed.len(), 1);
        assert_eq!(result.removed[0].key, "b");
        assert_eq!(result.changed.len(), 1);
        assert_eq!(result.changed[0].key, "a");
    }

    #[tokio::test]
    async fn diff_of_identical_roots_is_empty() {
        let bs = Arc::new(BlockStore::new(MemoryKv::new()));
        let mst = Mst::new(bs.clone());
        mst.put("a", val("a")).await.unwrap();
        let root = mst.root().await;

        let result = diff(&bs, root, root).await.unwrap();
        assert_eq!(result, MstDiff::default());
    }
}
