//! In-order cursor over the AVL shape, backing `Range`
//!
//! Adapted from the teacher's `mst::cursor::MstCursor` push/pop stack-of-
//! frames idiom (`cursor.rs`), walking left/self/right over the binary AVL
//! node instead of jacquard's flat prefix-compressed entries. Pruning
//! follows spec.md §4.3's "Range" rule exactly: skip the left subtree once a
//! node's key is already below `start`, skip the right subtree once a
//! node's key is already above `end`.

use cid::Cid as IpldCid;

use crate::error::Result;
use crate::kv::KvStore;
use crate::mst::node::NodeData;
use crate::mst::Entry;
use crate::storage::BlockStore;

/// Stack-based in-order cursor, pruned to `[start, end]` (empty bound ⇒
/// unbounded on that side)
pub struct MstCursor<'a, K: KvStore> {
    bs: &'a BlockStore<K>,
    start: String,
    end: String,
    root: Option<IpldCid>,
}

impl<'a, K: KvStore + 'static> MstCursor<'a, K> {
    /// Construct a cursor over `root`, bounded to `[start, end]`
    pub fn new(bs: &'a BlockStore<K>, root: Option<IpldCid>, start: &str, end: &str) -> Self {
        Self {
            bs,
            start: start.to_string(),
            end: end.to_string(),
            root,
        }
    }

    /// Drain the cursor into a sorted list of entries within bounds
    pub async fn collect(self) -> Result<Vec<Entry>> {
        let mut results = Vec::new();
        let mut stack: Vec<NodeData> = Vec::new();
        let mut current = self.root;

        loop {
            while let Some(cid) = current {
                let node = self.bs.get_node_as::<NodeData>(&cid).await?;
                let skip_left = !self.start.is_empty() && node.key.as_str() < self.start.as_str();
                if skip_left {
                    current = None;
                } else {
                    current = node.left;
                }
                stack.push(node);
                if skip_left {
                    break;
                }
            }

            let Some(node) = stack.pop() else { break };

            let in_range = (self.start.is_empty() || node.key.as_str() >= self.start.as_str())
                && (self.end.is_empty() || node.key.as_str() <= self.end.as_str());
            if in_range {
                results.push(Entry {
                    key: node.key.to_string(),
                    value: node.value,
                });
            }

            let skip_right = !self.end.is_empty() && node.key.as_str() > self.end.as_str();
            current = if skip_right { None } else { node.right };
        }

        Ok(results)
    }
}
