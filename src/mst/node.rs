//! MST node wire format
//!
//! spec.md §3/§4.3 specify a binary AVL node — `{key, value, left, right,
//! height, hash}` — not the atproto/jacquard prefix-compressed fanout entry
//! the teacher's `node.rs`/`TreeEntry` encode. The field set and algorithm
//! are rewritten per spec.md, but the nullability discipline is kept
//! verbatim from the teacher: `Option<Cid>` fields always serialize as
//! explicit CBOR `null` when absent, never omitted, since skip-vs-null
//! changes the encoded bytes and therefore the node's CID.

use cid::Cid as IpldCid;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// On-disk representation of one MST node
///
/// Field declaration order is alphabetical (`hash`, `height`, `key`, `left`,
/// `right`, `value`) to match DAG-CBOR's canonical map-key ordering, mirroring
/// the teacher's explicit-ordering discipline in `mst::node::NodeData`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeData {
    /// `H(key_bytes || value_cid_bytes || left.hash_or_empty || right.hash_or_empty)`
    #[serde(with = "serde_bytes")]
    pub hash: Vec<u8>,
    /// AVL height: `1 + max(height(left), height(right))`, absent children
    /// counting as height 0
    pub height: u32,
    /// Non-empty key, unique within the tree
    pub key: SmolStr,
    /// Subtree of strictly smaller keys
    pub left: Option<IpldCid>,
    /// Subtree of strictly greater keys
    pub right: Option<IpldCid>,
    /// Payload link for this key
    pub value: IpldCid,
}

impl NodeData {
    /// Height of a possibly-absent child, per spec.md §4.3 ("absent children
    /// treated as height 0")
    pub fn child_height(child_height: Option<u32>) -> u32 {
        child_height.unwrap_or(0)
    }
}
