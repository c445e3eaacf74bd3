//! MST hashing and key helpers
//!
//! Grounded on jacquard-repo's `mst::util::compute_cid`, but the node CID
//! itself is never derived here: a node's block CID is always the ordinary
//! digest of its own serialized bytes, computed by
//! [`crate::storage::BlockStore::put_block`]'s caller via the standard
//! [`crate::storage::LinkPrototype`] path (see `mst::tree::persist_node`),
//! so `Get(C)` always recomputes to `C` for MST blocks the same as for any
//! other block (spec.md §8). This module only computes the `hash` *field*
//! spec.md §4.3/§149 mandates — `H(key || value_cid || left.hash ||
//! right.hash)` — which is independent of the node's own encoding and so
//! can be computed before that encoding happens, without circularity.
//! Reusing a node's CID digest directly as its own `hash` field (the other
//! policy spec.md §299 leaves open) is not done here, since that would
//! require the field's value to depend on bytes that embed the field
//! itself.

use cid::Cid as IpldCid;

use crate::error::Result;

/// Validate an MST key: must be non-empty, per spec.md §4.3 ("Empty key ⇒
/// error"). The 0x00-separator restriction belongs to the Index layer (C4),
/// not here — spec.md §3 states it is "rejected at the Index layer".
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(crate::error::MstError::EmptyKey.into());
    }
    Ok(())
}

/// `H(key_bytes || value_cid_bytes || left_hash_or_empty || right_hash_or_empty)`
///
/// per spec.md §4.3 "Authentication hash". BLAKE3 is the default hash family
/// (spec.md §6), matching the CID hash so the two compose stably.
pub fn node_hash(key: &str, value: &IpldCid, left: Option<&[u8]>, right: Option<&[u8]>) -> Vec<u8> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(key.as_bytes());
    hasher.update(&value.to_bytes());
    if let Some(h) = left {
        hasher.update(h);
    }
    if let Some(h) = right {
        hasher.update(h);
    }
    hasher.finalize().as_bytes().to_vec()
}
