//! Link prototypes and CID computation
//!
//! A [`LinkPrototype`] fixes how an IPLD node becomes a block and a CID:
//! codec plus hash algorithm. The default for structured nodes is
//! (DAG-CBOR, BLAKE3); raw blocks use (raw, BLAKE3). Both CIDv0 and
//! CIDv1-over-SHA-256 decode on read for compatibility with content produced
//! elsewhere, per spec.md §3/§6.
//!
//! Grounded on jacquard-repo's `mst::util::compute_cid` (SHA-256 + DAG-CBOR
//! wrap into a `Multihash`), generalized to a chosen hash algorithm and
//! supplemented with BLAKE3 from `banyancomputer-banyan-cli`
//! (`tomb-common/src/blockstore/carv2_staging.rs`), which is the pack's other
//! content-addressed-storage example using BLAKE3 as its primary digest.

use cid::Cid as IpldCid;
use multihash::Multihash;
use sha2::{Digest, Sha256};

use crate::error::{MstError, Result};

/// DAG-CBOR multicodec code
pub const DAG_CBOR: u64 = 0x71;
/// Raw-bytes multicodec code
pub const RAW: u64 = 0x55;

/// SHA-256 multihash code (legacy, read-compatible)
pub const SHA2_256: u64 = 0x12;
/// BLAKE3 multihash code (default)
pub const BLAKE3: u64 = 0x1e;

const MULTIHASH_SIZE: usize = 64;

/// Hash algorithm used to derive a block's digest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// BLAKE3, full 32-byte digest (default per spec.md §3/§6)
    Blake3,
    /// SHA-256, full 32-byte digest (legacy CIDv0/v1 read compatibility)
    Sha256,
}

/// (codec, hash-algorithm) pair fixing how a node becomes a block and a CID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkPrototype {
    /// Multicodec code for the stored bytes
    pub codec: u64,
    /// Hash algorithm used to compute the CID's digest
    pub hash: HashAlgorithm,
}

impl LinkPrototype {
    /// DAG-CBOR + BLAKE3 — the default prototype for structured nodes
    pub const fn dag_cbor() -> Self {
        Self {
            codec: DAG_CBOR,
            hash: HashAlgorithm::Blake3,
        }
    }

    /// Raw codec + BLAKE3 — for opaque byte blocks
    pub const fn raw() -> Self {
        Self {
            codec: RAW,
            hash: HashAlgorithm::Blake3,
        }
    }

    /// Compute the CID for `data` under this prototype
    pub fn cid_for(&self, data: &[u8]) -> Result<IpldCid> {
        let digest = match self.hash {
            HashAlgorithm::Blake3 => blake3::hash(data).as_bytes().to_vec(),
            HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
        };
        let code = match self.hash {
            HashAlgorithm::Blake3 => BLAKE3,
            HashAlgorithm::Sha256 => SHA2_256,
        };
        let mh = Multihash::<MULTIHASH_SIZE>::wrap(code, &digest)
            .map_err(|e| MstError::InvalidNode(e.to_string()))?;
        Ok(IpldCid::new_v1(self.codec, mh))
    }
}

/// Compute a CID for already-encoded bytes under the default structured-node
/// prototype (DAG-CBOR, BLAKE3)
pub fn compute_cid(data: &[u8]) -> Result<IpldCid> {
    LinkPrototype::dag_cbor().cid_for(data)
}

/// Extract the raw digest bytes backing a CID, regardless of which
/// supported hash algorithm produced it
///
/// Used by the MST to reuse a node's own CID digest as its authentication
/// `hash` field (the Open Question resolution recorded in DESIGN.md).
pub fn digest_bytes(cid: &IpldCid) -> &[u8] {
    cid.hash().digest()
}

/// Whether `cid`'s multihash code is one this crate can decode on read
///
/// Accepts BLAKE3 (default, write path), SHA-256 (legacy CIDv0/CIDv1), per
/// spec.md §3/§6's "MUST support at least v0 and v1 CIDs on read".
pub fn is_supported_hash(cid: &IpldCid) -> bool {
    matches!(cid.hash().code(), BLAKE3 | SHA2_256)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prototype_is_dag_cbor_blake3() {
        let proto = LinkPrototype::dag_cbor();
        assert_eq!(proto.codec, DAG_CBOR);
        assert_eq!(proto.hash, HashAlgorithm::Blake3);
    }

    #[test]
    fn cid_for_is_deterministic() {
        let proto = LinkPrototype::dag_cbor();
        let a = proto.cid_for(b"hello").unwrap();
        let b = proto.cid_for(b"hello").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_hash_algorithms_yield_different_cids() {
        let blake3_cid = LinkPrototype::dag_cbor().cid_for(b"hello").unwrap();
        let sha256_cid = LinkPrototype {
            codec: DAG_CBOR,
            hash: HashAlgorithm::Sha256,
        }
        .cid_for(b"hello")
        .unwrap();
        assert_ne!(blake3_cid, sha256_cid);
        assert!(is_supported_hash(&blake3_cid));
        assert!(is_supported_hash(&sha256_cid));
    }

    #[test]
    fn digest_bytes_roundtrip_length() {
        let cid = LinkPrototype::dag_cbor().cid_for(b"hello").unwrap();
        assert_eq!(digest_bytes(&cid).len(), 32);
    }
}
