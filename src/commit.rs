//! Signed, chained commit nodes
//!
//! spec.md §3/§4.5/§6 define a commit as a DAG-CBOR map `{root, prev,
//! timestamp}` with no DID, revision TID, or schema version — deliberately
//! not the teacher's atproto `Commit` (`did`/`version`/`data`/`rev`/`sig`),
//! since this crate has no identity concept and scopes that out (spec.md §1
//! Non-goals). What *is* kept, nearly verbatim, is the teacher's
//! `commit::SigningKey` trait and its three algorithm impls
//! (`commit/mod.rs`): spec.md §7 says "we define where signatures attach,
//! not the signing algorithm," so `Commit` grows an ambient `sig` slot plus
//! the same multi-algorithm signing/verification machinery, parameterized
//! over a caller-supplied public key rather than a DID-resolved one.

use bytes::Bytes;
use cid::Cid as IpldCid;
use serde::{Deserialize, Serialize};

use crate::error::{RepoError, RepoErrorKind, Result};
use crate::storage::link::compute_cid;

/// A repository state snapshot: MST root, parent commit, and timestamp
///
/// Field order (`prev`, `root`, `sig`, `timestamp`) is alphabetical to match
/// DAG-CBOR canonical map-key ordering, per the nullability discipline kept
/// from `mst::node::NodeData`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Previous commit CID, or `None` for the first commit
    pub prev: Option<IpldCid>,
    /// The MST root this commit seals, or `None` for an empty repository
    pub root: Option<IpldCid>,
    /// Optional signature over the unsigned encoding, per spec.md §7
    #[serde(with = "serde_bytes")]
    pub sig: Option<Vec<u8>>,
    /// Seconds since the Unix epoch
    pub timestamp: i64,
}

impl Commit {
    /// Build an unsigned commit
    pub fn new(root: Option<IpldCid>, prev: Option<IpldCid>, timestamp: i64) -> Self {
        Self {
            prev,
            root,
            sig: None,
            timestamp,
        }
    }

    /// The encoding to sign or verify: this commit with `sig` cleared
    fn unsigned_bytes(&self) -> Result<Vec<u8>> {
        let mut unsigned = self.clone();
        unsigned.sig = None;
        serde_ipld_dagcbor::to_vec(&unsigned).map_err(RepoError::decode)
    }

    /// Sign this commit in place with `key`
    pub fn sign(mut self, key: &impl SigningKey) -> Result<Self> {
        let unsigned = self.unsigned_bytes()?;
        self.sig = Some(key.sign_bytes(&unsigned)?.to_vec());
        Ok(self)
    }

    /// Verify this commit's signature against `pubkey`
    pub fn verify(&self, kind: PublicKeyKind, pubkey: &[u8]) -> Result<()> {
        let unsigned = self.unsigned_bytes()?;
        let sig = self
            .sig
            .as_ref()
            .ok_or_else(|| RepoError::new(RepoErrorKind::Crypto, None).with_context("commit is unsigned"))?;
        kind.verify(pubkey, &unsigned, sig)
    }

    /// Encode this commit under the default link prototype and compute its CID
    pub fn to_cid(&self) -> Result<IpldCid> {
        let bytes = serde_ipld_dagcbor::to_vec(self).map_err(RepoError::decode)?;
        compute_cid(&bytes)
    }
}

/// Which asymmetric algorithm a public key belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicKeyKind {
    /// Ed25519
    Ed25519,
    /// secp256k1 (ECDSA)
    Secp256k1,
    /// NIST P-256 (ECDSA)
    P256,
}

impl PublicKeyKind {
    fn verify(&self, pubkey: &[u8], message: &[u8], sig: &[u8]) -> Result<()> {
        match self {
            PublicKeyKind::Ed25519 => {
                use ed25519_dalek::{Signature, Verifier, VerifyingKey};
                let vk = VerifyingKey::try_from(pubkey).map_err(RepoError::crypto)?;
                let sig = Signature::from_slice(sig).map_err(RepoError::crypto)?;
                vk.verify(message, &sig).map_err(RepoError::crypto)
            }
            PublicKeyKind::Secp256k1 => {
                use k256::ecdsa::signature::Verifier;
                use k256::ecdsa::{Signature, VerifyingKey};
                let vk = VerifyingKey::from_sec1_bytes(pubkey).map_err(RepoError::crypto)?;
                let sig = Signature::from_slice(sig).map_err(RepoError::crypto)?;
                vk.verify(message, &sig).map_err(RepoError::crypto)
            }
            PublicKeyKind::P256 => {
                use p256::ecdsa::signature::Verifier;
                use p256::ecdsa::{Signature, VerifyingKey};
                let vk = VerifyingKey::from_sec1_bytes(pubkey).map_err(RepoError::crypto)?;
                let sig = Signature::from_slice(sig).map_err(RepoError::crypto)?;
                vk.verify(message, &sig).map_err(RepoError::crypto)
            }
        }
    }
}

/// A private key capable of producing a commit signature
///
/// Implemented for `ed25519_dalek::SigningKey`, `k256::ecdsa::SigningKey`,
/// and `p256::ecdsa::SigningKey`, kept directly from the teacher's
/// `commit::SigningKey`.
pub trait SigningKey {
    /// Sign `data`, returning the raw signature bytes
    fn sign_bytes(&self, data: &[u8]) -> Result<Bytes>;

    /// The corresponding public key's encoded bytes
    fn public_key(&self) -> Vec<u8>;
}

impl SigningKey for ed25519_dalek::SigningKey {
    fn sign_bytes(&self, data: &[u8]) -> Result<Bytes> {
        use ed25519_dalek::Signer;
        Ok(Bytes::copy_from_slice(&Signer::sign(self, data).to_bytes()))
    }

    fn public_key(&self) -> Vec<u8> {
        self.verifying_key().to_bytes().to_vec()
    }
}

impl SigningKey for k256::ecdsa::SigningKey {
    fn sign_bytes(&self, data: &[u8]) -> Result<Bytes> {
        use k256::ecdsa::signature::Signer;
        let sig: k256::ecdsa::Signature = Signer::sign(self, data);
        Ok(Bytes::copy_from_slice(&sig.to_bytes()))
    }

    fn public_key(&self) -> Vec<u8> {
        self.verifying_key().to_encoded_point(true).as_bytes().to_vec()
    }
}

impl SigningKey for p256::ecdsa::SigningKey {
    fn sign_bytes(&self, data: &[u8]) -> Result<Bytes> {
        use p256::ecdsa::signature::Signer;
        let sig: p256::ecdsa::Signature = Signer::sign(self, data);
        Ok(Bytes::copy_from_slice(&sig.to_bytes()))
    }

    fn public_key(&self) -> Vec<u8> {
        self.verifying_key().to_encoded_point(true).as_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::link::compute_cid;

    fn root() -> IpldCid {
        compute_cid(b"mst-root").unwrap()
    }

    #[test]
    fn unsigned_commit_round_trips_through_cbor() {
        let commit = Commit::new(Some(root()), None, 1_700_000_000);
        let bytes = serde_ipld_dagcbor::to_vec(&commit).unwrap();
        let decoded: Commit = serde_ipld_dagcbor::from_slice(&bytes).unwrap();
        assert_eq!(commit, decoded);
    }

    #[test]
    fn sign_then_verify_succeeds() {
        use ed25519_dalek::SigningKey as Ed25519SigningKey;
        use rand::rngs::OsRng;

        let key = Ed25519SigningKey::generate(&mut OsRng);
        let commit = Commit::new(Some(root()), None, 1_700_000_000)
            .sign(&key)
            .unwrap();

        commit
            .verify(PublicKeyKind::Ed25519, &key.public_key())
            .unwrap();
    }

    #[test]
    fn tampered_commit_fails_verification() {
        use ed25519_dalek::SigningKey as Ed25519SigningKey;
        use rand::rngs::OsRng;

        let key = Ed25519SigningKey::generate(&mut OsRng);
        let mut commit = Commit::new(Some(root()), None, 1_700_000_000)
            .sign(&key)
            .unwrap();
        commit.timestamp += 1;

        assert!(commit.verify(PublicKeyKind::Ed25519, &key.public_key()).is_err());
    }

    #[test]
    fn distinct_commits_have_distinct_cids() {
        let a = Commit::new(Some(root()), None, 1);
        let b = Commit::new(Some(root()), None, 2);
        assert_ne!(a.to_cid().unwrap(), b.to_cid().unwrap());
    }
}
