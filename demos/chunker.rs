//! Minimal fixed-size chunker, used only to exercise the CAR round-trip
//! scenario (E4). Not part of the public crate: real UnixFS-style chunking
//! is an external collaborator per spec.md §9.

use cid::Cid as IpldCid;
use merkle_repo::storage::{BlockStore, LinkPrototype};
use merkle_repo::kv::KvStore;
use merkle_repo::Result;

/// Split `data` into `chunk_size`-byte pieces (the last piece may be
/// shorter) and store each as a raw-codec block.
pub async fn chunk_and_store<K: KvStore>(
    bs: &BlockStore<K>,
    data: &[u8],
    chunk_size: usize,
) -> Result<Vec<IpldCid>> {
    assert!(chunk_size > 0, "chunk_size must be positive");
    let mut cids = Vec::new();
    for piece in data.chunks(chunk_size) {
        let cid = LinkPrototype::raw().cid_for(piece)?;
        bs.put_block(&cid, bytes::Bytes::copy_from_slice(piece))
            .await?;
        cids.push(cid);
    }
    Ok(cids)
}

/// A DAG-CBOR list of links to each chunk, in order — the "file" node a
/// real chunker would produce as its root.
pub async fn build_manifest<K: KvStore>(
    bs: &BlockStore<K>,
    chunk_cids: &[IpldCid],
) -> Result<IpldCid> {
    let links: Vec<ipld_core::ipld::Ipld> = chunk_cids
        .iter()
        .map(|c| ipld_core::ipld::Ipld::Link(*c))
        .collect();
    bs.put_node(&ipld_core::ipld::Ipld::List(links), LinkPrototype::dag_cbor())
        .await
}
