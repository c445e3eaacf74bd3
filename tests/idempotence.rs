//! Idempotence properties from spec.md §8.

use std::sync::Arc;

use merkle_repo::kv::MemoryKv;
use merkle_repo::storage::link::compute_cid;
use merkle_repo::{BlockStore, Mst};

fn store() -> Arc<BlockStore<MemoryKv>> {
    Arc::new(BlockStore::new(MemoryKv::new()))
}

fn val(tag: &str) -> cid::Cid {
    compute_cid(tag.as_bytes()).unwrap()
}

#[tokio::test]
async fn put_same_key_value_twice_yields_the_same_root() {
    let bs = store();
    let mst = Mst::new(bs);

    let first_root = mst.put("k", val("v")).await.unwrap();
    let second_root = mst.put("k", val("v")).await.unwrap();

    assert_eq!(first_root, second_root);
}

#[tokio::test]
async fn delete_on_absent_key_leaves_root_unchanged_and_reports_not_removed() {
    let bs = store();
    let mst = Mst::new(bs);

    mst.put("a", val("a")).await.unwrap();
    mst.put("b", val("b")).await.unwrap();
    let root_before = mst.root().await;

    let (root_after, removed) = mst.delete("missing").await.unwrap();

    assert!(!removed);
    assert_eq!(root_after, root_before);
}

#[tokio::test]
async fn deleting_the_same_key_twice_is_a_noop_the_second_time() {
    let bs = store();
    let mst = Mst::new(bs);

    mst.put("a", val("a")).await.unwrap();
    let (_, first_removed) = mst.delete("a").await.unwrap();
    let root_after_first = mst.root().await;
    let (root_after_second, second_removed) = mst.delete("a").await.unwrap();

    assert!(first_removed);
    assert!(!second_removed);
    assert_eq!(root_after_first, root_after_second);
}
