//! Universal invariants from spec.md §8, run against the public API only.

use std::sync::Arc;

use merkle_repo::kv::MemoryKv;
use merkle_repo::mst::NodeData;
use merkle_repo::storage::link::compute_cid;
use merkle_repo::{BlockStore, Mst};

fn store() -> Arc<BlockStore<MemoryKv>> {
    Arc::new(BlockStore::new(MemoryKv::new()))
}

fn val(tag: &str) -> cid::Cid {
    compute_cid(tag.as_bytes()).unwrap()
}

/// Recursively check the AVL height invariant and strictly increasing
/// in-order key order over every stored node reachable from `root`.
async fn assert_avl_and_sorted(bs: &BlockStore<MemoryKv>, root: Option<cid::Cid>) {
    async fn height_of(bs: &BlockStore<MemoryKv>, node: Option<cid::Cid>) -> u32 {
        match node {
            Some(cid) => bs.get_node_as::<NodeData>(&cid).await.unwrap().height,
            None => 0,
        }
    }

    fn walk<'a>(
        bs: &'a BlockStore<MemoryKv>,
        node: Option<cid::Cid>,
        last_key: &'a mut Option<String>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + 'a>> {
        Box::pin(async move {
            let Some(cid) = node else { return };
            let data = bs.get_node_as::<NodeData>(&cid).await.unwrap();

            let lh = height_of(bs, data.left).await;
            let rh = height_of(bs, data.right).await;
            assert!(
                (lh as i64 - rh as i64).abs() <= 1,
                "AVL balance violated at key {}: left height {lh}, right height {rh}",
                data.key
            );
            assert_eq!(data.height, 1 + lh.max(rh));

            walk(bs, data.left, last_key).await;
            if let Some(prev) = last_key.as_ref() {
                assert!(
                    prev.as_str() < data.key.as_str(),
                    "keys out of order: {prev} >= {}",
                    data.key
                );
            }
            *last_key = Some(data.key.to_string());
            walk(bs, data.right, last_key).await;
        })
    }

    let mut last_key = None;
    walk(bs, root, &mut last_key).await;
}

#[tokio::test]
async fn put_delete_sequence_yields_latest_value_or_not_found() {
    let bs = store();
    let mst = Mst::new(bs);

    mst.put("a", val("a1")).await.unwrap();
    mst.put("a", val("a2")).await.unwrap();
    mst.put("b", val("b1")).await.unwrap();
    mst.delete("a").await.unwrap();

    assert_eq!(mst.get("a").await.unwrap(), None);
    assert_eq!(mst.get("b").await.unwrap(), Some(val("b1")));
}

#[tokio::test]
async fn avl_balance_and_sort_order_hold_after_many_ops() {
    let bs = store();
    let mst = Mst::new(bs.clone());

    let keys = [
        "mango", "kiwi", "fig", "date", "cherry", "banana", "apple", "grape", "honeydew", "lime",
        "nectarine", "orange",
    ];
    for (i, k) in keys.iter().enumerate() {
        mst.put(k, val(&format!("{k}-{i}"))).await.unwrap();
    }
    mst.delete("fig").await.unwrap();
    mst.delete("lime").await.unwrap();

    assert_avl_and_sorted(&bs, mst.root().await).await;
}

#[tokio::test]
async fn equal_mappings_built_the_same_way_produce_equal_roots() {
    let keys = ["a", "b", "c", "d", "e"];

    let first_bs = store();
    let first = Mst::new(first_bs);
    for k in keys {
        first.put(k, val(k)).await.unwrap();
    }

    let second_bs = store();
    let second = Mst::new(second_bs);
    for k in keys {
        second.put(k, val(k)).await.unwrap();
    }

    assert_eq!(first.root().await, second.root().await);
}

#[tokio::test]
async fn different_mappings_produce_different_roots() {
    let a_bs = store();
    let a = Mst::new(a_bs);
    a.put("a", val("a")).await.unwrap();

    let b_bs = store();
    let b = Mst::new(b_bs);
    b.put("a", val("different")).await.unwrap();

    assert_ne!(a.root().await, b.root().await);
}

#[tokio::test]
async fn stored_block_hash_recomputes_to_its_cid() {
    let bs = store();
    let cid = merkle_repo::storage::LinkPrototype::raw()
        .cid_for(b"payload")
        .unwrap();
    bs.put_block(&cid, bytes::Bytes::from_static(b"payload"))
        .await
        .unwrap();

    let bytes = bs.get_block(&cid).await.unwrap().unwrap();
    let recomputed = merkle_repo::storage::LinkPrototype::raw()
        .cid_for(&bytes)
        .unwrap();
    assert_eq!(recomputed, cid);
}
