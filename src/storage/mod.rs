//! C2 — content-addressed block storage
//!
//! Mirrors jacquard-repo's `storage` module layout (link/CID handling,
//! concrete store, tree-shaped read operations) but built around a single
//! generic [`BlockStore`] over any [`crate::kv::KvStore`] backend instead of
//! the teacher's several interchangeable `BlockStore` trait impls — spec.md
//! layers C2 strictly atop C1 rather than giving C2 its own storage engines.

pub mod block_store;
pub mod link;
pub mod selector;

pub use block_store::{BlockStore, DEFAULT_CACHE_CAPACITY, DEFAULT_PREFETCH_WORKERS};
pub use link::{HashAlgorithm, LinkPrototype};
pub use selector::Selector;
