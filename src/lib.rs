//! `merkle-repo`: a content-addressed, version-controlled record store.
//!
//! Three layered subsystems, leaves-first:
//!
//! - [`kv`] (C1) — the narrow, persistent key-value interface the block
//!   store consumes, plus an in-memory and a `sled`-backed reference
//!   adapter.
//! - [`storage`] (C2) — content-addressed block storage with a decoded-node
//!   LRU cache, CID/link handling, selector-driven traversal, and CAR
//!   import/export.
//! - [`car`] — CAR v1/v2 framing used by [`storage::BlockStore::export_car`]
//!   and [`storage::BlockStore::import_car`].
//! - [`mst`] (C3) — an AVL-balanced, authenticated `string -> CID` map
//!   persisted one node per block, with range queries, structural diffs,
//!   and inclusion proofs.
//! - [`index`] (C4) — per-collection namespacing over a single repository
//!   MST.
//! - [`commit`] / [`repo`] (C5) — record storage, index mutation, and a
//!   linear chain of signed, timestamped commits.

pub mod car;
pub mod commit;
pub mod error;
pub mod index;
pub mod kv;
pub mod mst;
pub mod repo;
pub mod storage;

pub use commit::Commit;
pub use error::{RepoError, RepoErrorKind, Result};
pub use index::Index;
pub use mst::{Entry, Mst};
pub use repo::Repository;
pub use storage::{BlockStore, Selector};
