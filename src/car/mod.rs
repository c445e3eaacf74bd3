//! CAR (Content Addressable aRchive) I/O
//!
//! Accepts CAR v1 and v2 on import; produces v2 on export, per spec.md §6.
//! `iroh-car` supplies the v1 framing (as in the teacher); [`v2`] adds the
//! thin wrapper v2 needs on top.

pub mod reader;
pub mod v2;
pub mod writer;

pub use reader::{for_each_block, read_car, read_car_roots, ParsedCar};
pub use v2::{CarV2Header, CARV2_PRAGMA};
pub use writer::{write_car_v1_bytes, write_car_v2, write_car_v2_bytes, write_car_v2_streaming};
