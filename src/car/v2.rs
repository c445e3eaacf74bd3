//! CAR v2 framing
//!
//! `iroh-car` (the teacher's CAR dependency) only frames CAR v1. spec.md §6
//! requires v2 on export (v1 and v2 both accepted on import), so this module
//! adds the thin wrapper v2 needs: an 11-byte pragma, a 40-byte header, and
//! the v1 body unchanged underneath. Pragma and header layout (16-byte
//! characteristics + three little-endian u64 offsets) are grounded on
//! `banyancomputer-banyan-cli`'s `CARV2_PRAGMA`/CARv2 header handling
//! (`tomb-common/src/blockstore/carv2_staging.rs`).
//!
//! The index is optional in the CARv2 spec; this wrapper always omits it
//! (`index_offset = 0`), since nothing in this crate needs index-assisted
//! random access into a CAR file — every reader here decodes the full body.

use crate::error::{CarError, Result};

/// 11-byte CARv2 pragma: CBOR-encoded `{"version": 2}`
pub const CARV2_PRAGMA: [u8; 11] = [0x0a, 0xa1, 0x67, 0x76, 0x65, 0x72, 0x73, 0x69, 0x6f, 0x6e, 0x02];

const HEADER_LEN: usize = 40;
/// Pragma + header length — the offset at which the v1 body begins when no
/// characteristics padding is used.
pub const PREFIX_LEN: usize = CARV2_PRAGMA.len() + HEADER_LEN;

/// The 40-byte CARv2 header: 16 characteristic bytes, then data_offset,
/// data_size, index_offset, each a little-endian u64.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarV2Header {
    /// Reserved characteristics bitfield; this crate always writes zeros.
    pub characteristics: [u8; 16],
    /// Byte offset of the v1 body from the start of the stream.
    pub data_offset: u64,
    /// Length of the v1 body in bytes.
    pub data_size: u64,
    /// Byte offset of the index, or 0 if absent.
    pub index_offset: u64,
}

impl CarV2Header {
    fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..16].copy_from_slice(&self.characteristics);
        out[16..24].copy_from_slice(&self.data_offset.to_le_bytes());
        out[24..32].copy_from_slice(&self.data_size.to_le_bytes());
        out[32..40].copy_from_slice(&self.index_offset.to_le_bytes());
        out
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(CarError::BadPragma.into());
        }
        let mut characteristics = [0u8; 16];
        characteristics.copy_from_slice(&bytes[0..16]);
        let data_offset = u64::from_le_bytes(bytes[16..24].try_into().unwrap());
        let data_size = u64::from_le_bytes(bytes[24..32].try_into().unwrap());
        let index_offset = u64::from_le_bytes(bytes[32..40].try_into().unwrap());
        Ok(Self {
            characteristics,
            data_offset,
            data_size,
            index_offset,
        })
    }
}

/// Whether `data` begins with the CARv2 pragma
pub fn is_v2(data: &[u8]) -> bool {
    data.len() >= CARV2_PRAGMA.len() && data[..CARV2_PRAGMA.len()] == CARV2_PRAGMA
}

/// Encode just the pragma + 40-byte header for a v1 body of `data_size`
/// bytes, with no index and no body — used to write the prefix ahead of a
/// streamed body whose bytes never need to be buffered as a whole.
pub(crate) fn encode_prefix(data_size: u64) -> Vec<u8> {
    let header = CarV2Header {
        characteristics: [0; 16],
        data_offset: PREFIX_LEN as u64,
        data_size,
        index_offset: 0,
    };
    let mut out = Vec::with_capacity(PREFIX_LEN);
    out.extend_from_slice(&CARV2_PRAGMA);
    out.extend_from_slice(&header.encode());
    out
}

/// Wrap an already-encoded CAR v1 byte stream in a v2 pragma + header, no index
pub fn wrap_v1_body(v1_body: &[u8]) -> Vec<u8> {
    let mut out = encode_prefix(v1_body.len() as u64);
    out.extend_from_slice(v1_body);
    out
}

/// Slice out the v1 body from a v2-framed byte stream
pub fn unwrap_v2_body(data: &[u8]) -> Result<&[u8]> {
    if !is_v2(data) {
        return Err(CarError::BadPragma.into());
    }
    if data.len() < PREFIX_LEN {
        return Err(CarError::BadPragma.into());
    }
    let header = CarV2Header::decode(&data[CARV2_PRAGMA.len()..PREFIX_LEN])?;
    let start = header.data_offset as usize;
    let end = if header.data_size == 0 {
        data.len()
    } else {
        start.saturating_add(header.data_size as usize)
    };
    data.get(start..end)
        .ok_or_else(|| CarError::BadPragma.into())
}
