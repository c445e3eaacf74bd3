//! CAR writing, grounded on jacquard-repo's `car/writer.rs` (`iroh_car::CarWriter`
//! over an in-memory buffer / file), extended to optionally wrap the v1
//! body in a CARv2 frame per spec.md §6 ("v2 produced on export").

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use cid::Cid as IpldCid;
use iroh_car::{CarHeader, CarWriter};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::car::v2::{encode_prefix, wrap_v1_body};
use crate::error::{CarError, Result};

/// An `AsyncWrite` sink that discards bytes but counts how many it received
///
/// Used to learn a CARv2 body's exact encoded length by running the same
/// write path that will later produce the real body, without retaining any
/// of its bytes — so computing `data_size` ahead of a streamed export never
/// costs more than one block's worth of memory at a time.
struct CountingSink {
    len: u64,
}

impl CountingSink {
    fn new() -> Self {
        Self { len: 0 }
    }
}

impl AsyncWrite for CountingSink {
    fn poll_write(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.len += buf.len() as u64;
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Encode `blocks` as a CAR v1 byte stream with the given `roots`
pub async fn write_car_v1_bytes(
    roots: Vec<IpldCid>,
    blocks: impl IntoIterator<Item = (IpldCid, Bytes)>,
) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let header = CarHeader::new_v1(roots);
    let mut writer = CarWriter::new(header, &mut buffer);

    for (cid, data) in blocks {
        writer
            .write(cid, data.as_ref())
            .await
            .map_err(|e| CarError::Parse(Box::new(e)))?;
    }
    writer
        .finish()
        .await
        .map_err(|e| CarError::Parse(Box::new(e)))?;
    buffer
        .flush()
        .await
        .map_err(|e| CarError::Io(Box::new(e)))?;

    Ok(buffer)
}

/// Encode `blocks` as a CARv2 byte stream (pragma + header + v1 body, no index)
pub async fn write_car_v2_bytes(
    roots: Vec<IpldCid>,
    blocks: impl IntoIterator<Item = (IpldCid, Bytes)>,
) -> Result<Vec<u8>> {
    let body = write_car_v1_bytes(roots, blocks).await?;
    Ok(wrap_v1_body(&body))
}

/// Write `blocks` as a CARv2 stream to `writer` — the default per spec.md §6
pub async fn write_car_v2<W>(
    mut writer: W,
    roots: Vec<IpldCid>,
    blocks: impl IntoIterator<Item = (IpldCid, Bytes)>,
) -> Result<()>
where
    W: tokio::io::AsyncWrite + Unpin + Send,
{
    let bytes = write_car_v2_bytes(roots, blocks).await?;
    writer
        .write_all(&bytes)
        .await
        .map_err(|e| CarError::Io(Box::new(e)))?;
    writer.flush().await.map_err(|e| CarError::Io(Box::new(e)))?;
    Ok(())
}

/// Write a CARv2 stream to `writer`, fetching each block via `fetch` one at a
/// time rather than collecting the subgraph into memory first
///
/// A CARv2 header must carry `data_size` — the v1 body's exact length —
/// before any of the body is written, which is at odds with forwarding
/// blocks to a non-seekable `writer` as soon as each is fetched. This runs
/// the same encode twice: once into a [`CountingSink`] that throws bytes
/// away and keeps only a running length, to learn `data_size`; then for
/// real, into `writer`, once the header ahead of it is known. Either pass
/// holds at most one fetched block's bytes at a time, so peak memory stays
/// one block regardless of subgraph size — the cost is that `fetch` runs
/// twice per CID rather than reusing a buffered copy.
pub async fn write_car_v2_streaming<W, F, Fut>(
    mut writer: W,
    roots: Vec<IpldCid>,
    cids: &[IpldCid],
    mut fetch: F,
) -> Result<()>
where
    W: tokio::io::AsyncWrite + Unpin + Send,
    F: FnMut(IpldCid) -> Fut,
    Fut: Future<Output = Result<Bytes>>,
{
    let mut counting = CountingSink::new();
    {
        let header = CarHeader::new_v1(roots.clone());
        let mut car_writer = CarWriter::new(header, &mut counting);
        for cid in cids {
            let data = fetch(*cid).await?;
            car_writer
                .write(*cid, data.as_ref())
                .await
                .map_err(|e| CarError::Parse(Box::new(e)))?;
        }
        car_writer
            .finish()
            .await
            .map_err(|e| CarError::Parse(Box::new(e)))?;
    }

    writer
        .write_all(&encode_prefix(counting.len))
        .await
        .map_err(|e| CarError::Io(Box::new(e)))?;

    let header = CarHeader::new_v1(roots);
    let mut car_writer = CarWriter::new(header, &mut writer);
    for cid in cids {
        let data = fetch(*cid).await?;
        car_writer
            .write(*cid, data.as_ref())
            .await
            .map_err(|e| CarError::Parse(Box::new(e)))?;
    }
    car_writer
        .finish()
        .await
        .map_err(|e| CarError::Parse(Box::new(e)))?;
    writer.flush().await.map_err(|e| CarError::Io(Box::new(e)))?;
    Ok(())
}
