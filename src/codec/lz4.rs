//! Chunked LZ4 frames used by crate sections.
//!
//! ```text
//! +---------------------------+
//! | compressed_size: u64      |  bytes after this field
//! +---------------------------+
//! | chunk_count: u32          |
//! +---------------------------+
//! | uncompressed_size: u32    |  \
//! | compressed_size: u32      |   } x chunk_count
//! | LZ4 block bytes           |  /
//! +---------------------------+
//! ```

use crate::util::{Error, Result, StreamReader};

/// Largest uncompressed span placed in a single chunk.
pub const MAX_CHUNK_SIZE: usize = 1 << 24;

/// Compress data into a chunked frame.
pub fn compress(data: &[u8]) -> Vec<u8> {
    let chunks: Vec<&[u8]> = if data.is_empty() {
        Vec::new()
    } else {
        data.chunks(MAX_CHUNK_SIZE).collect()
    };

    let mut body = Vec::with_capacity(data.len() / 2 + 16);
    body.extend_from_slice(&(chunks.len() as u32).to_le_bytes());
    for chunk in chunks {
        let block = lz4_flex::block::compress(chunk);
        body.extend_from_slice(&(chunk.len() as u32).to_le_bytes());
        body.extend_from_slice(&(block.len() as u32).to_le_bytes());
        body.extend_from_slice(&block);
    }

    let mut out = Vec::with_capacity(body.len() + 8);
    out.extend_from_slice(&(body.len() as u64).to_le_bytes());
    out.extend_from_slice(&body);
    out
}

/// Decompress a chunked frame starting at the reader's position.
///
/// The reader is left just past the frame. The summed chunk sizes are
/// checked against `max_size` before any output is allocated.
pub fn decompress(r: &mut StreamReader<'_>, max_size: u64) -> Result<Vec<u8>> {
    let frame_size = r.read_u64_le()?;
    if frame_size > r.remaining() as u64 {
        return Err(Error::Truncated {
            offset: r.tell(),
            needed: frame_size,
            available: r.remaining() as u64,
        });
    }
    let mut frame = StreamReader::new(r.read_bytes(frame_size as usize)?);

    let chunk_count = frame.read_u32_le()? as usize;
    let mut blocks = Vec::with_capacity(chunk_count.min(frame.remaining() / 8));
    let mut total = 0u64;
    for _ in 0..chunk_count {
        let uncompressed = frame.read_u32_le()?;
        let compressed = frame.read_u32_le()?;
        let block = frame.read_bytes(compressed as usize)?;
        total += u64::from(uncompressed);
        if total > max_size {
            return Err(Error::ResourceLimit {
                what: "decompressed size",
                requested: total,
                limit: max_size,
            });
        }
        blocks.push((uncompressed as usize, block));
    }
    if frame.remaining() != 0 {
        return Err(Error::invalid(format!(
            "{} trailing bytes after LZ4 chunks",
            frame.remaining()
        )));
    }

    let mut out = Vec::with_capacity(total as usize);
    for (size, block) in blocks {
        let chunk = lz4_flex::block::decompress(block, size)
            .map_err(|e| Error::invalid(format!("LZ4 decompression failed: {e}")))?;
        if chunk.len() != size {
            return Err(Error::invalid(format!(
                "LZ4 chunk decoded to {} bytes, expected {size}",
                chunk.len()
            )));
        }
        out.extend_from_slice(&chunk);
    }
    tracing::trace!(compressed = frame_size, decompressed = out.len(), "lz4 frame");
    Ok(out)
}

/// Decompress a frame held entirely in `data`.
pub fn decompress_slice(data: &[u8], max_size: u64) -> Result<Vec<u8>> {
    decompress(&mut StreamReader::new(data), max_size)
}
