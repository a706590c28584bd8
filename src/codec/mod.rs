//! Byte-level codecs used by the crate (usdc) decoder.
//!
//! - [`integer`] - Delta / run-length integer coding for index tables
//! - [`lz4`] - Chunked LZ4 frames wrapping compressed sections

pub mod integer;
pub mod lz4;

use crate::util::{Result, StreamReader};

/// Read an integer-coded stream of `i32` wrapped in an LZ4 frame.
pub fn read_coded_i32(r: &mut StreamReader<'_>, max_decompressed: u64, max_run: u64) -> Result<Vec<i32>> {
    let raw = lz4::decompress(r, max_decompressed)?;
    integer::decode_i32(&mut StreamReader::new(&raw), max_run)
}

/// Read an integer-coded stream of `u32` wrapped in an LZ4 frame.
pub fn read_coded_u32(r: &mut StreamReader<'_>, max_decompressed: u64, max_run: u64) -> Result<Vec<u32>> {
    let raw = lz4::decompress(r, max_decompressed)?;
    integer::decode_u32(&mut StreamReader::new(&raw), max_run)
}

/// Read an integer-coded stream of `i64` wrapped in an LZ4 frame.
pub fn read_coded_i64(r: &mut StreamReader<'_>, max_decompressed: u64, max_run: u64) -> Result<Vec<i64>> {
    let raw = lz4::decompress(r, max_decompressed)?;
    integer::decode_i64(&mut StreamReader::new(&raw), max_run)
}

/// Encode `i32` values and wrap them in an LZ4 frame.
pub fn write_coded_i32(values: &[i32]) -> Vec<u8> {
    lz4::compress(&integer::encode_i32(values))
}

/// Encode `u32` values and wrap them in an LZ4 frame.
pub fn write_coded_u32(values: &[u32]) -> Vec<u8> {
    lz4::compress(&integer::encode_u32(values))
}

/// Encode `i64` values and wrap them in an LZ4 frame.
pub fn write_coded_i64(values: &[i64]) -> Vec<u8> {
    lz4::compress(&integer::encode_i64(values))
}
