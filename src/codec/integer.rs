//! Variable-width delta / run-length integer coding.
//!
//! Layout of one coded run of `N` integers of width `W`:
//!
//! ```text
//! +--------------------+
//! | N (LEB128 varint)  |
//! +--------------------+
//! | 2-bit codes        |  N * 2 bits, LSB-first, padded to a byte
//! +--------------------+
//! | payload            |  per code: 1, 2 or W/8 bytes, or nothing
//! +--------------------+
//! ```
//!
//! Codes: `0` = i8 delta, `1` = i16 delta, `2` = full value, `3` = repeat.
//! The running "previous" value starts at zero.

use byteorder::{ByteOrder, LittleEndian};

use crate::util::{Error, Result, StreamReader};

const CODE_SMALL: u8 = 0;
const CODE_MEDIUM: u8 = 1;
const CODE_LARGE: u8 = 2;
const CODE_REPEAT: u8 = 3;

/// Append an unsigned LEB128 varint.
pub fn write_varint(out: &mut Vec<u8>, mut v: u64) {
    loop {
        let byte = (v & 0x7f) as u8;
        v >>= 7;
        if v == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Read an unsigned LEB128 varint.
pub fn read_varint(r: &mut StreamReader<'_>) -> Result<u64> {
    let mut result = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = r.read_u8()?;
        if shift >= 64 {
            return Err(Error::invalid("varint longer than 64 bits"));
        }
        result |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

#[inline]
fn code_at(codes: &[u8], i: usize) -> u8 {
    (codes[i / 4] >> ((i % 4) * 2)) & 0b11
}

macro_rules! int_codec {
    ($encode:ident, $decode:ident, $ty:ty, $width:expr, $read:ident, $write:ident) => {
        /// Encode a run of integers.
        pub fn $encode(values: &[$ty]) -> Vec<u8> {
            let mut out = Vec::with_capacity(values.len() + 16);
            write_varint(&mut out, values.len() as u64);

            let mut codes = vec![0u8; (values.len() + 3) / 4];
            let mut payload = Vec::with_capacity(values.len());
            let mut prev: $ty = 0;
            for (i, &v) in values.iter().enumerate() {
                let delta = v.wrapping_sub(prev);
                let code = if v == prev {
                    CODE_REPEAT
                } else if i8::try_from(delta).is_ok() {
                    payload.push(delta as i8 as u8);
                    CODE_SMALL
                } else if i16::try_from(delta).is_ok() {
                    payload.extend_from_slice(&(delta as i16).to_le_bytes());
                    CODE_MEDIUM
                } else {
                    let mut buf = [0u8; $width];
                    LittleEndian::$write(&mut buf, v);
                    payload.extend_from_slice(&buf);
                    CODE_LARGE
                };
                codes[i / 4] |= code << ((i % 4) * 2);
                prev = v;
            }

            out.extend_from_slice(&codes);
            out.extend_from_slice(&payload);
            out
        }

        /// Decode a run of integers, rejecting runs longer than `max_run`.
        pub fn $decode(r: &mut StreamReader<'_>, max_run: u64) -> Result<Vec<$ty>> {
            let count = read_varint(r)?;
            if count > max_run {
                return Err(Error::OversizedRun { count, limit: max_run });
            }
            let count = count as usize;
            let codes = r.read_bytes((count + 3) / 4)?;

            let mut values = Vec::with_capacity(count.min(r.remaining() + 1));
            let mut prev: $ty = 0;
            for i in 0..count {
                let v = match code_at(codes, i) {
                    CODE_SMALL => prev.wrapping_add(r.read_u8()? as i8 as $ty),
                    CODE_MEDIUM => prev.wrapping_add(r.read_u16_le()? as i16 as $ty),
                    CODE_LARGE => LittleEndian::$read(r.read_bytes($width)?),
                    _ => prev,
                };
                values.push(v);
                prev = v;
            }
            Ok(values)
        }
    };
}

int_codec!(encode_i32, decode_i32, i32, 4, read_i32, write_i32);
int_codec!(encode_i64, decode_i64, i64, 8, read_i64, write_i64);

/// Decode a run of unsigned 32-bit integers (bit-identical to the i32 coding).
pub fn decode_u32(r: &mut StreamReader<'_>, max_run: u64) -> Result<Vec<u32>> {
    Ok(decode_i32(r, max_run)?.into_iter().map(|v| v as u32).collect())
}

/// Encode a run of unsigned 32-bit integers.
pub fn encode_u32(values: &[u32]) -> Vec<u8> {
    let signed: Vec<i32> = values.iter().map(|&v| v as i32).collect();
    encode_i32(&signed)
}

/// Decode a run of unsigned 64-bit integers.
pub fn decode_u64(r: &mut StreamReader<'_>, max_run: u64) -> Result<Vec<u64>> {
    Ok(decode_i64(r, max_run)?.into_iter().map(|v| v as u64).collect())
}

/// Encode a run of unsigned 64-bit integers.
pub fn encode_u64(values: &[u64]) -> Vec<u8> {
    let signed: Vec<i64> = values.iter().map(|&v| v as i64).collect();
    encode_i64(&signed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip_i32(values: &[i32]) -> Vec<i32> {
        let enc = encode_i32(values);
        let mut r = StreamReader::new(&enc);
        let out = decode_i32(&mut r, 1 << 30).unwrap();
        assert_eq!(r.remaining(), 0, "decoder must consume the whole run");
        out
    }

    #[test]
    fn test_varint() {
        for v in [0u64, 1, 127, 128, 300, u32::MAX as u64, u64::MAX] {
            let mut buf = Vec::new();
            write_varint(&mut buf, v);
            let mut r = StreamReader::new(&buf);
            assert_eq!(read_varint(&mut r).unwrap(), v);
        }
    }

    #[test]
    fn test_empty() {
        assert_eq!(encode_i32(&[]), vec![0]);
        assert!(roundtrip_i32(&[]).is_empty());
    }

    #[test]
    fn test_code_selection() {
        // 0 repeats the initial zero, 5 is a small delta, 1000 a medium delta,
        // then a full value, then a repeat.
        let values = [0, 5, 1005, 1_000_000_000, 1_000_000_000];
        let enc = encode_i32(&values);
        assert_eq!(enc[0], 5);
        let codes = enc[1] as u32 | ((enc[2] as u32) << 8);
        assert_eq!(codes & 0b11, 3);
        assert_eq!((codes >> 2) & 0b11, 0);
        assert_eq!((codes >> 4) & 0b11, 1);
        assert_eq!((codes >> 6) & 0b11, 2);
        assert_eq!((codes >> 8) & 0b11, 3);
        // varint + 2 code bytes + 1 + 2 + 4 payload bytes
        assert_eq!(enc.len(), 1 + 2 + 1 + 2 + 4);
        assert_eq!(roundtrip_i32(&values), values);
    }

    #[test]
    fn test_extremes_wrap() {
        let values = [i32::MIN, i32::MAX, -1, 0, i32::MIN, 7, -7];
        assert_eq!(roundtrip_i32(&values), values);

        let values64 = [i64::MIN, i64::MAX, 0, -300, 300, i64::MAX];
        let enc = encode_i64(&values64);
        let mut r = StreamReader::new(&enc);
        assert_eq!(decode_i64(&mut r, 100).unwrap(), values64);
    }

    #[test]
    fn test_pseudo_random_sequences() {
        let mut seed = 0x2545_f491_4f6c_dd1du64;
        for len in [1usize, 3, 4, 5, 17, 256, 1001] {
            let mut values = Vec::with_capacity(len);
            for _ in 0..len {
                seed ^= seed << 13;
                seed ^= seed >> 7;
                seed ^= seed << 17;
                let v = match seed % 4 {
                    0 => (seed >> 40) as i32 % 100,
                    1 => (seed >> 20) as i32,
                    2 => values.last().copied().unwrap_or(0),
                    _ => -((seed >> 50) as i32),
                };
                values.push(v);
            }
            assert_eq!(roundtrip_i32(&values), values);

            let wide: Vec<i64> = values.iter().map(|&v| (v as i64) << 20).collect();
            let enc = encode_i64(&wide);
            let mut r = StreamReader::new(&enc);
            assert_eq!(decode_i64(&mut r, 1 << 30).unwrap(), wide);
        }
    }

    #[test]
    fn test_unsigned() {
        let values = [0u32, u32::MAX, 12, 12, 0x8000_0000];
        let enc = encode_u32(&values);
        let mut r = StreamReader::new(&enc);
        assert_eq!(decode_u32(&mut r, 10).unwrap(), values);
    }

    #[test]
    fn test_oversized_run() {
        let enc = encode_i32(&[1, 2, 3, 4]);
        let mut r = StreamReader::new(&enc);
        assert!(matches!(
            decode_i32(&mut r, 3),
            Err(Error::OversizedRun { count: 4, limit: 3 })
        ));
    }

    #[test]
    fn test_truncated() {
        let enc = encode_i32(&[100_000, 200_000]);
        let cut = &enc[..enc.len() - 1];
        let mut r = StreamReader::new(cut);
        assert!(matches!(decode_i32(&mut r, 10), Err(Error::Truncated { .. })));
    }
}
