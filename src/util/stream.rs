//! Bounded little-endian byte cursor.

use byteorder::{ByteOrder, LittleEndian};

use super::{Error, Result};

/// Endian-safe cursor over an in-memory byte slice.
///
/// Every read is bounds-checked against the slice length and fails with
/// [`Error::Truncated`] instead of panicking.
#[derive(Clone)]
pub struct StreamReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> StreamReader<'a> {
    /// Create a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Total size of the underlying buffer.
    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Current position.
    #[inline]
    pub fn tell(&self) -> u64 {
        self.pos as u64
    }

    /// Bytes left between the cursor and the end of the buffer.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Underlying buffer.
    #[inline]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Move to an absolute position. Seeking to `size()` is allowed.
    pub fn seek_to(&mut self, pos: u64) -> Result<()> {
        if pos > self.data.len() as u64 {
            return Err(Error::Truncated {
                offset: pos,
                needed: 0,
                available: self.data.len() as u64,
            });
        }
        self.pos = pos as usize;
        Ok(())
    }

    /// Move relative to the current position.
    pub fn seek_rel(&mut self, delta: i64) -> Result<()> {
        let target = self.pos as i64 + delta;
        if target < 0 {
            return Err(Error::invalid(format!("seek before start of stream ({target})")));
        }
        self.seek_to(target as u64)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(Error::Truncated {
                offset: self.pos as u64,
                needed: n as u64,
                available: self.remaining() as u64,
            });
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Borrow the next `n` bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_i32_le(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    pub fn read_u64_le(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    pub fn read_i64_le(&mut self) -> Result<i64> {
        Ok(LittleEndian::read_i64(self.take(8)?))
    }

    pub fn read_f32_le(&mut self) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.take(4)?))
    }

    pub fn read_f64_le(&mut self) -> Result<f64> {
        Ok(LittleEndian::read_f64(self.take(8)?))
    }

    /// Read a NUL-terminated string. The terminator is consumed but not returned.
    pub fn read_cstr(&mut self) -> Result<&'a str> {
        let rest = &self.data[self.pos..];
        let len = rest.iter().position(|&b| b == 0).ok_or(Error::Truncated {
            offset: self.pos as u64,
            needed: rest.len() as u64 + 1,
            available: rest.len() as u64,
        })?;
        let s = std::str::from_utf8(&rest[..len])?;
        self.pos += len + 1;
        Ok(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_are_little_endian() {
        let bytes = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let mut r = StreamReader::new(&bytes);
        assert_eq!(r.read_u16_le().unwrap(), 0x0201);
        assert_eq!(r.read_u8().unwrap(), 0x03);
        assert_eq!(r.tell(), 3);
        r.seek_to(0).unwrap();
        assert_eq!(r.read_u64_le().unwrap(), 0x0807060504030201);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_short_read() {
        let bytes = [1u8, 2, 3];
        let mut r = StreamReader::new(&bytes);
        let err = r.read_u32_le().unwrap_err();
        assert!(matches!(err, Error::Truncated { needed: 4, available: 3, .. }));
        // failed read leaves the cursor untouched
        assert_eq!(r.tell(), 0);
    }

    #[test]
    fn test_seek_bounds() {
        let bytes = [0u8; 4];
        let mut r = StreamReader::new(&bytes);
        assert!(r.seek_to(4).is_ok());
        assert!(r.seek_to(5).is_err());
        r.seek_to(2).unwrap();
        r.seek_rel(-2).unwrap();
        assert_eq!(r.tell(), 0);
        assert!(r.seek_rel(-1).is_err());
    }

    #[test]
    fn test_cstr() {
        let bytes = b"abc\0de\0f";
        let mut r = StreamReader::new(bytes);
        assert_eq!(r.read_cstr().unwrap(), "abc");
        assert_eq!(r.read_cstr().unwrap(), "de");
        assert!(r.read_cstr().is_err());
    }

    #[test]
    fn test_floats() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1.5f32.to_le_bytes());
        bytes.extend_from_slice(&(-2.25f64).to_le_bytes());
        let mut r = StreamReader::new(&bytes);
        assert_eq!(r.read_f32_le().unwrap(), 1.5);
        assert_eq!(r.read_f64_le().unwrap(), -2.25);
    }
}
