//! Allocation ceilings applied while decoding untrusted input.

use super::{Error, Result};

/// Default ceiling on a single input buffer (2 GiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 2 << 30;

/// Default ceiling on one decompressed LZ4 frame (4 GiB).
pub const DEFAULT_MAX_DECOMPRESSED_SIZE: u64 = 4 << 30;

/// Default ceiling on the number of paths in one crate file.
pub const DEFAULT_MAX_PATH_COUNT: u64 = 1 << 28;

/// Default ceiling on the element count of one integer-coded run.
pub const DEFAULT_MAX_INT_RUN: u64 = 1 << 30;

/// Default number of follow-up usda diagnostics kept after the first error.
pub const DEFAULT_MAX_DIAGNOSTICS: usize = 10;

/// Resource ceilings. Breaching any of them yields [`Error::ResourceLimit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    pub max_file_size: u64,
    pub max_decompressed_size: u64,
    pub max_path_count: u64,
    pub max_int_run: u64,
    pub max_diagnostics: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_decompressed_size: DEFAULT_MAX_DECOMPRESSED_SIZE,
            max_path_count: DEFAULT_MAX_PATH_COUNT,
            max_int_run: DEFAULT_MAX_INT_RUN,
            max_diagnostics: DEFAULT_MAX_DIAGNOSTICS,
        }
    }
}

impl Limits {
    #[inline]
    pub fn check_file_size(&self, size: u64) -> Result<()> {
        check("file size", size, self.max_file_size)
    }

    #[inline]
    pub fn check_decompressed_size(&self, size: u64) -> Result<()> {
        check("decompressed size", size, self.max_decompressed_size)
    }

    #[inline]
    pub fn check_path_count(&self, count: u64) -> Result<()> {
        check("path count", count, self.max_path_count)
    }
}

#[inline]
fn check(what: &'static str, requested: u64, limit: u64) -> Result<()> {
    if requested > limit {
        return Err(Error::ResourceLimit { what, requested, limit });
    }
    Ok(())
}
