//! USDZ package reader.
//!
//! A USDZ file is a zip archive whose members are stored without
//! compression and whose data starts on 64-byte boundaries, so each member
//! can be consumed in place.
//!
//! ## File Structure
//!
//! ```text
//! +----------------------------+
//! | local header + padding     |  data aligned to 64 bytes
//! | member data (stored)       |
//! +----------------------------+
//! | ... more members ...       |
//! +----------------------------+
//! | central directory          |  parsed by the `zip` crate
//! +----------------------------+
//! | end of central directory   |
//! +----------------------------+
//! ```
//!
//! - [`UsdzArchive`] - Member table and zero-copy reads
//! - [`Member`] - Name and byte range of one member

mod archive;

pub use archive::*;

/// True if `data` starts with a zip local file header.
pub fn is_usdz(data: &[u8]) -> bool {
    data.starts_with(b"PK\x03\x04")
}
