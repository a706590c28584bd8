//! Crate (binary `.usdc`) decoder.
//!
//! ## File Structure
//!
//! ```text
//! +----------------------+
//! | Magic: "PXR-USDC"    |  8 bytes
//! +----------------------+
//! | Version              |  8 bytes (major, minor, patch, padding)
//! +----------------------+
//! | TOC offset           |  8 bytes (u64 LE)
//! +----------------------+
//! | Reserved             |  64 bytes
//! +----------------------+
//! | ... values ...       |  out-of-line value blobs
//! +----------------------+
//! | TOKENS, STRINGS,     |
//! | FIELDS, FIELDSETS,   |  structural sections
//! | PATHS, SPECS         |
//! +----------------------+
//! | TOC                  |  u64 count + {name[16], i64 start, i64 size}
//! +----------------------+
//! ```

mod builder;
pub mod format;
mod reader;
mod value;

pub use builder::{build_layer, coerce};
pub use format::{CrateType, SpecType, ValueRep, USDC_MAGIC};
pub use reader::{read_bootstrap, CrateFile, Field, Section, Spec};

use crate::sdf::Layer;
use crate::util::{Limits, Result, Warnings};

/// True if `data` starts with the crate magic.
pub fn is_crate(data: &[u8]) -> bool {
    data.starts_with(USDC_MAGIC)
}

/// Decode a crate file into a layer.
pub fn read_layer(
    data: &[u8],
    identifier: &str,
    limits: Limits,
    parallel: bool,
    warnings: &mut Warnings,
) -> Result<Layer> {
    let file = CrateFile::open(data, limits, parallel)?;
    build_layer(&file, identifier, warnings)
}
