//! # TinyUSDZ
//!
//! Rust loader for Universal Scene Description files: usda text, usdc
//! crate binaries and usdz packages, plus the composition that turns a
//! root layer and everything it references into one flattened stage.
//!
//! Input is always a byte slice (or a memory-mapped file); nothing in the
//! core blocks on I/O except through the [`AssetResolver`] the caller
//! supplies.
//!
//! ## Modules
//!
//! - [`util`] - Errors, warnings, limits and load options
//! - [`value`] - Typed values, list-ops and time samples
//! - [`sdf`] - Tokens, paths, prim specs and layers
//! - [`codec`] - Integer and LZ4 codecs used by crate files
//! - [`usdc`] - Crate (binary) decoder
//! - [`usda`] - Text parser and writer
//! - [`usdz`] - Zip package reader
//! - [`composition`] - Asset resolution and the composition engine
//! - [`stage`] - The composed scene
//! - [`loader`] - `load_*` entry points with format detection
//!
//! ## Example
//!
//! ```ignore
//! use tinyusdz::prelude::*;
//!
//! let stage = load_file("scene.usda", &LoadOptions::default())?;
//! for prim in stage.iter() {
//!     println!("{} {}", prim.path(), prim.type_name().unwrap_or(""));
//! }
//! for warning in stage.warnings() {
//!     eprintln!("{warning}");
//! }
//! ```

pub mod codec;
pub mod composition;
pub mod loader;
pub mod sdf;
pub mod stage;
pub mod usda;
pub mod usdc;
pub mod usdz;
pub mod util;
pub mod value;

// Re-export commonly used types
pub use composition::{AssetResolver, FileResolver, MemoryResolver, NullResolver};
pub use loader::{load, load_file, load_usda, load_usdc, load_usdz, Format};
pub use sdf::{Layer, Path, Token};
pub use stage::{Prim, Stage};
pub use util::{Error, Limits, LoadOptions, Result, Warning, WarningKind};
pub use value::Value;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::composition::{AssetResolver, FileResolver, MemoryResolver, NullResolver, UsdzResolver};
    pub use crate::loader::{load, load_file, load_usda, load_usdc, load_usdz, Format};
    pub use crate::sdf::{Layer, LayerOffset, Path, PrimSpec, Property, Reference, Specifier, Token};
    pub use crate::stage::{Prim, Stage};
    pub use crate::util::{Error, Limits, LoadOptions, Result, Warning, WarningKind};
    pub use crate::value::{Interpolation, ListOp, SampleTime, TimeSamples, TypeId, Value};
}
