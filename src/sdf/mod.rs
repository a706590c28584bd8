//! Scene description: tokens, paths, prim and property specs, layers.
//!
//! - [`Token`] - Interned strings
//! - [`Path`] - Prim / property / variant paths
//! - [`PrimSpec`] / [`Property`] - Opinions authored in one layer
//! - [`Layer`] - Arena of prim specs plus layer metadata

mod layer;
mod path;
mod prim_spec;
mod property;
mod token;
mod types;

pub use layer::*;
pub use path::*;
pub use prim_spec::*;
pub use property::*;
pub use token::*;
pub use types::*;
