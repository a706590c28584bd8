//! Composed stage.
//!
//! A [`Stage`] is what composition produces: one tree of [`Prim`]s with
//! every layer, reference, variant and class opinion already merged.
//!
//! - [`Stage`] - prim arena with path and id indices
//! - [`Prim`] - a composed prim and its properties
//! - [`PrimArcs`] - composition arcs that contributed to a prim
//! - [`HandleAllocator`] - non-zero prim id allocation with reuse
//!
//! # Example
//!
//! ```ignore
//! let stage = tinyusdz::load_file("scene.usda", &LoadOptions::default())?;
//! stage.traverse(|prim| println!("{} {:?}", prim.path(), prim.type_name()));
//! println!("{}", stage.export_usda()?);
//! ```

mod export;
mod handle;
mod prim;
#[allow(clippy::module_inception)]
mod stage;

pub use export::value_json;
pub use handle::*;
pub use prim::*;
pub use stage::*;
