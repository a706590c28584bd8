//! Composition: from layers to a [`Stage`](crate::stage::Stage).
//!
//! - [`AssetResolver`] - maps `@asset@` paths to bytes
//! - [`FileResolver`], [`MemoryResolver`], [`UsdzResolver`], [`NullResolver`] - stock resolvers
//! - [`compose`] - merge a root layer and everything it reaches into a stage
//!
//! ## Strength order
//!
//! For a single prim, strongest first:
//!
//! ```text
//! local opinions (stack root layer)
//!   > selected variants
//!   > references, payloads
//!   > inherits
//!   > specializes
//!   > sublayers, in declaration order
//! ```
//!
//! A reference or payload that would reopen an asset already on the
//! current arc chain is dropped with a
//! [`WarningKind::CompositionCycle`](crate::util::WarningKind) warning;
//! unresolved assets are dropped with
//! [`WarningKind::UnresolvedAsset`](crate::util::WarningKind).

mod engine;
mod resolver;

pub use engine::compose;
pub use resolver::*;
