//! usda text format.
//!
//! - [`parse_layer`] - Parse usda text into a [`Layer`](crate::sdf::Layer)
//! - [`Tok`] - The `logos` lexer
//! - `Layer::to_usda` - Canonical usda output (see [`writer`])
//!
//! # Example
//!
//! ```ignore
//! use tinyusdz::usda;
//! use tinyusdz::util::{Limits, Warnings};
//!
//! let mut warnings = Warnings::new();
//! let layer = usda::parse_layer(text, "scene.usda", &Limits::default(), &mut warnings)?;
//! println!("{}", layer.to_usda());
//! ```

mod parser;
pub mod token;
pub mod writer;

pub use parser::{check_header, is_usda, parse_layer, Parser, USDA_MAJOR_VERSION};
pub use token::Tok;
