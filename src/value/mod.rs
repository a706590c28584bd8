//! USD value system.
//!
//! - [`TypeId`] / [`Role`] - Type identifiers, sizes and roles
//! - [`Value`] - Dynamically typed value with typed access
//! - [`ListOp`] - List editing operations
//! - [`TimeSamples`] - Time-sampled values and interpolation
//! - [`pprint`] - usda literal formatting

mod list_op;
mod math;
pub mod pprint;
mod time_samples;
mod typed;
mod types;
#[allow(clippy::module_inception)]
mod value;

pub use list_op::*;
pub use math::*;
pub use time_samples::*;
pub use typed::*;
pub use types::*;
pub use value::{Dictionary, Value, VariantSelectionMap};
