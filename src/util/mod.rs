//! Utility types shared by every decoder.
//!
//! - [`Error`] / [`Result`] - Error handling, plus the [`Warnings`] sink
//! - [`StreamReader`] - Bounded little-endian byte cursor
//! - [`Limits`] - Allocation ceilings for untrusted input
//! - [`LoadOptions`] - Decoding and composition settings

mod error;
mod limits;
mod options;
mod stream;

pub use error::*;
pub use limits::*;
pub use options::*;
pub use stream::*;
