//! Utility types shared by the pipeline and its backends.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - [`Extent`] - Surface and image dimensions
//! - Math type re-exports from glam

mod error;
mod math;

pub use error::*;
pub use math::*;
