//! Text utilities shared across the pipeline.

pub mod sanitize;

pub use sanitize::{canonicalize, sanitize_output};
