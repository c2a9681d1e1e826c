//! Shared utilities.
//!
//! - [`analyzer`] - text tokenization shared by indexing and query parsing
//! - [`encoding`] - variable-length integer and delta encoding

pub mod analyzer;
pub mod encoding;

pub use analyzer::*;
pub use encoding::*;
