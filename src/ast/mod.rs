//! Abstract Syntax Tree
//!
//! Nodes live in a pool and reference each other by index; see `types`.

pub mod types;

pub use types::*;
