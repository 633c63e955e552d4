//! Runtime Object Model
//!
//! Every value the evaluator touches lives in the workspace-owned arena and
//! is referenced by a small copyable handle. See `types` for the value
//! variants and `arena` for storage.

pub mod arena;
pub mod strings;
pub mod types;

pub use arena::ObjStore;
pub use strings::{StrId, StringPool};
pub use types::*;
