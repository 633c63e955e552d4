//! masonry - a build-configuration language front-end
//!
//! This library parses and evaluates build descriptions (meson.build
//! files), records the declared targets, dependencies, options, tests and
//! install rules, and exposes the resulting state for a backend to turn
//! into a low-level build manifest.

pub mod ast;
pub mod compiler;
pub mod diagnostics;
pub mod external;
pub mod fs;
pub mod functions;
pub mod introspect;
pub mod object;
pub mod parser;
pub mod typecheck;
pub mod version;
pub mod vm;
pub mod workspace;

pub use diagnostics::{Diagnostics, ErrorKind, InterpError, InterpResult, Span};
pub use object::{Obj, ObjStore, ObjType, Value};
pub use parser::{parse_source, ParseMode};
pub use workspace::{LanguageMode, Workspace};
