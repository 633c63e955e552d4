//! File System Types
//!
//! The evaluator core never opens files directly; everything goes through
//! the `FileSystem` trait so tests can run against an in-memory tree.

use thiserror::Error;

/// File system errors.
#[derive(Error, Debug, Clone)]
pub enum FsError {
    #[error("no such file or directory: '{path}'")]
    NotFound { path: String },

    #[error("illegal operation on a directory: '{path}'")]
    IsDirectory { path: String },

    #[error("not a directory: '{path}'")]
    NotDirectory { path: String },

    #[error("file is not valid utf-8: '{path}'")]
    InvalidUtf8 { path: String },

    #[error("{message}")]
    Other { message: String },
}

/// Synchronous filesystem interface used by source loading, configure-file
/// output and the fs module.
pub trait FileSystem {
    fn read_to_string(&self, path: &str) -> Result<String, FsError>;
    fn exists(&self, path: &str) -> bool;
    fn is_file(&self, path: &str) -> bool;
    fn is_dir(&self, path: &str) -> bool;
    /// Write `contents` only when they differ from what is on disk,
    /// preserving the mtime otherwise. Returns true when a write happened.
    fn write_if_changed(&mut self, path: &str, contents: &str) -> Result<bool, FsError>;
    fn mkdir_p(&mut self, path: &str) -> Result<(), FsError>;
    /// Names of direct children of a directory, empty when it does not
    /// exist.
    fn list_dir(&self, path: &str) -> Vec<String>;
}
