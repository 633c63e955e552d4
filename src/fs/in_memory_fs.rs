//! In-Memory File System
//!
//! Backing store for tests: a flat map of absolute paths to contents.
//! Directories exist implicitly for any stored file path and explicitly
//! via `mkdir_p`.

use std::collections::{HashMap, HashSet};

use crate::fs::types::{FileSystem, FsError};

#[derive(Debug, Default)]
pub struct InMemoryFs {
    files: HashMap<String, String>,
    dirs: HashSet<String>,
}

impl InMemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file, creating implied parent directories.
    pub fn add_file(&mut self, path: &str, contents: &str) {
        self.files.insert(path.to_string(), contents.to_string());
    }

    pub fn with_file(mut self, path: &str, contents: &str) -> Self {
        self.add_file(path, contents);
        self
    }

    pub fn file_contents(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(|s| s.as_str())
    }

    fn dir_implied(&self, path: &str) -> bool {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        self.files.keys().any(|f| f.starts_with(&prefix))
    }
}

impl FileSystem for InMemoryFs {
    fn read_to_string(&self, path: &str) -> Result<String, FsError> {
        match self.files.get(path) {
            Some(contents) => Ok(contents.clone()),
            None => Err(FsError::NotFound { path: path.to_string() }),
        }
    }

    fn exists(&self, path: &str) -> bool {
        self.is_file(path) || self.is_dir(path)
    }

    fn is_file(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    fn is_dir(&self, path: &str) -> bool {
        self.dirs.contains(path) || self.dir_implied(path)
    }

    fn write_if_changed(&mut self, path: &str, contents: &str) -> Result<bool, FsError> {
        if self.files.get(path).map(|c| c.as_str()) == Some(contents) {
            return Ok(false);
        }
        self.files.insert(path.to_string(), contents.to_string());
        Ok(true)
    }

    fn mkdir_p(&mut self, path: &str) -> Result<(), FsError> {
        self.dirs.insert(path.trim_end_matches('/').to_string());
        Ok(())
    }

    fn list_dir(&self, path: &str) -> Vec<String> {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        let mut names: Vec<String> = self
            .files
            .keys()
            .filter_map(|f| f.strip_prefix(&prefix))
            .map(|rest| rest.split('/').next().unwrap_or(rest).to_string())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write() {
        let mut fs = InMemoryFs::new();
        fs.add_file("/src/meson.build", "project('x', 'c')");
        assert!(fs.is_file("/src/meson.build"));
        assert!(fs.is_dir("/src"));
        assert_eq!(fs.read_to_string("/src/meson.build").unwrap(), "project('x', 'c')");
    }

    #[test]
    fn test_write_if_changed_is_idempotent() {
        let mut fs = InMemoryFs::new();
        assert!(fs.write_if_changed("/out.h", "#define A\n").unwrap());
        assert!(!fs.write_if_changed("/out.h", "#define A\n").unwrap());
        assert!(fs.write_if_changed("/out.h", "#define B\n").unwrap());
    }

    #[test]
    fn test_missing_file() {
        let fs = InMemoryFs::new();
        assert!(matches!(
            fs.read_to_string("/nope"),
            Err(FsError::NotFound { .. })
        ));
    }
}
