//! Real File System
//!
//! Thin wrapper over std::fs with the write-if-changed contract the
//! configure-file machinery relies on.

use std::fs;
use std::io::ErrorKind as IoKind;
use std::path::Path;

use crate::fs::types::{FileSystem, FsError};

#[derive(Debug, Default)]
pub struct StdFs;

impl StdFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for StdFs {
    fn read_to_string(&self, path: &str) -> Result<String, FsError> {
        match fs::read(path) {
            Ok(bytes) => String::from_utf8(bytes)
                .map_err(|_| FsError::InvalidUtf8 { path: path.to_string() }),
            Err(e) if e.kind() == IoKind::NotFound => {
                Err(FsError::NotFound { path: path.to_string() })
            }
            Err(e) => Err(FsError::Other { message: format!("{}: {}", path, e) }),
        }
    }

    fn exists(&self, path: &str) -> bool {
        Path::new(path).exists()
    }

    fn is_file(&self, path: &str) -> bool {
        Path::new(path).is_file()
    }

    fn is_dir(&self, path: &str) -> bool {
        Path::new(path).is_dir()
    }

    fn write_if_changed(&mut self, path: &str, contents: &str) -> Result<bool, FsError> {
        if let Ok(existing) = fs::read(path) {
            if existing == contents.as_bytes() {
                return Ok(false);
            }
        }
        if let Some(parent) = Path::new(path).parent() {
            fs::create_dir_all(parent)
                .map_err(|e| FsError::Other { message: format!("{}: {}", path, e) })?;
        }
        // Write to a sibling temp file then rename so readers never see a
        // partial file.
        let tmp = format!("{}.tmp", path);
        fs::write(&tmp, contents)
            .map_err(|e| FsError::Other { message: format!("{}: {}", tmp, e) })?;
        fs::rename(&tmp, path)
            .map_err(|e| FsError::Other { message: format!("{}: {}", path, e) })?;
        Ok(true)
    }

    fn mkdir_p(&mut self, path: &str) -> Result<(), FsError> {
        fs::create_dir_all(path)
            .map_err(|e| FsError::Other { message: format!("{}: {}", path, e) })
    }

    fn list_dir(&self, path: &str) -> Vec<String> {
        match fs::read_dir(path) {
            Ok(entries) => {
                let mut names: Vec<String> = entries
                    .filter_map(|e| e.ok())
                    .filter_map(|e| e.file_name().into_string().ok())
                    .collect();
                names.sort();
                names
            }
            Err(_) => Vec::new(),
        }
    }
}
