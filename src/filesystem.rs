//! In-memory filesystem used as a [`FileReader`]
//!
//! `MemoryFS` holds configuration files in a map and serves them through the
//! same reader interface as the local filesystem. It is what tests and
//! embedders use to compile pipelines without touching disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use glob::Pattern;

use crate::error::{Error, Result};
use crate::reader::{normalize_path, FileReader};

/// Represents a file with content
#[derive(Debug, Clone)]
pub struct File {
    /// File content as bytes
    pub content: Vec<u8>,
}

impl File {
    /// Create a new file with content
    pub fn new(content: Vec<u8>) -> Self {
        Self { content }
    }

    /// Create a new file from string content
    pub fn from_string(content: &str) -> Self {
        Self::new(content.as_bytes().to_vec())
    }

    /// Get file size in bytes
    pub fn size(&self) -> usize {
        self.content.len()
    }
}

/// In-memory filesystem. Revisions are not modelled: `read` ignores `ref`.
#[derive(Debug, Clone, Default)]
pub struct MemoryFS {
    /// Files stored as path -> content mapping
    files: HashMap<PathBuf, File>,
}

impl MemoryFS {
    /// Create a new empty filesystem
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or update a file
    pub fn add_file<P: AsRef<Path>>(&mut self, path: P, file: File) -> Result<()> {
        let key = normalize_key(path.as_ref())?;
        self.files.insert(key, file);
        Ok(())
    }

    /// Add a file with string content
    pub fn add_file_string<P: AsRef<Path>>(&mut self, path: P, content: &str) -> Result<()> {
        self.add_file(path, File::from_string(content))
    }

    /// Builder-style variant of `add_file_string`, handy in tests.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P, content: &str) -> Result<Self> {
        self.add_file_string(path, content)?;
        Ok(self)
    }

    /// Get a file by path
    pub fn get_file<P: AsRef<Path>>(&self, path: P) -> Option<&File> {
        let key = normalize_key(path.as_ref()).ok()?;
        self.files.get(&key)
    }

    /// Check if a file exists
    pub fn exists<P: AsRef<Path>>(&self, path: P) -> bool {
        self.get_file(path).is_some()
    }

    /// List all files
    pub fn list_files(&self) -> Vec<PathBuf> {
        self.files.keys().cloned().collect()
    }

    /// List files matching a glob pattern
    pub fn list_files_glob(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        let pattern = Pattern::new(pattern).map_err(Error::Glob)?;
        let mut matches: Vec<PathBuf> = self
            .files
            .keys()
            .filter(|path| path.to_str().is_some_and(|s| pattern.matches(s)))
            .cloned()
            .collect();
        matches.sort();
        Ok(matches)
    }

    /// Get the number of files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if filesystem is empty
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterate over all files as (path, file) pairs
    pub fn files(&self) -> impl Iterator<Item = (&PathBuf, &File)> {
        self.files.iter()
    }
}

impl FileReader for MemoryFS {
    fn read(&self, path: &str, _ref: Option<&str>) -> Result<Vec<u8>> {
        self.get_file(path)
            .map(|file| file.content.clone())
            .ok_or_else(|| Error::NotFound {
                path: normalize_path(path),
                r#ref: None,
            })
    }

    fn list(&self, dir: &str) -> Result<Vec<String>> {
        let dir = normalize_path(dir);
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{}/", dir)
        };

        let mut files: Vec<String> = self
            .files
            .keys()
            .filter_map(|path| path.to_str())
            .filter(|path| path.starts_with(&prefix))
            .map(str::to_string)
            .collect();

        if files.is_empty() && !dir.is_empty() {
            return Err(Error::NotFound {
                path: dir,
                r#ref: None,
            });
        }

        files.sort();
        Ok(files)
    }
}

/// Keys are stored as normalized `/`-separated relative paths.
fn normalize_key(path: &Path) -> Result<PathBuf> {
    let as_str = path.to_str().ok_or_else(|| Error::NotFound {
        path: path.display().to_string(),
        r#ref: None,
    })?;
    Ok(PathBuf::from(normalize_path(as_str)))
}
