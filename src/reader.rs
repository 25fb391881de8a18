//! # File Reading Capability
//!
//! The resolution core never touches the filesystem or network itself; it
//! reads every document through the narrow [`FileReader`] trait. This
//! module defines that trait, the local-filesystem implementation, and
//! [`IncludeSources`], which routes each include directive to the reader for
//! its kind (local, project, remote).
//!
//! Readers are shared by the compiler's worker threads, so they must be safe
//! for concurrent use: every implementation here is a stateless read.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use walkdir::WalkDir;

use crate::config::CompilerConfig;
use crate::error::{Error, Result};
use crate::git::GitFileReader;
use crate::stages::include::{IncludeDirective, IncludeKind};

/// Reads configuration files from one location.
pub trait FileReader: Send + Sync {
    /// Read the file at `path` (relative to the reader's root), optionally at
    /// the revision `ref`. Readers without revisions ignore `ref`.
    ///
    /// Fails with `Error::NotFound` when no such file exists.
    fn read(&self, path: &str, r#ref: Option<&str>) -> Result<Vec<u8>>;

    /// List every file below `dir`, recursively, as root-relative paths using
    /// `/` separators, sorted.
    fn list(&self, dir: &str) -> Result<Vec<String>> {
        Err(Error::NotImplemented {
            feature: format!("listing files under '{}'", dir),
        })
    }

    /// List every file below `dir` as of revision `ref`. Without a ref this
    /// is [`list`](FileReader::list); readers that track revisions override it.
    fn list_at(&self, dir: &str, r#ref: Option<&str>) -> Result<Vec<String>> {
        match r#ref {
            None => self.list(dir),
            Some(rev) => Err(Error::NotImplemented {
                feature: format!("listing files under '{}' at revision '{}'", dir, rev),
            }),
        }
    }
}

impl<T: FileReader + ?Sized> FileReader for Arc<T> {
    fn read(&self, path: &str, r#ref: Option<&str>) -> Result<Vec<u8>> {
        (**self).read(path, r#ref)
    }

    fn list(&self, dir: &str) -> Result<Vec<String>> {
        (**self).list(dir)
    }

    fn list_at(&self, dir: &str, r#ref: Option<&str>) -> Result<Vec<String>> {
        (**self).list_at(dir, r#ref)
    }
}

/// Normalize a repository-relative path: strip leading `./` and `/`, and
/// drop empty segments.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Reads files below a root directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalFileReader {
    root: PathBuf,
}

impl LocalFileReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileReader for LocalFileReader {
    fn read(&self, path: &str, _ref: Option<&str>) -> Result<Vec<u8>> {
        let normalized = normalize_path(path);
        let full_path = self.root.join(&normalized);
        std::fs::read(&full_path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => Error::NotFound {
                path: normalized,
                r#ref: None,
            },
            _ => Error::Io(err),
        })
    }

    fn list(&self, dir: &str) -> Result<Vec<String>> {
        let normalized = normalize_path(dir);
        let start = self.root.join(&normalized);
        if !start.is_dir() {
            return Err(Error::NotFound {
                path: normalized,
                r#ref: None,
            });
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&start).follow_links(true) {
            let entry = entry.map_err(|err| Error::Io(err.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            // Entries always live below the root we started from
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let relative = relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if relative.starts_with(".git/") {
                continue;
            }
            files.push(relative);
        }

        files.sort();
        Ok(files)
    }
}

/// Routes include directives to one reader per include kind.
///
/// There is always a local reader (the repository being compiled). Remote
/// and project readers are optional; a directive whose kind has no reader
/// fails with `UnresolvableInclude`.
#[derive(Clone)]
pub struct IncludeSources {
    local: Arc<dyn FileReader>,
    remote: Option<Arc<dyn FileReader>>,
    projects: HashMap<String, Arc<dyn FileReader>>,
}

impl IncludeSources {
    /// Create sources with only a local reader.
    pub fn new(local: impl FileReader + 'static) -> Self {
        Self {
            local: Arc::new(local),
            remote: None,
            projects: HashMap::new(),
        }
    }

    /// Build sources for a repository checkout at `root`: a local reader over
    /// the checkout plus a git-backed reader for every configured project.
    ///
    /// Relative project paths are taken relative to `root`.
    pub fn from_config(root: &Path, config: &CompilerConfig) -> Self {
        let mut sources = Self::new(LocalFileReader::new(root));
        for (name, checkout) in &config.projects {
            let repo_dir = if checkout.is_absolute() {
                checkout.clone()
            } else {
                root.join(checkout)
            };
            debug!("Project '{}' reads from {}", name, repo_dir.display());
            sources = sources.with_project(name, GitFileReader::new(repo_dir));
        }
        sources
    }

    /// Set the reader used for `remote` includes.
    pub fn with_remote(mut self, reader: impl FileReader + 'static) -> Self {
        self.remote = Some(Arc::new(reader));
        self
    }

    /// Set the reader used for `project` includes naming `project`.
    pub fn with_project(mut self, project: &str, reader: impl FileReader + 'static) -> Self {
        self.projects.insert(project.to_string(), Arc::new(reader));
        self
    }

    /// The reader for the repository being compiled.
    pub fn local(&self) -> &dyn FileReader {
        self.local.as_ref()
    }

    /// The reader responsible for `kind`, if one is configured.
    pub fn reader_for(&self, kind: &IncludeKind) -> Option<&dyn FileReader> {
        match kind {
            IncludeKind::Local => Some(self.local.as_ref()),
            IncludeKind::Remote => self.remote.as_deref(),
            IncludeKind::Project { project } => self.projects.get(project).map(|r| r.as_ref()),
        }
    }

    /// Fetch the content an include directive points at.
    ///
    /// Every failure is reported as `UnresolvableInclude` naming the directive.
    pub fn read(&self, directive: &IncludeDirective) -> Result<Vec<u8>> {
        let reader = self
            .reader_for(&directive.kind)
            .ok_or_else(|| Error::UnresolvableInclude {
                include: directive.to_string(),
                message: "no reader is configured for this include kind".to_string(),
            })?;

        debug!("Fetching include {}", directive);
        reader
            .read(&directive.source, directive.r#ref.as_deref())
            .map_err(|err| Error::UnresolvableInclude {
                include: directive.to_string(),
                message: err.to_string(),
            })
    }
}

impl std::fmt::Debug for IncludeSources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut projects: Vec<&String> = self.projects.keys().collect();
        projects.sort();
        f.debug_struct("IncludeSources")
            .field("remote", &self.remote.is_some())
            .field("projects", &projects)
            .finish()
    }
}
