//! Git plumbing used at the edges of compilation
//!
//! Two collaborators live here, both shelling out to the system `git`
//! command (so SSH keys, credential helpers and `~/.gitconfig` apply as
//! usual):
//!
//! - [`GitFileReader`], a [`FileReader`] that serves files from a local
//!   checkout at any revision. It backs `project` includes.
//! - [`get_changed_files`], which produces the changeset fed to the trigger
//!   evaluator from a diff between two revisions.

use std::path::{Path, PathBuf};
use std::process::Command;

use log::debug;

use crate::error::{Error, Result};
use crate::reader::{normalize_path, FileReader, LocalFileReader};

/// Reads files from a git checkout, optionally at a given revision.
#[derive(Debug, Clone)]
pub struct GitFileReader {
    repo_dir: PathBuf,
    worktree: LocalFileReader,
}

impl GitFileReader {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        let repo_dir = repo_dir.into();
        Self {
            worktree: LocalFileReader::new(repo_dir.clone()),
            repo_dir,
        }
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }
}

impl FileReader for GitFileReader {
    /// With a ref, runs `git show <ref>:<path>`; without one, reads the work tree.
    fn read(&self, path: &str, r#ref: Option<&str>) -> Result<Vec<u8>> {
        let Some(rev) = r#ref else {
            return self.worktree.read(path, None);
        };

        let path = normalize_path(path);
        let object = format!("{}:{}", rev, path);
        debug!("git show {} in {}", object, self.repo_dir.display());

        let output = Command::new("git")
            .arg("-C")
            .arg(&self.repo_dir)
            .args(["show", &object])
            .output()?;

        if output.status.success() {
            return Ok(output.stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_missing_object(&stderr) {
            Err(Error::NotFound {
                path,
                r#ref: Some(rev.to_string()),
            })
        } else {
            Err(Error::GitCommand {
                command: format!("show {}", object),
                repo: self.repo_dir.display().to_string(),
                stderr: stderr.trim().to_string(),
            })
        }
    }

    fn list(&self, dir: &str) -> Result<Vec<String>> {
        self.worktree.list(dir)
    }

    /// With a ref, runs `git ls-tree -r --name-only <ref> -- <dir>`.
    fn list_at(&self, dir: &str, r#ref: Option<&str>) -> Result<Vec<String>> {
        let Some(rev) = r#ref else {
            return self.worktree.list(dir);
        };

        let dir = normalize_path(dir);
        let mut command = Command::new("git");
        command
            .arg("-C")
            .arg(&self.repo_dir)
            .args(["ls-tree", "-r", "--full-tree", "--name-only", rev]);
        if !dir.is_empty() {
            command.args(["--", dir.as_str()]);
        }
        debug!("git ls-tree {} {} in {}", rev, dir, self.repo_dir.display());

        let output = command.output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::GitCommand {
                command: format!("ls-tree {} {}", rev, dir),
                repo: self.repo_dir.display().to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        let mut paths = parse_name_only(&String::from_utf8_lossy(&output.stdout));
        paths.sort();
        Ok(paths)
    }
}

fn is_missing_object(stderr: &str) -> bool {
    stderr.contains("does not exist")
        || stderr.contains("exists on disk, but not in")
        || stderr.contains("invalid object name")
        || stderr.contains("bad revision")
}

/// List files changed between `base` and `head` in the repository at
/// `repo_dir`, as repository-relative paths.
///
/// With a `head`, this is the diff from the merge base (`base...head`), the
/// same set a merge request would show. Without one, the work tree is
/// compared against `base`.
pub fn get_changed_files(repo_dir: &Path, base: &str, head: Option<&str>) -> Result<Vec<String>> {
    let range = match head {
        Some(head) => format!("{}...{}", base, head),
        None => base.to_string(),
    };

    let output = Command::new("git")
        .arg("-C")
        .arg(repo_dir)
        .args(["diff", "--name-only", &range])
        .output()?;

    if !output.status.success() {
        return Err(Error::GitCommand {
            command: format!("diff --name-only {}", range),
            repo: repo_dir.display().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(parse_name_only(&String::from_utf8_lossy(&output.stdout)))
}

fn parse_name_only(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
