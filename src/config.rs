//! # Compiler Settings
//!
//! This module defines [`CompilerConfig`], the explicit settings value that
//! is threaded into the [`Compiler`](crate::stages::orchestrator::Compiler)
//! and used to build readers. There is no process-wide settings state: each
//! compilation run gets the configuration it was constructed with.
//!
//! Settings are read from a `.ci-compose.yaml` file at the repository root.
//! Every key is optional:
//!
//! ```yaml
//! pipelines-folder: .gitlab/pipelines
//! entry-patterns: ["*.yml", "*.yaml"]
//! trigger-key: changes
//! nested-key: pipelines
//! array-merge: replace
//! jobs: 4
//! projects:
//!   group/shared-ci: ../shared-ci
//! ```
//!
//! Unknown keys are rejected, with a "did you mean" hint when a known key is
//! close.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::merge::ArrayMergeMode;
use crate::suggestions;

/// Default settings file name, looked up in the repository root.
pub const CONFIG_FILE_NAME: &str = ".ci-compose.yaml";

const KNOWN_KEYS: &[&str] = &[
    "pipelines-folder",
    "entry-patterns",
    "trigger-key",
    "nested-key",
    "array-merge",
    "jobs",
    "projects",
];

/// Settings for one compilation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct CompilerConfig {
    /// Folder holding the entry-point files, relative to the repository root.
    pub pipelines_folder: String,
    /// File-name globs selecting entry points among the folder's direct children.
    pub entry_patterns: Vec<String>,
    /// Top-level key holding a pipeline's change trigger.
    pub trigger_key: String,
    /// Top-level key naming a folder of nested pipelines.
    pub nested_key: String,
    /// How sequences are combined by includes and extends.
    pub array_merge: ArrayMergeMode,
    /// Worker threads for per-pipeline compilation. Defaults to the available
    /// parallelism.
    pub jobs: Option<usize>,
    /// Project name to local checkout, for `project` includes.
    pub projects: HashMap<String, PathBuf>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            pipelines_folder: ".gitlab/pipelines".to_string(),
            entry_patterns: vec!["*.yml".to_string(), "*.yaml".to_string()],
            trigger_key: "changes".to_string(),
            nested_key: "pipelines".to_string(),
            array_merge: ArrayMergeMode::Replace,
            jobs: None,
            projects: HashMap::new(),
        }
    }
}

impl CompilerConfig {
    /// Number of worker threads to use, never zero.
    pub fn worker_count(&self) -> usize {
        match self.jobs {
            Some(jobs) if jobs > 0 => jobs,
            _ => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

/// Parse settings from YAML. An empty document yields the defaults.
pub fn parse(yaml_content: &str) -> Result<CompilerConfig> {
    let to_config_error = |err: serde_yaml::Error| {
        let message = err.to_string();
        Error::ConfigParse {
            hint: unknown_key_hint(&message),
            message,
        }
    };

    // A file holding only comments parses as null
    let value: serde_yaml::Value = serde_yaml::from_str(yaml_content).map_err(to_config_error)?;
    if value.is_null() {
        return Ok(CompilerConfig::default());
    }
    let config: CompilerConfig = serde_yaml::from_value(value).map_err(to_config_error)?;

    if config.entry_patterns.is_empty() {
        return Err(Error::ConfigParse {
            message: "entry-patterns must not be empty".to_string(),
            hint: Some("Use [\"*.yml\", \"*.yaml\"] to select YAML files".to_string()),
        });
    }
    for pattern in &config.entry_patterns {
        glob::Pattern::new(pattern).map_err(|err| Error::ConfigParse {
            message: format!("invalid entry pattern '{}': {}", pattern, err),
            hint: None,
        })?;
    }

    Ok(config)
}

/// Parse settings from a file.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<CompilerConfig> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    parse(&content)
}

/// serde reports unknown fields as "unknown field `name`, expected ...".
fn unknown_key_hint(message: &str) -> Option<String> {
    let rest = message.strip_prefix("unknown field `")?;
    let key = &rest[..rest.find('`')?];
    suggestions::find_similar(key, KNOWN_KEYS).map(|known| format!("did you mean `{}`?", known))
}
