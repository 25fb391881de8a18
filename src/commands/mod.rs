//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the `ci-compose`
//! command-line tool. Each subcommand is defined in its own file to keep the
//! logic separated and maintainable.
//!
//! ## Structure
//!
//! Each command module typically contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and performs the
//!   command's logic.
//!
//! Commands that compile pipelines share [`SourceArgs`] (where the repository,
//! settings and pipelines folder are) and [`load_compiler`], which turns them
//! into a ready [`Compiler`].

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use ci_compose::config::{self, CompilerConfig, CONFIG_FILE_NAME};
use ci_compose::error::Error;
use ci_compose::pipeline::{Pipeline, PipelinesConfig};
use ci_compose::reader::IncludeSources;
use ci_compose::stages::{CompileReport, Compiler};
use ci_compose::suggestions;

pub mod compile;
pub mod completions;
pub mod ls;
pub mod tree;
pub mod triggered;
pub mod validate;

/// Where to find the repository, its settings and its pipelines.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Repository root that local includes and pipeline folders are relative to.
    ///
    /// Can also be set with the `CI_COMPOSE_ROOT` environment variable.
    #[arg(long, value_name = "DIR", env = "CI_COMPOSE_ROOT", default_value = ".")]
    pub root: PathBuf,

    /// Settings file. Defaults to `.ci-compose.yaml` in the root, if present.
    ///
    /// Can also be set with the `CI_COMPOSE_CONFIG` environment variable.
    #[arg(short, long, value_name = "FILE", env = "CI_COMPOSE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Pipelines folder, relative to the root. Overrides `pipelines-folder`.
    #[arg(short, long, value_name = "DIR")]
    pub folder: Option<String>,

    /// Number of worker threads. Overrides `jobs`.
    #[arg(short, long, value_name = "NUM")]
    pub jobs: Option<usize>,
}

/// A compiler built from command-line arguments.
pub struct Session {
    pub root: PathBuf,
    pub folder: String,
    pub compiler: Compiler,
}

impl Session {
    /// Compile the selected folder.
    pub fn compile(&self) -> Result<CompileReport> {
        self.compiler
            .compile(&self.folder)
            .with_context(|| format!("Failed to compile pipelines in '{}'", self.folder))
    }
}

/// Read settings, apply command-line overrides and build the compiler.
pub fn load_compiler(args: &SourceArgs) -> Result<Session> {
    let mut settings = load_settings(&args.root, args.config.as_deref())?;
    if let Some(jobs) = args.jobs {
        settings.jobs = Some(jobs);
    }

    let folder = args
        .folder
        .clone()
        .unwrap_or_else(|| settings.pipelines_folder.clone());
    if !args.root.join(&folder).is_dir() {
        return Err(suggestions::pipelines_folder_not_found(&folder, &args.root));
    }

    let sources = IncludeSources::from_config(&args.root, &settings);
    Ok(Session {
        root: args.root.clone(),
        folder,
        compiler: Compiler::new(settings, sources),
    })
}

fn load_settings(root: &Path, explicit: Option<&Path>) -> Result<CompilerConfig> {
    let path = match explicit {
        Some(path) if !path.exists() => return Err(suggestions::config_not_found(path)),
        Some(path) => path.to_path_buf(),
        None => {
            let default = root.join(CONFIG_FILE_NAME);
            if !default.exists() {
                return Ok(CompilerConfig::default());
            }
            default
        }
    };

    config::from_file(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load config from {}: {}", path.display(), e))
}

/// Find a pipeline by a possibly nested identifier such as `web/frontend`.
pub fn find_pipeline<'a>(config: &'a PipelinesConfig, qualified: &str) -> Option<&'a Pipeline> {
    let mut segments = qualified.split('/');
    let mut pipeline = config.get(segments.next()?)?;
    for segment in segments {
        pipeline = pipeline.nested.as_ref()?.get(segment)?;
    }
    Some(pipeline)
}

/// Print every failure of a report to stderr, with a hint where one applies.
pub fn report_failures(report: &CompileReport) {
    for failure in &report.failures {
        eprintln!("error: {}: {}", failure.identifier, describe(&failure.error));
        if let Some(hint) = suggestions::failure_hint(&failure.error) {
            eprintln!("  hint: {}", hint);
        }
    }
}

fn describe(error: &Error) -> String {
    match error {
        Error::Pipeline { path, source } => format!("{} ({})", source, path),
        other => other.to_string(),
    }
}
