//! # Triggered Command Implementation
//!
//! This module implements the `triggered` subcommand, which answers "which
//! pipelines must run for this change?".
//!
//! ## Functionality
//!
//! - **Changeset**: Taken from repeated `--changed` paths, or from a git
//!   diff between `--base` and `--head` (the work tree when `--head` is
//!   omitted).
//! - **Nested pipelines**: With `--recursive`, nested pipelines of triggered
//!   pipelines are evaluated too and printed as `parent/child`.
//! - **Explain**: With `--explain`, each identifier is followed by the
//!   changed paths that matched its patterns.
//!
//! Pipelines that fail to compile cannot be evaluated; they are reported on
//! stderr and the command still prints what it could evaluate.

use anyhow::{Context, Result};
use clap::Args;

use ci_compose::git::get_changed_files;
use ci_compose::trigger::{triggered_by, triggered_recursive};

use super::{find_pipeline, load_compiler, report_failures, SourceArgs};
use ci_compose::suggestions;

/// List the pipelines triggered by a set of changed files
#[derive(Args, Debug)]
pub struct TriggeredArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// A changed repository-relative path. Can be repeated.
    #[arg(long = "changed", value_name = "PATH", conflicts_with = "base")]
    pub changed: Vec<String>,

    /// Base revision to diff from.
    #[arg(long, value_name = "REV")]
    pub base: Option<String>,

    /// Head revision to diff to. Defaults to the work tree.
    #[arg(long, value_name = "REV", requires = "base")]
    pub head: Option<String>,

    /// Also evaluate nested pipelines of triggered pipelines.
    #[arg(short, long)]
    pub recursive: bool,

    /// Show which changed paths triggered each pipeline.
    #[arg(long)]
    pub explain: bool,
}

/// Execute the `triggered` command.
pub fn execute(args: TriggeredArgs) -> Result<()> {
    let session = load_compiler(&args.source)?;

    let changed = if !args.changed.is_empty() {
        args.changed.clone()
    } else if let Some(base) = &args.base {
        get_changed_files(&session.root, base, args.head.as_deref())
            .with_context(|| format!("Failed to list changes since '{}'", base))?
    } else {
        return Err(suggestions::missing_changeset());
    };
    log::debug!("Evaluating {} changed paths", changed.len());

    let report = session.compile()?;
    report_failures(&report);

    let triggered = if args.recursive {
        triggered_recursive(&report.config, &changed)
    } else {
        triggered_by(&report.config, &changed)
    };

    for identifier in &triggered {
        if !args.explain {
            println!("{}", identifier);
            continue;
        }
        let matched = find_pipeline(&report.config, identifier)
            .map(|pipeline| pipeline.matching_paths(&changed))
            .unwrap_or_default();
        println!("{}: {}", identifier, matched.join(", "));
    }

    Ok(())
}
