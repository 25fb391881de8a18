//! # Ls Command Implementation
//!
//! This module implements the `ls` subcommand, which lists compiled pipelines
//! and the patterns that trigger them.
//!
//! ## Functionality
//!
//! - **Pipeline Listing**: One line per pipeline, nested ones as `parent/child`
//! - **Detailed Output**: Optional long format adding the source file and the
//!   runnable jobs
//! - **Count**: Optionally show only the number of pipelines
//!
//! This command is a safe, read-only operation that does not modify any files.

use anyhow::Result;
use clap::Args;

use ci_compose::output::OutputConfig;
use ci_compose::pipeline::PipelinesConfig;

use super::{load_compiler, report_failures, SourceArgs};

/// List pipelines and their trigger patterns
#[derive(Args, Debug)]
pub struct LsArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Use long listing format showing source files and jobs.
    #[arg(short, long)]
    pub long: bool,

    /// Show only the total count of pipelines.
    #[arg(long)]
    pub count: bool,
}

/// Execute the `ls` command.
pub fn execute(args: LsArgs, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    let session = load_compiler(&args.source)?;
    let report = session.compile()?;
    report_failures(&report);

    let mut lines = Vec::new();
    collect_lines(&report.config, "", args.long, &out, &mut lines);

    if args.count {
        println!("{}", lines.len());
    } else {
        for (_, text) in &lines {
            println!("{}", text);
        }
    }

    Ok(())
}

/// One `(identifier, rendered line)` per pipeline, nested ones after their parent.
fn collect_lines(
    config: &PipelinesConfig,
    prefix: &str,
    long: bool,
    out: &OutputConfig,
    lines: &mut Vec<(String, String)>,
) {
    for pipeline in config.pipelines.values() {
        let qualified = format!("{}{}", prefix, pipeline.identifier);
        let patterns = if pipeline.triggers.is_empty() {
            "(no triggers)".to_string()
        } else {
            pipeline.triggers.patterns().join(" ")
        };

        let mut text = format!("{}  {}", out.bold(&qualified), out.dim(&patterns));
        if long {
            let jobs: Vec<&str> = pipeline.jobs().map(|job| job.name.as_str()).collect();
            text.push_str(&format!(
                "\n    source: {}\n    jobs: {}",
                pipeline.source_path,
                jobs.join(", ")
            ));
        }
        lines.push((qualified.clone(), text));

        if let Some(nested) = &pipeline.nested {
            collect_lines(nested, &format!("{}/", qualified), long, out, lines);
        }
    }
}
