//! # Compile Command Implementation
//!
//! This module implements the `compile` subcommand, which resolves every
//! pipeline entry point (includes, extends and references) and emits the
//! resulting configuration.
//!
//! ## Functionality
//!
//! - **Stdout output**: By default every pipeline is printed as its own YAML
//!   (or JSON) document, preceded by a comment naming the pipeline.
//! - **Directory output**: With `--output DIR`, each pipeline is written to
//!   `DIR/<identifier>.<ext>`; nested pipelines go to `DIR/<identifier>/`.
//! - **Partial failure**: Pipelines that compiled are still emitted when
//!   others fail. Failures are printed to stderr and the command exits with
//!   an error.

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use ci_compose::document::dump;
use ci_compose::pipeline::{Pipeline, PipelinesConfig};

use super::{load_compiler, report_failures, SourceArgs};

/// Compile every pipeline and print or write the resolved configuration
#[derive(Args, Debug)]
pub struct CompileArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Write one file per pipeline into this directory instead of stdout.
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<std::path::PathBuf>,

    /// Output format.
    #[arg(long, value_enum, default_value = "yaml")]
    pub format: OutputFormat,
}

/// Serialization format for compiled pipelines
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// YAML, the format of the source documents
    #[default]
    Yaml,
    /// Pretty-printed JSON
    Json,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Yaml => "yml",
            OutputFormat::Json => "json",
        }
    }
}

/// Execute the `compile` command.
pub fn execute(args: CompileArgs) -> Result<()> {
    let session = load_compiler(&args.source)?;
    let report = session.compile()?;

    match &args.output {
        Some(dir) => write_config(&report.config, dir, args.format)?,
        None => print_config(&report.config, "", args.format)?,
    }

    if !report.is_success() {
        report_failures(&report);
        anyhow::bail!(
            "{} of {} pipeline(s) failed to compile",
            report.failures.len(),
            report.failures.len() + count_pipelines(&report.config)
        );
    }

    Ok(())
}

/// Serialize one pipeline's resolved document.
pub fn render(pipeline: &Pipeline, format: OutputFormat) -> Result<String> {
    let document = pipeline.to_document();
    let rendered = match format {
        OutputFormat::Yaml => dump(&document)?,
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(&document)
                .with_context(|| format!("Failed to render '{}' as JSON", pipeline.identifier))?;
            json.push('\n');
            json
        }
    };
    Ok(rendered)
}

fn print_config(config: &PipelinesConfig, prefix: &str, format: OutputFormat) -> Result<()> {
    for pipeline in config.pipelines.values() {
        let qualified = format!("{}{}", prefix, pipeline.identifier);
        let rendered = render(pipeline, format)?;
        match format {
            OutputFormat::Yaml => {
                println!("---");
                println!("# pipeline: {} ({})", qualified, pipeline.source_path);
                print!("{}", rendered);
            }
            OutputFormat::Json => print!("{}", rendered),
        }

        if let Some(nested) = &pipeline.nested {
            print_config(nested, &format!("{}/", qualified), format)?;
        }
    }
    Ok(())
}

fn write_config(config: &PipelinesConfig, dir: &Path, format: OutputFormat) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    for pipeline in config.pipelines.values() {
        let target = dir.join(format!("{}.{}", pipeline.identifier, format.extension()));
        std::fs::write(&target, render(pipeline, format)?)
            .with_context(|| format!("Failed to write {}", target.display()))?;
        println!("Wrote {}", target.display());

        if let Some(nested) = &pipeline.nested {
            write_config(nested, &dir.join(&pipeline.identifier), format)?;
        }
    }
    Ok(())
}

fn count_pipelines(config: &PipelinesConfig) -> usize {
    config
        .pipelines
        .values()
        .map(|pipeline| 1 + pipeline.nested.as_ref().map_or(0, count_pipelines))
        .sum()
}
