//! # Validate Command Implementation
//!
//! This module implements the `validate` subcommand, which compiles every
//! pipeline without emitting anything and reports whether the configuration
//! graph is sound.
//!
//! ## Functionality
//!
//! - **Full resolution**: Includes, extends and references are resolved for
//!   every entry point, so cycles, unknown parents and dangling references
//!   all surface here.
//! - **Trigger validation**: Every trigger pattern is compiled.
//! - **Summary**: Prints each pipeline with its job and pattern counts, and
//!   each failure with a hint on how to fix it.
//!
//! This command is a safe, read-only operation that does not modify any files.

use anyhow::Result;
use clap::Args;

use ci_compose::output::{emoji, OutputConfig};
use ci_compose::pipeline::PipelinesConfig;
use ci_compose::suggestions;

use super::{load_compiler, SourceArgs};

/// Compile every pipeline and report problems
#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Treat pipelines without trigger patterns as errors.
    #[arg(long)]
    pub strict: bool,
}

/// Execute the `validate` command.
///
/// # Arguments
/// * `args` - The command arguments
/// * `color_flag` - The value of the global --color flag ("always", "never", or "auto")
pub fn execute(args: ValidateArgs, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    let session = load_compiler(&args.source)?;
    println!(
        "{} Validating pipelines in: {}",
        emoji(&out, "🔍", "[SCAN]"),
        session.root.join(&session.folder).display()
    );

    let report = session.compile()?;

    println!("\n{} Pipelines:", emoji(&out, "📊", "[INFO]"));
    let mut untriggered = Vec::new();
    print_pipelines(&out, &report.config, "", &mut untriggered);

    if !untriggered.is_empty() {
        println!(
            "\n{} Pipelines without trigger patterns (never run on changes):",
            emoji(&out, "⚠️", "[WARN]")
        );
        for identifier in &untriggered {
            println!("   {}", identifier);
        }
    }

    if !report.failures.is_empty() {
        println!("\n{} Failures:", emoji(&out, "❌", "[ERR]"));
        for failure in &report.failures {
            println!("   {}: {}", failure.identifier, failure.error);
            if let Some(hint) = suggestions::failure_hint(&failure.error) {
                println!("      hint: {}", hint);
            }
        }
    }

    println!("\n{} Validation Result:", emoji(&out, "🎯", "[RESULT]"));
    if !report.is_success() {
        println!(
            "{} {} pipeline(s) failed to compile",
            emoji(&out, "❌", "[ERR]"),
            report.failures.len()
        );
        return Err(anyhow::anyhow!("Pipeline validation failed"));
    }

    if args.strict && !untriggered.is_empty() {
        println!(
            "{} Pipelines without triggers (strict mode enabled)",
            emoji(&out, "❌", "[ERR]")
        );
        return Err(anyhow::anyhow!(
            "Pipeline validation failed due to warnings (strict mode)"
        ));
    }

    println!("{} All pipelines are valid", emoji(&out, "✅", "[OK]"));
    Ok(())
}

fn print_pipelines(
    out: &OutputConfig,
    config: &PipelinesConfig,
    prefix: &str,
    untriggered: &mut Vec<String>,
) {
    for pipeline in config.pipelines.values() {
        let qualified = format!("{}{}", prefix, pipeline.identifier);
        println!(
            "{} {} ({} jobs, {} trigger patterns)",
            emoji(out, "✅", "[OK]"),
            qualified,
            pipeline.jobs().count(),
            pipeline.triggers.patterns().len()
        );
        if pipeline.triggers.is_empty() {
            untriggered.push(qualified.clone());
        }
        if let Some(nested) = &pipeline.nested {
            print_pipelines(out, nested, &format!("{}/", qualified), untriggered);
        }
    }
}
