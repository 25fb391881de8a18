//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// CI Compose - Compile templated CI configuration and select triggered pipelines
#[derive(Parser, Debug)]
#[command(name = "ci-compose")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace). RUST_LOG takes precedence.
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile every pipeline and print or write the resolved configuration
    Compile(commands::compile::CompileArgs),

    /// List the pipelines triggered by a set of changed files
    Triggered(commands::triggered::TriggeredArgs),

    /// Compile every pipeline and report problems without emitting output
    Validate(commands::validate::ValidateArgs),

    /// List pipelines and their trigger patterns
    Ls(commands::ls::LsArgs),

    /// Display pipelines and their nested pipelines as a tree
    Tree(commands::tree::TreeArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);

        match self.command {
            Commands::Compile(args) => commands::compile::execute(args),
            Commands::Triggered(args) => commands::triggered::execute(args),
            Commands::Validate(args) => commands::validate::execute(args, &self.color),
            Commands::Ls(args) => commands::ls::execute(args, &self.color),
            Commands::Tree(args) => commands::tree::execute(args),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}

/// Install `env_logger` at `level`, letting `RUST_LOG` override it.
fn init_logging(level: &str) {
    let mut builder = env_logger::Builder::new();
    builder.parse_filters(level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.format_timestamp(None);
    // A logger may already be installed when running under a test harness
    let _ = builder.try_init();
}
