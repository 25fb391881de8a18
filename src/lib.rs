//! # CI Pipeline Composition Library
//!
//! This library compiles a multi-file, templated CI configuration graph into
//! concrete, fully-merged job definitions, and decides which of many
//! independently declared pipelines a changeset must run. It backs the
//! `ci-compose` command-line tool but does no I/O of its own beyond the
//! readers it is given, so it can be embedded anywhere.
//!
//! ## Quick Example
//!
//! ```
//! use ci_compose::config::CompilerConfig;
//! use ci_compose::filesystem::MemoryFS;
//! use ci_compose::reader::IncludeSources;
//! use ci_compose::stages::Compiler;
//! use ci_compose::trigger::triggered_by;
//!
//! let fs = MemoryFS::new()
//!     .with_file("base.yml", ".build:\n  script: [echo build]\n")
//!     .unwrap()
//!     .with_file(
//!         "pipelines/main.yml",
//!         "include: [base.yml]\nchanges: ['src/**']\njob1:\n  extends: .build\n  stage: build\n",
//!     )
//!     .unwrap();
//!
//! let compiler = Compiler::new(CompilerConfig::default(), IncludeSources::new(fs));
//! let report = compiler.compile("pipelines").unwrap();
//! assert!(report.is_success());
//!
//! let job = report.config.get("main").unwrap().definition("job1").unwrap();
//! assert_eq!(job.body.len(), 2);
//!
//! let triggered = triggered_by(&report.config, &["src/x.go"]);
//! assert!(triggered.contains("main"));
//! ```
//!
//! ## Core Concepts
//!
//! - **Documents (`document`)**: YAML mappings that may carry `!reference`
//!   markers, loaded and dumped without any global tag registration.
//! - **Deep merge (`merge`)**: the one precedence rule every stage uses:
//!   the overlay wins, mappings merge recursively, sequences are replaced.
//! - **Readers (`reader`, `filesystem`, `git`)**: the narrow file-reading
//!   capability through which all content is fetched.
//! - **Stages (`stages`)**: include, extends and reference resolution, and
//!   the orchestrating `Compiler`.
//! - **Pipelines (`pipeline`, `trigger`)**: the resolved model and the
//!   change-trigger evaluator.
//!
//! ## Execution Flow
//!
//! For each entry-point file in the pipelines folder, the `Compiler`:
//!
//! 1.  **Loads** the entry document.
//! 2.  **Resolves includes**, depth-first, with cycle detection and a
//!     per-run cache of resolved sources.
//! 3.  **Resolves extends** between named definitions (child wins).
//! 4.  **Resolves references**, recursively, with cycle detection.
//! 5.  **Assembles** a `Pipeline` with its change trigger and any nested
//!     pipelines folder.
//!
//! Entry points compile in parallel and fail independently; the
//! `CompileReport` holds both the compiled pipelines and the failures.

pub mod cache;
pub mod config;
pub mod document;
pub mod error;
pub mod filesystem;
pub mod git;
pub mod merge;
pub mod output;
pub mod pipeline;
pub mod reader;
pub mod stages;
pub mod suggestions;
pub mod trigger;

#[cfg(test)]
mod merge_proptest;
