//! Resolution stages of pipeline compilation.
//!
//! ## Overview
//!
//! Each entry point goes through three resolution stages, in this order:
//! 1. Include Resolution - Fold the `include` DAG into one merged document
//! 2. Extends Resolution - Materialize `extends` inheritance between definitions
//! 3. Reference Resolution - Substitute every `!reference` marker
//!
//! The orchestrator wires them together per entry point and runs entry
//! points in parallel.
//!
//! Each stage consumes the complete output of the previous one; none of them
//! performs I/O except through the readers held by [`IncludeSources`](crate::reader::IncludeSources).

pub mod extends;
pub mod include;
pub mod orchestrator;
pub mod reference;

pub use extends::{resolve_extends, resolve_extends_with, Definition, Definitions};
pub use include::{resolve_includes, IncludeDirective, IncludeKind, IncludeResolver};
pub use orchestrator::{CompileReport, Compiler, PipelineFailure};
pub use reference::{resolve_references, ResolvedDefinition, ResolvedDefinitions};
