//! # Error Handling
//!
//! This module defines the centralized error type for `ci-compose`. It uses
//! the `thiserror` library to derive a single `Error` enum covering every
//! failure mode of pipeline compilation, with enough context (the offending
//! path, name or full cycle chain) to diagnose a failure without re-running
//! resolution.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum. Resolution variants (`CyclicInclude`,
//!   `UnknownParent`, `DanglingReference`, ...) are raised by the individual
//!   stages; `Pipeline` wraps any of them with the entry point that failed.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`, used
//!   throughout the library.
//!
//! Cycle variants carry the chain of sources, definitions or pipelines that
//! formed the cycle, in visiting order, ending with the repeated element.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for ci-compose operations
#[derive(Error, Debug)]
pub enum Error {
    /// The YAML syntax parser rejected a document, or its root is not a mapping.
    #[error("Malformed document {origin}: {message}")]
    MalformedDocument { origin: String, message: String },

    /// A `!reference` tag whose payload is not a non-empty sequence of strings.
    #[error("Invalid reference tag: {message}")]
    InvalidReferenceTag { message: String },

    /// A source is reachable from itself through `include` directives.
    #[error("Cyclic include: {}", chain.join(" -> "))]
    CyclicInclude { chain: Vec<String> },

    /// The reader configured for an include directive could not produce content.
    #[error("Unresolvable include {include}: {message}")]
    UnresolvableInclude { include: String, message: String },

    /// An include entry that does not match any supported include form.
    #[error("Invalid include: {message}")]
    InvalidInclude { message: String },

    /// An `extends` entry names a definition absent from the document.
    #[error("Unknown parent '{parent}' extended by '{child}'")]
    UnknownParent { child: String, parent: String },

    /// Definitions extend each other in a loop.
    #[error("Cyclic extends: {}", chain.join(" -> "))]
    CyclicExtends { chain: Vec<String> },

    /// A definition whose shape cannot be resolved (e.g. a non-string `extends`).
    #[error("Invalid definition '{name}': {message}")]
    InvalidDefinition { name: String, message: String },

    /// A reference marker path does not lead to an existing definition or key.
    #[error("Dangling reference [{}]", path.join(", "))]
    DanglingReference { path: Vec<String> },

    /// Dereferencing a marker loops back to a path still being resolved.
    #[error("Cyclic reference: {}", chain.join(" -> "))]
    CyclicReference { chain: Vec<String> },

    /// A trigger declaration or pattern that cannot be compiled.
    #[error("Invalid trigger pattern '{pattern}': {message}")]
    InvalidTrigger { pattern: String, message: String },

    /// A pipeline (transitively) declares its own folder as nested pipelines.
    #[error("Cyclic pipeline nesting: {}", chain.join(" -> "))]
    CyclicPipelineNesting { chain: Vec<String> },

    /// Two entry points resolve to the same pipeline identifier.
    #[error("Duplicate pipeline identifier '{identifier}' from {path}")]
    DuplicatePipeline { identifier: String, path: String },

    /// A failure attributed to the entry point whose compilation it aborted.
    #[error("Pipeline {path}: {source}")]
    Pipeline {
        path: String,
        #[source]
        source: Box<Error>,
    },

    /// A file reader has no content for the requested path.
    #[error("File not found: {path}{}", r#ref.as_ref().map(|r| format!("@{}", r)).unwrap_or_default())]
    NotFound { path: String, r#ref: Option<String> },

    /// An error occurred while parsing the `.ci-compose.yaml` settings file.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// An error occurred while executing a Git command.
    #[error("Git command failed in {repo}: {command} - {stderr}")]
    GitCommand {
        command: String,
        repo: String,
        stderr: String,
    },

    /// An error indicating that a mutex or other lock has been poisoned.
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },

    /// The compiler's worker pool could not be started.
    #[error("Failed to start worker pool: {message}")]
    WorkerPool { message: String },

    /// An error for a capability a reader does not provide.
    #[error("Feature not implemented: {feature}")]
    NotImplemented { feature: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML error, wrapped from `serde_yaml::Error`.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Wrap this error with the entry point it aborted.
    pub fn in_pipeline(self, path: impl Into<PathBuf>) -> Self {
        Error::Pipeline {
            path: path.into().display().to_string(),
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through `Pipeline` wrappers.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Pipeline { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_cyclic_include() {
        let error = Error::CyclicInclude {
            chain: vec![
                "local:a.yml".to_string(),
                "local:b.yml".to_string(),
                "local:a.yml".to_string(),
            ],
        };
        let display = format!("{}", error);
        assert!(display.contains("Cyclic include"));
        assert!(display.contains("local:a.yml -> local:b.yml -> local:a.yml"));
    }

    #[test]
    fn test_error_display_unknown_parent() {
        let error = Error::UnknownParent {
            child: "job1".to_string(),
            parent: ".missing".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("'.missing'"));
        assert!(display.contains("'job1'"));
    }

    #[test]
    fn test_error_display_dangling_reference() {
        let error = Error::DanglingReference {
            path: vec![".base".to_string(), "script".to_string()],
        };
        assert_eq!(format!("{}", error), "Dangling reference [.base, script]");
    }

    #[test]
    fn test_error_display_not_found_with_ref() {
        let error = Error::NotFound {
            path: "ci/base.yml".to_string(),
            r#ref: Some("main".to_string()),
        };
        assert_eq!(format!("{}", error), "File not found: ci/base.yml@main");

        let error = Error::NotFound {
            path: "ci/base.yml".to_string(),
            r#ref: None,
        };
        assert_eq!(format!("{}", error), "File not found: ci/base.yml");
    }

    #[test]
    fn test_error_display_config_parse_with_hint() {
        let error = Error::ConfigParse {
            message: "unknown field `trigger`".to_string(),
            hint: Some("did you mean `trigger-key`?".to_string()),
        };
        let display = format!("{}", error);
        assert!(display.contains("Configuration parsing error"));
        assert!(display.contains("hint:"));
        assert!(display.contains("trigger-key"));
    }

    #[test]
    fn test_in_pipeline_wraps_and_keeps_root_cause() {
        let error = Error::CyclicExtends {
            chain: vec!["a".to_string(), "b".to_string(), "a".to_string()],
        }
        .in_pipeline("pipelines/web.yml");

        let display = format!("{}", error);
        assert!(display.starts_with("Pipeline pipelines/web.yml:"));
        assert!(display.contains("a -> b -> a"));
        assert!(matches!(error.root_cause(), Error::CyclicExtends { .. }));
    }

    #[test]
    fn test_error_from_yaml_error() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: [unclosed").unwrap_err();
        let error: Error = yaml_error.into();
        assert!(format!("{}", error).contains("YAML error"));
    }

    #[test]
    fn test_error_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let error: Error = io_error.into();
        let display = format!("{}", error);
        assert!(display.contains("I/O error"));
        assert!(display.contains("File not found"));
    }
}
