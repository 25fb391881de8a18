//! # Change-Trigger Evaluator
//!
//! Decides which pipelines a changeset activates.
//!
//! Patterns are matched segment by segment against repository-relative
//! paths:
//!
//! - `**` matches any number of whole segments, including none.
//! - `*`, `?` and `[...]` match within a single segment.
//! - Any other segment must match literally.
//!
//! Matching is case-sensitive and anchored to the whole path, so `*.md`
//! matches `readme.md` but not `docs/readme.md`. A pattern ending in `/`
//! names a directory and behaves like `dir/**`.

use std::collections::BTreeSet;

use glob::{MatchOptions, Pattern};

use crate::error::{Error, Result};
use crate::pipeline::PipelinesConfig;
use crate::reader::normalize_path;

const SEGMENT_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone)]
enum Segment {
    AnyDepth,
    Literal(String),
    Glob(Pattern),
}

impl Segment {
    fn matches(&self, part: &str) -> bool {
        match self {
            Segment::AnyDepth => true,
            Segment::Literal(literal) => literal == part,
            Segment::Glob(pattern) => pattern.matches_with(part, SEGMENT_OPTIONS),
        }
    }
}

/// A compiled trigger pattern.
#[derive(Debug, Clone)]
pub struct TriggerPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl TriggerPattern {
    /// Compile `raw`, failing with `InvalidTrigger` on an empty pattern or
    /// invalid glob syntax.
    pub fn new(raw: &str) -> Result<Self> {
        let invalid = |message: String| Error::InvalidTrigger {
            pattern: raw.to_string(),
            message,
        };

        let trimmed = raw.trim();
        let mut path = normalize_path(trimmed);
        if path.is_empty() {
            return Err(invalid("pattern is empty".to_string()));
        }
        if trimmed.ends_with('/') {
            path.push_str("/**");
        }

        let mut segments = Vec::new();
        for part in path.split('/') {
            let segment = if part == "**" {
                // Consecutive `**` are equivalent to one
                if matches!(segments.last(), Some(Segment::AnyDepth)) {
                    continue;
                }
                Segment::AnyDepth
            } else if part.contains(['*', '?', '[', ']']) {
                Segment::Glob(Pattern::new(part).map_err(|err| invalid(err.to_string()))?)
            } else {
                Segment::Literal(part.to_string())
            };
            segments.push(segment);
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether `path` (repository-relative) is described by this pattern.
    pub fn matches(&self, path: &str) -> bool {
        let path = normalize_path(path);
        if path.is_empty() {
            return false;
        }
        let parts: Vec<&str> = path.split('/').collect();
        match_segments(&self.segments, &parts)
    }
}

impl std::fmt::Display for TriggerPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

fn match_segments(segments: &[Segment], parts: &[&str]) -> bool {
    match segments.split_first() {
        None => parts.is_empty(),
        Some((Segment::AnyDepth, rest)) => {
            (0..=parts.len()).any(|skip| match_segments(rest, &parts[skip..]))
        }
        Some((segment, rest)) => match parts.split_first() {
            Some((part, remaining)) => segment.matches(part) && match_segments(rest, remaining),
            None => false,
        },
    }
}

/// Identifiers of the pipelines in `config` triggered by `changed`.
///
/// Pipelines with no trigger patterns are never returned.
pub fn triggered_by<S: AsRef<str>>(config: &PipelinesConfig, changed: &[S]) -> BTreeSet<String> {
    config
        .pipelines
        .values()
        .filter(|pipeline| pipeline.is_triggered_by(changed))
        .map(|pipeline| pipeline.identifier.clone())
        .collect()
}

/// Identifiers of the nested pipelines of pipeline `identifier` triggered by
/// `changed`.
///
/// Returns `None` when `config` has no such pipeline, and an empty set when
/// the pipeline declares no nested pipelines.
pub fn triggered_nested<S: AsRef<str>>(
    config: &PipelinesConfig,
    identifier: &str,
    changed: &[S],
) -> Option<BTreeSet<String>> {
    let pipeline = config.pipelines.get(identifier)?;
    Some(
        pipeline
            .nested
            .as_ref()
            .map(|nested| triggered_by(nested, changed))
            .unwrap_or_default(),
    )
}

/// Every triggered pipeline at any nesting depth.
///
/// Nested pipelines are only considered when their parent is triggered, and
/// are reported as `parent/child`.
pub fn triggered_recursive<S: AsRef<str>>(
    config: &PipelinesConfig,
    changed: &[S],
) -> BTreeSet<String> {
    let mut triggered = BTreeSet::new();
    collect_recursive(config, changed, "", &mut triggered);
    triggered
}

fn collect_recursive<S: AsRef<str>>(
    config: &PipelinesConfig,
    changed: &[S],
    prefix: &str,
    triggered: &mut BTreeSet<String>,
) {
    for identifier in triggered_by(config, changed) {
        let qualified = format!("{}{}", prefix, identifier);
        if let Some(nested) = config
            .pipelines
            .get(&identifier)
            .and_then(|pipeline| pipeline.nested.as_ref())
        {
            collect_recursive(nested, changed, &format!("{}/", qualified), triggered);
        }
        triggered.insert(qualified);
    }
}
