//! Stage 1: Include Resolution
//!
//! Expands the `include` key of an entry document into the DAG of documents
//! it pulls in, and folds that DAG into one merged document.
//!
//! ## Process
//!
//! 1.  **Directive parsing**: The `include` value (a single entry or a
//!     sequence) becomes an ordered list of [`IncludeDirective`]s. Strings
//!     are local paths unless they parse as an `http(s)` URL; mappings use
//!     the `local`, `remote` or `project` + `file` (+ `ref`) forms.
//!
//! 2.  **Depth-first fetch**: Each directive is read through
//!     [`IncludeSources`], parsed, and has its own includes resolved first.
//!     Local directives inside a project document are re-scoped to that
//!     project and ref.
//!
//! 3.  **Folding**: Included documents are deep-merged in declared order,
//!     later directives overlaying earlier ones, and the including document's
//!     own keys are merged last with the highest precedence.
//!
//! 4.  **Cycle detection**: A stack holds the sources currently being
//!     resolved. Meeting a source that is still on the stack aborts with
//!     `CyclicInclude` and the full chain.
//!
//! Fully-resolved sources are memoized in a [`SourceCache`] by identity, so
//! a file included from several places is fetched and parsed once per run.

use std::fmt;
use std::sync::Arc;

use glob::{MatchOptions, Pattern};
use log::debug;
use serde_yaml::{Mapping, Value};
use url::Url;

use crate::cache::SourceCache;
use crate::document::{load_bytes, type_name, Document};
use crate::error::{Error, Result};
use crate::merge::{merge_with, ArrayMergeMode};
use crate::reader::{normalize_path, IncludeSources};

/// Top-level key holding include directives.
pub const INCLUDE_KEY: &str = "include";

/// Where an included document comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IncludeKind {
    /// A path relative to the root of the repository being compiled.
    Local,
    /// A file from another project, optionally at a revision.
    Project { project: String },
    /// A document addressed by URL.
    Remote,
}

/// One entry of an `include` key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IncludeDirective {
    /// Path (local, project) or URL (remote).
    pub source: String,
    pub kind: IncludeKind,
    /// Revision for project includes.
    pub r#ref: Option<String>,
}

impl IncludeDirective {
    pub fn local(path: &str) -> Self {
        Self {
            source: normalize_path(path),
            kind: IncludeKind::Local,
            r#ref: None,
        }
    }

    pub fn remote(url: &str) -> Self {
        Self {
            source: url.to_string(),
            kind: IncludeKind::Remote,
            r#ref: None,
        }
    }

    pub fn project(project: &str, file: &str, r#ref: Option<&str>) -> Self {
        Self {
            source: normalize_path(file),
            kind: IncludeKind::Project {
                project: project.to_string(),
            },
            r#ref: r#ref.map(str::to_string),
        }
    }

    /// Identity used for cycle detection and memoization.
    pub fn source_id(&self) -> String {
        self.to_string()
    }

    /// A local directive found inside a project document refers to a file of
    /// that same project at the same revision.
    fn scoped_to(self, parent: &IncludeDirective) -> Self {
        match (&self.kind, &parent.kind) {
            (IncludeKind::Local, IncludeKind::Project { .. }) => Self {
                source: self.source,
                kind: parent.kind.clone(),
                r#ref: parent.r#ref.clone(),
            },
            _ => self,
        }
    }

    fn is_wildcard(&self) -> bool {
        self.kind != IncludeKind::Remote && self.source.contains(['*', '?', '['])
    }

    /// The same location with `path` in place of the source.
    fn with_source(&self, path: &str) -> Self {
        Self {
            source: normalize_path(path),
            kind: self.kind.clone(),
            r#ref: self.r#ref.clone(),
        }
    }
}

impl fmt::Display for IncludeDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            IncludeKind::Local => write!(f, "local:{}", self.source),
            IncludeKind::Remote => write!(f, "remote:{}", self.source),
            IncludeKind::Project { project } => {
                write!(f, "project:{}/{}", project, self.source)?;
                if let Some(r) = &self.r#ref {
                    write!(f, "@{}", r)?;
                }
                Ok(())
            }
        }
    }
}

/// Parse the value of an `include` key into directives, in declared order.
pub fn parse_directives(value: &Value) -> Result<Vec<IncludeDirective>> {
    match value {
        Value::Sequence(entries) => {
            let mut directives = Vec::new();
            for entry in entries {
                directives.extend(parse_entry(entry)?);
            }
            Ok(directives)
        }
        Value::Null => Ok(Vec::new()),
        single => parse_entry(single),
    }
}

fn parse_entry(entry: &Value) -> Result<Vec<IncludeDirective>> {
    match entry {
        Value::String(s) => Ok(vec![classify_string(s)]),
        Value::Mapping(map) => parse_mapping(map),
        other => Err(Error::InvalidInclude {
            message: format!("expected a string or mapping, found {}", type_name(other)),
        }),
    }
}

fn classify_string(s: &str) -> IncludeDirective {
    match Url::parse(s) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => IncludeDirective::remote(s),
        _ => IncludeDirective::local(s),
    }
}

fn parse_mapping(map: &Mapping) -> Result<Vec<IncludeDirective>> {
    if let Some(local) = map.get("local") {
        return Ok(vec![IncludeDirective::local(string_field(local, "local")?)]);
    }

    if let Some(remote) = map.get("remote") {
        let url = string_field(remote, "remote")?;
        Url::parse(url)?;
        return Ok(vec![IncludeDirective::remote(url)]);
    }

    if let Some(project) = map.get("project") {
        let project = string_field(project, "project")?;
        let r#ref = map.get("ref").map(|r| string_field(r, "ref")).transpose()?;
        let files = match map.get("file") {
            Some(Value::String(file)) => vec![file.as_str()],
            Some(Value::Sequence(files)) => files
                .iter()
                .map(|file| string_field(file, "file"))
                .collect::<Result<Vec<_>>>()?,
            Some(other) => {
                return Err(Error::InvalidInclude {
                    message: format!("'file' must be a string or sequence, found {}", type_name(other)),
                })
            }
            None => {
                return Err(Error::InvalidInclude {
                    message: format!("project include '{}' has no 'file'", project),
                })
            }
        };
        return Ok(files
            .into_iter()
            .map(|file| IncludeDirective::project(project, file, r#ref))
            .collect());
    }

    if map.contains_key("template") {
        return Err(Error::InvalidInclude {
            message: "template includes are not supported".to_string(),
        });
    }

    Err(Error::InvalidInclude {
        message: "expected one of 'local', 'remote' or 'project'".to_string(),
    })
}

fn string_field<'a>(value: &'a Value, field: &str) -> Result<&'a str> {
    value.as_str().ok_or_else(|| Error::InvalidInclude {
        message: format!("'{}' must be a string, found {}", field, type_name(value)),
    })
}

/// Resolves include directives against a set of readers.
pub struct IncludeResolver<'a> {
    sources: &'a IncludeSources,
    cache: &'a SourceCache,
    mode: ArrayMergeMode,
}

impl<'a> IncludeResolver<'a> {
    pub fn new(sources: &'a IncludeSources, cache: &'a SourceCache) -> Self {
        Self {
            sources,
            cache,
            mode: ArrayMergeMode::Replace,
        }
    }

    /// Use `mode` when folding sequences.
    pub fn with_array_merge(mut self, mode: ArrayMergeMode) -> Self {
        self.mode = mode;
        self
    }

    /// Resolve the includes of a document that was not itself read through
    /// an include (it cannot take part in a cycle by identity).
    pub fn resolve(&self, document: &Document) -> Result<Document> {
        self.resolve_document(document, None, &mut Vec::new())
    }

    /// Resolve the includes of an entry document read from `entry`, so that
    /// an include leading back to the entry file is reported as a cycle.
    pub fn resolve_entry(&self, document: &Document, entry: &IncludeDirective) -> Result<Document> {
        let mut stack = vec![entry.source_id()];
        self.resolve_document(document, Some(entry), &mut stack)
    }

    fn resolve_document(
        &self,
        document: &Document,
        origin: Option<&IncludeDirective>,
        stack: &mut Vec<String>,
    ) -> Result<Document> {
        let mut accumulated = Mapping::new();

        if let Some(value) = document.get(INCLUDE_KEY) {
            for directive in parse_directives(value)? {
                let directive = match origin {
                    Some(parent) => directive.scoped_to(parent),
                    None => directive,
                };
                for expanded in self.expand(directive)? {
                    let included = self.resolve_source(&expanded, stack)?;
                    accumulated = merge_with(&accumulated, &included, self.mode);
                }
            }
        }

        let mut own = document.clone();
        own.remove(INCLUDE_KEY);
        Ok(merge_with(&accumulated, &own, self.mode))
    }

    fn resolve_source(
        &self,
        directive: &IncludeDirective,
        stack: &mut Vec<String>,
    ) -> Result<Arc<Document>> {
        let id = directive.source_id();
        if stack.contains(&id) {
            let mut chain = stack.clone();
            chain.push(id);
            return Err(Error::CyclicInclude { chain });
        }

        if let Some(cached) = self.cache.get(&id)? {
            debug!("Include cache hit for {}", id);
            return Ok(cached);
        }

        self.cache.get_or_process(&id, || {
            let bytes = self.sources.read(directive)?;
            let document = load_bytes(&bytes, &id)?;

            stack.push(id.clone());
            let resolved = self.resolve_document(&document, Some(directive), stack);
            stack.pop();
            resolved
        })
    }

    /// Expand a wildcard local or project path into every matching file,
    /// sorted. Project paths are listed at the directive's ref.
    fn expand(&self, directive: IncludeDirective) -> Result<Vec<IncludeDirective>> {
        if !directive.is_wildcard() {
            return Ok(vec![directive]);
        }

        let pattern = Pattern::new(&directive.source)?;
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };

        // List only below the literal directory prefix of the pattern
        let literal_dir = directive
            .source
            .split('/')
            .take_while(|segment| !segment.contains(['*', '?', '[']))
            .collect::<Vec<_>>()
            .join("/");

        let unresolvable = |message: String| Error::UnresolvableInclude {
            include: directive.to_string(),
            message,
        };
        let reader = self
            .sources
            .reader_for(&directive.kind)
            .ok_or_else(|| unresolvable("no reader is configured for this include kind".to_string()))?;
        let listed = reader
            .list_at(&literal_dir, directive.r#ref.as_deref())
            .map_err(|err| unresolvable(err.to_string()))?;

        let matches: Vec<IncludeDirective> = listed
            .iter()
            .filter(|path| pattern.matches_with(path, options))
            .map(|path| directive.with_source(path))
            .collect();

        if matches.is_empty() {
            return Err(unresolvable("pattern matched no files".to_string()));
        }

        debug!("Include {} expanded to {} files", directive, matches.len());
        Ok(matches)
    }
}

/// Resolve the includes of `entry` with a fresh, private cache.
pub fn resolve_includes(entry: &Document, sources: &IncludeSources) -> Result<Document> {
    let cache = SourceCache::new();
    IncludeResolver::new(sources, &cache).resolve(entry)
}
