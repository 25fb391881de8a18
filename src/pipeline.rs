//! # Pipeline Model
//!
//! The typed, fully-resolved view of compiled configuration. Nothing here
//! refers back to raw documents: include directives and reference markers
//! are gone by the time a [`Pipeline`] exists, and every value is plain YAML.

use std::collections::BTreeMap;

use serde_yaml::{Mapping, Value};

use crate::document::{type_name, Document};
use crate::error::{Error, Result};
use crate::stages::reference::{ResolvedDefinition, ResolvedDefinitions};
use crate::trigger::TriggerPattern;

/// The path patterns that cause a pipeline to run.
///
/// An empty trigger never fires on file changes.
#[derive(Debug, Clone, Default)]
pub struct ChangesTrigger {
    patterns: Vec<TriggerPattern>,
}

impl ChangesTrigger {
    /// Compile a list of patterns.
    pub fn new(patterns: Vec<String>) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|raw| TriggerPattern::new(raw))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Read a trigger declaration: a sequence of patterns, a single pattern,
    /// or a mapping with a `paths` sequence.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::String(pattern) => Self::new(vec![pattern.clone()]),
            Value::Sequence(items) => Self::new(pattern_strings(items)?),
            Value::Mapping(map) => match map.get("paths") {
                Some(Value::Sequence(items)) => Self::new(pattern_strings(items)?),
                Some(other) => Err(Error::InvalidTrigger {
                    pattern: "paths".to_string(),
                    message: format!("expected a sequence, found {}", type_name(other)),
                }),
                None => Err(Error::InvalidTrigger {
                    pattern: String::new(),
                    message: "trigger mapping has no 'paths' key".to_string(),
                }),
            },
            other => Err(Error::InvalidTrigger {
                pattern: String::new(),
                message: format!("expected a sequence of patterns, found {}", type_name(other)),
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// The patterns as written.
    pub fn patterns(&self) -> Vec<&str> {
        self.patterns.iter().map(TriggerPattern::as_str).collect()
    }

    /// Whether `path` matches any pattern.
    pub fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.matches(path))
    }
}

fn pattern_strings(items: &[Value]) -> Result<Vec<String>> {
    items
        .iter()
        .map(|item| match item {
            Value::String(pattern) => Ok(pattern.clone()),
            other => Err(Error::InvalidTrigger {
                pattern: format!("{:?}", other),
                message: format!("patterns must be strings, found {}", type_name(other)),
            }),
        })
        .collect()
}

/// One compiled entry point.
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Entry file stem, e.g. `backend` for `pipelines/backend.yml`.
    pub identifier: String,
    pub source_path: String,
    pub triggers: ChangesTrigger,
    pub definitions: BTreeMap<String, ResolvedDefinition>,
    /// Top-level keys that are not definitions (`stages`, `variables`, ...).
    pub globals: Mapping,
    /// Top-level keys in source order, for emission.
    pub order: Vec<String>,
    /// Pipelines compiled from the folder this one declares, if any.
    pub nested: Option<PipelinesConfig>,
}

impl Pipeline {
    /// An empty pipeline with no definitions and no triggers.
    pub fn new(identifier: &str, source_path: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            source_path: source_path.to_string(),
            triggers: ChangesTrigger::default(),
            definitions: BTreeMap::new(),
            globals: Mapping::new(),
            order: Vec::new(),
            nested: None,
        }
    }

    /// Assemble a pipeline from resolved definitions.
    pub fn from_resolved(
        identifier: &str,
        source_path: &str,
        triggers: ChangesTrigger,
        resolved: ResolvedDefinitions,
    ) -> Self {
        Self {
            identifier: identifier.to_string(),
            source_path: source_path.to_string(),
            triggers,
            definitions: resolved.definitions,
            globals: resolved.globals,
            order: resolved.order,
            nested: None,
        }
    }

    pub fn definition(&self, name: &str) -> Option<&ResolvedDefinition> {
        self.definitions.get(name)
    }

    /// Runnable definitions (not hidden templates), in source order.
    pub fn jobs(&self) -> impl Iterator<Item = &ResolvedDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.definitions.get(name))
            .filter(|definition| !definition.is_hidden())
    }

    /// Whether any path in `changed` matches this pipeline's triggers.
    pub fn is_triggered_by<S: AsRef<str>>(&self, changed: &[S]) -> bool {
        changed
            .iter()
            .any(|path| self.triggers.matches(path.as_ref()))
    }

    /// The paths in `changed` that match this pipeline's triggers.
    pub fn matching_paths<'p, S: AsRef<str>>(&self, changed: &'p [S]) -> Vec<&'p str> {
        changed
            .iter()
            .map(AsRef::<str>::as_ref)
            .filter(|path| self.triggers.matches(path))
            .collect()
    }

    /// Rebuild the resolved document, globals and definitions in source order.
    pub fn to_document(&self) -> Document {
        let mut document = Mapping::new();
        for name in &self.order {
            if let Some(definition) = self.definitions.get(name) {
                document.insert(
                    Value::String(name.clone()),
                    Value::Mapping(definition.body.clone()),
                );
            } else if let Some(value) = self.globals.get(name.as_str()) {
                document.insert(Value::String(name.clone()), value.clone());
            }
        }
        document
    }
}

/// Every pipeline compiled from one folder.
#[derive(Debug, Clone, Default)]
pub struct PipelinesConfig {
    /// The folder the entry points were read from, relative to the reader root.
    pub folder: String,
    pub pipelines: BTreeMap<String, Pipeline>,
}

impl PipelinesConfig {
    pub fn new(folder: &str) -> Self {
        Self {
            folder: folder.to_string(),
            pipelines: BTreeMap::new(),
        }
    }

    /// Add a pipeline, replacing one with the same identifier.
    pub fn insert(&mut self, pipeline: Pipeline) {
        self.pipelines.insert(pipeline.identifier.clone(), pipeline);
    }

    pub fn get(&self, identifier: &str) -> Option<&Pipeline> {
        self.pipelines.get(identifier)
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.pipelines.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::load;

    #[test]
    fn test_changes_trigger_forms() {
        let seq: Value = serde_yaml::from_str("[src/**, '*.md']").unwrap();
        assert_eq!(ChangesTrigger::from_value(&seq).unwrap().patterns(), vec!["src/**", "*.md"]);

        let map: Value = serde_yaml::from_str("paths: [docs/]\ncompare_to: main\n").unwrap();
        let trigger = ChangesTrigger::from_value(&map).unwrap();
        assert!(trigger.matches("docs/intro.md"));

        let single = Value::from("Dockerfile");
        assert!(ChangesTrigger::from_value(&single).unwrap().matches("Dockerfile"));

        assert!(ChangesTrigger::from_value(&Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_changes_trigger_rejects_bad_shapes() {
        let bad: Value = serde_yaml::from_str("[1, 2]").unwrap();
        assert!(ChangesTrigger::from_value(&bad).is_err());

        let bad: Value = serde_yaml::from_str("when: always\n").unwrap();
        assert!(ChangesTrigger::from_value(&bad).is_err());

        assert!(ChangesTrigger::from_value(&Value::Bool(true)).is_err());
    }

    #[test]
    fn test_matching_paths_and_is_triggered_by() {
        let mut pipeline = Pipeline::new("backend", "pipelines/backend.yml");
        pipeline.triggers = ChangesTrigger::new(vec!["src/**".to_string()]).unwrap();

        let changed = ["src/a.go", "docs/readme.md", "src/b/c.go"];
        assert_eq!(pipeline.matching_paths(&changed), vec!["src/a.go", "src/b/c.go"]);
        assert!(pipeline.is_triggered_by(&changed));
        assert!(!pipeline.is_triggered_by(&["docs/readme.md"]));
    }

    #[test]
    fn test_jobs_skip_hidden_and_keep_order_and_to_document() {
        let resolved = ResolvedDefinitions {
            definitions: BTreeMap::from([
                (
                    "zeta".to_string(),
                    ResolvedDefinition {
                        name: "zeta".to_string(),
                        body: load("stage: test\n").unwrap(),
                    },
                ),
                (
                    ".tmpl".to_string(),
                    ResolvedDefinition {
                        name: ".tmpl".to_string(),
                        body: load("image: alpine\n").unwrap(),
                    },
                ),
                (
                    "alpha".to_string(),
                    ResolvedDefinition {
                        name: "alpha".to_string(),
                        body: load("stage: build\n").unwrap(),
                    },
                ),
            ]),
            globals: load("stages: [build, test]\n").unwrap(),
            order: vec![
                "stages".to_string(),
                ".tmpl".to_string(),
                "zeta".to_string(),
                "alpha".to_string(),
            ],
        };
        let pipeline = Pipeline::from_resolved("p", "p.yml", ChangesTrigger::default(), resolved);

        let jobs: Vec<&str> = pipeline.jobs().map(|job| job.name.as_str()).collect();
        assert_eq!(jobs, vec!["zeta", "alpha"]);

        let document = pipeline.to_document();
        let keys: Vec<&str> = document.keys().filter_map(Value::as_str).collect();
        assert_eq!(keys, vec!["stages", ".tmpl", "zeta", "alpha"]);
        assert_eq!(pipeline.definition("alpha").unwrap().body, load("stage: build\n").unwrap());
    }

    #[test]
    fn test_pipelines_config_accessors() {
        let mut config = PipelinesConfig::new("pipelines");
        assert!(config.is_empty());
        config.insert(Pipeline::new("b", "pipelines/b.yml"));
        config.insert(Pipeline::new("a", "pipelines/a.yml"));
        assert_eq!(config.len(), 2);
        assert_eq!(config.identifiers().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(config.get("a").is_some());
    }
}
