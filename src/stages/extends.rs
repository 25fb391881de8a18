//! Stage 2: Extends Resolution
//!
//! Splits a merged document into named definitions and materializes the
//! `extends` inheritance between them.
//!
//! ## Process
//!
//! 1.  **Classification**: Every top-level key whose value is a mapping is a
//!     [`Definition`]; its `extends` entry (a name or a list of names) is
//!     lifted out of the body. All other top-level keys are globals and pass
//!     through untouched.
//!
//! 2.  **Inheritance**: Each definition's parents are resolved first, then
//!     deep-merged in declared order (a later parent overlays an earlier
//!     one), and finally the definition's own body is merged on top, so the
//!     child always wins.
//!
//! 3.  **Cycle detection**: A visiting stack of definition names catches
//!     inheritance loops, including a definition extending itself.
//!
//! Resolved bodies are memoized by name for the duration of one call, so a
//! template shared by many jobs is materialized once.

use std::collections::{BTreeMap, HashMap};

use log::trace;
use serde_yaml::{Mapping, Value};

use crate::document::{type_name, Document};
use crate::error::{Error, Result};
use crate::merge::{merge_with, ArrayMergeMode};

/// Key declaring the parents of a definition.
pub const EXTENDS_KEY: &str = "extends";

/// A named unit of configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub name: String,
    /// Parents in declared order.
    pub extends: Vec<String>,
    /// Own keys, without `extends`. After [`resolve_extends`] this also holds
    /// every inherited key.
    pub body: Mapping,
}

impl Definition {
    /// Hidden definitions (leading `.`) are templates, not runnable jobs.
    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }
}

/// All definitions of one merged document, plus its non-definition keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Definitions {
    pub definitions: BTreeMap<String, Definition>,
    /// Top-level keys whose values are not mappings.
    pub globals: Mapping,
    /// Every top-level key in source order.
    pub order: Vec<String>,
}

impl Definitions {
    pub fn get(&self, name: &str) -> Option<&Definition> {
        self.definitions.get(name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Resolve `extends` chains with the default replace semantics for sequences.
pub fn resolve_extends(document: &Document) -> Result<Definitions> {
    resolve_extends_with(document, ArrayMergeMode::Replace)
}

/// Resolve `extends` chains, merging sequences according to `mode`.
pub fn resolve_extends_with(document: &Document, mode: ArrayMergeMode) -> Result<Definitions> {
    let declared = classify(document)?;

    let mut resolver = ExtendsResolver {
        declared: &declared,
        mode,
        resolved: HashMap::new(),
        stack: Vec::new(),
    };

    let mut definitions = BTreeMap::new();
    for (name, definition) in &declared.definitions {
        let body = resolver.resolve(name)?;
        definitions.insert(
            name.clone(),
            Definition {
                name: name.clone(),
                extends: definition.extends.clone(),
                body,
            },
        );
    }

    Ok(Definitions {
        definitions,
        globals: declared.globals.clone(),
        order: declared.order.clone(),
    })
}

/// Split the top level of `document` into definitions and globals.
fn classify(document: &Document) -> Result<Definitions> {
    let mut classified = Definitions::default();

    for (key, value) in document {
        let name = match key {
            Value::String(name) => name.clone(),
            other => {
                return Err(Error::InvalidDefinition {
                    name: format!("{:?}", other),
                    message: format!("top-level keys must be strings, found {}", type_name(other)),
                })
            }
        };
        classified.order.push(name.clone());

        match value {
            Value::Mapping(body) => {
                let mut body = body.clone();
                let extends = match body.remove(EXTENDS_KEY) {
                    Some(value) => parse_extends(&name, &value)?,
                    None => Vec::new(),
                };
                classified
                    .definitions
                    .insert(name.clone(), Definition { name, extends, body });
            }
            other => {
                classified.globals.insert(key.clone(), other.clone());
            }
        }
    }

    Ok(classified)
}

fn parse_extends(name: &str, value: &Value) -> Result<Vec<String>> {
    let invalid = |found: &Value| Error::InvalidDefinition {
        name: name.to_string(),
        message: format!(
            "'{}' must be a string or a sequence of strings, found {}",
            EXTENDS_KEY,
            type_name(found)
        ),
    };

    match value {
        Value::String(parent) => Ok(vec![parent.clone()]),
        Value::Sequence(parents) => parents
            .iter()
            .map(|parent| parent.as_str().map(str::to_string).ok_or_else(|| invalid(parent)))
            .collect(),
        other => Err(invalid(other)),
    }
}

struct ExtendsResolver<'a> {
    declared: &'a Definitions,
    mode: ArrayMergeMode,
    resolved: HashMap<String, Mapping>,
    stack: Vec<String>,
}

impl ExtendsResolver<'_> {
    fn resolve(&mut self, name: &str) -> Result<Mapping> {
        if let Some(body) = self.resolved.get(name) {
            return Ok(body.clone());
        }

        if let Some(start) = self.stack.iter().position(|visiting| visiting == name) {
            let mut chain = self.stack[start..].to_vec();
            chain.push(name.to_string());
            return Err(Error::CyclicExtends { chain });
        }

        let declared = self.declared;
        let Some(definition) = declared.definitions.get(name) else {
            // Callers check parents before recursing; only a top-level
            // lookup of an unknown name can get here.
            return Err(Error::UnknownParent {
                child: name.to_string(),
                parent: name.to_string(),
            });
        };

        self.stack.push(name.to_string());
        let body = self.inherit(definition);
        self.stack.pop();
        let body = body?;

        self.resolved.insert(name.to_string(), body.clone());
        Ok(body)
    }

    fn inherit(&mut self, definition: &Definition) -> Result<Mapping> {
        let mut inherited = Mapping::new();

        for parent in &definition.extends {
            if !self.declared.definitions.contains_key(parent) {
                if self.declared.globals.contains_key(parent.as_str()) {
                    return Err(Error::InvalidDefinition {
                        name: definition.name.clone(),
                        message: format!("extends '{}', which is not a mapping", parent),
                    });
                }
                return Err(Error::UnknownParent {
                    child: definition.name.clone(),
                    parent: parent.clone(),
                });
            }

            trace!("'{}' inherits from '{}'", definition.name, parent);
            let parent_body = self.resolve(parent)?;
            inherited = merge_with(&inherited, &parent_body, self.mode);
        }

        Ok(merge_with(&inherited, &definition.body, self.mode))
    }
}
