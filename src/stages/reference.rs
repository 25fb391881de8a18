//! Stage 3: Reference Resolution
//!
//! Substitutes every `!reference [name, key, ...]` marker with the value it
//! points at. The first segment names a definition (or a global); the
//! remaining segments walk through its resolved body, by key for mappings
//! and by decimal index for sequences.
//!
//! Markers are resolved by path, not by whole definition. Resolving
//! `[.a, x]` only needs the value under `.a.x`, so two definitions may
//! reference each other's keys freely. Markers met along the way (inside
//! the value, or in place of an intermediate segment) are resolved first, so
//! the result is fully substituted. A visiting stack of marker paths turns
//! real value-level loops into `CyclicReference` errors carrying the chain
//! of paths.

use std::collections::{BTreeMap, HashMap};

use serde_yaml::{Mapping, Value};

use crate::document::ReferenceMarker;
use crate::error::{Error, Result};
use crate::stages::extends::Definitions;

/// A definition with all inheritance merged in and no markers left.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDefinition {
    pub name: String,
    pub body: Mapping,
}

impl ResolvedDefinition {
    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }
}

/// Output of reference resolution for one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedDefinitions {
    pub definitions: BTreeMap<String, ResolvedDefinition>,
    pub globals: Mapping,
    /// Every top-level key in source order.
    pub order: Vec<String>,
}

/// Replace every reference marker in `definitions` and their globals.
pub fn resolve_references(definitions: &Definitions) -> Result<ResolvedDefinitions> {
    let mut resolver = ReferenceResolver {
        source: definitions,
        resolved: HashMap::new(),
        stack: Vec::new(),
    };

    let mut resolved = ResolvedDefinitions {
        order: definitions.order.clone(),
        ..Default::default()
    };

    for name in definitions.definitions.keys() {
        let body = match resolver.resolve_path(std::slice::from_ref(name))? {
            Value::Mapping(body) => body,
            // Definitions are mappings by construction
            other => {
                return Err(Error::InvalidDefinition {
                    name: name.clone(),
                    message: format!("resolved to a non-mapping value: {:?}", other),
                })
            }
        };
        resolved.definitions.insert(
            name.clone(),
            ResolvedDefinition {
                name: name.clone(),
                body,
            },
        );
    }

    for (key, value) in &definitions.globals {
        let value = match key.as_str() {
            Some(name) => resolver.resolve_path(&[name.to_string()])?,
            None => resolver.substitute(value)?,
        };
        resolved.globals.insert(key.clone(), value);
    }

    Ok(resolved)
}

struct ReferenceResolver<'a> {
    source: &'a Definitions,
    /// Fully substituted values, by path.
    resolved: HashMap<Vec<String>, Value>,
    /// Paths currently being resolved.
    stack: Vec<Vec<String>>,
}

impl ReferenceResolver<'_> {
    /// Fully resolve the value at `path`: a definition or global name
    /// followed by keys or sequence indices.
    fn resolve_path(&mut self, path: &[String]) -> Result<Value> {
        if let Some(value) = self.resolved.get(path) {
            return Ok(value.clone());
        }

        if let Some(start) = self.stack.iter().position(|visiting| visiting == path) {
            let chain = self.stack[start..]
                .iter()
                .map(|visiting| render_path(visiting))
                .chain(std::iter::once(render_path(path)))
                .collect();
            return Err(Error::CyclicReference { chain });
        }

        self.stack.push(path.to_vec());
        let value = self.navigate_and_substitute(path);
        self.stack.pop();
        let value = value?;

        self.resolved.insert(path.to_vec(), value.clone());
        Ok(value)
    }

    fn navigate_and_substitute(&mut self, path: &[String]) -> Result<Value> {
        let dangling = || Error::DanglingReference {
            path: path.to_vec(),
        };

        let (target, segments) = path.split_first().ok_or_else(dangling)?;
        let mut current = self.lookup(target).ok_or_else(dangling)?;
        for segment in segments {
            // A marker standing where a container is expected is resolved
            // before navigation continues through its value
            let container = match ReferenceMarker::from_value(&current) {
                Some(marker) => self.resolve_path(marker.path())?,
                None => current,
            };
            current = step(&container, segment).cloned().ok_or_else(dangling)?;
        }

        self.substitute(&current)
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(definition) = self.source.definitions.get(name) {
            return Some(Value::Mapping(definition.body.clone()));
        }
        self.source.globals.get(name).cloned()
    }

    fn substitute(&mut self, value: &Value) -> Result<Value> {
        match value {
            Value::Tagged(tagged) => match ReferenceMarker::from_value(value) {
                Some(marker) => self.resolve_path(marker.path()),
                None => self.substitute(&tagged.value),
            },
            Value::Sequence(items) => items
                .iter()
                .map(|item| self.substitute(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::Sequence),
            Value::Mapping(map) => {
                let mut substituted = Mapping::with_capacity(map.len());
                for (key, item) in map {
                    substituted.insert(key.clone(), self.substitute(item)?);
                }
                Ok(Value::Mapping(substituted))
            }
            scalar => Ok(scalar.clone()),
        }
    }
}

/// Follow one segment into `value`, by key for mappings and by index for
/// sequences.
fn step<'v>(value: &'v Value, segment: &str) -> Option<&'v Value> {
    match value {
        Value::Mapping(map) => map.get(segment),
        Value::Sequence(items) => segment.parse::<usize>().ok().and_then(|index| items.get(index)),
        Value::Tagged(tagged) => step(&tagged.value, segment),
        _ => None,
    }
}

fn render_path(path: &[String]) -> String {
    format!("[{}]", path.join(", "))
}
