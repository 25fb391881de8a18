//! # Document Loader
//!
//! Parses a single pipeline configuration file into an in-memory mapping.
//!
//! The loader understands exactly one extension to plain YAML: the
//! `!reference` tag (also accepted as `!ref`), which marks a sequence of
//! strings as a pointer into another definition:
//!
//! ```yaml
//! job:
//!   script: !reference [.base, script]
//! ```
//!
//! A validated marker is kept in the document as a tagged value carrying the
//! canonical `!reference` tag, so that it survives deep merges untouched and
//! `dump` writes it back out. Every other custom tag is stripped and its
//! inner value passed through as a standard YAML value. YAML merge keys
//! (`<<: *anchor`) are applied while loading, so later stages only see the
//! merged mapping.
//!
//! The tag handling is local to this module; nothing is registered with the
//! YAML library globally.

use log::debug;
use serde_yaml::value::{Tag, TaggedValue};
use serde_yaml::{Mapping, Value};

use crate::error::{Error, Result};

/// Canonical name of the reference tag.
pub const REFERENCE_TAG: &str = "reference";

/// Short spelling accepted on input, written back as `!reference`.
const REFERENCE_TAG_SHORT: &str = "ref";

/// A raw configuration document: a mapping of YAML values that may still
/// contain reference markers.
pub type Document = Mapping;

/// A pointer to a value inside another definition, e.g. `[".build", "script"]`.
///
/// The path is never empty: the first segment names a top-level definition,
/// the remaining segments navigate through its body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceMarker {
    path: Vec<String>,
}

impl ReferenceMarker {
    /// Create a marker, rejecting an empty path.
    pub fn new(path: Vec<String>) -> Result<Self> {
        if path.is_empty() {
            return Err(Error::InvalidReferenceTag {
                message: "reference path must not be empty".to_string(),
            });
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// The definition (or global) named by the first path segment.
    pub fn target(&self) -> &str {
        &self.path[0]
    }

    /// Path segments after the target name.
    pub fn rest(&self) -> &[String] {
        &self.path[1..]
    }

    /// Recognize a marker in a value produced by [`load`].
    pub fn from_value(value: &Value) -> Option<Self> {
        let Value::Tagged(tagged) = value else {
            return None;
        };
        if tagged.tag != REFERENCE_TAG {
            return None;
        }
        let segments = tagged.value.as_sequence()?;
        let path = segments
            .iter()
            .map(|segment| segment.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()?;
        Self::new(path).ok()
    }

    /// Encode this marker as a tagged YAML value.
    pub fn to_value(&self) -> Value {
        Value::Tagged(Box::new(TaggedValue {
            tag: Tag::new(REFERENCE_TAG),
            value: Value::Sequence(self.path.iter().cloned().map(Value::String).collect()),
        }))
    }
}

impl std::fmt::Display for ReferenceMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "!reference [{}]", self.path.join(", "))
    }
}

/// Parse document content.
///
/// Fails with `MalformedDocument` when the YAML is invalid or its root is not
/// a mapping, and with `InvalidReferenceTag` when a reference tag's payload is
/// not a non-empty sequence of strings. An empty document loads as an empty
/// mapping.
pub fn load(content: &str) -> Result<Document> {
    load_from(content, "<input>")
}

/// Parse document content, naming `origin` in error messages.
pub fn load_from(content: &str, origin: &str) -> Result<Document> {
    let malformed = |err: serde_yaml::Error| Error::MalformedDocument {
        origin: origin.to_string(),
        message: err.to_string(),
    };
    let mut value: Value = serde_yaml::from_str(content).map_err(malformed)?;
    // `<<: *anchor` merge keys are kept literally by the parser
    value.apply_merge().map_err(malformed)?;

    match normalize(value)? {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(map) => Ok(map),
        other => Err(Error::MalformedDocument {
            origin: origin.to_string(),
            message: format!("expected a mapping at the document root, found {}", type_name(&other)),
        }),
    }
}

/// Parse raw bytes as returned by a file reader.
pub fn load_bytes(bytes: &[u8], origin: &str) -> Result<Document> {
    let content = std::str::from_utf8(bytes).map_err(|err| Error::MalformedDocument {
        origin: origin.to_string(),
        message: format!("content is not valid UTF-8: {}", err),
    })?;
    load_from(content, origin)
}

/// Serialize a document back to YAML. Reference markers are written with
/// the `!reference` tag, so `load(dump(doc))` yields `doc` again.
pub fn dump(document: &Document) -> Result<String> {
    Ok(serde_yaml::to_string(document)?)
}

/// Whether any reference marker remains anywhere inside `value`.
pub fn contains_reference(value: &Value) -> bool {
    match value {
        Value::Tagged(tagged) => tagged.tag == REFERENCE_TAG || contains_reference(&tagged.value),
        Value::Sequence(seq) => seq.iter().any(contains_reference),
        Value::Mapping(map) => map.values().any(contains_reference),
        _ => false,
    }
}

/// Human-readable name of a YAML value's type, for messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

fn normalize(value: Value) -> Result<Value> {
    match value {
        Value::Tagged(tagged) => {
            let TaggedValue { tag, value } = *tagged;
            if tag == REFERENCE_TAG || tag == REFERENCE_TAG_SHORT {
                Ok(parse_reference(&tag, value)?.to_value())
            } else {
                debug!("Dropping unsupported tag {} from document value", tag);
                normalize(value)
            }
        }
        Value::Sequence(seq) => seq
            .into_iter()
            .map(normalize)
            .collect::<Result<Vec<_>>>()
            .map(Value::Sequence),
        Value::Mapping(map) => {
            let mut normalized = Mapping::with_capacity(map.len());
            for (key, value) in map {
                normalized.insert(key, normalize(value)?);
            }
            Ok(Value::Mapping(normalized))
        }
        scalar => Ok(scalar),
    }
}

fn parse_reference(tag: &Tag, payload: Value) -> Result<ReferenceMarker> {
    let Value::Sequence(segments) = payload else {
        return Err(Error::InvalidReferenceTag {
            message: format!("{} expects a sequence, found {}", tag, type_name(&payload)),
        });
    };

    let mut path = Vec::with_capacity(segments.len());
    for segment in segments {
        match segment {
            Value::String(s) => path.push(s),
            other => {
                return Err(Error::InvalidReferenceTag {
                    message: format!("{} segments must be strings, found {}", tag, type_name(&other)),
                })
            }
        }
    }

    ReferenceMarker::new(path)
}
