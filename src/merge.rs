//! # Deep Merge
//!
//! Combines two YAML mappings under the precedence rules every resolution
//! stage relies on:
//!
//! - A key present on one side only is taken unchanged.
//! - Two mappings are merged recursively.
//! - Two sequences: the overlay replaces the base, unless the caller opted
//!   into [`ArrayMergeMode::Append`].
//! - Anything else (scalars, mismatched types, tagged values such as
//!   reference markers): the overlay wins.
//!
//! Merging never mutates its inputs. The same base document is routinely
//! merged into several overlays (one template extended by many jobs), so
//! the result is always a fresh mapping.

use log::trace;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::document::type_name;

/// How two sequences under the same key are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArrayMergeMode {
    /// The overlay's sequence replaces the base's.
    #[default]
    Replace,
    /// The overlay's items are appended after the base's.
    Append,
}

/// Merge `overlay` on top of `base` with the default replace semantics.
///
/// # Examples
///
/// ```
/// use ci_compose::document::load;
/// use ci_compose::merge::merge;
///
/// let base = load("image: alpine\ntags: [a, b]\n").unwrap();
/// let overlay = load("tags: [c]\n").unwrap();
/// let merged = merge(&base, &overlay);
///
/// assert_eq!(merged, load("image: alpine\ntags: [c]\n").unwrap());
/// ```
pub fn merge(base: &Mapping, overlay: &Mapping) -> Mapping {
    merge_with(base, overlay, ArrayMergeMode::Replace)
}

/// Merge `overlay` on top of `base` using `mode` for sequences.
pub fn merge_with(base: &Mapping, overlay: &Mapping, mode: ArrayMergeMode) -> Mapping {
    let mut result = base.clone();
    merge_mappings(&mut result, overlay, mode, "");
    result
}

/// Merge `source` into `target` in place.
fn merge_mappings(target: &mut Mapping, source: &Mapping, mode: ArrayMergeMode, path: &str) {
    for (key, value) in source {
        let key_str = match key {
            Value::String(s) => s.clone(),
            other => format!("{:?}", other),
        };
        let key_path = if path.is_empty() {
            key_str
        } else {
            format!("{}.{}", path, key_str)
        };

        match target.get_mut(key) {
            Some(existing) => merge_values(existing, value, mode, &key_path),
            None => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

fn merge_values(target: &mut Value, source: &Value, mode: ArrayMergeMode, path: &str) {
    match (target, source) {
        (Value::Mapping(target_map), Value::Mapping(source_map)) => {
            merge_mappings(target_map, source_map, mode, path);
        }
        (Value::Sequence(target_seq), Value::Sequence(source_seq)) => match mode {
            ArrayMergeMode::Append => target_seq.extend(source_seq.iter().cloned()),
            ArrayMergeMode::Replace => {
                trace!(
                    "Replacing sequence at '{}' (old size: {}, new size: {})",
                    path,
                    target_seq.len(),
                    source_seq.len()
                );
                *target_seq = source_seq.clone();
            }
        },
        (target, source) => {
            trace!(
                "Overwriting value at '{}': {} -> {}",
                path,
                type_name(target),
                type_name(source)
            );
            *target = source.clone();
        }
    }
}
