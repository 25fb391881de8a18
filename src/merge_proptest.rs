//! Property-based tests for merging and trigger matching.
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold for all possible inputs.

#[cfg(test)]
mod proptest_tests {
    use crate::merge::{merge, merge_with, ArrayMergeMode};
    use crate::trigger::TriggerPattern;
    use proptest::prelude::*;
    use serde_yaml::{Mapping, Value};

    // ============================================================================
    // Strategies
    // ============================================================================

    fn scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            "[a-z]{0,6}".prop_map(Value::String),
        ]
    }

    fn yaml_value() -> impl Strategy<Value = Value> {
        scalar().prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Sequence),
                prop::collection::btree_map("[a-d]", inner, 0..4).prop_map(|entries| {
                    Value::Mapping(
                        entries
                            .into_iter()
                            .map(|(key, value)| (Value::String(key), value))
                            .collect(),
                    )
                }),
            ]
        })
    }

    fn mapping() -> impl Strategy<Value = Mapping> {
        prop::collection::btree_map("[a-f]", yaml_value(), 0..6).prop_map(|entries| {
            entries
                .into_iter()
                .map(|(key, value)| (Value::String(key), value))
                .collect()
        })
    }

    fn segment() -> impl Strategy<Value = String> {
        "[a-z]{1,5}"
    }

    // ============================================================================
    // merge property tests
    // ============================================================================

    proptest! {
        /// Property: merging a mapping with itself yields the same mapping
        #[test]
        fn merge_with_self_is_identity(a in mapping()) {
            prop_assert_eq!(merge(&a, &a), a);
        }

        /// Property: keys present only in the overlay appear unchanged
        #[test]
        fn overlay_only_keys_are_unchanged(a in mapping(), b in mapping()) {
            let merged = merge(&a, &b);
            for (key, value) in &b {
                if !a.contains_key(key) {
                    prop_assert_eq!(merged.get(key), Some(value));
                }
            }
        }

        /// Property: keys present only in the base appear unchanged
        #[test]
        fn base_only_keys_are_unchanged(a in mapping(), b in mapping()) {
            let merged = merge(&a, &b);
            for (key, value) in &a {
                if !b.contains_key(key) {
                    prop_assert_eq!(merged.get(key), Some(value));
                }
            }
        }

        /// Property: the merged key set is the union of both key sets
        #[test]
        fn merged_keys_are_union(a in mapping(), b in mapping()) {
            let merged = merge(&a, &b);
            for key in a.keys().chain(b.keys()) {
                prop_assert!(merged.contains_key(key));
            }
            prop_assert!(merged.len() <= a.len() + b.len());
        }

        /// Property: merging an empty overlay returns the base unchanged
        #[test]
        fn empty_overlay_is_identity(a in mapping()) {
            prop_assert_eq!(merge(&a, &Mapping::new()), a.clone());
            prop_assert_eq!(merge(&Mapping::new(), &a), a);
        }

        /// Property: merge never mutates its inputs
        #[test]
        fn merge_does_not_mutate(a in mapping(), b in mapping()) {
            let (a_before, b_before) = (a.clone(), b.clone());
            let _ = merge_with(&a, &b, ArrayMergeMode::Append);
            prop_assert_eq!(a, a_before);
            prop_assert_eq!(b, b_before);
        }
    }

    // ============================================================================
    // trigger pattern property tests
    // ============================================================================

    proptest! {
        /// Property: a literal pattern matches exactly its own path
        #[test]
        fn literal_pattern_matches_itself(parts in prop::collection::vec(segment(), 1..5)) {
            let path = parts.join("/");
            let pattern = TriggerPattern::new(&path).unwrap();
            prop_assert!(pattern.matches(&path));
            let deeper = format!("{}/extra", path);
            prop_assert!(!pattern.matches(&deeper));
            let nested = format!("prefix/{}", path);
            prop_assert!(!pattern.matches(&nested));
        }

        /// Property: `dir/**` matches everything below dir and nothing outside it
        #[test]
        fn double_star_is_anchored_to_prefix(
            dir in segment(),
            rest in prop::collection::vec(segment(), 1..4),
            other in segment(),
        ) {
            let pattern = TriggerPattern::new(&format!("{}/**", dir)).unwrap();
            let inside = format!("{}/{}", dir, rest.join("/"));
            prop_assert!(pattern.matches(&inside));

            prop_assume!(other != dir);
            let outside = format!("{}/{}", other, rest.join("/"));
            prop_assert!(!pattern.matches(&outside));
        }

        /// Property: `*` never crosses a path separator
        #[test]
        fn single_star_stays_in_one_segment(parts in prop::collection::vec(segment(), 2..5)) {
            let pattern = TriggerPattern::new("*").unwrap();
            prop_assert!(!pattern.matches(&parts.join("/")));
            prop_assert!(pattern.matches(&parts[0]));
        }
    }
}
