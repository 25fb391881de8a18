//! # Error Suggestions
//!
//! This module provides helper functions for generating helpful error
//! messages with hints and suggestions. Following CLI recommendations,
//! errors should tell users what went wrong AND how to fix it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ci_compose::suggestions;
//!
//! // Instead of:
//! anyhow::bail!("Configuration file not found: {}", path.display());
//!
//! // Use:
//! return Err(suggestions::config_not_found(path));
//! ```

use std::path::Path;

use crate::error::Error;

/// Generate an error for when an explicitly requested settings file is missing.
///
/// Includes hints about:
/// - Creating a new settings file
/// - Using the -c/--config flag
/// - Using the CI_COMPOSE_CONFIG environment variable
pub fn config_not_found(path: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "Configuration file not found: {path}\n\n\
         hint: Create a .ci-compose.yaml file in your repository root\n\
         hint: Use -c/--config to specify a different path\n\
         hint: Set CI_COMPOSE_CONFIG environment variable",
        path = path.display()
    )
}

/// Generate an error for a pipelines folder that does not exist.
pub fn pipelines_folder_not_found(folder: &str, root: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "Pipelines folder not found: {folder} (in {root})\n\n\
         hint: Use --folder to point at the folder holding entry-point files\n\
         hint: Set pipelines-folder in .ci-compose.yaml\n\
         hint: Use --root or CI_COMPOSE_ROOT if you are not in the repository root",
        root = root.display()
    )
}

/// Generate an error for `triggered` called without any changeset source.
pub fn missing_changeset() -> anyhow::Error {
    anyhow::anyhow!(
        "No changed files given\n\n\
         hint: Use --changed <PATH> (repeatable) to list changed files\n\
         hint: Use --base <REV> [--head <REV>] to diff a git range"
    )
}

/// A one-line hint for fixing a compilation failure, when there is one.
pub fn failure_hint(error: &Error) -> Option<&'static str> {
    match error.root_cause() {
        Error::CyclicInclude { .. } => {
            Some("Remove one of the 'include' entries in the chain to break the cycle")
        }
        Error::CyclicExtends { .. } => {
            Some("A definition cannot (transitively) extend itself; move shared keys into a hidden template")
        }
        Error::CyclicReference { .. } => {
            Some("A !reference must not point at a value that contains it, directly or through other references")
        }
        Error::CyclicPipelineNesting { .. } => {
            Some("A nested pipelines folder must not contain the pipeline that declares it")
        }
        Error::UnknownParent { .. } => {
            Some("Check the spelling of the 'extends' entry; hidden templates start with '.'")
        }
        Error::DanglingReference { .. } => {
            Some("The first !reference segment must name a top-level key, the rest keys inside it")
        }
        Error::UnresolvableInclude { .. } => {
            Some("Project includes need a checkout configured under 'projects' in .ci-compose.yaml")
        }
        Error::InvalidTrigger { .. } => {
            Some("Use * for single path component, ** for recursive matching, dir/ for a whole directory")
        }
        _ => None,
    }
}

/// Find a similar string from a list of candidates using edit distance.
///
/// Returns Some(candidate) if a close match is found (edit distance <= 2).
pub fn find_similar<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .filter_map(|&candidate| {
            let distance = edit_distance(input, candidate);
            if distance <= 2 && distance < input.len() {
                Some((candidate, distance))
            } else {
                None
            }
        })
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate)
}

/// Calculate the Levenshtein edit distance between two strings.
fn edit_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let a_len = a_chars.len();
    let b_len = b_chars.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut previous: Vec<usize> = (0..=b_len).collect();
    let mut current = vec![0usize; b_len + 1];

    for i in 1..=a_len {
        current[0] = i;
        for j in 1..=b_len {
            let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
            current[j] = (previous[j] + 1)
                .min(current[j - 1] + 1)
                .min(previous[j - 1] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b_len]
}
