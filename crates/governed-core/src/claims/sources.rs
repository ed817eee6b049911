//! Source pointer classification.
//!
//! Agents cite provenance with bracketed pointers:
//!
//! | Pointer | Kind |
//! |---------|------|
//! | `[Source: https://...]` | external |
//! | `[Source: User Prompt]`, `[Context: ...]`, `[InternalDoc: ...]` | internal |
//! | `[Source: Task 42]` | dependency |
//! | anything else | none |

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::patterns::{POINTER_PATTERN, URL_PATTERN};

lazy_static! {
    static ref TASK_REFERENCE: Regex = Regex::new(r"(?i)^task\s*#?\s*[\w.-]+$").unwrap();
}

/// Provenance of a cited pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    External,
    Internal,
    Dependency,
    None,
}

/// Per-kind pointer tallies for one output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceCounts {
    pub external_sources_count: usize,
    pub internal_sources_count: usize,
    pub dependency_sources_count: usize,
}

impl SourceCounts {
    /// Pointers of any recognized kind.
    pub fn total(&self) -> usize {
        self.external_sources_count + self.internal_sources_count + self.dependency_sources_count
    }
}

fn classify_parts(tag: &str, body: &str) -> SourceKind {
    let tag = tag.to_lowercase();
    let body = body.trim();

    if tag == "context" || tag == "internaldoc" {
        return SourceKind::Internal;
    }

    if body.eq_ignore_ascii_case("user prompt") {
        SourceKind::Internal
    } else if TASK_REFERENCE.is_match(body) {
        SourceKind::Dependency
    } else if URL_PATTERN.is_match(body) {
        SourceKind::External
    } else {
        SourceKind::None
    }
}

/// Classify the first bracketed pointer in `fragment`.
pub fn classify_pointer(fragment: &str) -> SourceKind {
    POINTER_PATTERN
        .captures(fragment)
        .map(|caps| classify_parts(&caps[1], &caps[2]))
        .unwrap_or(SourceKind::None)
}

/// Tally every bracketed pointer in an output by kind.
pub fn count_sources(output: &str) -> SourceCounts {
    let mut counts = SourceCounts::default();
    for caps in POINTER_PATTERN.captures_iter(output) {
        match classify_parts(&caps[1], &caps[2]) {
            SourceKind::External => counts.external_sources_count += 1,
            SourceKind::Internal => counts.internal_sources_count += 1,
            SourceKind::Dependency => counts.dependency_sources_count += 1,
            SourceKind::None => {}
        }
    }
    counts
}
