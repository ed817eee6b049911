//! Structural Gate
//!
//! **Question**: Is the output complete in form, regardless of whether it is true?

use crate::patterns::{contains_references_heading, contains_url, count_steps};
use crate::profiles::{Profile, StructuralCheck};
use crate::types::{GateResult, Layer};

use super::Gate;

/// Minimum number of enumerated markers that count as a list of steps.
const MIN_STEPS: usize = 2;

/// The structural gate.
#[derive(Debug, Clone, Copy)]
pub struct StructuralGate;

impl StructuralGate {
    pub fn new() -> Self {
        Self
    }

    fn check_word_count(&self, text: &str, min_word_count: usize, result: &mut GateResult) {
        let words = text.split_whitespace().count();
        if words < min_word_count {
            result.fail(format!(
                "word_count: {} words, minimum is {}",
                words, min_word_count
            ));
        }
    }

    fn check_required_sections(&self, text: &str, sections: &[String], result: &mut GateResult) {
        let lower = text.to_lowercase();
        let missing: Vec<&str> = sections
            .iter()
            .filter(|s| !lower.contains(&s.to_lowercase()))
            .map(String::as_str)
            .collect();

        if !missing.is_empty() {
            result.fail(format!("required_sections: missing {}", missing.join(", ")));
        }
    }

    fn check_sources_list(&self, text: &str, result: &mut GateResult) {
        if !contains_url(text) && !contains_references_heading(text) {
            result.fail("sources_list: no URLs or references section found");
        }
    }

    fn check_has_steps(&self, text: &str, result: &mut GateResult) {
        let steps = count_steps(text);
        if steps < MIN_STEPS {
            result.fail(format!(
                "has_steps: found {} enumerated step(s), need at least {}",
                steps, MIN_STEPS
            ));
        }
    }
}

impl Default for StructuralGate {
    fn default() -> Self {
        Self::new()
    }
}

impl Gate for StructuralGate {
    fn layer(&self) -> Layer {
        Layer::Structural
    }

    fn run(&self, text: &str, profile: &Profile) -> GateResult {
        let mut result = GateResult::pass();

        for check in &profile.structural_checks {
            match check {
                StructuralCheck::WordCount => {
                    self.check_word_count(text, profile.min_word_count, &mut result)
                }
                StructuralCheck::RequiredSections => {
                    self.check_required_sections(text, &profile.required_sections, &mut result)
                }
                StructuralCheck::SourcesList => self.check_sources_list(text, &mut result),
                StructuralCheck::HasSteps => self.check_has_steps(text, &mut result),
                StructuralCheck::Unrecognized(name) => {
                    tracing::debug!(check = %name, "Skipping unrecognized structural check");
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn word_count_profile(min: usize) -> Profile {
        Profile::new(min).with_structural([StructuralCheck::WordCount])
    }

    #[test]
    fn test_word_count_failure_cites_check() {
        let result = StructuralGate::new().run("two words", &word_count_profile(100));
        assert!(!result.passed);
        assert!(result.failures[0].contains("word_count"));
    }

    #[test]
    fn test_word_count_pass() {
        let result = StructuralGate::new().run(
            "one two three four five six",
            &word_count_profile(5),
        );
        assert!(result.passed);
        assert!(result.failures.is_empty());
    }

    #[test]
    fn test_missing_sections_are_named() {
        let profile = Profile::new(0)
            .with_sections(["Summary", "Findings", "Risks"])
            .with_structural([StructuralCheck::RequiredSections]);
        let result = StructuralGate::new().run("## summary\nAll good.", &profile);
        assert!(!result.passed);
        assert_eq!(result.failures.len(), 1);
        assert!(result.failures[0].contains("Findings"));
        assert!(result.failures[0].contains("Risks"));
        assert!(!result.failures[0].contains("Summary"));
    }

    #[test]
    fn test_sources_list() {
        let profile = Profile::new(0).with_structural([StructuralCheck::SourcesList]);
        let gate = StructuralGate::new();
        assert!(gate.run("See https://example.org/a", &profile).passed);
        assert!(gate.run("Body\n\nReferences\n- Smith 2020", &profile).passed);
        assert!(!gate.run("No sources at all", &profile).passed);
    }

    #[test]
    fn test_has_steps() {
        let profile = Profile::new(0).with_structural([StructuralCheck::HasSteps]);
        let gate = StructuralGate::new();
        assert!(gate.run("1. Draft\n2. Review\n3. Ship", &profile).passed);
        assert!(!gate.run("Just do everything at once.", &profile).passed);
    }

    #[test]
    fn test_all_failures_collected() {
        let profile = Profile::new(50)
            .with_sections(["timeline"])
            .with_structural([
                StructuralCheck::WordCount,
                StructuralCheck::RequiredSections,
                StructuralCheck::HasSteps,
            ]);
        let result = StructuralGate::new().run("too short", &profile);
        assert_eq!(result.failures.len(), 3);
    }

    #[test]
    fn test_unrecognized_check_is_skipped() {
        let profile = Profile::new(0)
            .with_structural([StructuralCheck::Unrecognized("readability".to_string())]);
        assert!(StructuralGate::new().run("", &profile).passed);
    }

    proptest! {
        #[test]
        fn prop_word_count_threshold(words in 0usize..60, min in 0usize..60) {
            let text = vec!["word"; words].join(" ");
            let result = StructuralGate::new().run(&text, &word_count_profile(min));
            prop_assert_eq!(result.passed, words >= min);
        }
    }
}
