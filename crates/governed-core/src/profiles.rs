//! Per-task-type verification profiles.
//!
//! A profile decides which structural and grounding checks apply to a task
//! type and with which thresholds. The registry is a fixed table indexed by
//! [`TaskType`]; anything unrecognized resolves to the `custom` record, whose
//! check lists are empty.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

use crate::types::TaskType;

/// Errors from loading profile overrides.
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Failed to parse profile overrides: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Unknown task type in profile overrides: {0}")]
    UnknownTaskType(String),
}

/// A structural check name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StructuralCheck {
    WordCount,
    RequiredSections,
    SourcesList,
    HasSteps,
    /// A name this build does not know. Skipped by the gate.
    Unrecognized(String),
}

impl StructuralCheck {
    pub fn name(&self) -> &str {
        match self {
            StructuralCheck::WordCount => "word_count",
            StructuralCheck::RequiredSections => "required_sections",
            StructuralCheck::SourcesList => "sources_list",
            StructuralCheck::HasSteps => "has_steps",
            StructuralCheck::Unrecognized(name) => name,
        }
    }
}

impl From<String> for StructuralCheck {
    fn from(name: String) -> Self {
        match name.as_str() {
            "word_count" => StructuralCheck::WordCount,
            "required_sections" => StructuralCheck::RequiredSections,
            "sources_list" => StructuralCheck::SourcesList,
            "has_steps" => StructuralCheck::HasSteps,
            _ => StructuralCheck::Unrecognized(name),
        }
    }
}

impl From<StructuralCheck> for String {
    fn from(check: StructuralCheck) -> Self {
        check.name().to_string()
    }
}

impl fmt::Display for StructuralCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A grounding check name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GroundingCheck {
    CitationsPresent,
    /// Warning-only.
    DatesValid,
    /// Only runs when a URL probe is configured.
    UrlReachable,
    /// A name this build does not know. Skipped by the gate.
    Unrecognized(String),
}

impl GroundingCheck {
    pub fn name(&self) -> &str {
        match self {
            GroundingCheck::CitationsPresent => "citations_present",
            GroundingCheck::DatesValid => "dates_valid",
            GroundingCheck::UrlReachable => "url_reachable",
            GroundingCheck::Unrecognized(name) => name,
        }
    }
}

impl From<String> for GroundingCheck {
    fn from(name: String) -> Self {
        match name.as_str() {
            "citations_present" => GroundingCheck::CitationsPresent,
            "dates_valid" => GroundingCheck::DatesValid,
            "url_reachable" => GroundingCheck::UrlReachable,
            _ => GroundingCheck::Unrecognized(name),
        }
    }
}

impl From<GroundingCheck> for String {
    fn from(check: GroundingCheck) -> Self {
        check.name().to_string()
    }
}

impl fmt::Display for GroundingCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Checks and thresholds for one task type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Profile {
    #[serde(default)]
    pub min_word_count: usize,

    /// Section headings or keywords that must appear (case-insensitive)
    #[serde(default)]
    pub required_sections: Vec<String>,

    #[serde(default)]
    pub structural_checks: Vec<StructuralCheck>,

    #[serde(default)]
    pub grounding_checks: Vec<GroundingCheck>,
}

impl Profile {
    /// A profile with no checks at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Start a profile with a word-count threshold and no checks enabled.
    pub fn new(min_word_count: usize) -> Self {
        Self {
            min_word_count,
            ..Self::default()
        }
    }

    pub fn with_structural(mut self, checks: impl IntoIterator<Item = StructuralCheck>) -> Self {
        self.structural_checks = checks.into_iter().collect();
        self
    }

    pub fn with_grounding(mut self, checks: impl IntoIterator<Item = GroundingCheck>) -> Self {
        self.grounding_checks = checks.into_iter().collect();
        self
    }

    pub fn with_sections<I, S>(mut self, sections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_sections = sections.into_iter().map(Into::into).collect();
        self
    }

    /// True when neither gate has anything to check.
    pub fn is_permissive(&self) -> bool {
        self.structural_checks.is_empty() && self.grounding_checks.is_empty()
    }
}

fn research_profile() -> Profile {
    Profile::new(200)
        .with_sections(["summary", "findings"])
        .with_structural([
            StructuralCheck::WordCount,
            StructuralCheck::RequiredSections,
            StructuralCheck::SourcesList,
        ])
        .with_grounding([
            GroundingCheck::CitationsPresent,
            GroundingCheck::DatesValid,
            GroundingCheck::UrlReachable,
        ])
}

fn analysis_profile() -> Profile {
    Profile::new(150)
        .with_sections(["analysis", "conclusion"])
        .with_structural([StructuralCheck::WordCount, StructuralCheck::RequiredSections])
        .with_grounding([GroundingCheck::CitationsPresent, GroundingCheck::DatesValid])
}

fn strategy_profile() -> Profile {
    Profile::new(200)
        .with_sections(["objective", "risks", "recommendation"])
        .with_structural([StructuralCheck::WordCount, StructuralCheck::RequiredSections])
        .with_grounding([GroundingCheck::DatesValid])
}

fn writing_profile() -> Profile {
    Profile::new(100).with_structural([StructuralCheck::WordCount])
}

fn planning_profile() -> Profile {
    Profile::new(100)
        .with_sections(["timeline"])
        .with_structural([
            StructuralCheck::WordCount,
            StructuralCheck::RequiredSections,
            StructuralCheck::HasSteps,
        ])
        .with_grounding([GroundingCheck::DatesValid])
}

/// Table of profiles indexed by task type.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRegistry {
    profiles: [Profile; 6],
}

fn slot(task_type: TaskType) -> usize {
    match task_type {
        TaskType::Research => 0,
        TaskType::Analysis => 1,
        TaskType::Strategy => 2,
        TaskType::Writing => 3,
        TaskType::Planning => 4,
        TaskType::Custom => 5,
    }
}

impl ProfileRegistry {
    /// The built-in profile table.
    pub fn builtin() -> Self {
        Self {
            profiles: [
                research_profile(),
                analysis_profile(),
                strategy_profile(),
                writing_profile(),
                planning_profile(),
                Profile::empty(),
            ],
        }
    }

    /// Process-wide registry, initialized once on first use.
    pub fn global() -> &'static ProfileRegistry {
        static GLOBAL: OnceLock<ProfileRegistry> = OnceLock::new();
        GLOBAL.get_or_init(ProfileRegistry::builtin)
    }

    /// Built-in table with the task types named in `yaml` replaced.
    ///
    /// ```yaml
    /// research:
    ///   min_word_count: 300
    ///   required_sections: [summary]
    ///   structural_checks: [word_count]
    ///   grounding_checks: [citations_present]
    /// ```
    pub fn from_yaml(yaml: &str) -> Result<Self, ProfileError> {
        let overrides: BTreeMap<String, Profile> = serde_yaml::from_str(yaml)?;
        let mut registry = Self::builtin();
        for (name, profile) in overrides {
            let task_type = TaskType::parse(&name);
            if task_type == TaskType::Custom && !name.trim().eq_ignore_ascii_case("custom") {
                return Err(ProfileError::UnknownTaskType(name));
            }
            tracing::debug!(task_type = %task_type, "Profile override loaded");
            registry.profiles[slot(task_type)] = profile;
        }
        Ok(registry)
    }

    /// Profile for a task type.
    pub fn get(&self, task_type: TaskType) -> &Profile {
        &self.profiles[slot(task_type)]
    }

    /// Profile for a task type name; unknown names get the custom profile.
    pub fn get_by_name(&self, name: &str) -> &Profile {
        self.get(TaskType::parse(name))
    }

    /// Iterate over every (task type, profile) pair.
    pub fn iter(&self) -> impl Iterator<Item = (TaskType, &Profile)> {
        TaskType::ALL.into_iter().map(move |t| (t, self.get(t)))
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Look up a profile in the process-wide registry.
pub fn get_profile(task_type: TaskType) -> &'static Profile {
    ProfileRegistry::global().get(task_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_profile_is_permissive() {
        let profile = get_profile(TaskType::Custom);
        assert!(profile.is_permissive());
        assert_eq!(profile.min_word_count, 0);
    }

    #[test]
    fn test_unknown_name_falls_back_to_custom() {
        let registry = ProfileRegistry::builtin();
        assert_eq!(registry.get_by_name("astrology"), registry.get(TaskType::Custom));
    }

    #[test]
    fn test_research_profile_checks() {
        let profile = get_profile(TaskType::Research);
        assert!(profile.structural_checks.contains(&StructuralCheck::SourcesList));
        assert!(profile.grounding_checks.contains(&GroundingCheck::CitationsPresent));
        assert_eq!(profile.required_sections, vec!["summary", "findings"]);
    }

    #[test]
    fn test_every_non_custom_type_checks_word_count() {
        for (task_type, profile) in ProfileRegistry::builtin().iter() {
            if task_type != TaskType::Custom {
                assert!(
                    profile.structural_checks.contains(&StructuralCheck::WordCount),
                    "{} lacks word_count",
                    task_type
                );
            }
        }
    }

    #[test]
    fn test_yaml_overrides() {
        let yaml = r#"
writing:
  min_word_count: 20
  structural_checks: [word_count, readability_score]
  grounding_checks: [citations_present]
"#;
        let registry = ProfileRegistry::from_yaml(yaml).unwrap();
        let writing = registry.get(TaskType::Writing);
        assert_eq!(writing.min_word_count, 20);
        assert_eq!(
            writing.structural_checks[1],
            StructuralCheck::Unrecognized("readability_score".to_string())
        );
        // untouched types keep their built-in profile
        assert_eq!(registry.get(TaskType::Research), get_profile(TaskType::Research));
    }

    #[test]
    fn test_yaml_override_rejects_unknown_task_type() {
        let result = ProfileRegistry::from_yaml("astrology:\n  min_word_count: 1\n");
        assert!(matches!(result, Err(ProfileError::UnknownTaskType(_))));
    }

    #[test]
    fn test_check_names_round_trip_through_serde() {
        let json = serde_json::to_string(&GroundingCheck::DatesValid).unwrap();
        assert_eq!(json, "\"dates_valid\"");
        let check: StructuralCheck = serde_json::from_str("\"has_steps\"").unwrap();
        assert_eq!(check, StructuralCheck::HasSteps);
    }
}
