//! Task contract parsing from YAML/JSON.

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::schema::validate_contract_schema;
use crate::types::{TaskType, VerificationMode};

/// Message id given to the entry synthesized from a legacy string context.
pub const LEGACY_CONTEXT_ID: &str = "legacy-context";

/// Source type for context supplied by the user.
pub const USER_MESSAGE: &str = "user_message";

/// Default number of council reviewers.
pub const DEFAULT_COUNCIL_SIZE: usize = 3;

/// Errors that can occur when parsing task contracts.
#[derive(Error, Debug)]
pub enum ContractError {
    #[error("Failed to read contract file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Contract schema validation failed: {}", .0.join("; "))]
    SchemaError(Vec<String>),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// One piece of ground truth supplied with the task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContextEntry {
    #[serde(default)]
    pub message_id: String,

    /// RFC 3339 timestamp, as supplied
    #[serde(default)]
    pub timestamp: String,

    pub content: String,

    #[serde(default = "default_source_type")]
    pub source_type: String,
}

fn default_source_type() -> String {
    USER_MESSAGE.to_string()
}

impl ContextEntry {
    /// Create an entry stamped with the current time.
    pub fn new(
        message_id: impl Into<String>,
        content: impl Into<String>,
        source_type: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            timestamp: Utc::now().to_rfc3339(),
            content: content.into(),
            source_type: source_type.into(),
        }
    }

    /// A user message entry.
    pub fn user_message(message_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(message_id, content, USER_MESSAGE)
    }

    /// Entry synthesized from a legacy single-string context.
    pub fn from_legacy(content: impl Into<String>) -> Self {
        Self::new(LEGACY_CONTEXT_ID, content, USER_MESSAGE)
    }
}

/// Either form of `user_provided_context` accepted on the wire.
#[derive(Deserialize)]
#[serde(untagged)]
enum ContextInput {
    Legacy(String),
    Entries(Vec<ContextEntry>),
}

/// Normalize a legacy string into a one-entry list. An empty string yields no entries.
pub fn normalize_legacy_context(context: &str) -> Vec<ContextEntry> {
    if context.trim().is_empty() {
        Vec::new()
    } else {
        vec![ContextEntry::from_legacy(context)]
    }
}

fn deserialize_context<'de, D>(deserializer: D) -> Result<Vec<ContextEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<ContextInput>::deserialize(deserializer)? {
        None => Ok(Vec::new()),
        Some(ContextInput::Legacy(text)) => Ok(normalize_legacy_context(&text)),
        Some(ContextInput::Entries(entries)) => Ok(entries),
    }
}

fn default_council_size() -> usize {
    DEFAULT_COUNCIL_SIZE
}

/// What an agent was asked to do, and how its output is verified.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskContract {
    /// What the agent must accomplish
    pub objective: String,

    /// Criteria the output is judged against, in order
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,

    #[serde(default)]
    pub task_type: TaskType,

    #[serde(default)]
    pub verification_mode: VerificationMode,

    /// Number of independent reviewers in council mode
    #[serde(default = "default_council_size")]
    pub council_size: usize,

    /// Ground truth supplied by the caller. Always a list once parsed.
    #[serde(default, deserialize_with = "deserialize_context")]
    pub user_provided_context: Vec<ContextEntry>,
}

impl TaskContract {
    /// Create a deterministic-mode contract with no context.
    pub fn new(objective: impl Into<String>, task_type: TaskType) -> Self {
        Self {
            objective: objective.into(),
            acceptance_criteria: Vec::new(),
            task_type,
            verification_mode: VerificationMode::default(),
            council_size: DEFAULT_COUNCIL_SIZE,
            user_provided_context: Vec::new(),
        }
    }

    /// Set the acceptance criteria.
    pub fn with_criteria<I, S>(mut self, criteria: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.acceptance_criteria = criteria.into_iter().map(Into::into).collect();
        self
    }

    /// Switch to council mode with `size` reviewers.
    pub fn with_council(mut self, size: usize) -> Self {
        self.verification_mode = VerificationMode::Council;
        self.council_size = size;
        self
    }

    /// Set the context entries.
    pub fn with_context(mut self, entries: Vec<ContextEntry>) -> Self {
        self.user_provided_context = entries;
        self
    }

    /// Set the context from a legacy single string.
    pub fn with_legacy_context(mut self, context: &str) -> Self {
        self.user_provided_context = normalize_legacy_context(context);
        self
    }

    /// Parse a contract from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ContractError> {
        let contract: TaskContract = serde_yaml::from_str(yaml)?;
        contract.validate()?;
        Ok(contract)
    }

    /// Parse a contract from JSON string, validating it against the schema first.
    pub fn from_json(json: &str) -> Result<Self, ContractError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_json_value(value)
    }

    /// Build a contract from an already-parsed JSON document.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self, ContractError> {
        validate_contract_schema(&value).map_err(ContractError::SchemaError)?;
        let contract: TaskContract = serde_json::from_value(value)?;
        contract.validate()?;
        Ok(contract)
    }

    /// Parse a contract from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ContractError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse a contract from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ContractError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Parse a contract file, choosing the format by extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ContractError> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_file(path),
            _ => Self::from_json_file(path),
        }
    }

    /// Validate the contract structure.
    fn validate(&self) -> Result<(), ContractError> {
        if self.objective.trim().is_empty() {
            return Err(ContractError::MissingField("objective".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_string_context_normalizes_to_list() {
        let contract = TaskContract::from_json(
            r#"{"objective": "Summarise", "user_provided_context": "legacy context"}"#,
        )
        .unwrap();
        assert_eq!(contract.user_provided_context.len(), 1);
        let entry = &contract.user_provided_context[0];
        assert_eq!(entry.content, "legacy context");
        assert_eq!(entry.message_id, LEGACY_CONTEXT_ID);
        assert_eq!(entry.source_type, USER_MESSAGE);
    }

    #[test]
    fn test_builder_legacy_context() {
        let contract =
            TaskContract::new("Summarise", TaskType::Writing).with_legacy_context("legacy context");
        assert_eq!(contract.user_provided_context.len(), 1);
        assert_eq!(contract.user_provided_context[0].content, "legacy context");

        let empty = TaskContract::new("Summarise", TaskType::Writing).with_legacy_context("  ");
        assert!(empty.user_provided_context.is_empty());
    }

    #[test]
    fn test_list_context_is_kept() {
        let json = r#"{
            "objective": "Assess revenue",
            "acceptance_criteria": ["Uses provided figures"],
            "task_type": "analysis",
            "verification_mode": "council",
            "council_size": 5,
            "user_provided_context": [
                {"message_id": "m1", "timestamp": "2025-01-01T00:00:00Z",
                 "content": "Revenue is 50M", "source_type": "user_message"},
                {"message_id": "m2", "content": "Costs are 20M"}
            ]
        }"#;
        let contract = TaskContract::from_json(json).unwrap();
        assert_eq!(contract.task_type, TaskType::Analysis);
        assert_eq!(contract.verification_mode, VerificationMode::Council);
        assert_eq!(contract.council_size, 5);
        assert_eq!(contract.user_provided_context.len(), 2);
        assert_eq!(contract.user_provided_context[1].source_type, USER_MESSAGE);
    }

    #[test]
    fn test_defaults() {
        let contract = TaskContract::from_json(r#"{"objective": "Do it"}"#).unwrap();
        assert_eq!(contract.task_type, TaskType::Custom);
        assert_eq!(contract.verification_mode, VerificationMode::Deterministic);
        assert_eq!(contract.council_size, DEFAULT_COUNCIL_SIZE);
        assert!(contract.user_provided_context.is_empty());
    }

    #[test]
    fn test_unknown_task_type_is_custom() {
        let contract =
            TaskContract::from_json(r#"{"objective": "x", "task_type": "astrology"}"#).unwrap();
        assert_eq!(contract.task_type, TaskType::Custom);
    }

    #[test]
    fn test_missing_objective_rejected() {
        let result = TaskContract::from_json(r#"{"task_type": "research"}"#);
        assert!(matches!(result, Err(ContractError::SchemaError(_))));
    }

    #[test]
    fn test_blank_objective_rejected() {
        let result = TaskContract::from_yaml("objective: \"  \"\n");
        assert!(matches!(result, Err(ContractError::MissingField(_))));
    }

    #[test]
    fn test_yaml_contract_with_legacy_context() {
        let yaml = r#"
objective: "Plan the migration"
acceptance_criteria:
  - "Lists ordered steps"
task_type: planning
user_provided_context: "We have 3 weeks"
"#;
        let contract = TaskContract::from_yaml(yaml).unwrap();
        assert_eq!(contract.task_type, TaskType::Planning);
        assert_eq!(contract.user_provided_context[0].content, "We have 3 weeks");
    }
}
