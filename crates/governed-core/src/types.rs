//! Shared types for verification requests and results.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::council::AggregateResult;
use crate::facts::FactCheckReport;

/// Kind of work a task contract describes.
///
/// Unknown names deserialize to [`TaskType::Custom`] so that unclassified
/// tasks still flow through the pipeline.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum TaskType {
    Research,
    Analysis,
    Strategy,
    Writing,
    Planning,
    #[default]
    Custom,
}

impl TaskType {
    /// All task types, in registry order.
    pub const ALL: [TaskType; 6] = [
        TaskType::Research,
        TaskType::Analysis,
        TaskType::Strategy,
        TaskType::Writing,
        TaskType::Planning,
        TaskType::Custom,
    ];

    /// Parse a task type name, case-insensitively. Never fails.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "research" => TaskType::Research,
            "analysis" => TaskType::Analysis,
            "strategy" => TaskType::Strategy,
            "writing" => TaskType::Writing,
            "planning" => TaskType::Planning,
            _ => TaskType::Custom,
        }
    }

    /// Wire name of this task type.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Research => "research",
            TaskType::Analysis => "analysis",
            TaskType::Strategy => "strategy",
            TaskType::Writing => "writing",
            TaskType::Planning => "planning",
            TaskType::Custom => "custom",
        }
    }
}

impl From<String> for TaskType {
    fn from(name: String) -> Self {
        TaskType::parse(&name)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How far verification goes beyond the deterministic gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMode {
    /// Structural and grounding gates only.
    #[default]
    Deterministic,

    /// Gates, context fact check, then a reviewer council.
    Council,
}

/// The gate layer that stopped a verification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Structural,
    Grounding,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Structural => f.write_str("structural"),
            Layer::Grounding => f.write_str("grounding"),
        }
    }
}

/// Outcome of a single gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    pub passed: bool,

    #[serde(default)]
    pub failures: Vec<String>,

    /// Advisory findings. Never affect `passed`.
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl GateResult {
    /// A passing result with nothing to report.
    pub fn pass() -> Self {
        Self {
            passed: true,
            failures: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Record a failure; the gate no longer passes.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.passed = false;
        self.failures.push(reason.into());
    }

    /// Record a warning.
    pub fn warn(&mut self, reason: impl Into<String>) {
        self.warnings.push(reason.into());
    }
}

impl Default for GateResult {
    fn default() -> Self {
        Self::pass()
    }
}

/// Top-level outcome of a verification run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub passed: bool,

    /// Gate that stopped the run, if any.
    pub layer_failed: Option<Layer>,

    /// Whether a reviewer council still has to judge the output.
    pub needs_council: bool,

    /// Share of checked prompt premises supported by the supplied context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_fact_score: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claims_supported_by_prompt: Option<usize>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    /// Vote aggregate, present once a council has run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub council: Option<AggregateResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fact_check: Option<FactCheckReport>,
}

impl VerificationResult {
    /// A result stopped at `layer` with the gate's messages.
    pub fn stopped_at(layer: Layer, gate: GateResult, warnings: Vec<String>) -> Self {
        let mut all_warnings = warnings;
        all_warnings.extend(gate.warnings);
        Self {
            passed: false,
            layer_failed: Some(layer),
            needs_council: false,
            context_fact_score: None,
            claims_supported_by_prompt: None,
            failures: gate.failures,
            warnings: all_warnings,
            council: None,
            fact_check: None,
        }
    }

    /// A result that cleared every gate.
    pub fn cleared(needs_council: bool, warnings: Vec<String>) -> Self {
        Self {
            passed: true,
            layer_failed: None,
            needs_council,
            context_fact_score: None,
            claims_supported_by_prompt: None,
            failures: Vec::new(),
            warnings,
            council: None,
            fact_check: None,
        }
    }

    /// Attach a fact check report and lift its headline numbers.
    pub fn with_fact_check(mut self, report: FactCheckReport) -> Self {
        self.context_fact_score = Some(report.context_fact_score);
        self.claims_supported_by_prompt = Some(report.claims_supported_by_prompt);
        self.fact_check = Some(report);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_type_parse_is_lenient() {
        assert_eq!(TaskType::parse("Research"), TaskType::Research);
        assert_eq!(TaskType::parse(" planning "), TaskType::Planning);
        assert_eq!(TaskType::parse("astrology"), TaskType::Custom);
        assert_eq!(TaskType::parse(""), TaskType::Custom);
    }

    #[test]
    fn test_task_type_deserializes_unknown_to_custom() {
        let t: TaskType = serde_json::from_str("\"astrology\"").unwrap();
        assert_eq!(t, TaskType::Custom);
        let t: TaskType = serde_json::from_str("\"ANALYSIS\"").unwrap();
        assert_eq!(t, TaskType::Analysis);
        assert_eq!(serde_json::to_string(&TaskType::Writing).unwrap(), "\"writing\"");
    }

    #[test]
    fn test_result_serializes_required_fields() {
        let result = VerificationResult::cleared(true, vec![]);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["passed"], true);
        assert_eq!(json["layer_failed"], serde_json::Value::Null);
        assert_eq!(json["needs_council"], true);
        assert!(json.get("context_fact_score").is_none());
    }

    #[test]
    fn test_layer_wire_names() {
        let mut gate = GateResult::pass();
        gate.fail("word_count: too short");
        let result = VerificationResult::stopped_at(Layer::Structural, gate, vec![]);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["layer_failed"], "structural");
        assert_eq!(json["failures"][0], "word_count: too short");
    }
}
