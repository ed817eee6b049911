//! Council prompts, vote parsing and aggregation.
//!
//! Dispatching reviewers is the caller's concern. This module builds the
//! prompts, parses each raw answer into a [`CouncilVerdict`] and folds the
//! verdicts into an [`AggregateResult`] by strict majority.
//!
//! Parsing fails closed: anything that is not a well-formed approve/reject
//! answer becomes a rejection with `parse_success = false`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::contract::TaskContract;

/// Default confidence when a reviewer does not state one.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Distinct weaknesses quoted in a council summary.
const SUMMARY_WEAKNESSES: usize = 5;

/// Distinct missing items quoted in a council summary.
const SUMMARY_MISSING: usize = 3;

const DEFAULT_INSTRUCTION: &str = "You are an independent reviewer. Be precise and critical. \
An honest rejection is more valuable than a false approval.";

/// One reviewer's vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vote {
    Approve,
    Reject,
}

impl Vote {
    /// Parse a vote, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "approve" => Some(Vote::Approve),
            "reject" => Some(Vote::Reject),
            _ => None,
        }
    }
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vote::Approve => write!(f, "approve"),
            Vote::Reject => write!(f, "reject"),
        }
    }
}

/// A reviewer's parsed verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouncilVerdict {
    pub reviewer_id: String,
    pub verdict: Vote,
    /// False when the reviewer's answer could not be read
    pub parse_success: bool,
    pub confidence: f64,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub missing: Vec<String>,
    /// Raw reviewer answer
    #[serde(default)]
    pub raw: String,
}

impl CouncilVerdict {
    /// A vote constructed directly, without a raw answer.
    pub fn new(reviewer_id: impl Into<String>, verdict: Vote) -> Self {
        Self {
            reviewer_id: reviewer_id.into(),
            verdict,
            parse_success: true,
            confidence: DEFAULT_CONFIDENCE,
            strengths: Vec::new(),
            weaknesses: Vec::new(),
            missing: Vec::new(),
            raw: String::new(),
        }
    }

    /// Pessimistic rejection for a reviewer that produced nothing usable.
    pub fn failed(reviewer_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            parse_success: false,
            raw: reason.into(),
            ..Self::new(reviewer_id, Vote::Reject)
        }
    }

    /// Parse a raw reviewer answer.
    ///
    /// The JSON object is taken from the first `{` to the last `}`, so prose
    /// or code fences around it are tolerated.
    pub fn from_output(raw: &str, reviewer_id: impl Into<String>) -> Self {
        let reviewer_id = reviewer_id.into();
        match parse_answer(raw) {
            Some(mut verdict) => {
                verdict.reviewer_id = reviewer_id;
                verdict.raw = raw.to_string();
                verdict
            }
            None => {
                tracing::debug!(reviewer = %reviewer_id, "Unreadable reviewer answer, counting as reject");
                Self::failed(reviewer_id, raw)
            }
        }
    }

    pub fn approved(&self) -> bool {
        self.verdict == Vote::Approve
    }
}

fn json_slice(raw: &str) -> &str {
    match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if start < end => &raw[start..=end],
        _ => raw,
    }
}

fn string_list(data: &Value, key: &str) -> Vec<String> {
    match data.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_answer(raw: &str) -> Option<CouncilVerdict> {
    let data: Value = serde_json::from_str(json_slice(raw)).ok()?;
    let verdict = Vote::parse(data.as_object()?.get("verdict")?.as_str()?)?;

    let confidence = data
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(DEFAULT_CONFIDENCE)
        .clamp(0.0, 1.0);

    Some(CouncilVerdict {
        reviewer_id: String::new(),
        verdict,
        parse_success: true,
        confidence,
        strengths: string_list(&data, "strengths"),
        weaknesses: string_list(&data, "weaknesses"),
        missing: string_list(&data, "missing"),
        raw: String::new(),
    })
}

/// Majority outcome over a set of council verdicts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub passed: bool,
    /// approvals / total, 0.0 for an empty council
    pub score: f64,
    pub approvals: usize,
    pub total: usize,
    /// Verdicts that could not be read
    pub parse_failures: usize,
    pub summary: String,
    #[serde(default)]
    pub verdicts: Vec<CouncilVerdict>,
}

fn distinct<'a>(items: impl Iterator<Item = &'a String>, limit: usize) -> Vec<&'a str> {
    let mut seen: Vec<&str> = Vec::new();
    for item in items {
        if seen.len() == limit {
            break;
        }
        if !seen.contains(&item.as_str()) {
            seen.push(item.as_str());
        }
    }
    seen
}

/// Fold verdicts into a strict-majority decision. A tie fails.
pub fn aggregate_votes(verdicts: Vec<CouncilVerdict>) -> AggregateResult {
    if verdicts.is_empty() {
        return AggregateResult {
            passed: false,
            score: 0.0,
            approvals: 0,
            total: 0,
            parse_failures: 0,
            summary: "Council: no verdicts received, defaulting to FAIL".to_string(),
            verdicts,
        };
    }

    let total = verdicts.len();
    let approvals = verdicts.iter().filter(|v| v.approved()).count();
    let parse_failures = verdicts.iter().filter(|v| !v.parse_success).count();
    let score = approvals as f64 / total as f64;
    let passed = approvals * 2 > total;

    let mut summary = format!(
        "Council: {}/{} approved (score={:.2}, {})",
        approvals,
        total,
        score,
        if passed { "PASS" } else { "FAIL" }
    );
    if parse_failures > 0 {
        summary.push_str(&format!("\nUnreadable verdicts: {}", parse_failures));
    }
    let weaknesses = distinct(verdicts.iter().flat_map(|v| &v.weaknesses), SUMMARY_WEAKNESSES);
    if !weaknesses.is_empty() {
        summary.push_str(&format!("\nWeaknesses: {}", weaknesses.join("; ")));
    }
    let missing = distinct(verdicts.iter().flat_map(|v| &v.missing), SUMMARY_MISSING);
    if !missing.is_empty() {
        summary.push_str(&format!("\nMissing: {}", missing.join("; ")));
    }

    AggregateResult {
        passed,
        score,
        approvals,
        total,
        parse_failures,
        summary,
        verdicts,
    }
}

/// Build one reviewer prompt.
///
/// `instruction` replaces the default reviewer instruction when given.
pub fn generate_reviewer_prompt(
    objective: &str,
    criteria: &[String],
    output: &str,
    instruction: Option<&str>,
) -> String {
    let criteria_text = criteria
        .iter()
        .map(|c| format!("- {}", c))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"COUNCIL REVIEW REQUEST

{instruction}

Task Objective: {objective}

Acceptance Criteria:
{criteria_text}

--- OUTPUT TO REVIEW ---
{output}
---

Return ONLY this JSON (no other text):
{{
  "verdict": "approve",
  "confidence": 0.8,
  "strengths": ["strength 1"],
  "weaknesses": ["weakness 1"],
  "missing": ["missing item"]
}}

verdict must be exactly "approve" or "reject".
"#,
        instruction = instruction.unwrap_or(DEFAULT_INSTRUCTION),
    )
}

/// One labeled prompt per council seat.
pub fn generate_council_tasks(contract: &TaskContract, output: &str) -> Vec<String> {
    generate_council_tasks_with(contract, output, None)
}

/// [`generate_council_tasks`] with a custom reviewer instruction.
pub fn generate_council_tasks_with(
    contract: &TaskContract,
    output: &str,
    instruction: Option<&str>,
) -> Vec<String> {
    let prompt = generate_reviewer_prompt(
        &contract.objective,
        &contract.acceptance_criteria,
        output,
        instruction,
    );
    let n = contract.council_size;
    (1..=n)
        .map(|i| format!("[Reviewer {}/{}]\n{}", i, n, prompt))
        .collect()
}
