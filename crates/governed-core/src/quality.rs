//! Quality review of an output as a whole.
//!
//! Four weighted heuristics. None of them read the claims' truth; that is the
//! fact check's job.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::contract::{ContextEntry, USER_MESSAGE};
use crate::patterns::INTENT_WORD;

/// Minimum words for an argument to count as coherent.
pub const MIN_COHERENT_WORDS: usize = 25;

const REASONING_MARKERS: &[&str] = &["because", "therefore", "thus", "deshalb", "daher"];
const RISK_MARKERS: &[&str] = &["risk", "risiko"];

const WEIGHT_COHERENT: f64 = 0.30;
const WEIGHT_REASONING: f64 = 0.30;
const WEIGHT_RISKS: f64 = 0.20;
const WEIGHT_INTENT: f64 = 0.20;

/// Share of intent words the output has to echo.
const INTENT_OVERLAP: f64 = 0.20;

/// Outcome of the quality review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityVerdict {
    pub argument_coherent: bool,
    pub reasoning_sound: bool,
    pub risks_addressed: bool,
    pub user_intent_match: bool,
    /// Weighted sum of the passed checks, in `[0, 1]`
    pub quality_score: f64,
    /// One note per failed check
    #[serde(default)]
    pub notes: Vec<String>,
}

impl QualityVerdict {
    /// Notes joined for display.
    pub fn summary(&self) -> String {
        if self.notes.is_empty() {
            "Quality checks passed".to_string()
        } else {
            self.notes.join("; ")
        }
    }
}

fn intent_words(text: &str) -> HashSet<String> {
    INTENT_WORD
        .find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

fn matches_intent(output: &str, user_intent: Option<&str>) -> bool {
    let wanted = intent_words(user_intent.unwrap_or_default());
    if wanted.is_empty() {
        return true;
    }
    let present = intent_words(output);
    let overlap = wanted.intersection(&present).count();
    let required = ((wanted.len() as f64 * INTENT_OVERLAP) as usize).max(1);
    overlap >= required
}

/// Review an output against four quality heuristics.
pub fn review_quality(output: &str, user_intent: Option<&str>) -> QualityVerdict {
    let lower = output.to_lowercase();

    let argument_coherent = output.split_whitespace().count() >= MIN_COHERENT_WORDS;
    let reasoning_sound = REASONING_MARKERS.iter().any(|m| lower.contains(m));
    let risks_addressed = RISK_MARKERS.iter().any(|m| lower.contains(m));
    let user_intent_match = matches_intent(output, user_intent);

    let weight = |passed: bool, w: f64| if passed { w } else { 0.0 };
    let quality_score = weight(argument_coherent, WEIGHT_COHERENT)
        + weight(reasoning_sound, WEIGHT_REASONING)
        + weight(risks_addressed, WEIGHT_RISKS)
        + weight(user_intent_match, WEIGHT_INTENT);

    let mut notes = Vec::new();
    if !argument_coherent {
        notes.push("Argumentation is too short or fragmented".to_string());
    }
    if !reasoning_sound {
        notes.push("Reasoning chain markers are weak".to_string());
    }
    if !risks_addressed {
        notes.push("Risks not explicitly addressed".to_string());
    }
    if !user_intent_match {
        notes.push("Output does not match user intent strongly".to_string());
    }

    QualityVerdict {
        argument_coherent,
        reasoning_sound,
        risks_addressed,
        user_intent_match,
        quality_score,
        notes,
    }
}

/// The user's intent: the first user message, else the first entry.
pub fn extract_intent(entries: &[ContextEntry]) -> Option<&str> {
    entries
        .iter()
        .find(|e| e.source_type == USER_MESSAGE)
        .or_else(|| entries.first())
        .map(|e| e.content.as_str())
}
