//! Claim-versus-context matching.
//!
//! Prompt-premise claims restate something the user supplied. The matcher
//! decides, with simple rules, whether the supplied context supports the
//! claim, contradicts it, or says nothing about it:
//!
//! 1. Numbers in the claim that differ from the nearest context number by
//!    more than the tolerance: **contradicts**. Checked before anything else.
//! 2. Opposite direction words (increase/decrease, rise/fall, ...): **contradicts**.
//! 3. Enough of the claim's words appear in the context: **supported**.
//! 4. Otherwise: **not found**.
//!
//! A matcher reports faults as `Err(MatchFault)`. [`check_claim_context`]
//! turns any fault, or panic, into `INFRA_FAIL`, which scoring excludes.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

use crate::claims::Claim;
use crate::contract::ContextEntry;
use crate::patterns::{overlap_words, NUMBER_PATTERN, POINTER_PATTERN, URL_PATTERN};

/// Default relative tolerance for numeric comparison.
pub const DEFAULT_TOLERANCE: f64 = 0.05;

/// Default share of claim words that must appear in the context.
pub const DEFAULT_OVERLAP_THRESHOLD: f64 = 0.30;

/// Context score when no verdict is scoreable (all `INFRA_FAIL`, or none at all).
pub const VACUOUS_CONTEXT_SCORE: f64 = 1.0;

lazy_static! {
    // Opposite-direction word pairs, matched as whole words
    static ref INVERSIONS: Vec<(Regex, Regex)> = [
        (r"increas(?:e|es|ed|ing)", r"decreas(?:e|es|ed|ing)"),
        (r"higher", r"lower"),
        (r"up", r"down"),
        (r"profit(?:s|able)?", r"loss(?:es)?"),
        (r"ris(?:e|es|ing)|rose", r"fall(?:s|ing)?|fell"),
        (r"steig(?:t|en)", r"fäll(?:t|en)"),
    ]
    .iter()
    .map(|(left, right)| {
        (
            Regex::new(&format!(r"(?i)\b(?:{})\b", left)).unwrap(),
            Regex::new(&format!(r"(?i)\b(?:{})\b", right)).unwrap(),
        )
    })
    .collect();
}

/// Outcome of matching one claim, as stored and serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContextVerdictKind {
    SupportedByPrompt,
    ContradictsPrompt,
    #[serde(alias = "NOT_IN_PROMPT")]
    NotFound,
    /// The claim could not be judged. Excluded from scoring.
    InfraFail,
}

impl ContextVerdictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextVerdictKind::SupportedByPrompt => "SUPPORTED_BY_PROMPT",
            ContextVerdictKind::ContradictsPrompt => "CONTRADICTS_PROMPT",
            ContextVerdictKind::NotFound => "NOT_FOUND",
            ContextVerdictKind::InfraFail => "INFRA_FAIL",
        }
    }

    /// Score contribution, or `None` for verdicts excluded from scoring.
    pub fn score(&self) -> Option<f64> {
        match self {
            ContextVerdictKind::SupportedByPrompt => Some(1.0),
            ContextVerdictKind::ContradictsPrompt | ContextVerdictKind::NotFound => Some(0.0),
            ContextVerdictKind::InfraFail => None,
        }
    }
}

impl fmt::Display for ContextVerdictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a matcher can conclude. `INFRA_FAIL` is deliberately absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchKind {
    Supported,
    Contradicts,
    NotFound,
}

impl From<MatchKind> for ContextVerdictKind {
    fn from(kind: MatchKind) -> Self {
        match kind {
            MatchKind::Supported => ContextVerdictKind::SupportedByPrompt,
            MatchKind::Contradicts => ContextVerdictKind::ContradictsPrompt,
            MatchKind::NotFound => ContextVerdictKind::NotFound,
        }
    }
}

/// A matcher's judgement with its reason.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextMatch {
    pub kind: MatchKind,
    pub evidence: String,
}

impl ContextMatch {
    fn new(kind: MatchKind, evidence: impl Into<String>) -> Self {
        Self {
            kind,
            evidence: evidence.into(),
        }
    }
}

/// Why a matcher could not judge a claim.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchFault {
    #[error("claim {0} has no text")]
    EmptyClaim(String),

    #[error("malformed input: {0}")]
    Malformed(String),

    #[error("matcher timed out")]
    Timeout,
}

/// Verdict for one claim against the supplied context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMatchVerdict {
    pub claim_id: String,
    pub verdict: ContextVerdictKind,
    #[serde(default)]
    pub evidence: String,
}

impl ContextMatchVerdict {
    /// Verdict for a claim that could not be judged.
    pub fn infra_fail(claim_id: impl Into<String>, evidence: impl Into<String>) -> Self {
        Self {
            claim_id: claim_id.into(),
            verdict: ContextVerdictKind::InfraFail,
            evidence: evidence.into(),
        }
    }
}

/// Decides whether context supports a claim.
pub trait ContextMatcher: Send + Sync {
    fn match_claim(
        &self,
        claim: &Claim,
        entries: &[ContextEntry],
    ) -> Result<ContextMatch, MatchFault>;
}

/// The rule-based matcher.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleMatcher {
    /// Relative tolerance for numeric comparison
    pub tolerance: f64,

    /// Share of claim words that must occur in the context
    pub overlap_threshold: f64,

    /// Treat opposite direction words as a contradiction
    pub detect_inversions: bool,
}

impl Default for RuleMatcher {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            overlap_threshold: DEFAULT_OVERLAP_THRESHOLD,
            detect_inversions: true,
        }
    }
}

impl RuleMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Compare claim numbers to context numbers.
    ///
    /// `None` when either side has no numbers, `Some(false)` when any claim
    /// number is further than the tolerance from every context number.
    fn numeric_alignment(&self, claim_text: &str, context_text: &str) -> Option<bool> {
        let claim_numbers = extract_numbers(claim_text);
        let context_numbers = extract_numbers(context_text);
        if claim_numbers.is_empty() || context_numbers.is_empty() {
            return None;
        }

        let aligned = claim_numbers.iter().all(|&claim_value| {
            let baseline = if claim_value.abs() > 1e-9 {
                claim_value.abs()
            } else {
                1.0
            };
            let nearest = context_numbers
                .iter()
                .map(|ctx| (ctx - claim_value).abs() / baseline)
                .fold(f64::INFINITY, f64::min);
            nearest <= self.tolerance
        });
        Some(aligned)
    }

    fn inverted_direction(&self, claim_text: &str, context_text: &str) -> bool {
        INVERSIONS.iter().any(|(left, right)| {
            (left.is_match(claim_text) && right.is_match(context_text))
                || (right.is_match(claim_text) && left.is_match(context_text))
        })
    }

    fn overlaps(&self, claim_text: &str, context_text: &str) -> bool {
        let words = overlap_words(claim_text);
        if words.is_empty() {
            return false;
        }
        let context_lower = context_text.to_lowercase();
        let found = words.iter().filter(|w| context_lower.contains(w.as_str())).count();
        let required = ((words.len() as f64 * self.overlap_threshold).floor() as usize).max(1);
        found >= required
    }
}

impl ContextMatcher for RuleMatcher {
    fn match_claim(
        &self,
        claim: &Claim,
        entries: &[ContextEntry],
    ) -> Result<ContextMatch, MatchFault> {
        let claim_text = strip_pointers(&claim.text);
        if claim_text.trim().is_empty() {
            return Err(MatchFault::EmptyClaim(claim.claim_id.clone()));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(MatchFault::Malformed(format!(
                "tolerance {} is not a non-negative number",
                self.tolerance
            )));
        }

        let context_text = entries
            .iter()
            .map(|e| e.content.trim())
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        if context_text.is_empty() {
            return Ok(ContextMatch::new(
                MatchKind::NotFound,
                "No user-provided context available",
            ));
        }

        if self.numeric_alignment(&claim_text, &context_text) == Some(false) {
            return Ok(ContextMatch::new(
                MatchKind::Contradicts,
                format!(
                    "Numeric mismatch greater than {:.0}% against provided context",
                    self.tolerance * 100.0
                ),
            ));
        }

        if self.detect_inversions && self.inverted_direction(&claim_text, &context_text) {
            return Ok(ContextMatch::new(
                MatchKind::Contradicts,
                "Opposite direction stated in provided context",
            ));
        }

        if self.overlaps(&claim_text, &context_text) {
            Ok(ContextMatch::new(
                MatchKind::Supported,
                "Claim aligns with user-provided context",
            ))
        } else {
            Ok(ContextMatch::new(
                MatchKind::NotFound,
                "Claim not sufficiently present in user-provided context",
            ))
        }
    }
}

/// Claim text without its source pointers and URLs.
fn strip_pointers(text: &str) -> String {
    let without_pointers = POINTER_PATTERN.replace_all(text, " ");
    URL_PATTERN.replace_all(&without_pointers, " ").into_owned()
}

fn magnitude(suffix: Option<&str>) -> f64 {
    match suffix.map(|s| s.to_ascii_lowercase()) {
        Some(s) if s == "k" => 1_000.0,
        Some(s) if s == "m" => 1_000_000.0,
        Some(s) if s == "b" => 1_000_000_000.0,
        _ => 1.0,
    }
}

/// Numbers in `text`, normalized by their `k`/`M`/`B` suffix.
///
/// Digits glued to a preceding letter (`Q3`, `v2`) are not numbers.
pub fn extract_numbers(text: &str) -> Vec<f64> {
    NUMBER_PATTERN
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let preceded_by_word = text[..whole.start()]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric() || c == '_');
            if preceded_by_word {
                return None;
            }
            let value: f64 = caps[1].replace(',', "").parse().ok()?;
            Some(value * magnitude(caps.get(2).map(|m| m.as_str())))
        })
        .collect()
}

/// Match one claim with the default rule matcher. Never fails.
pub fn check_claim_context(claim: &Claim, entries: &[ContextEntry]) -> ContextMatchVerdict {
    check_claim_context_with(&RuleMatcher::default(), claim, entries)
}

/// Match one claim with `matcher`, converting any fault or panic to `INFRA_FAIL`.
pub fn check_claim_context_with<M>(
    matcher: &M,
    claim: &Claim,
    entries: &[ContextEntry],
) -> ContextMatchVerdict
where
    M: ContextMatcher + ?Sized,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| matcher.match_claim(claim, entries)));

    match outcome {
        Ok(Ok(found)) => ContextMatchVerdict {
            claim_id: claim.claim_id.clone(),
            verdict: found.kind.into(),
            evidence: found.evidence,
        },
        Ok(Err(fault)) => {
            tracing::warn!(claim_id = %claim.claim_id, error = %fault, "Context check failed");
            ContextMatchVerdict::infra_fail(
                &claim.claim_id,
                format!("Context check failed: {}", fault),
            )
        }
        Err(_) => {
            tracing::warn!(claim_id = %claim.claim_id, "Context check panicked");
            ContextMatchVerdict::infra_fail(&claim.claim_id, "Context check panicked")
        }
    }
}

/// Share of scoreable verdicts that are supported by the prompt.
///
/// `INFRA_FAIL` is removed from numerator and denominator. With nothing left
/// to score the result is [`VACUOUS_CONTEXT_SCORE`].
pub fn compute_context_score(verdicts: &[ContextMatchVerdict]) -> f64 {
    let scores: Vec<f64> = verdicts.iter().filter_map(|v| v.verdict.score()).collect();
    if scores.is_empty() {
        return VACUOUS_CONTEXT_SCORE;
    }
    scores.iter().sum::<f64>() / scores.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn context(text: &str) -> Vec<ContextEntry> {
        vec![ContextEntry::user_message("m1", text)]
    }

    fn verdict(kind: ContextVerdictKind) -> ContextMatchVerdict {
        ContextMatchVerdict {
            claim_id: "c".to_string(),
            verdict: kind,
            evidence: String::new(),
        }
    }

    struct ExplodingMatcher;

    impl ContextMatcher for ExplodingMatcher {
        fn match_claim(&self, _: &Claim, _: &[ContextEntry]) -> Result<ContextMatch, MatchFault> {
            Err(MatchFault::Timeout)
        }
    }

    struct PanickingMatcher;

    impl ContextMatcher for PanickingMatcher {
        fn match_claim(&self, _: &Claim, _: &[ContextEntry]) -> Result<ContextMatch, MatchFault> {
            panic!("matcher bug")
        }
    }

    #[test]
    fn test_numeric_mismatch_contradicts() {
        let claim = Claim::premise("c1", "Revenue is 53M", 1);
        let ctx = context("Revenue is 50M");
        let first = check_claim_context(&claim, &ctx);
        assert_eq!(first.verdict, ContextVerdictKind::ContradictsPrompt);

        let second = check_claim_context(&claim, &ctx);
        assert_eq!(first, second);
    }

    #[test]
    fn test_numeric_within_tolerance_supports() {
        let claim = Claim::premise("c1", "Revenue is 51M", 1);
        let result = check_claim_context(&claim, &context("Revenue is 50M"));
        assert_eq!(result.verdict, ContextVerdictKind::SupportedByPrompt);
    }

    #[test]
    fn test_numeric_priority_over_overlap() {
        let claim = Claim::premise("c1", "Annual revenue of the company is 80M", 1);
        let result = check_claim_context(
            &claim,
            &context("Annual revenue of the company is 50M"),
        );
        assert_eq!(result.verdict, ContextVerdictKind::ContradictsPrompt);
    }

    #[test]
    fn test_suffixes_and_separators_normalize() {
        assert_eq!(extract_numbers("1,200 units"), vec![1200.0]);
        assert_eq!(extract_numbers("2.5k users"), vec![2500.0]);
        assert_eq!(extract_numbers("revenue 3 B"), vec![3_000_000_000.0]);
        assert_eq!(extract_numbers("Q3 plan v2"), Vec::<f64>::new());
        assert_eq!(extract_numbers("5 more"), vec![5.0]);
    }

    #[test]
    fn test_inversion_contradicts() {
        let claim = Claim::premise("c1", "Customer churn will increase next year", 1);
        let result = check_claim_context(&claim, &context("Customer churn will decrease next year"));
        assert_eq!(result.verdict, ContextVerdictKind::ContradictsPrompt);
    }

    #[test]
    fn test_overlap_supports() {
        let claim = Claim::premise("c1", "The board approved the budget [Context: memo]", 1);
        let result = check_claim_context(&claim, &context("Board approved budget on Monday"));
        assert_eq!(result.verdict, ContextVerdictKind::SupportedByPrompt);
    }

    #[test]
    fn test_unrelated_claim_not_found() {
        let claim = Claim::premise("c1", "Competitors launched seven products", 1);
        let result = check_claim_context(&claim, &context("Our office moved to Berlin"));
        assert_eq!(result.verdict, ContextVerdictKind::NotFound);
    }

    #[test]
    fn test_empty_context_not_found() {
        let claim = Claim::premise("c1", "Revenue is 50M", 1);
        let result = check_claim_context(&claim, &[]);
        assert_eq!(result.verdict, ContextVerdictKind::NotFound);
    }

    #[test]
    fn test_empty_claim_is_infra_fail() {
        let claim = Claim::premise("c9", "[Context: memo]", 1);
        let result = check_claim_context(&claim, &context("anything"));
        assert_eq!(result.verdict, ContextVerdictKind::InfraFail);
        assert_eq!(result.claim_id, "c9");
    }

    #[test]
    fn test_faulting_matcher_becomes_infra_fail() {
        let claim = Claim::premise("c1", "Revenue is 50M", 1);
        let result = check_claim_context_with(&ExplodingMatcher, &claim, &context("Revenue is 50M"));
        assert_eq!(result.verdict, ContextVerdictKind::InfraFail);
        assert!(result.evidence.contains("timed out"));
    }

    #[test]
    fn test_panicking_matcher_becomes_infra_fail() {
        let claim = Claim::premise("c1", "Revenue is 50M", 1);
        let result = check_claim_context_with(&PanickingMatcher, &claim, &context("x"));
        assert_eq!(result.verdict, ContextVerdictKind::InfraFail);
    }

    #[test]
    fn test_context_score_excludes_infra_fail() {
        let verdicts = vec![
            verdict(ContextVerdictKind::SupportedByPrompt),
            verdict(ContextVerdictKind::InfraFail),
        ];
        assert_eq!(compute_context_score(&verdicts), 1.0);
    }

    #[test]
    fn test_context_score_all_infra_fail_is_vacuous() {
        let verdicts = vec![verdict(ContextVerdictKind::InfraFail)];
        assert_eq!(compute_context_score(&verdicts), VACUOUS_CONTEXT_SCORE);
        assert_eq!(compute_context_score(&[]), VACUOUS_CONTEXT_SCORE);
    }

    #[test]
    fn test_context_score_mixed() {
        let verdicts = vec![
            verdict(ContextVerdictKind::SupportedByPrompt),
            verdict(ContextVerdictKind::ContradictsPrompt),
            verdict(ContextVerdictKind::NotFound),
            verdict(ContextVerdictKind::SupportedByPrompt),
        ];
        assert!((compute_context_score(&verdicts) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_legacy_wire_name_accepted() {
        let kind: ContextVerdictKind = serde_json::from_str("\"NOT_IN_PROMPT\"").unwrap();
        assert_eq!(kind, ContextVerdictKind::NotFound);
        assert_eq!(
            serde_json::to_string(&ContextVerdictKind::SupportedByPrompt).unwrap(),
            "\"SUPPORTED_BY_PROMPT\""
        );
    }

    fn kind_strategy() -> impl Strategy<Value = ContextVerdictKind> {
        prop_oneof![
            Just(ContextVerdictKind::SupportedByPrompt),
            Just(ContextVerdictKind::ContradictsPrompt),
            Just(ContextVerdictKind::NotFound),
            Just(ContextVerdictKind::InfraFail),
        ]
    }

    proptest! {
        #[test]
        fn prop_context_score_in_unit_interval(kinds in prop::collection::vec(kind_strategy(), 0..20)) {
            let verdicts: Vec<_> = kinds.into_iter().map(verdict).collect();
            let score = compute_context_score(&verdicts);
            prop_assert!((0.0..=1.0).contains(&score));
        }
    }
}
