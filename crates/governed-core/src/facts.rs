//! Fact check: claims, context, quality, one report.
//!
//! ```text
//! output ──► extract_claims ──► route_claims
//!                                  │
//!          ┌───────────────────────┼──────────────────────┐
//!          ▼                       ▼                      ▼
//!   PROMPT_PREMISE            FACTUAL               whole output
//!   check_claim_context       check_external        review_quality
//!          │                       │                      │
//!          └──────── min(context, external, quality) ─────┘
//!                                  │
//!                      rank-1 fabricated? ──► 0.0
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::claims::{extract_claims, route_claims, Claim, ClaimType};
use crate::context::{
    check_claim_context_with, compute_context_score, ContextMatchVerdict, ContextMatcher,
    ContextVerdictKind, RuleMatcher,
};
use crate::contract::ContextEntry;
use crate::quality::{extract_intent, review_quality, QualityVerdict};

/// Minimum final score for a report to pass.
pub const PASS_THRESHOLD: f64 = 0.70;

/// Share of misattributed verdicts above which a failure is reported as misattribution.
pub const MISATTRIBUTION_RATE: f64 = 0.30;

/// Outcome of checking a factual claim's external pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExternalVerdict {
    Supported,
    /// An internal pointer cited for an external fact
    Misattributed,
    Unsupported,
    InfraFail,
}

impl ExternalVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExternalVerdict::Supported => "SUPPORTED",
            ExternalVerdict::Misattributed => "MISATTRIBUTED",
            ExternalVerdict::Unsupported => "UNSUPPORTED",
            ExternalVerdict::InfraFail => "INFRA_FAIL",
        }
    }

    pub fn score(&self) -> Option<f64> {
        match self {
            ExternalVerdict::Supported => Some(1.0),
            ExternalVerdict::Misattributed => Some(0.2),
            ExternalVerdict::Unsupported => Some(0.0),
            ExternalVerdict::InfraFail => None,
        }
    }
}

/// Verdict from either check, tagged with the check that produced it.
///
/// Both checks can report `INFRA_FAIL`, so the tag is what keeps them apart
/// on the wire: `{"check": "context", "verdict": "INFRA_FAIL"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "check", content = "verdict", rename_all = "lowercase")]
pub enum FactVerdictKind {
    External(ExternalVerdict),
    Context(ContextVerdictKind),
}

impl FactVerdictKind {
    pub fn score(&self) -> Option<f64> {
        match self {
            FactVerdictKind::External(v) => v.score(),
            FactVerdictKind::Context(v) => v.score(),
        }
    }

    /// Whether a rank-1 claim with this verdict counts as fabricated.
    pub fn is_fabrication(&self) -> bool {
        matches!(
            self,
            FactVerdictKind::External(ExternalVerdict::Unsupported | ExternalVerdict::Misattributed)
                | FactVerdictKind::Context(
                    ContextVerdictKind::ContradictsPrompt | ContextVerdictKind::NotFound
                )
        )
    }

    pub fn is_infra_fail(&self) -> bool {
        matches!(
            self,
            FactVerdictKind::External(ExternalVerdict::InfraFail)
                | FactVerdictKind::Context(ContextVerdictKind::InfraFail)
        )
    }
}

impl fmt::Display for FactVerdictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactVerdictKind::External(v) => f.write_str(v.as_str()),
            FactVerdictKind::Context(v) => f.write_str(v.as_str()),
        }
    }
}

/// Verdict for one fact-checked claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactVerdict {
    pub claim_id: String,
    pub verdict: FactVerdictKind,
    #[serde(default)]
    pub evidence: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_used: Option<String>,
}

impl From<ContextMatchVerdict> for FactVerdict {
    fn from(v: ContextMatchVerdict) -> Self {
        Self {
            claim_id: v.claim_id,
            verdict: FactVerdictKind::Context(v.verdict),
            evidence: v.evidence,
            source_used: None,
        }
    }
}

/// Judge a factual claim by the pointer it cites.
pub fn check_external(claim: &Claim) -> FactVerdict {
    let source = claim.source_cited.as_deref().unwrap_or_default().to_lowercase();

    let (verdict, evidence) = if source.contains("http://") || source.contains("https://") {
        (ExternalVerdict::Supported, "External source pointer present")
    } else if source.contains("[source:") && source.contains("user prompt") {
        (
            ExternalVerdict::Misattributed,
            "Internal pointer used for a factual claim",
        )
    } else {
        (
            ExternalVerdict::Unsupported,
            "No external evidence pointer available",
        )
    };

    FactVerdict {
        claim_id: claim.claim_id.clone(),
        verdict: FactVerdictKind::External(verdict),
        evidence: evidence.to_string(),
        source_used: claim.source_cited.clone(),
    }
}

/// Mean score of the scoreable verdicts; `INFRA_FAIL` is excluded. Empty is 1.0.
pub fn compute_fact_score(verdicts: &[FactVerdict]) -> f64 {
    let scores: Vec<f64> = verdicts.iter().filter_map(|v| v.verdict.score()).collect();
    if scores.is_empty() {
        return 1.0;
    }
    scores.iter().sum::<f64>() / scores.len() as f64
}

/// Overall fact check outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FactOutcome {
    Pass,
    Fail,
    Misattributed,
}

impl fmt::Display for FactOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FactOutcome::Pass => "PASS",
            FactOutcome::Fail => "FAIL",
            FactOutcome::Misattributed => "MISATTRIBUTED",
        };
        f.write_str(s)
    }
}

/// Everything the fact check found for one output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactCheckReport {
    pub outcome: FactOutcome,
    pub final_score: f64,
    pub external_fact_score: f64,
    pub context_fact_score: f64,
    pub quality_score: f64,
    pub rank_1_fabricated: bool,

    pub claims_checked: usize,
    pub claims_supported: usize,
    pub claims_supported_by_prompt: usize,
    pub claims_contradicts_prompt: usize,
    pub claims_not_found: usize,
    pub claims_misattributed: usize,
    pub claims_unsupported: usize,
    pub infra_fails: usize,

    pub claims: Vec<Claim>,
    pub fact_verdicts: Vec<FactVerdict>,
    pub quality: QualityVerdict,

    #[serde(default)]
    pub transparency_notes: Vec<String>,
}

impl FactCheckReport {
    pub fn passed(&self) -> bool {
        self.outcome == FactOutcome::Pass
    }

    /// Plain-text summary of the report.
    pub fn nutrition_label(&self) -> String {
        let prompt_failures = self.claims_contradicts_prompt + self.claims_not_found;
        let alignment = if prompt_failures == 0 && self.claims_supported_by_prompt > 0 {
            "PROMPT MATCH"
        } else {
            "PROMPT FAIL"
        };

        let mut lines = vec![
            "=== FACT CHECK LABEL ===".to_string(),
            format!("Verdict: {}", self.outcome),
            format!("Final Score: {:.2}", self.final_score),
            format!("External Fact Score: {:.2}", self.external_fact_score),
            format!("Context Fact Score: {:.2}", self.context_fact_score),
            format!("Quality Score: {:.2}", self.quality_score),
            format!("Prompt Alignment: {}", alignment),
            format!(
                "Claims: {} checked, {} supported, {} supported by prompt, {} infra failures",
                self.claims_checked,
                self.claims_supported,
                self.claims_supported_by_prompt,
                self.infra_fails
            ),
        ];
        if self.rank_1_fabricated {
            lines.push("Core claim is fabricated".to_string());
        }
        if !self.transparency_notes.is_empty() {
            lines.push("Transparency Notes:".to_string());
            lines.extend(self.transparency_notes.iter().map(|n| format!("- {}", n)));
        }
        lines.join("\n")
    }
}

impl fmt::Display for FactCheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.nutrition_label())
    }
}

/// Runs the fact check with a configurable matcher and threshold.
#[derive(Clone)]
pub struct FactChecker {
    matcher: Arc<dyn ContextMatcher>,
    pass_threshold: f64,
}

impl Default for FactChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl FactChecker {
    pub fn new() -> Self {
        Self {
            matcher: Arc::new(RuleMatcher::default()),
            pass_threshold: PASS_THRESHOLD,
        }
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn ContextMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_pass_threshold(mut self, threshold: f64) -> Self {
        self.pass_threshold = threshold;
        self
    }

    /// Check an output against the supplied context.
    pub fn check(&self, output: &str, context: &[ContextEntry]) -> FactCheckReport {
        let claims = extract_claims(output);
        let (for_fact_check, _) = route_claims(&claims);

        let mut external = Vec::new();
        let mut in_context = Vec::new();
        for claim in for_fact_check {
            match claim.claim_type {
                ClaimType::PromptPremise => in_context.push(check_claim_context_with(
                    self.matcher.as_ref(),
                    claim,
                    context,
                )),
                _ => external.push(check_external(claim)),
            }
        }

        tracing::debug!(
            claims = claims.len(),
            external = external.len(),
            premises = in_context.len(),
            "Claims routed"
        );

        let quality = review_quality(output, extract_intent(context));
        self.build_report(claims, external, in_context, quality)
    }

    fn build_report(
        &self,
        claims: Vec<Claim>,
        external: Vec<FactVerdict>,
        in_context: Vec<ContextMatchVerdict>,
        quality: QualityVerdict,
    ) -> FactCheckReport {
        let external_fact_score = compute_fact_score(&external);
        let context_fact_score = compute_context_score(&in_context);
        let quality_score = quality.quality_score;
        let mut final_score = external_fact_score.min(context_fact_score).min(quality_score);

        let mut transparency_notes = Vec::new();
        for v in &in_context {
            if v.verdict == ContextVerdictKind::InfraFail {
                transparency_notes.push(format!(
                    "PROMPT_PREMISE {}: excluded from scoring ({})",
                    v.claim_id, v.evidence
                ));
            } else {
                transparency_notes.push(format!(
                    "PROMPT_PREMISE {}: {} ({})",
                    v.claim_id, v.verdict, v.evidence
                ));
            }
        }

        let fact_verdicts: Vec<FactVerdict> = external
            .into_iter()
            .chain(in_context.into_iter().map(FactVerdict::from))
            .collect();

        let rank_1_fabricated = claims.iter().filter(|c| c.is_core_pillar()).any(|core| {
            fact_verdicts
                .iter()
                .any(|v| v.claim_id == core.claim_id && v.verdict.is_fabrication())
        });
        if rank_1_fabricated {
            final_score = 0.0;
        }

        let count = |kind: FactVerdictKind| fact_verdicts.iter().filter(|v| v.verdict == kind).count();
        let claims_misattributed = count(FactVerdictKind::External(ExternalVerdict::Misattributed));
        let misattributed_rate = if fact_verdicts.is_empty() {
            0.0
        } else {
            claims_misattributed as f64 / fact_verdicts.len() as f64
        };

        let outcome = if !rank_1_fabricated && final_score >= self.pass_threshold {
            FactOutcome::Pass
        } else if misattributed_rate > MISATTRIBUTION_RATE {
            FactOutcome::Misattributed
        } else {
            FactOutcome::Fail
        };

        FactCheckReport {
            outcome,
            final_score,
            external_fact_score,
            context_fact_score,
            quality_score,
            rank_1_fabricated,
            claims_checked: fact_verdicts.len(),
            claims_supported: count(FactVerdictKind::External(ExternalVerdict::Supported)),
            claims_supported_by_prompt: count(FactVerdictKind::Context(
                ContextVerdictKind::SupportedByPrompt,
            )),
            claims_contradicts_prompt: count(FactVerdictKind::Context(
                ContextVerdictKind::ContradictsPrompt,
            )),
            claims_not_found: count(FactVerdictKind::Context(ContextVerdictKind::NotFound)),
            claims_misattributed,
            claims_unsupported: count(FactVerdictKind::External(ExternalVerdict::Unsupported)),
            infra_fails: fact_verdicts.iter().filter(|v| v.verdict.is_infra_fail()).count(),
            claims,
            fact_verdicts,
            quality,
            transparency_notes,
        }
    }
}

/// Fact-check an output with the rule matcher and the default threshold.
pub fn check_facts(output: &str, context: &[ContextEntry]) -> FactCheckReport {
    FactChecker::new().check(output, context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextMatch, MatchFault};

    const REASONING: &str = "We should expand the sales team because revenue is healthy \
        and demand keeps growing, therefore hiring two people this quarter is sensible. \
        The main risk is a slower pipeline in summer.";

    fn memo() -> Vec<ContextEntry> {
        vec![ContextEntry::user_message("m1", "Revenue is 50M. Should we expand the sales team?")]
    }

    fn factual(id: &str, source: Option<&str>) -> Claim {
        Claim {
            claim_id: id.to_string(),
            text: "Market grew 4%".to_string(),
            rank: 2,
            claim_type: ClaimType::Factual,
            source_cited: source.map(String::from),
        }
    }

    struct BrokenMatcher;

    impl ContextMatcher for BrokenMatcher {
        fn match_claim(&self, _: &Claim, _: &[ContextEntry]) -> Result<ContextMatch, MatchFault> {
            Err(MatchFault::Timeout)
        }
    }

    #[test]
    fn test_check_external() {
        let url = check_external(&factual("c2", Some("[Source: https://a.example/x]")));
        assert_eq!(url.verdict, FactVerdictKind::External(ExternalVerdict::Supported));

        let internal = check_external(&factual("c2", Some("[Source: User Prompt]")));
        assert_eq!(internal.verdict, FactVerdictKind::External(ExternalVerdict::Misattributed));

        let bare = check_external(&factual("c2", None));
        assert_eq!(bare.verdict, FactVerdictKind::External(ExternalVerdict::Unsupported));
    }

    #[test]
    fn test_fact_score_weights() {
        let verdicts = vec![
            check_external(&factual("a", Some("https://a.example"))),
            check_external(&factual("b", Some("[Source: User Prompt]"))),
        ];
        assert!((compute_fact_score(&verdicts) - 0.6).abs() < 1e-9);
        assert_eq!(compute_fact_score(&[]), 1.0);
    }

    #[test]
    fn test_supported_output_passes() {
        let output = format!(
            "Revenue is 50M [Context: board memo]\nAdoption doubled [Source: https://stats.example/a]\n{}",
            REASONING
        );
        let report = check_facts(&output, &memo());
        assert_eq!(report.outcome, FactOutcome::Pass);
        assert!(!report.rank_1_fabricated);
        assert_eq!(report.claims_supported_by_prompt, 1);
        assert_eq!(report.claims_supported, 1);
        assert_eq!(report.context_fact_score, 1.0);
        assert!((report.final_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_contradicted_core_claim_is_fabricated() {
        let output = format!("Revenue is 53M [Context: board memo]\n{}", REASONING);
        let report = check_facts(&output, &memo());
        assert!(report.rank_1_fabricated);
        assert_eq!(report.final_score, 0.0);
        assert_eq!(report.outcome, FactOutcome::Fail);
        assert_eq!(report.claims_contradicts_prompt, 1);
        assert_eq!(report.context_fact_score, 0.0);
        assert!(report.transparency_notes[0].contains("CONTRADICTS_PROMPT"));
    }

    #[test]
    fn test_synthesized_core_claim_is_not_checked() {
        let report = check_facts(REASONING, &memo());
        assert!(!report.rank_1_fabricated);
        assert_eq!(report.claims_checked, 0);
        assert_eq!(report.external_fact_score, 1.0);
    }

    #[test]
    fn test_matcher_fault_is_excluded_and_counted() {
        let checker = FactChecker::new().with_matcher(Arc::new(BrokenMatcher));
        let output = format!("{}\nRevenue is 50M [Context: board memo]", REASONING);
        let report = checker.check(&output, &memo());
        assert_eq!(report.infra_fails, 1);
        assert_eq!(report.context_fact_score, 1.0);
        assert_eq!(report.claims_checked, 1);
    }

    #[test]
    fn test_misattribution_outcome() {
        let checker = FactChecker::new();
        let claims = vec![Claim {
            rank: 1,
            claim_id: "c1".to_string(),
            ..factual("c1", Some("[Source: User Prompt]"))
        }];
        let external = vec![check_external(&claims[0])];
        let report = checker.build_report(claims, external, Vec::new(), review_quality(REASONING, None));
        assert!(report.rank_1_fabricated);
        assert_eq!(report.outcome, FactOutcome::Misattributed);
        assert_eq!(report.claims_misattributed, 1);
    }

    #[test]
    fn test_nutrition_label_lines() {
        let output = format!("Revenue is 50M [Context: board memo]\n{}", REASONING);
        let label = check_facts(&output, &memo()).to_string();
        assert!(label.starts_with("=== FACT CHECK LABEL ==="));
        assert!(label.contains("Verdict: PASS"));
        assert!(label.contains("Prompt Alignment: PROMPT MATCH"));
        assert!(label.contains("Transparency Notes:"));
    }

    #[test]
    fn test_verdict_kind_wire_names() {
        let supported = FactVerdictKind::External(ExternalVerdict::Supported);
        assert_eq!(
            serde_json::to_value(supported).unwrap(),
            serde_json::json!({"check": "external", "verdict": "SUPPORTED"})
        );
        let parsed: FactVerdictKind =
            serde_json::from_str(r#"{"check": "context", "verdict": "NOT_IN_PROMPT"}"#).unwrap();
        assert_eq!(parsed, FactVerdictKind::Context(ContextVerdictKind::NotFound));
    }

    #[test]
    fn test_infra_fail_keeps_its_check() {
        let verdicts = [
            FactVerdict::from(ContextMatchVerdict::infra_fail("c1", "matcher timed out")),
            FactVerdict {
                claim_id: "c2".to_string(),
                verdict: FactVerdictKind::External(ExternalVerdict::InfraFail),
                evidence: String::new(),
                source_used: None,
            },
        ];
        for verdict in verdicts {
            let json = serde_json::to_string(&verdict).unwrap();
            let back: FactVerdict = serde_json::from_str(&json).unwrap();
            assert_eq!(back, verdict);
        }

        let report = check_facts("Revenue is 50M [Context: board memo]", &memo());
        let json = serde_json::to_string(&report).unwrap();
        let back: FactCheckReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.fact_verdicts, report.fact_verdicts);
    }
}
