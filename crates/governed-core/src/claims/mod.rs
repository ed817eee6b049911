//! Claim extraction.
//!
//! An output is split into at most [`MAX_CLAIMS`] atomic claims, one per
//! non-empty line. Each claim is typed by the pointer it cites so it can be
//! routed: prompt premises are checked against the supplied context, factual
//! claims against their external pointer, and everything feeds the quality
//! review.

mod sources;

pub use sources::{classify_pointer, count_sources, SourceCounts, SourceKind};

use serde::{Deserialize, Serialize};

use crate::patterns::{POINTER_PATTERN, URL_PATTERN};

/// Claims kept per output; the first is the core pillar.
pub const MAX_CLAIMS: usize = 6;

/// What kind of assertion a claim makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimType {
    /// Asserts an external fact.
    Factual,
    /// The agent's own reasoning.
    SynthesizedLogic,
    /// Restates something the user or supplied context asserted.
    PromptPremise,
}

/// An atomic assertion extracted from agent output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub claim_id: String,
    pub text: String,
    /// 1-based extraction order
    pub rank: usize,
    pub claim_type: ClaimType,
    /// First URL or bracketed pointer in the text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_cited: Option<String>,
}

impl Claim {
    /// A prompt-premise claim with no cited pointer.
    pub fn premise(claim_id: impl Into<String>, text: impl Into<String>, rank: usize) -> Self {
        Self {
            claim_id: claim_id.into(),
            text: text.into(),
            rank,
            claim_type: ClaimType::PromptPremise,
            source_cited: None,
        }
    }

    /// Whether this is the highest-ranked claim of its output.
    pub fn is_core_pillar(&self) -> bool {
        self.rank == 1
    }
}

/// First URL or bracketed pointer in `text`, whichever starts earlier.
fn first_source(text: &str) -> Option<String> {
    let pointer = POINTER_PATTERN.find(text);
    let url = URL_PATTERN.find(text);
    match (pointer, url) {
        (Some(p), Some(u)) if u.start() < p.start() => Some(u.as_str().to_string()),
        (Some(p), _) => Some(p.as_str().to_string()),
        (None, Some(u)) => Some(u.as_str().to_string()),
        (None, None) => None,
    }
}

fn initial_claim_type(text: &str) -> ClaimType {
    if POINTER_PATTERN.is_match(text) {
        match classify_pointer(text) {
            SourceKind::Internal => ClaimType::PromptPremise,
            SourceKind::Dependency => ClaimType::SynthesizedLogic,
            SourceKind::External | SourceKind::None => ClaimType::Factual,
        }
    } else if URL_PATTERN.is_match(text) {
        ClaimType::Factual
    } else {
        ClaimType::SynthesizedLogic
    }
}

/// Fix a type that disagrees with the pointer actually cited.
fn reconcile_claim_type(claim_type: ClaimType, source_cited: Option<&str>) -> ClaimType {
    let source = source_cited.unwrap_or_default().to_lowercase();
    match claim_type {
        ClaimType::Factual
            if source.contains("user prompt") || source.starts_with("[context:") =>
        {
            tracing::debug!("Claim type corrected: FACTUAL -> PROMPT_PREMISE");
            ClaimType::PromptPremise
        }
        ClaimType::PromptPremise if source.starts_with("http") => {
            tracing::debug!("Claim type corrected: PROMPT_PREMISE -> FACTUAL");
            ClaimType::Factual
        }
        other => other,
    }
}

fn trim_bullet(line: &str) -> &str {
    line.trim_matches(|c: char| c.is_whitespace() || c == '-' || c == '*')
}

/// Extract up to [`MAX_CLAIMS`] claims from an output, one per line.
pub fn extract_claims(output: &str) -> Vec<Claim> {
    let mut candidates: Vec<&str> = output
        .lines()
        .map(trim_bullet)
        .filter(|line| !line.is_empty())
        .collect();

    if candidates.is_empty() && !output.trim().is_empty() {
        candidates.push(output.trim());
    }

    candidates
        .into_iter()
        .take(MAX_CLAIMS)
        .enumerate()
        .map(|(i, text)| {
            let rank = i + 1;
            let source_cited = first_source(text);
            let claim_type = reconcile_claim_type(initial_claim_type(text), source_cited.as_deref());
            Claim {
                claim_id: format!("c{}", rank),
                text: text.to_string(),
                rank,
                claim_type,
                source_cited,
            }
        })
        .collect()
}

/// Split claims into those needing a fact check and those for quality review.
///
/// Factual and prompt-premise claims are fact-checked; every claim is
/// reviewed for quality.
pub fn route_claims(claims: &[Claim]) -> (Vec<&Claim>, &[Claim]) {
    let for_fact_check = claims
        .iter()
        .filter(|c| matches!(c.claim_type, ClaimType::Factual | ClaimType::PromptPremise))
        .collect();
    (for_fact_check, claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_claims_types_and_ranks() {
        let output = "- Revenue is 50M [Context: board memo]\n\
                      * Market grew 4% [Source: https://stats.example/m]\n\
                      \n\
                      We should therefore expand.\n\
                      Timeline follows [Source: Task 9]";
        let claims = extract_claims(output);
        assert_eq!(claims.len(), 4);

        assert_eq!(claims[0].claim_id, "c1");
        assert_eq!(claims[0].rank, 1);
        assert!(claims[0].is_core_pillar());
        assert_eq!(claims[0].text, "Revenue is 50M [Context: board memo]");
        assert_eq!(claims[0].claim_type, ClaimType::PromptPremise);
        assert_eq!(claims[0].source_cited.as_deref(), Some("[Context: board memo]"));

        assert_eq!(claims[1].claim_type, ClaimType::Factual);
        assert_eq!(claims[2].claim_type, ClaimType::SynthesizedLogic);
        assert_eq!(claims[2].source_cited, None);
        assert_eq!(claims[3].claim_type, ClaimType::SynthesizedLogic);
    }

    #[test]
    fn test_extract_claims_caps_at_max() {
        let output = (1..=10).map(|i| format!("line {}", i)).collect::<Vec<_>>().join("\n");
        let claims = extract_claims(&output);
        assert_eq!(claims.len(), MAX_CLAIMS);
        assert_eq!(claims.last().unwrap().claim_id, "c6");
    }

    #[test]
    fn test_extract_claims_empty() {
        assert!(extract_claims("").is_empty());
        assert!(extract_claims("\n \n").is_empty());
    }

    #[test]
    fn test_bare_url_is_factual() {
        let claims = extract_claims("Adoption doubled, see https://a.example/x");
        assert_eq!(claims[0].claim_type, ClaimType::Factual);
        assert_eq!(claims[0].source_cited.as_deref(), Some("https://a.example/x"));
    }

    #[test]
    fn test_url_before_context_pointer_is_factual() {
        let claims = extract_claims("https://a.example/x agrees with [Context: memo]");
        assert_eq!(claims[0].claim_type, ClaimType::Factual);
    }

    #[test]
    fn test_route_claims() {
        let claims = extract_claims(
            "Revenue is 50M [Source: User Prompt]\nSo we grow.\nSee https://a.example",
        );
        let (facts, all) = route_claims(&claims);
        assert_eq!(facts.len(), 2);
        assert_eq!(all.len(), 3);
        assert!(facts.iter().all(|c| c.claim_type != ClaimType::SynthesizedLogic));
    }
}
