//! # governed-core
//!
//! Deterministic verification of agent output against a task contract.
//!
//! This crate answers, without calling a language model:
//! - Is the output complete in form?
//! - Does it carry evidence markers?
//! - Do the claims it restates from the user match what the user said?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same contract and output always produce the same result
//! 2. **No LLM calls**: Gates, claim matching and vote aggregation are rule-based
//! 3. **Fail-closed**: Unreadable reviewer answers count as rejections; matcher
//!    faults become `INFRA_FAIL` and are excluded from scoring, never passed
//! 4. **Never errors on unknown task types**: They get the permissive custom profile
//!
//! ## Example
//!
//! ```rust,ignore
//! use governed_core::{run_non_coding_verification, TaskContract};
//!
//! let contract = TaskContract::from_yaml_file("contract.yaml")?;
//! let result = run_non_coding_verification(&contract, &output);
//!
//! if !result.passed {
//!     println!("stopped at {:?}: {:?}", result.layer_failed, result.failures);
//! } else if result.needs_council {
//!     let prompts = generate_council_tasks(&contract, &output);
//!     // dispatch prompts, parse answers with CouncilVerdict::from_output
//! }
//! ```

pub mod claims;
pub mod context;
pub mod contract;
pub mod council;
pub mod facts;
pub mod gates;
pub mod patterns;
pub mod pipeline;
pub mod profiles;
pub mod quality;
pub mod types;

// Re-export main types at crate root
pub use claims::{
    count_sources, extract_claims, route_claims, Claim, ClaimType, SourceCounts, SourceKind,
};
pub use context::{
    check_claim_context, check_claim_context_with, compute_context_score, ContextMatch,
    ContextMatchVerdict, ContextMatcher, ContextVerdictKind, MatchFault, MatchKind, RuleMatcher,
    VACUOUS_CONTEXT_SCORE,
};
pub use contract::{normalize_legacy_context, ContextEntry, ContractError, TaskContract};
pub use council::{
    aggregate_votes, generate_council_tasks, generate_council_tasks_with,
    generate_reviewer_prompt, AggregateResult, CouncilVerdict, Vote,
};
pub use facts::{
    check_external, check_facts, compute_fact_score, ExternalVerdict, FactCheckReport,
    FactChecker, FactOutcome, FactVerdict, FactVerdictKind, PASS_THRESHOLD,
};
pub use gates::{Gate, GroundingGate, StructuralGate, UrlProbe};
pub use pipeline::{run_non_coding_verification, Pipeline};
pub use profiles::{get_profile, Profile, ProfileError, ProfileRegistry};
pub use quality::{extract_intent, review_quality, QualityVerdict};
pub use types::{GateResult, Layer, TaskType, VerificationMode, VerificationResult};
