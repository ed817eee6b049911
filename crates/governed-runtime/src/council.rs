//! Reviewer council execution.
//!
//! Every seat gets its own task in a [`JoinSet`]. A seat that errors, times
//! out or panics still yields a verdict: a pessimistic reject with
//! `parse_success = false`. Cancelling the run (or hitting the council
//! deadline) aborts whatever is still outstanding and fills the empty seats
//! the same way, so the aggregate is always over `council_size` votes.

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

use governed_core::{
    aggregate_votes, generate_council_tasks_with, AggregateResult, CouncilVerdict, FactChecker,
    Pipeline, TaskContract, VerificationResult,
};

use crate::cache::CachedReviewer;
use crate::config::RuntimeConfig;
use crate::providers::LlmProvider;
use crate::resilience::{BudgetTracker, ReviewUsage};
use crate::reviewer::{ProviderReviewer, Reviewer, ReviewerError};

/// Default ceiling for a single reviewer call.
pub const DEFAULT_REVIEWER_TIMEOUT: Duration = Duration::from_secs(60);

fn reviewer_id(idx: usize) -> String {
    format!("reviewer-{}", idx + 1)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run one seat to a verdict. Never fails and never panics.
async fn review_seat(
    reviewer: Arc<dyn Reviewer>,
    prompt: String,
    timeout: Duration,
    reviewer_id: String,
) -> CouncilVerdict {
    let call = AssertUnwindSafe(reviewer.review(&prompt)).catch_unwind();

    let error = match tokio::time::timeout(timeout, call).await {
        Ok(Ok(Ok(raw))) => {
            let verdict = CouncilVerdict::from_output(&raw, reviewer_id);
            if !verdict.parse_success {
                tracing::warn!(reviewer = %verdict.reviewer_id, "Unreadable reviewer answer");
            }
            return verdict;
        }
        Ok(Ok(Err(e))) => e,
        Ok(Err(payload)) => ReviewerError::Panicked(panic_message(payload.as_ref())),
        Err(_) => ReviewerError::Timeout(timeout),
    };

    tracing::warn!(
        reviewer = %reviewer_id,
        backend = reviewer.name(),
        error = %error,
        "Reviewer failed, counting as reject"
    );
    CouncilVerdict::failed(reviewer_id, error.to_string())
}

/// A council of reviewers.
///
/// Seats are assigned round-robin over the configured reviewers, so a
/// single reviewer can fill every seat; each seat's prompt carries its own
/// `[Reviewer i/N]` label.
pub struct Council {
    reviewers: Vec<Arc<dyn Reviewer>>,
    reviewer_timeout: Duration,
    council_timeout: Option<Duration>,
    instruction: Option<String>,
    fact_checker: FactChecker,
    budget: Option<Arc<BudgetTracker>>,
}

impl Council {
    pub fn new(reviewers: Vec<Arc<dyn Reviewer>>) -> Self {
        Self {
            reviewers,
            reviewer_timeout: DEFAULT_REVIEWER_TIMEOUT,
            council_timeout: None,
            instruction: None,
            fact_checker: FactChecker::new(),
            budget: None,
        }
    }

    /// Provider-backed council with retry, a shared token budget and, when
    /// enabled, a response cache.
    pub fn from_config(provider: Arc<dyn LlmProvider>, config: &RuntimeConfig) -> Self {
        let budget = Arc::new(BudgetTracker::new(
            config.budget.global_max_tokens,
            config.budget.per_call_max_tokens,
        ));
        let reviewer = ProviderReviewer::from_config(provider, config).with_budget(budget.clone());

        let reviewer: Arc<dyn Reviewer> = if config.cache.enabled {
            Arc::new(CachedReviewer::from_config(reviewer, &config.cache))
        } else {
            Arc::new(reviewer)
        };

        let mut council = Self::new(vec![reviewer]).with_reviewer_timeout(config.reviewer_timeout);
        council.council_timeout = config.council_timeout;
        council.instruction = config.reviewer_instruction.clone();
        council.budget = Some(budget);
        council
    }

    pub fn with_reviewer_timeout(mut self, timeout: Duration) -> Self {
        self.reviewer_timeout = timeout;
        self
    }

    pub fn with_council_timeout(mut self, timeout: Duration) -> Self {
        self.council_timeout = Some(timeout);
        self
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    pub fn with_fact_checker(mut self, checker: FactChecker) -> Self {
        self.fact_checker = checker;
        self
    }

    /// Token usage so far, for provider-backed councils.
    pub fn usage(&self) -> Option<ReviewUsage> {
        self.budget.as_ref().map(|b| b.usage())
    }

    /// Collect one verdict per seat and aggregate them.
    pub async fn vote(&self, contract: &TaskContract, output: &str) -> AggregateResult {
        self.vote_until(contract, output, std::future::pending()).await
    }

    /// Like [`Council::vote`], but stops early once `cancel` resolves.
    pub async fn vote_until<F>(
        &self,
        contract: &TaskContract,
        output: &str,
        cancel: F,
    ) -> AggregateResult
    where
        F: Future<Output = ()>,
    {
        let prompts = generate_council_tasks_with(contract, output, self.instruction.as_deref());
        let size = prompts.len();
        let mut slots: Vec<Option<CouncilVerdict>> = (0..size).map(|_| None).collect();

        if self.reviewers.is_empty() {
            tracing::warn!(seats = size, "Council has no reviewers");
        }

        let mut tasks = JoinSet::new();
        for (idx, prompt) in prompts.into_iter().enumerate() {
            let Some(reviewer) = self.reviewers.get(idx % self.reviewers.len().max(1)) else {
                continue;
            };
            let reviewer = Arc::clone(reviewer);
            let timeout = self.reviewer_timeout;
            tasks.spawn(async move {
                let verdict = review_seat(reviewer, prompt, timeout, reviewer_id(idx)).await;
                (idx, verdict)
            });
        }

        let council_timeout = self.council_timeout;
        let deadline = async move {
            match council_timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(cancel);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                joined = tasks.join_next() => match joined {
                    Some(Ok((idx, verdict))) => slots[idx] = Some(verdict),
                    Some(Err(e)) => tracing::warn!(error = %e, "Reviewer task ended abnormally"),
                    None => break,
                },
                _ = &mut cancel => {
                    tracing::warn!(pending = tasks.len(), "Council cancelled");
                    tasks.abort_all();
                    break;
                }
                _ = &mut deadline => {
                    tracing::warn!(
                        pending = tasks.len(),
                        timeout = ?council_timeout,
                        "Council deadline reached"
                    );
                    tasks.abort_all();
                    break;
                }
            }
        }

        let verdicts = slots
            .into_iter()
            .enumerate()
            .map(|(idx, slot)| {
                slot.unwrap_or_else(|| {
                    CouncilVerdict::failed(reviewer_id(idx), "no verdict before the council stopped")
                })
            })
            .collect();

        let result = aggregate_votes(verdicts);
        tracing::info!(
            approvals = result.approvals,
            total = result.total,
            parse_failures = result.parse_failures,
            passed = result.passed,
            "Council finished"
        );
        result
    }

    /// Fact check and vote on one output; `passed` follows the vote.
    pub async fn run_council(
        &self,
        task_id: &str,
        contract: &TaskContract,
        output: &str,
    ) -> VerificationResult {
        self.run_council_until(task_id, contract, output, std::future::pending())
            .await
    }

    pub async fn run_council_until<F>(
        &self,
        task_id: &str,
        contract: &TaskContract,
        output: &str,
        cancel: F,
    ) -> VerificationResult
    where
        F: Future<Output = ()>,
    {
        let report = self
            .fact_checker
            .check(output, &contract.user_provided_context);
        tracing::info!(
            task_id,
            context_fact_score = report.context_fact_score,
            outcome = ?report.outcome,
            "Fact check complete"
        );

        let result = VerificationResult::cleared(true, Vec::new()).with_fact_check(report);
        let aggregate = self.vote_until(contract, output, cancel).await;
        tracing::info!(task_id, passed = aggregate.passed, "Council verdict");
        merge_vote(result, aggregate)
    }
}

/// Attach a council vote; the vote decides `passed`.
fn merge_vote(mut result: VerificationResult, aggregate: AggregateResult) -> VerificationResult {
    result.passed = aggregate.passed;
    if !aggregate.passed {
        result.failures.push(aggregate.summary.clone());
    }
    result.council = Some(aggregate);
    result
}

/// Gates first, then the council when the gates ask for one.
pub struct GovernedVerifier {
    pipeline: Pipeline,
    council: Council,
}

impl GovernedVerifier {
    pub fn new(pipeline: Pipeline, council: Council) -> Self {
        Self { pipeline, council }
    }

    pub fn council(&self) -> &Council {
        &self.council
    }

    pub async fn verify(&self, contract: &TaskContract, output: &str) -> VerificationResult {
        self.verify_until(contract, output, std::future::pending())
            .await
    }

    pub async fn verify_until<F>(
        &self,
        contract: &TaskContract,
        output: &str,
        cancel: F,
    ) -> VerificationResult
    where
        F: Future<Output = ()>,
    {
        let mut result = self.pipeline.run(contract, output);
        if !result.passed || !result.needs_council {
            return result;
        }

        // Custom tasks outside council mode reach here without a fact check.
        if result.fact_check.is_none() {
            let report = self
                .pipeline
                .fact_checker()
                .check(output, &contract.user_provided_context);
            result = result.with_fact_check(report);
        }

        let aggregate = self.council.vote_until(contract, output, cancel).await;
        merge_vote(result, aggregate)
    }
}
