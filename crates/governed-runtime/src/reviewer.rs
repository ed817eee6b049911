//! Council reviewers.
//!
//! A [`Reviewer`] turns one review prompt into raw answer text. The council
//! parses the text itself, so a reviewer never needs to understand the
//! verdict format.

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{RetryConfig, RuntimeConfig};
use crate::prompts::{reviewer_messages, REVIEWER_SYSTEM_PROMPT};
use crate::providers::{CompletionConfig, LlmProvider, ProviderError};
use crate::resilience::BudgetTracker;

#[derive(Error, Debug)]
pub enum ReviewerError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Token budget exceeded: need ~{estimated}, {remaining} left")]
    BudgetExceeded { estimated: u32, remaining: u32 },

    #[error("Reviewer timed out after {0:?}")]
    Timeout(Duration),

    #[error("Reviewer panicked: {0}")]
    Panicked(String),
}

/// One council seat.
#[async_trait]
pub trait Reviewer: Send + Sync {
    async fn review(&self, prompt: &str) -> Result<String, ReviewerError>;

    /// Name for logs.
    fn name(&self) -> &str {
        "reviewer"
    }
}

#[async_trait]
impl<R: Reviewer + ?Sized> Reviewer for Arc<R> {
    async fn review(&self, prompt: &str) -> Result<String, ReviewerError> {
        (**self).review(prompt).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// A reviewer backed by a chat-completion provider.
///
/// Transient provider errors are retried with exponential backoff. When a
/// budget tracker is attached, each call reserves its estimate before it is
/// sent and is refused if the reservation does not fit.
pub struct ProviderReviewer {
    provider: Arc<dyn LlmProvider>,
    completion: CompletionConfig,
    retry: RetryConfig,
    budget: Option<Arc<BudgetTracker>>,
}

impl ProviderReviewer {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            completion: CompletionConfig::default(),
            retry: RetryConfig::default(),
            budget: None,
        }
    }

    pub fn from_config(provider: Arc<dyn LlmProvider>, config: &RuntimeConfig) -> Self {
        Self {
            provider,
            completion: config.completion_config(),
            retry: config.retry.clone(),
            budget: None,
        }
    }

    pub fn with_completion(mut self, completion: CompletionConfig) -> Self {
        self.completion = completion;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_budget(mut self, budget: Arc<BudgetTracker>) -> Self {
        self.budget = Some(budget);
        self
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.retry.min_delay)
            .with_max_delay(self.retry.max_delay)
            .with_max_times(self.retry.max_attempts)
    }

    fn estimate(&self, prompt: &str) -> u32 {
        self.provider.estimate_tokens(REVIEWER_SYSTEM_PROMPT)
            + self.provider.estimate_tokens(prompt)
            + self.completion.max_tokens
    }
}

#[async_trait]
impl Reviewer for ProviderReviewer {
    async fn review(&self, prompt: &str) -> Result<String, ReviewerError> {
        // Held across the call; released on any early return.
        let reservation = match &self.budget {
            Some(budget) => {
                let estimated = self.estimate(prompt);
                match budget.try_reserve(estimated) {
                    Some(reservation) => Some(reservation),
                    None => {
                        return Err(ReviewerError::BudgetExceeded {
                            estimated,
                            remaining: budget.remaining(),
                        });
                    }
                }
            }
            None => None,
        };

        let messages = reviewer_messages(prompt);
        let provider = &self.provider;
        let completion = &self.completion;
        let messages = &messages;

        let response = (|| async move { provider.complete(messages.clone(), completion).await })
            .retry(self.backoff())
            .when(|e: &ProviderError| e.is_retryable())
            .notify(|e: &ProviderError, delay: Duration| {
                tracing::warn!(
                    provider = provider.name(),
                    error = %e,
                    retry_in = ?delay,
                    "Reviewer call failed, retrying"
                );
            })
            .await?;

        if let Some(reservation) = reservation {
            reservation.settle(&response.usage, &response.model);
        }

        Ok(response.content)
    }

    fn name(&self) -> &str {
        self.provider.name()
    }
}
