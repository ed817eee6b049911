//! # governed-runtime
//!
//! Async reviewer council for governed agent verification.
//!
//! `governed-core` decides whether an output clears the gates and whether a
//! council is needed. This crate runs that council: it sends one prompt per
//! seat to LLM-backed reviewers, concurrently, and aggregates the votes.
//!
//! ## Failure handling
//!
//! A reviewer that errors, times out or panics counts as a reject with
//! `parse_success = false`. Cancellation and the optional council deadline
//! fill the seats still open the same way. A council never passes by
//! default.
//!
//! ## Example
//!
//! ```rust,ignore
//! use governed_runtime::{AnthropicProvider, Council, GovernedVerifier, RuntimeConfig};
//!
//! let config = RuntimeConfig::from_file("runtime.yaml")?;
//! let provider = Arc::new(AnthropicProvider::from_env()?);
//! let verifier = GovernedVerifier::new(Pipeline::new(), Council::from_config(provider, &config));
//!
//! let result = verifier.verify(&contract, &output).await;
//! ```

pub mod cache;
pub mod config;
pub mod council;
pub mod prompts;
pub mod providers;
pub mod resilience;
pub mod reviewer;

pub use cache::CachedReviewer;
pub use config::{BudgetConfig, CacheConfig, ConfigError, RetryConfig, RuntimeConfig};
pub use council::{Council, GovernedVerifier, DEFAULT_REVIEWER_TIMEOUT};
pub use providers::{
    ApiCredential, ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError,
    TokenUsage,
};
pub use resilience::{BudgetTracker, ReviewUsage};
pub use reviewer::{ProviderReviewer, Reviewer, ReviewerError};

#[cfg(feature = "anthropic")]
pub use providers::{AnthropicProvider, ANTHROPIC_API_KEY_ENV};
