//! Response cache for reviewers.
//!
//! Re-running a council over an unchanged output sends the same prompts
//! again; [`CachedReviewer`] answers those from memory. Only successful
//! answers are stored, so a failed call is always retried on the next run.

use async_trait::async_trait;
use moka::future::Cache;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use crate::config::CacheConfig;
use crate::reviewer::{Reviewer, ReviewerError};

/// Key for a prompt sent to a named reviewer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    reviewer_hash: u64,
    prompt_hash: u64,
}

impl CacheKey {
    pub fn new(reviewer: &str, prompt: &str) -> Self {
        Self {
            reviewer_hash: hash_str(reviewer),
            prompt_hash: hash_str(prompt),
        }
    }
}

fn hash_str(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

/// Wraps a reviewer with a moka cache.
pub struct CachedReviewer<R> {
    inner: R,
    cache: Cache<CacheKey, String>,
}

impl<R: Reviewer> CachedReviewer<R> {
    pub fn new(inner: R, max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();
        Self { inner, cache }
    }

    pub fn from_config(inner: R, config: &CacheConfig) -> Self {
        Self::new(inner, config.max_entries, config.ttl)
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait]
impl<R: Reviewer> Reviewer for CachedReviewer<R> {
    async fn review(&self, prompt: &str) -> Result<String, ReviewerError> {
        let key = CacheKey::new(self.inner.name(), prompt);
        if let Some(answer) = self.cache.get(&key).await {
            tracing::debug!(reviewer = self.inner.name(), "Review served from cache");
            return Ok(answer);
        }

        let answer = self.inner.review(prompt).await?;
        self.cache.insert(key, answer.clone()).await;
        Ok(answer)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct CountingReviewer {
        calls: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl Reviewer for CountingReviewer {
        async fn review(&self, prompt: &str) -> Result<String, ReviewerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ProviderError::HttpError("connection reset".to_string()).into());
            }
            Ok(format!("answer to {}", prompt))
        }
    }

    fn counting(fail: bool) -> Arc<CountingReviewer> {
        Arc::new(CountingReviewer {
            calls: AtomicU32::new(0),
            fail,
        })
    }

    #[tokio::test]
    async fn test_repeat_prompt_hits_cache() {
        let inner = counting(false);
        let reviewer = CachedReviewer::new(inner.clone(), 100, Duration::from_secs(60));

        let first = reviewer.review("prompt A").await.unwrap();
        let second = reviewer.review("prompt A").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);

        reviewer.review("prompt B").await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let inner = counting(true);
        let reviewer = CachedReviewer::new(inner.clone(), 100, Duration::from_secs(60));

        assert!(reviewer.review("prompt").await.is_err());
        assert!(reviewer.review("prompt").await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_key_depends_on_reviewer_and_prompt() {
        assert_eq!(CacheKey::new("a", "p"), CacheKey::new("a", "p"));
        assert_ne!(CacheKey::new("a", "p"), CacheKey::new("b", "p"));
        assert_ne!(CacheKey::new("a", "p"), CacheKey::new("a", "q"));
    }
}
