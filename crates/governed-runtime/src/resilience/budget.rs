//! Token budgets for reviewer calls.
//!
//! A council run shares one [`BudgetTracker`]: every call must fit both the
//! per-call ceiling and what is left of the global budget.
//!
//! Seats run concurrently, so a call reserves its estimate before it is sent
//! ([`BudgetTracker::try_reserve`]). The reservation is settled to the actual
//! usage when the call returns, or released if the call fails.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::providers::TokenUsage;

/// A token allowance drawn down by recorded usage.
pub struct TokenBudget {
    pub max_tokens: u32,
    used: AtomicU32,
}

impl TokenBudget {
    pub fn new(max_tokens: u32) -> Self {
        Self {
            max_tokens,
            used: AtomicU32::new(0),
        }
    }

    pub fn can_afford(&self, tokens: u32) -> bool {
        self.remaining() >= tokens
    }

    pub fn record(&self, tokens: u32) {
        self.used.fetch_add(tokens, Ordering::SeqCst);
    }

    /// Take `tokens` from the budget if they fit. Check and take are one step.
    pub fn try_take(&self, tokens: u32) -> bool {
        self.used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                let total = used.checked_add(tokens)?;
                (total <= self.max_tokens).then_some(total)
            })
            .is_ok()
    }

    /// Give back tokens taken earlier.
    pub fn release(&self, tokens: u32) {
        let _ = self
            .used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                Some(used.saturating_sub(tokens))
            });
    }

    pub fn remaining(&self) -> u32 {
        self.max_tokens.saturating_sub(self.used.load(Ordering::SeqCst))
    }

    pub fn used(&self) -> u32 {
        self.used.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.used.store(0, Ordering::SeqCst);
    }
}

/// Accumulated usage across reviewer calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewUsage {
    pub total_tokens: u32,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub calls: u32,
    /// Estimated cost in USD
    pub estimated_cost: f64,
}

impl ReviewUsage {
    pub fn add(&mut self, usage: &TokenUsage, model: &str) {
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
        self.total_tokens += usage.total();
        self.calls += 1;
        self.estimated_cost += Self::estimate_cost(usage, model);
    }

    fn estimate_cost(usage: &TokenUsage, model: &str) -> f64 {
        // USD per million tokens
        let (input_rate, output_rate) = match model {
            m if m.contains("opus") => (5.0, 25.0),
            m if m.contains("haiku") => (1.0, 5.0),
            _ => (3.0, 15.0),
        };
        (usage.prompt_tokens as f64 / 1_000_000.0) * input_rate
            + (usage.completion_tokens as f64 / 1_000_000.0) * output_rate
    }
}

/// Global and per-call token limits for one council.
pub struct BudgetTracker {
    global_budget: TokenBudget,
    per_call_max: u32,
    usage: RwLock<ReviewUsage>,
}

impl BudgetTracker {
    pub fn new(global_max: u32, per_call_max: u32) -> Self {
        Self {
            global_budget: TokenBudget::new(global_max),
            per_call_max,
            usage: RwLock::new(ReviewUsage::default()),
        }
    }

    /// Whether a call estimated at `estimated_tokens` may go out.
    pub fn can_afford(&self, estimated_tokens: u32) -> bool {
        estimated_tokens <= self.per_call_max && self.global_budget.can_afford(estimated_tokens)
    }

    /// Reserve `estimated_tokens` for one call, or `None` when it does not fit.
    pub fn try_reserve(&self, estimated_tokens: u32) -> Option<Reservation<'_>> {
        if estimated_tokens > self.per_call_max || !self.global_budget.try_take(estimated_tokens) {
            return None;
        }
        Some(Reservation {
            tracker: self,
            tokens: estimated_tokens,
            settled: false,
        })
    }

    pub fn record_usage(&self, usage: &TokenUsage, model: &str) {
        self.global_budget.record(usage.total());
        self.usage.write().add(usage, model);
    }

    pub fn usage(&self) -> ReviewUsage {
        self.usage.read().clone()
    }

    pub fn remaining(&self) -> u32 {
        self.global_budget.remaining()
    }

    pub fn reset(&self) {
        self.global_budget.reset();
        *self.usage.write() = ReviewUsage::default();
    }
}

/// Tokens held for one in-flight call. Dropping it unsettled releases them.
#[must_use = "an unsettled reservation is released on drop"]
pub struct Reservation<'a> {
    tracker: &'a BudgetTracker,
    tokens: u32,
    settled: bool,
}

impl Reservation<'_> {
    pub fn tokens(&self) -> u32 {
        self.tokens
    }

    /// Replace the reserved estimate with what the call actually used.
    pub fn settle(mut self, usage: &TokenUsage, model: &str) {
        let budget = &self.tracker.global_budget;
        let actual = usage.total();
        if actual >= self.tokens {
            budget.record(actual - self.tokens);
        } else {
            budget.release(self.tokens - actual);
        }
        self.tracker.usage.write().add(usage, model);
        self.settled = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.tracker.global_budget.release(self.tokens);
        }
    }
}

impl Default for BudgetTracker {
    fn default() -> Self {
        Self::new(50_000, 8_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_budget_enforcement() {
        let budget = TokenBudget::new(100);
        assert!(budget.can_afford(100));
        assert!(!budget.can_afford(101));

        budget.record(60);
        assert_eq!(budget.remaining(), 40);
        assert_eq!(budget.used(), 60);
        assert!(!budget.can_afford(50));

        budget.record(100);
        assert_eq!(budget.remaining(), 0);

        budget.reset();
        assert_eq!(budget.remaining(), 100);
    }

    #[test]
    fn test_tracker_applies_both_limits() {
        let tracker = BudgetTracker::new(1000, 300);
        assert!(tracker.can_afford(300));
        assert!(!tracker.can_afford(301));

        let usage = TokenUsage {
            prompt_tokens: 600,
            completion_tokens: 200,
        };
        tracker.record_usage(&usage, "claude-sonnet-4-5");
        assert_eq!(tracker.remaining(), 200);
        assert!(!tracker.can_afford(250));
        assert!(tracker.can_afford(200));
    }

    #[test]
    fn test_usage_accumulates() {
        let tracker = BudgetTracker::default();
        let usage = TokenUsage {
            prompt_tokens: 1_000_000,
            completion_tokens: 0,
        };
        tracker.record_usage(&usage, "claude-haiku-4-5");
        tracker.record_usage(&usage, "claude-sonnet-4-5");

        let total = tracker.usage();
        assert_eq!(total.calls, 2);
        assert_eq!(total.prompt_tokens, 2_000_000);
        assert!((total.estimated_cost - 4.0).abs() < 1e-9);

        tracker.reset();
        assert_eq!(tracker.usage(), ReviewUsage::default());
    }

    #[test]
    fn test_reservation_holds_until_settled() {
        let tracker = BudgetTracker::new(1_200, 1_000);
        let first = tracker.try_reserve(700).unwrap();
        assert_eq!(tracker.remaining(), 500);
        assert!(tracker.try_reserve(700).is_none());
        assert!(tracker.try_reserve(1_001).is_none());

        first.settle(
            &TokenUsage {
                prompt_tokens: 400,
                completion_tokens: 100,
            },
            "claude-sonnet-4-5",
        );
        assert_eq!(tracker.remaining(), 700);
        assert_eq!(tracker.usage().calls, 1);
        assert!(tracker.try_reserve(700).is_some());
    }

    #[test]
    fn test_dropped_reservation_is_released() {
        let tracker = BudgetTracker::new(1_000, 1_000);
        {
            let _held = tracker.try_reserve(900).unwrap();
            assert_eq!(tracker.remaining(), 100);
        }
        assert_eq!(tracker.remaining(), 1_000);
        assert_eq!(tracker.usage().calls, 0);
    }

    #[test]
    fn test_concurrent_reservations_never_overspend() {
        let tracker = BudgetTracker::new(1_000, 1_000);
        let granted: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let tracker = &tracker;
                    scope.spawn(move || {
                        let reservation = tracker.try_reserve(300);
                        let granted = reservation.is_some();
                        std::mem::forget(reservation);
                        granted as usize
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });
        assert_eq!(granted, 3);
        assert_eq!(tracker.remaining(), 100);
    }

    proptest! {
        #[test]
        fn prop_remaining_tracks_usage(max in 0u32..100_000, spends in prop::collection::vec(0u32..5_000, 0..20)) {
            let budget = TokenBudget::new(max);
            for &tokens in &spends {
                budget.record(tokens);
            }
            let used: u32 = spends.iter().sum();
            prop_assert_eq!(budget.used(), used);
            prop_assert_eq!(budget.remaining(), max.saturating_sub(used));
            prop_assert!(budget.remaining() <= max);
        }
    }
}
