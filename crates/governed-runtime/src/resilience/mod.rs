//! Cost controls around reviewer calls.

pub mod budget;

pub use budget::{BudgetTracker, Reservation, ReviewUsage, TokenBudget};
