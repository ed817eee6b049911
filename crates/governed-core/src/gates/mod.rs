//! Rule-based gates run before any fact checking or council vote.
//!
//! | Gate | Question |
//! |------|----------|
//! | Structural | Is the output complete in form (length, sections, sources, steps)? |
//! | Grounding | Does the output carry plausible evidentiary markers? |
//!
//! Each gate runs every check its profile enables and reports all failures
//! together. Deciding whether to stop is the pipeline's job.

mod grounding;
mod structural;

pub use grounding::{GroundingGate, UrlProbe, DEFAULT_STALE_AFTER_YEARS};
pub use structural::StructuralGate;

use crate::profiles::Profile;
use crate::types::{GateResult, Layer};

/// A verification gate.
pub trait Gate: Send + Sync {
    /// Layer reported when this gate stops a run.
    fn layer(&self) -> Layer;

    /// Run every check enabled by `profile` against `text`.
    fn run(&self, text: &str, profile: &Profile) -> GateResult;
}
