//! Grounding Gate
//!
//! **Question**: Does the output carry plausible markers of evidence?
//!
//! | Check | Effect |
//! |-------|--------|
//! | `citations_present` | Fails when no citation-like marker appears |
//! | `dates_valid` | Warning only: future, stale or impossible dates |
//! | `url_reachable` | Fails on unreachable URLs, only when a probe is configured |

use chrono::{Datelike, NaiveDate, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::patterns::{contains_citation, ISO_DATE, URL_PATTERN, YEAR_PATTERN};
use crate::profiles::{GroundingCheck, Profile};
use crate::types::{GateResult, Layer};

use super::Gate;

/// Years older than this, relative to the reference date, are flagged as stale.
pub const DEFAULT_STALE_AFTER_YEARS: i32 = 5;

/// Reachability check for URLs cited in an output.
///
/// Network access is outside the core; callers plug in their own probe.
pub trait UrlProbe: Send + Sync {
    fn is_reachable(&self, url: &str) -> bool;
}

/// The grounding gate.
#[derive(Clone)]
pub struct GroundingGate {
    today: NaiveDate,
    stale_after_years: i32,
    probe: Option<Arc<dyn UrlProbe>>,
}

impl GroundingGate {
    /// Gate dated today, with no URL probe.
    pub fn new() -> Self {
        Self {
            today: Utc::now().date_naive(),
            stale_after_years: DEFAULT_STALE_AFTER_YEARS,
            probe: None,
        }
    }

    /// Use a fixed reference date for date checks.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn with_stale_after_years(mut self, years: i32) -> Self {
        self.stale_after_years = years;
        self
    }

    /// Enable `url_reachable` with the given probe.
    pub fn with_probe(mut self, probe: Arc<dyn UrlProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    fn check_citations(&self, text: &str, result: &mut GateResult) {
        if !contains_citation(text) {
            result.fail("citations_present: no citation or source marker found");
        }
    }

    fn check_dates(&self, text: &str, result: &mut GateResult) {
        for caps in ISO_DATE.captures_iter(text) {
            if parse_iso_date(&caps).is_none() {
                result.warn(format!(
                    "dates_valid: {} is not a calendar date",
                    &caps[0]
                ));
            }
        }

        let current_year = self.today.year();
        let years: BTreeSet<i32> = YEAR_PATTERN
            .find_iter(text)
            .filter_map(|m| m.as_str().parse().ok())
            .collect();

        for year in years {
            if year > current_year {
                result.warn(format!("dates_valid: year {} is in the future", year));
            } else if current_year - year > self.stale_after_years {
                result.warn(format!(
                    "dates_valid: year {} is more than {} years old and may be stale",
                    year, self.stale_after_years
                ));
            }
        }
    }

    fn check_urls(&self, text: &str, result: &mut GateResult) {
        let Some(probe) = &self.probe else {
            tracing::debug!("No URL probe configured, skipping url_reachable");
            return;
        };

        let urls: BTreeSet<&str> = URL_PATTERN.find_iter(text).map(|m| m.as_str()).collect();
        for url in urls {
            if !probe.is_reachable(url) {
                result.fail(format!("url_reachable: {} is not reachable", url));
            }
        }
    }
}

fn parse_iso_date(caps: &regex::Captures<'_>) -> Option<NaiveDate> {
    let year = caps.get(1)?.as_str().parse().ok()?;
    let month = caps.get(2)?.as_str().parse().ok()?;
    let day = caps.get(3)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

impl Default for GroundingGate {
    fn default() -> Self {
        Self::new()
    }
}

impl Gate for GroundingGate {
    fn layer(&self) -> Layer {
        Layer::Grounding
    }

    fn run(&self, text: &str, profile: &Profile) -> GateResult {
        let mut result = GateResult::pass();

        for check in &profile.grounding_checks {
            match check {
                GroundingCheck::CitationsPresent => self.check_citations(text, &mut result),
                GroundingCheck::DatesValid => self.check_dates(text, &mut result),
                GroundingCheck::UrlReachable => self.check_urls(text, &mut result),
                GroundingCheck::Unrecognized(name) => {
                    tracing::debug!(check = %name, "Skipping unrecognized grounding check");
                }
            }
        }

        result
    }
}
