//! Assertion helpers handed to plugins.

use metrics::counter;
use regex::Regex;
use std::fmt::Debug;
use std::sync::Arc;

use crate::scenario::{Outcome, ScenarioTracker};

const UNNAMED: &str = "*unnamed-assertion*";

/// Records pass/fail results against the active scenario. Never panics.
#[derive(Debug, Clone)]
pub struct Assertions {
    tracker: Arc<ScenarioTracker>,
}

impl Assertions {
    pub fn new(tracker: Arc<ScenarioTracker>) -> Self {
        Self { tracker }
    }

    pub fn equal<T>(&self, actual: T, expected: T, message: &str) -> bool
    where
        T: PartialEq + Debug,
    {
        let passed = actual == expected;
        self.record(passed, message, || {
            format!("expected {expected:?}, got {actual:?}")
        })
    }

    pub fn not_equal<T>(&self, actual: T, unexpected: T, message: &str) -> bool
    where
        T: PartialEq + Debug,
    {
        let passed = actual != unexpected;
        self.record(passed, message, || {
            format!("expected anything but {unexpected:?}")
        })
    }

    pub fn ok(&self, value: bool, message: &str) -> bool {
        self.record(value, message, || "expected a true value".to_string())
    }

    /// Unconditional failure.
    pub fn fail(&self, message: &str) -> bool {
        self.record(false, message, String::new)
    }

    /// Passes when `actual` matches `pattern`. An invalid pattern fails.
    pub fn matches(&self, actual: &str, pattern: &str, message: &str) -> bool {
        match Regex::new(pattern) {
            Ok(regex) => self.record(regex.is_match(actual), message, || {
                format!("{actual:?} does not match /{pattern}/")
            }),
            Err(e) => self.record(false, message, || format!("invalid pattern /{pattern}/: {e}")),
        }
    }

    fn record<D>(&self, passed: bool, message: &str, detail: D) -> bool
    where
        D: FnOnce() -> String,
    {
        let label = if message.is_empty() { UNNAMED } else { message };
        let (outcome, text) = if passed {
            (Outcome::Pass, label.to_string())
        } else {
            let detail = detail();
            let text = if detail.is_empty() {
                label.to_string()
            } else {
                format!("{label} ({detail})")
            };
            (Outcome::Fail, text)
        };

        let scenario = self.tracker.record(outcome, text);
        let outcome_label = if passed { "pass" } else { "fail" };
        counter!("hydra_assertions_total", "outcome" => outcome_label).increment(1);
        tracing::debug!(
            plugin = %scenario.plugin,
            scenario = %scenario.scenario,
            outcome = outcome_label,
            assertion = label,
            "Assertion recorded"
        );
        passed
    }
}
