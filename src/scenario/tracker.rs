//! Active-scenario pointer and per-scenario results.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::scenario::DEFAULT_SCENARIO;

/// A (plugin, scenario) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ScenarioRef {
    pub plugin: String,
    pub scenario: String,
}

impl ScenarioRef {
    pub fn new(plugin: impl Into<String>, scenario: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            scenario: scenario.into(),
        }
    }

    /// The sentinel pair.
    pub fn sentinel() -> Self {
        Self::new(DEFAULT_SCENARIO, DEFAULT_SCENARIO)
    }

    pub fn is_sentinel(&self) -> bool {
        self.plugin == DEFAULT_SCENARIO && self.scenario == DEFAULT_SCENARIO
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
}

/// Assertion record for one scenario.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScenarioResult {
    /// `None` until the first assertion runs.
    pub result: Option<Outcome>,
    pub passes: Vec<String>,
    pub failures: Vec<String>,
}

impl ScenarioResult {
    fn record(&mut self, outcome: Outcome, message: String) {
        match outcome {
            Outcome::Pass => {
                self.passes.push(message);
                if self.result.is_none() {
                    self.result = Some(Outcome::Pass);
                }
            }
            Outcome::Fail => {
                self.failures.push(message);
                self.result = Some(Outcome::Fail);
            }
        }
    }
}

/// plugin → scenario → result.
pub type TestResults = BTreeMap<String, BTreeMap<String, ScenarioResult>>;

#[derive(Debug)]
struct TrackerState {
    active: ScenarioRef,
    results: TestResults,
}

/// Which scenario is active and what its assertions reported.
#[derive(Debug)]
pub struct ScenarioTracker {
    state: RwLock<TrackerState>,
}

impl Default for ScenarioTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ScenarioTracker {
    /// Sentinel active, with an empty sentinel entry.
    pub fn new() -> Self {
        let sentinel = ScenarioRef::sentinel();
        let mut results = TestResults::new();
        results
            .entry(sentinel.plugin.clone())
            .or_default()
            .insert(sentinel.scenario.clone(), ScenarioResult::default());
        Self {
            state: RwLock::new(TrackerState {
                active: sentinel,
                results,
            }),
        }
    }

    /// Make `scenario` active with a fresh, empty result entry.
    pub fn activate(&self, scenario: ScenarioRef) {
        let mut state = self.state.write();
        state
            .results
            .entry(scenario.plugin.clone())
            .or_default()
            .insert(scenario.scenario.clone(), ScenarioResult::default());
        state.active = scenario;
    }

    /// Point back at the sentinel. Results are kept.
    pub fn deactivate(&self) {
        self.state.write().active = ScenarioRef::sentinel();
    }

    pub fn current(&self) -> ScenarioRef {
        self.state.read().active.clone()
    }

    /// Record against whichever scenario is active right now.
    pub fn record(&self, outcome: Outcome, message: String) -> ScenarioRef {
        let mut state = self.state.write();
        let active = state.active.clone();
        state
            .results
            .entry(active.plugin.clone())
            .or_default()
            .entry(active.scenario.clone())
            .or_default()
            .record(outcome, message);
        active
    }

    pub fn results(&self) -> TestResults {
        self.state.read().results.clone()
    }

    pub fn result_for(&self, plugin: &str, scenario: &str) -> Option<ScenarioResult> {
        self.state
            .read()
            .results
            .get(plugin)
            .and_then(|scenarios| scenarios.get(scenario))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_on_sentinel_with_empty_entry() {
        let tracker = ScenarioTracker::new();
        assert!(tracker.current().is_sentinel());
        assert_eq!(
            tracker.result_for(DEFAULT_SCENARIO, DEFAULT_SCENARIO),
            Some(ScenarioResult::default())
        );
    }

    #[test]
    fn test_activate_discards_previous_result() {
        let tracker = ScenarioTracker::new();
        tracker.activate(ScenarioRef::new("p", "s"));
        tracker.record(Outcome::Fail, "boom".into());
        assert_eq!(tracker.result_for("p", "s").unwrap().result, Some(Outcome::Fail));

        tracker.activate(ScenarioRef::new("p", "s"));
        assert_eq!(tracker.result_for("p", "s"), Some(ScenarioResult::default()));
    }

    #[test]
    fn test_restart_leaves_other_entries_untouched() {
        let tracker = ScenarioTracker::new();
        tracker.activate(ScenarioRef::new("p", "t"));
        tracker.record(Outcome::Pass, "t passed".into());
        tracker.record(Outcome::Fail, "t failed".into());
        tracker.activate(ScenarioRef::new("q", "s"));
        tracker.record(Outcome::Pass, "q passed".into());
        tracker.activate(ScenarioRef::new("p", "s"));
        tracker.record(Outcome::Fail, "first run".into());

        let other_t = tracker.result_for("p", "t").unwrap();
        let other_q = tracker.result_for("q", "s").unwrap();

        tracker.activate(ScenarioRef::new("p", "s"));

        assert_eq!(tracker.result_for("p", "s"), Some(ScenarioResult::default()));
        assert_eq!(tracker.result_for("p", "t"), Some(other_t.clone()));
        assert_eq!(tracker.result_for("q", "s"), Some(other_q.clone()));
        assert_eq!(other_t.passes, vec!["t passed"]);
        assert_eq!(other_t.failures, vec!["t failed"]);
        assert_eq!(other_q.result, Some(Outcome::Pass));
    }

    #[test]
    fn test_one_failure_fails_the_scenario() {
        let tracker = ScenarioTracker::new();
        tracker.activate(ScenarioRef::new("p", "s"));
        tracker.record(Outcome::Pass, "a".into());
        tracker.record(Outcome::Fail, "b".into());
        tracker.record(Outcome::Pass, "c".into());

        let result = tracker.result_for("p", "s").unwrap();
        assert_eq!(result.result, Some(Outcome::Fail));
        assert_eq!(result.passes, vec!["a", "c"]);
        assert_eq!(result.failures, vec!["b"]);
    }

    #[test]
    fn test_deactivate_keeps_results() {
        let tracker = ScenarioTracker::new();
        tracker.activate(ScenarioRef::new("p", "s"));
        tracker.record(Outcome::Pass, "ok".into());
        tracker.deactivate();

        assert!(tracker.current().is_sentinel());
        assert_eq!(tracker.result_for("p", "s").unwrap().passes, vec!["ok"]);
        let recorded = tracker.record(Outcome::Pass, "later".into());
        assert!(recorded.is_sentinel());
    }

    #[test]
    fn test_results_serialize_lowercase() {
        let tracker = ScenarioTracker::new();
        tracker.record(Outcome::Pass, "fine".into());
        let json = serde_json::to_value(tracker.results()).unwrap();
        assert_eq!(json["*default*"]["*default*"]["result"], "pass");
        assert_eq!(json["*default*"]["*default*"]["passes"][0], "fine");
    }
}
