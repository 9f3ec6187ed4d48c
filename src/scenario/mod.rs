//! Scenario activation state and assertion results.
//!
//! # Design Decisions
//! - One tracker per engine, shared with every `Assertions` handle
//! - Assertions resolve the active scenario when they run, not when the
//!   head that makes them was declared

pub mod assert;
pub mod tracker;

pub use assert::Assertions;
pub use tracker::{Outcome, ScenarioRef, ScenarioResult, ScenarioTracker, TestResults};

/// Plugin and scenario name of the sentinel pair used when no scenario is
/// active.
pub const DEFAULT_SCENARIO: &str = "*default*";
