//! Plugin registry.
//!
//! # Data Flow
//! ```text
//! Registry (one immutable version)
//!     *admin* → *priority-dynamic* → *dynamic* → *current-scenario*
//!     → user plugins in registration order
//!
//! Mutation:
//!     current version → register / replace pseudo-plugin heads
//!     → new version → swapped in by the engine
//! ```
//!
//! # Design Decisions
//! - A version is never mutated; changes build a new one
//! - Heads are shared (`Arc<Head>`) between versions, never copied
//! - Pseudo-plugin positions are fixed; only their contents change

pub mod plugin;
pub mod snapshot;

pub use plugin::{Plugin, Scenario, ScenarioDefinition};
pub use snapshot::{HeadCursor, HeadMatch, Registry};

use crate::error::{HydraError, HydraResult};

/// Admin REST heads.
pub const ADMIN: &str = "*admin*";
/// Dynamic heads registered with high priority.
pub const PRIORITY_DYNAMIC: &str = "*priority-dynamic*";
/// Dynamic heads registered with normal priority.
pub const DYNAMIC: &str = "*dynamic*";
/// Heads of the active scenario.
pub const CURRENT_SCENARIO: &str = "*current-scenario*";

/// Reserved plugins in dispatch order.
pub const PSEUDO_PLUGINS: [&str; 4] = [ADMIN, PRIORITY_DYNAMIC, DYNAMIC, CURRENT_SCENARIO];

pub fn is_pseudo(name: &str) -> bool {
    PSEUDO_PLUGINS.contains(&name)
}

/// User plugin names are `[a-z0-9_-]+`, case-insensitive.
pub fn validate_plugin_name(name: &str) -> HydraResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(HydraError::InvalidName(name.to_string()))
    }
}
