//! Plugin loading.
//!
//! # Data Flow
//! ```text
//! code:   impl PluginFactory (or a closure)
//! config: [[plugins]] table → DeclarativePlugin
//!     → build(PluginConfig, Modules) → PluginDefinition { heads, scenarios }
//!     → Plugin::new → Hydra::register_plugin
//! ```

pub mod contract;
pub mod declarative;
pub mod fixtures;

pub use contract::{Modules, PluginConfig, PluginDefinition, PluginFactory};
pub use declarative::load_declared;
pub use fixtures::Fixtures;
