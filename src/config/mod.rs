//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, every problem collected)
//!     → HydraConfig (validated, immutable)
//!     → shared via Arc with the summoner's hydra builder
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Unknown keys are errors, not warnings
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, DeclarativePlugin, HeadConfig, HydraConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, ScenarioConfig, SummonerConfig, TimeoutConfig, TlsConfig,
};
