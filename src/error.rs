//! Engine-level error definitions.

use thiserror::Error;

use crate::model::ResponseError;

/// Errors raised synchronously by registry, matching and scenario operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HydraError {
    /// Plugin name is not `[a-z0-9_-]+`.
    #[error("invalid plugin name '{0}'")]
    InvalidName(String),

    /// A plugin with this name is already registered.
    #[error("duplicate plugin name '{0}'")]
    DuplicatePlugin(String),

    /// A head with this name already exists in the plugin.
    #[error("duplicate head name '{head}' in plugin '{plugin}'")]
    DuplicateHead { plugin: String, head: String },

    #[error("plugin '{0}' not found")]
    PluginNotFound(String),

    #[error("head '{head}' not found in plugin '{plugin}'")]
    HeadNotFound { plugin: String, head: String },

    /// The (plugin, scenario) pair does not exist.
    #[error("scenario '{scenario}' not found in plugin '{plugin}'")]
    InvalidScenario { plugin: String, scenario: String },

    /// Structural problem in a plugin, head or scenario definition.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Attaching an attached head or detaching a detached one.
    #[error("head '{head}' in plugin '{plugin}' is already {state}")]
    InvalidHeadState {
        plugin: String,
        head: String,
        state: &'static str,
    },

    #[error("invalid dynamic head priority '{0}' (expected 'normal' or 'high')")]
    InvalidPriority(String),

    /// Head replacement attempted on a user plugin.
    #[error("'{0}' is not a reserved pseudo-plugin")]
    NotPseudoPlugin(String),

    #[error("fixture error: {0}")]
    Fixture(String),

    /// The summoner was asked for a hydra outside its allow-list.
    #[error("hydra '{0}' is not allowed")]
    HydraNotAllowed(String),

    /// The summoner already holds its maximum number of hydras.
    #[error("cannot summon hydra '{name}': limit of {limit} reached")]
    HydraLimitReached { name: String, limit: usize },
}

/// Result alias for engine operations.
pub type HydraResult<T> = Result<T, HydraError>;

/// Errors a head handler may return.
///
/// The dispatch boundary converts any of these into a 500 response.
#[derive(Debug, Error)]
pub enum HeadError {
    #[error(transparent)]
    Response(#[from] ResponseError),

    #[error(transparent)]
    Hydra(#[from] HydraError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("upstream request failed: {0}")]
    Upstream(String),

    #[error("{0}")]
    Message(String),
}

impl HeadError {
    /// Build a free-form handler error.
    pub fn msg(message: impl Into<String>) -> Self {
        HeadError::Message(message.into())
    }
}
