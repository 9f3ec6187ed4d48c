//! What a plugin receives and what it must return.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use crate::dispatch::Hydra;
use crate::error::HydraResult;
use crate::heads::Head;
use crate::plugins::Fixtures;
use crate::registry::ScenarioDefinition;
use crate::scenario::Assertions;

/// Heads and scenarios produced by a plugin.
#[derive(Debug, Default)]
pub struct PluginDefinition {
    pub heads: Vec<Head>,
    pub scenarios: BTreeMap<String, ScenarioDefinition>,
}

impl PluginDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn head(mut self, head: Head) -> Self {
        self.heads.push(head);
        self
    }

    pub fn scenario(mut self, name: impl Into<String>, scenario: ScenarioDefinition) -> Self {
        self.scenarios.insert(name.into(), scenario);
        self
    }
}

/// Context handed to a plugin factory.
#[derive(Debug, Clone)]
pub struct PluginConfig {
    hydra: Weak<Hydra>,
    path: Option<PathBuf>,
    settings: HashMap<String, String>,
}

impl PluginConfig {
    pub fn new(hydra: Weak<Hydra>, path: Option<PathBuf>, settings: HashMap<String, String>) -> Self {
        Self {
            hydra,
            path,
            settings,
        }
    }

    /// The engine loading the plugin, while it is alive.
    pub fn hydra(&self) -> Option<Arc<Hydra>> {
        self.hydra.upgrade()
    }

    /// Directory the plugin was loaded from.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn setting(&self, name: &str) -> Option<&str> {
        self.settings.get(name).map(String::as_str)
    }

    pub fn settings(&self) -> &HashMap<String, String> {
        &self.settings
    }
}

/// Helpers available to plugins.
#[derive(Debug, Clone)]
pub struct Modules {
    pub assert: Assertions,
    pub fixtures: Fixtures,
}

/// Builds a plugin's heads and scenarios.
pub trait PluginFactory: Send + Sync {
    fn build(&self, config: &PluginConfig, modules: &Modules) -> HydraResult<PluginDefinition>;
}

impl<F> PluginFactory for F
where
    F: Fn(&PluginConfig, &Modules) -> HydraResult<PluginDefinition> + Send + Sync,
{
    fn build(&self, config: &PluginConfig, modules: &Modules) -> HydraResult<PluginDefinition> {
        self(config, modules)
    }
}
