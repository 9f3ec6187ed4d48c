//! Plugins and their scenarios.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{HydraError, HydraResult};
use crate::heads::Head;
use crate::registry::{is_pseudo, validate_plugin_name};

/// A scenario as declared by a plugin, before registration.
#[derive(Debug, Default)]
pub struct ScenarioDefinition {
    pub instructions: Option<String>,
    pub heads: Vec<Head>,
}

impl ScenarioDefinition {
    pub fn new(heads: Vec<Head>) -> Self {
        Self {
            instructions: None,
            heads,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }
}

/// A registered scenario: a named set of heads installed on activation.
#[derive(Debug, Clone)]
pub struct Scenario {
    instructions: Option<String>,
    heads: Vec<Arc<Head>>,
}

impl Scenario {
    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    pub fn heads(&self) -> &[Arc<Head>] {
        &self.heads
    }
}

/// One immutable version of a plugin.
#[derive(Debug, Clone)]
pub struct Plugin {
    name: String,
    path: Option<PathBuf>,
    heads: Vec<Arc<Head>>,
    index: HashMap<String, Arc<Head>>,
    scenarios: BTreeMap<String, Scenario>,
    /// Next anonymous head number. Carried across versions so generated
    /// names are never reused.
    anonymous_heads: usize,
}

impl Plugin {
    /// Build a plugin, naming anonymous heads.
    pub fn new(
        name: impl Into<String>,
        heads: Vec<Head>,
        scenarios: BTreeMap<String, ScenarioDefinition>,
    ) -> HydraResult<Self> {
        let name = name.into();
        if !is_pseudo(&name) {
            validate_plugin_name(&name)?;
        }

        let mut plugin = Self {
            name,
            path: None,
            heads: Vec::new(),
            index: HashMap::new(),
            scenarios: BTreeMap::new(),
            anonymous_heads: 0,
        };

        let heads = plugin.adopt_all(heads);
        plugin.index = index_heads(&plugin.name, &heads)?;
        plugin.heads = heads;

        for (scenario_name, definition) in scenarios {
            if scenario_name.is_empty() {
                return Err(HydraError::InvalidConfiguration(format!(
                    "plugin '{}' declares a scenario with an empty name",
                    plugin.name
                )));
            }
            let heads = plugin.adopt_all(definition.heads);
            index_heads(&plugin.name, &heads)?;
            plugin.scenarios.insert(
                scenario_name,
                Scenario {
                    instructions: definition.instructions,
                    heads,
                },
            );
        }

        Ok(plugin)
    }

    /// Empty reserved plugin.
    pub(crate) fn pseudo(name: &str) -> Self {
        Self {
            name: name.to_string(),
            path: None,
            heads: Vec::new(),
            index: HashMap::new(),
            scenarios: BTreeMap::new(),
            anonymous_heads: 0,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn heads(&self) -> &[Arc<Head>] {
        &self.heads
    }

    pub fn head(&self, name: &str) -> Option<&Arc<Head>> {
        self.index.get(name)
    }

    pub fn scenarios(&self) -> &BTreeMap<String, Scenario> {
        &self.scenarios
    }

    pub fn scenario(&self, name: &str) -> Option<&Scenario> {
        self.scenarios.get(name)
    }

    pub fn is_pseudo(&self) -> bool {
        is_pseudo(&self.name)
    }

    /// New version holding exactly `heads`.
    pub(crate) fn with_heads(&self, heads: Vec<Arc<Head>>) -> HydraResult<Self> {
        let index = index_heads(&self.name, &heads)?;
        Ok(Self {
            heads,
            index,
            ..self.clone()
        })
    }

    /// New version holding `heads` after naming them.
    pub(crate) fn with_owned_heads(&self, heads: Vec<Head>) -> HydraResult<Self> {
        let mut next = self.clone();
        let heads = next.adopt_all(heads);
        next.index = index_heads(&next.name, &heads)?;
        next.heads = heads;
        Ok(next)
    }

    /// New version with `head` in front of the existing ones.
    pub(crate) fn with_prepended(&self, head: Head) -> HydraResult<Self> {
        let mut next = self.clone();
        let head = next.adopt(head);
        if next.index.contains_key(head.name()) {
            return Err(HydraError::DuplicateHead {
                plugin: next.name.clone(),
                head: head.name().to_string(),
            });
        }
        next.index.insert(head.name().to_string(), head.clone());
        next.heads.insert(0, head);
        Ok(next)
    }

    fn adopt(&mut self, mut head: Head) -> Arc<Head> {
        if !head.is_named() {
            head.assign_name(format!("anonymousHead{}", self.anonymous_heads));
            self.anonymous_heads += 1;
        }
        Arc::new(head)
    }

    fn adopt_all(&mut self, heads: Vec<Head>) -> Vec<Arc<Head>> {
        heads.into_iter().map(|h| self.adopt(h)).collect()
    }
}

/// Name index for a head list, rejecting duplicates.
fn index_heads(plugin: &str, heads: &[Arc<Head>]) -> HydraResult<HashMap<String, Arc<Head>>> {
    let mut seen = HashSet::new();
    let mut index = HashMap::with_capacity(heads.len());
    for head in heads {
        if !seen.insert(head.name()) {
            return Err(HydraError::DuplicateHead {
                plugin: plugin.to_string(),
                head: head.name().to_string(),
            });
        }
        index.insert(head.name().to_string(), head.clone());
    }
    Ok(index)
}
