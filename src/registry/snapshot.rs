//! Immutable registry versions and the matching scan.

use std::sync::Arc;

use crate::error::{HydraError, HydraResult};
use crate::heads::Head;
use crate::model::Request;
use crate::registry::{is_pseudo, Plugin, PSEUDO_PLUGINS};

/// Resume point for a continuation: the (plugin, head) pair after which the
/// next scan starts matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HeadCursor {
    pub plugin: String,
    pub head: String,
}

impl HeadCursor {
    pub fn new(plugin: impl Into<String>, head: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            head: head.into(),
        }
    }
}

/// Result of a successful scan.
#[derive(Debug, Clone)]
pub struct HeadMatch {
    pub plugin: String,
    pub head: Arc<Head>,
}

impl HeadMatch {
    pub fn cursor(&self) -> HeadCursor {
        HeadCursor::new(self.plugin.clone(), self.head.name())
    }
}

/// Ordered plugin list: four reserved slots first, then user plugins.
#[derive(Debug, Clone)]
pub struct Registry {
    plugins: Vec<Arc<Plugin>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            plugins: PSEUDO_PLUGINS
                .iter()
                .map(|name| Arc::new(Plugin::pseudo(name)))
                .collect(),
        }
    }

    pub fn plugins(&self) -> &[Arc<Plugin>] {
        &self.plugins
    }

    pub fn lookup(&self, name: &str) -> HydraResult<&Arc<Plugin>> {
        self.plugins
            .iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| HydraError::PluginNotFound(name.to_string()))
    }

    pub fn find_head(&self, plugin: &str, head: &str) -> HydraResult<Arc<Head>> {
        self.lookup(plugin)?
            .head(head)
            .cloned()
            .ok_or_else(|| HydraError::HeadNotFound {
                plugin: plugin.to_string(),
                head: head.to_string(),
            })
    }

    /// New version with `plugin` appended.
    pub fn register(&self, plugin: Plugin) -> HydraResult<Registry> {
        if self.plugins.iter().any(|p| p.name() == plugin.name()) {
            return Err(HydraError::DuplicatePlugin(plugin.name().to_string()));
        }
        let mut plugins = self.plugins.clone();
        plugins.push(Arc::new(plugin));
        Ok(Self { plugins })
    }

    /// New version where a reserved slot holds exactly `heads`.
    pub fn replace_heads(&self, pseudo: &str, heads: Vec<Arc<Head>>) -> HydraResult<Registry> {
        self.update_pseudo(pseudo, |plugin| plugin.with_heads(heads))
    }

    /// New version where a reserved slot holds `heads` (named on the way in).
    pub fn replace_owned_heads(&self, pseudo: &str, heads: Vec<Head>) -> HydraResult<Registry> {
        self.update_pseudo(pseudo, |plugin| plugin.with_owned_heads(heads))
    }

    /// New version with `head` first in a reserved slot.
    pub fn prepend_head(&self, pseudo: &str, head: Head) -> HydraResult<Registry> {
        self.update_pseudo(pseudo, |plugin| plugin.with_prepended(head))
    }

    fn update_pseudo<F>(&self, pseudo: &str, update: F) -> HydraResult<Registry>
    where
        F: FnOnce(&Plugin) -> HydraResult<Plugin>,
    {
        if !is_pseudo(pseudo) {
            return Err(HydraError::NotPseudoPlugin(pseudo.to_string()));
        }
        let position = self
            .plugins
            .iter()
            .position(|p| p.name() == pseudo)
            .ok_or_else(|| HydraError::PluginNotFound(pseudo.to_string()))?;

        let mut plugins = self.plugins.clone();
        plugins[position] = Arc::new(update(&self.plugins[position])?);
        Ok(Self { plugins })
    }

    /// First head, in registry order, that can handle `req`.
    ///
    /// With a cursor, heads up to and including the cursor are skipped.
    /// A cursor that no longer exists in this version matches nothing.
    pub fn head_for_path(&self, req: &Request, after: Option<&HeadCursor>) -> Option<HeadMatch> {
        let mut can_match_yet = after.is_none();
        for plugin in &self.plugins {
            for head in plugin.heads() {
                if can_match_yet && head.can_handle(req) {
                    return Some(HeadMatch {
                        plugin: plugin.name().to_string(),
                        head: head.clone(),
                    });
                }
                if let Some(cursor) = after {
                    if plugin.name() == cursor.plugin && head.name() == cursor.head {
                        can_match_yet = true;
                    }
                }
            }
        }
        None
    }
}
