//! Dispatch engine.
//!
//! # Data Flow
//! ```text
//! Hydra::handle(request, response)
//!     → registry snapshot (one version for the whole scan)
//!     → head_for_path(request, cursor?)
//!         no match → 404 "Not Found"
//!         match    → bind params, status 200, head.handle(req, res, next)
//!                    next.run(req2, res2) → scan again after that head
//!     → handler error / panic → 500 naming plugin and head
//!
//! Management:
//!     register / load plugin, dynamic heads, attach / detach,
//!     start / stop scenario → new registry version swapped in
//! ```
//!
//! # Design Decisions
//! - Registry versions are swapped with `ArcSwap`; readers never lock
//! - Writers are serialized so read-modify-swap cannot lose updates
//! - The continuation is a plain value (`Next`) holding a name cursor

pub mod engine;
pub mod next;

pub use next::Next;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{HydraError, HydraResult};
use crate::heads::Head;
use crate::model::Request;
use crate::plugins::{Fixtures, Modules, PluginConfig, PluginFactory};
use crate::registry::{
    HeadCursor, HeadMatch, Plugin, Registry, ADMIN, CURRENT_SCENARIO, DYNAMIC, PRIORITY_DYNAMIC,
};
use crate::scenario::{Assertions, ScenarioRef, ScenarioTracker, TestResults};

/// Where a dynamic head is inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    #[default]
    Normal,
    High,
}

impl FromStr for Priority {
    type Err = HydraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            other => Err(HydraError::InvalidPriority(other.to_string())),
        }
    }
}

/// One dispatch engine: a registry plus scenario state.
pub struct Hydra {
    name: String,
    registry: ArcSwap<Registry>,
    writer: Mutex<()>,
    scenarios: Arc<ScenarioTracker>,
}

impl std::fmt::Debug for Hydra {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hydra")
            .field("name", &self.name)
            .field("plugins", &self.registry.load().plugins().len())
            .finish()
    }
}

impl Hydra {
    /// Empty engine with the four reserved plugins.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registry: ArcSwap::from_pointee(Registry::new()),
            writer: Mutex::new(()),
            scenarios: Arc::new(ScenarioTracker::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current registry version.
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.load_full()
    }

    /// Apply `update` to the current version and swap the result in.
    fn update<F>(&self, update: F) -> HydraResult<()>
    where
        F: FnOnce(&Registry) -> HydraResult<Registry>,
    {
        let _guard = self.writer.lock();
        let next = update(&self.registry.load())?;
        self.registry.store(Arc::new(next));
        Ok(())
    }

    // --- Plugins ---

    pub fn register_plugin(&self, plugin: Plugin) -> HydraResult<()> {
        let name = plugin.name().to_string();
        let heads = plugin.heads().len();
        self.update(|registry| registry.register(plugin))?;
        tracing::info!(hydra = %self.name, plugin = %name, heads, "Plugin registered");
        Ok(())
    }

    /// Build a plugin with `factory` and register it.
    pub fn load_plugin<F>(
        self: &Arc<Self>,
        name: &str,
        path: Option<&Path>,
        settings: HashMap<String, String>,
        factory: &F,
    ) -> HydraResult<()>
    where
        F: PluginFactory + ?Sized,
    {
        let config = PluginConfig::new(Arc::downgrade(self), path.map(Path::to_path_buf), settings);
        let modules = Modules {
            assert: self.assertions(),
            fixtures: Fixtures::new(path),
        };
        let definition = factory.build(&config, &modules)?;
        let mut plugin = Plugin::new(name, definition.heads, definition.scenarios)?;
        if let Some(path) = path {
            plugin = plugin.with_path(path);
        }
        self.register_plugin(plugin)
    }

    pub fn plugins(&self) -> Vec<Arc<Plugin>> {
        self.registry.load().plugins().to_vec()
    }

    pub fn plugin(&self, name: &str) -> HydraResult<Arc<Plugin>> {
        self.registry.load().lookup(name).cloned()
    }

    pub fn find_head(&self, plugin: &str, head: &str) -> HydraResult<Arc<Head>> {
        self.registry.load().find_head(plugin, head)
    }

    // --- Reserved slots ---

    /// Replace the contents of `*admin*`.
    pub fn install_admin_heads(&self, heads: Vec<Head>) -> HydraResult<()> {
        self.update(|registry| registry.replace_owned_heads(ADMIN, heads))
    }

    /// Prepend a head to `*dynamic*` or `*priority-dynamic*`.
    pub fn register_dynamic_head(&self, head: Head, priority: Priority) -> HydraResult<()> {
        let slot = match priority {
            Priority::Normal => DYNAMIC,
            Priority::High => PRIORITY_DYNAMIC,
        };
        let path = head.path().to_string();
        self.update(|registry| registry.prepend_head(slot, head))?;
        tracing::debug!(hydra = %self.name, slot, path = %path, "Dynamic head registered");
        Ok(())
    }

    // --- Attachment ---

    pub fn attach_head(&self, plugin: &str, head: &str) -> HydraResult<()> {
        self.set_attached(plugin, head, true)
    }

    pub fn detach_head(&self, plugin: &str, head: &str) -> HydraResult<()> {
        self.set_attached(plugin, head, false)
    }

    pub fn is_head_attached(&self, plugin: &str, head: &str) -> HydraResult<bool> {
        Ok(self.find_head(plugin, head)?.is_attached())
    }

    fn set_attached(&self, plugin: &str, head: &str, attached: bool) -> HydraResult<()> {
        let target = self.find_head(plugin, head)?;
        if !target.set_attached(attached) {
            return Err(HydraError::InvalidHeadState {
                plugin: plugin.to_string(),
                head: head.to_string(),
                state: if attached { "attached" } else { "detached" },
            });
        }
        tracing::info!(hydra = %self.name, plugin, head, attached, "Head attachment changed");
        Ok(())
    }

    // --- Scenarios ---

    /// Install a scenario's heads into `*current-scenario*` and make it active.
    ///
    /// The previous scenario is always stopped first, even if this one does
    /// not exist.
    pub fn start_scenario(&self, plugin: &str, scenario: &str) -> HydraResult<()> {
        let _guard = self.writer.lock();
        self.stop_locked()?;

        let registry = self.registry.load_full();
        let invalid = || HydraError::InvalidScenario {
            plugin: plugin.to_string(),
            scenario: scenario.to_string(),
        };
        let heads = registry
            .lookup(plugin)
            .map_err(|_| invalid())?
            .scenario(scenario)
            .ok_or_else(invalid)?
            .heads()
            .to_vec();

        for head in &heads {
            head.reset();
        }
        self.registry
            .store(Arc::new(registry.replace_heads(CURRENT_SCENARIO, heads)?));
        self.scenarios.activate(ScenarioRef::new(plugin, scenario));

        tracing::info!(hydra = %self.name, plugin, scenario, "Scenario started");
        Ok(())
    }

    /// Back to the sentinel scenario with an empty `*current-scenario*`.
    pub fn stop_scenario(&self) -> HydraResult<()> {
        let _guard = self.writer.lock();
        self.stop_locked()
    }

    fn stop_locked(&self) -> HydraResult<()> {
        let registry = self.registry.load();
        let cleared = registry.replace_heads(CURRENT_SCENARIO, Vec::new())?;
        self.registry.store(Arc::new(cleared));

        let previous = self.scenarios.current();
        self.scenarios.deactivate();
        if !previous.is_sentinel() {
            tracing::info!(
                hydra = %self.name,
                plugin = %previous.plugin,
                scenario = %previous.scenario,
                "Scenario stopped"
            );
        }
        Ok(())
    }

    pub fn current_scenario(&self) -> ScenarioRef {
        self.scenarios.current()
    }

    pub fn scenario_results(&self) -> TestResults {
        self.scenarios.results()
    }

    /// Assertion helpers bound to this engine's scenario state.
    pub fn assertions(&self) -> Assertions {
        Assertions::new(self.scenarios.clone())
    }

    // --- Matching ---

    pub fn head_for_path(&self, req: &Request, after: Option<&HeadCursor>) -> Option<HeadMatch> {
        self.registry.load().head_for_path(req, after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heads::{RepeatMode, StaticHead, StaticResponse};
    use crate::registry::ScenarioDefinition;
    use std::collections::BTreeMap;

    fn text_head(path: &str, name: &str, body: &str) -> Head {
        Head::builder(path)
            .name(name)
            .static_content(StaticHead::new(StaticResponse::new(body.to_string())))
            .unwrap()
    }

    fn plugin_with_scenario() -> Plugin {
        let rotating = Head::builder("/seq")
            .name("seq")
            .static_content(
                StaticHead::sequence(
                    vec![StaticResponse::new("one"), StaticResponse::new("two")],
                    RepeatMode::RoundRobin,
                )
                .unwrap(),
            )
            .unwrap();
        let scenarios = BTreeMap::from([(
            "rotate".to_string(),
            ScenarioDefinition::new(vec![rotating]),
        )]);
        Plugin::new("demo", vec![text_head("/foo", "foo", "bar")], scenarios).unwrap()
    }

    #[test]
    fn test_priority_parsing() {
        assert_eq!("high".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!("normal".parse::<Priority>().unwrap(), Priority::Normal);
        assert_eq!(
            "urgent".parse::<Priority>().unwrap_err(),
            HydraError::InvalidPriority("urgent".into())
        );
    }

    #[test]
    fn test_attach_detach_state_errors() {
        let hydra = Hydra::new("test");
        hydra.register_plugin(plugin_with_scenario()).unwrap();

        assert_eq!(
            hydra.attach_head("demo", "foo").unwrap_err(),
            HydraError::InvalidHeadState {
                plugin: "demo".into(),
                head: "foo".into(),
                state: "attached"
            }
        );
        hydra.detach_head("demo", "foo").unwrap();
        assert!(!hydra.is_head_attached("demo", "foo").unwrap());
        assert!(matches!(
            hydra.detach_head("demo", "foo"),
            Err(HydraError::InvalidHeadState { state: "detached", .. })
        ));
        assert!(matches!(
            hydra.attach_head("demo", "nope"),
            Err(HydraError::HeadNotFound { .. })
        ));
    }

    #[test]
    fn test_start_scenario_installs_heads() {
        let hydra = Hydra::new("test");
        hydra.register_plugin(plugin_with_scenario()).unwrap();
        hydra.start_scenario("demo", "rotate").unwrap();

        let current = hydra.plugin(CURRENT_SCENARIO).unwrap();
        assert_eq!(current.heads().len(), 1);
        assert_eq!(hydra.current_scenario(), ScenarioRef::new("demo", "rotate"));

        let found = hydra.head_for_path(&Request::new("GET", "/seq"), None).unwrap();
        assert_eq!(found.plugin, CURRENT_SCENARIO);
    }

    #[test]
    fn test_unknown_scenario_still_stops_current_one() {
        let hydra = Hydra::new("test");
        hydra.register_plugin(plugin_with_scenario()).unwrap();
        hydra.start_scenario("demo", "rotate").unwrap();

        let err = hydra.start_scenario("demo", "missing").unwrap_err();
        assert!(matches!(err, HydraError::InvalidScenario { .. }));
        assert!(hydra.current_scenario().is_sentinel());
        assert!(hydra.plugin(CURRENT_SCENARIO).unwrap().heads().is_empty());
    }

    #[test]
    fn test_stop_scenario_is_idempotent() {
        let hydra = Hydra::new("test");
        hydra.stop_scenario().unwrap();
        hydra.stop_scenario().unwrap();
        assert!(hydra.current_scenario().is_sentinel());
    }

    #[test]
    fn test_dynamic_heads_are_prepended() {
        let hydra = Hydra::new("test");
        hydra
            .register_dynamic_head(text_head("/x", "older", "1"), Priority::Normal)
            .unwrap();
        hydra
            .register_dynamic_head(text_head("/x", "newer", "2"), Priority::Normal)
            .unwrap();
        let dynamic = hydra.plugin(DYNAMIC).unwrap();
        assert_eq!(dynamic.heads()[0].name(), "newer");
    }
}
