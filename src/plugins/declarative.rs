//! Plugins described in the configuration file.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::config::schema::{DeclarativePlugin, HeadConfig, StaticResponseConfig};
use crate::dispatch::Hydra;
use crate::error::{HydraError, HydraResult};
use crate::heads::{FilesystemHead, Head, ProxyHead, StaticHead, StaticResponse};
use crate::plugins::{Fixtures, Modules, PluginConfig, PluginDefinition, PluginFactory};
use crate::registry::ScenarioDefinition;

impl PluginFactory for DeclarativePlugin {
    fn build(&self, _config: &PluginConfig, modules: &Modules) -> HydraResult<PluginDefinition> {
        let heads = self
            .heads
            .iter()
            .map(|head| build_head(head, &modules.fixtures))
            .collect::<HydraResult<Vec<_>>>()?;

        let mut scenarios = BTreeMap::new();
        for (name, scenario) in &self.scenarios {
            let heads = scenario
                .heads
                .iter()
                .map(|head| build_head(head, &modules.fixtures))
                .collect::<HydraResult<Vec<_>>>()?;
            let mut definition = ScenarioDefinition::new(heads);
            definition.instructions = scenario.instructions.clone();
            scenarios.insert(name.clone(), definition);
        }

        Ok(PluginDefinition { heads, scenarios })
    }
}

/// Load every declared plugin into `hydra`, in order.
pub fn load_declared(hydra: &Arc<Hydra>, plugins: &[DeclarativePlugin]) -> HydraResult<()> {
    for plugin in plugins {
        hydra.load_plugin(&plugin.name, plugin.path.as_deref(), HashMap::new(), plugin)?;
    }
    Ok(())
}

fn build_head(config: &HeadConfig, fixtures: &Fixtures) -> HydraResult<Head> {
    let options = config.options();
    let mut builder = Head::builder(options.path);
    if let Some(name) = options.name {
        builder = builder.name(name);
    }
    for method in options.methods {
        builder = builder.method(method);
    }
    if let Some(hostname) = options.hostname {
        builder = builder.hostname(hostname);
    }
    if options.detached {
        builder = builder.detached();
    }

    match config {
        HeadConfig::Static(head) => {
            let responses = head
                .all_responses()
                .iter()
                .map(|response| build_response(response, fixtures))
                .collect::<HydraResult<Vec<_>>>()?;
            builder.static_content(StaticHead::sequence(responses, head.repeat)?)
        }
        HeadConfig::Filesystem(head) => {
            let mut filesystem = FilesystemHead::new(&head.document_root);
            if let Some(index_files) = &head.index_files {
                filesystem = filesystem.with_index_files(index_files.clone());
            }
            builder.filesystem(filesystem)
        }
        HeadConfig::Proxy(head) => {
            let proxy = ProxyHead::new(&head.proxy_to)?.set_host_header(head.set_host_header);
            builder.proxy(proxy)
        }
    }
}

fn build_response(config: &StaticResponseConfig, fixtures: &Fixtures) -> HydraResult<StaticResponse> {
    let mut response = match (&config.content, &config.json, &config.fixture) {
        (Some(content), None, None) => StaticResponse::new(content.clone()),
        (None, Some(json), None) => StaticResponse::json(json),
        (None, None, Some(fixture)) => StaticResponse::new(fixtures.load(fixture)?),
        _ => {
            return Err(HydraError::InvalidConfiguration(
                "a static response needs exactly one of content, json or fixture".to_string(),
            ))
        }
    };
    if let Some(content_type) = &config.content_type {
        response = response.with_content_type(content_type.clone());
    }
    if let Some(status) = config.status {
        response = response.with_status(status);
    }
    for (name, value) in &config.headers {
        response = response.with_header(name, value.clone());
    }
    Ok(response)
}
