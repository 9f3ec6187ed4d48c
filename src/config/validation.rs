//! Semantic configuration checks.
//!
//! Serde guarantees shape; this module checks meaning. Every problem is
//! collected so one run reports all of them.

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;
use url::Url;

use crate::config::schema::{HeadConfig, HydraConfig};
use crate::registry::validate_plugin_name;

/// One semantic problem, located by a dotted path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &HydraConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be greater than 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }
    if !config.admin.mount_path.starts_with('/') {
        errors.push(ValidationError::new("admin.mount_path", "must start with '/'"));
    }
    if let Some(header) = &config.summoner.hydra_header {
        if header.trim().is_empty() {
            errors.push(ValidationError::new("summoner.hydra_header", "must not be empty"));
        }
    }
    if config.summoner.max_hydras == 0 {
        errors.push(ValidationError::new("summoner.max_hydras", "must be greater than 0"));
    }

    let mut names = HashSet::new();
    for (i, plugin) in config.plugins.iter().enumerate() {
        let field = format!("plugins[{i}]");
        if validate_plugin_name(&plugin.name).is_err() {
            errors.push(ValidationError::new(
                format!("{field}.name"),
                format!("'{}' must match [a-z0-9_-]+", plugin.name),
            ));
        }
        if !names.insert(plugin.name.to_ascii_lowercase()) {
            errors.push(ValidationError::new(
                format!("{field}.name"),
                format!("duplicate plugin '{}'", plugin.name),
            ));
        }
        for (j, head) in plugin.heads.iter().enumerate() {
            validate_head(&format!("{field}.heads[{j}]"), head, &mut errors);
        }
        for (scenario, definition) in &plugin.scenarios {
            let scenario_field = format!("{field}.scenarios.{scenario}");
            if scenario.trim().is_empty() {
                errors.push(ValidationError::new(&scenario_field, "scenario name must not be empty"));
            }
            for (j, head) in definition.heads.iter().enumerate() {
                validate_head(&format!("{scenario_field}.heads[{j}]"), head, &mut errors);
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_head(field: &str, head: &HeadConfig, errors: &mut Vec<ValidationError>) {
    let options = head.options();
    if !options.path.starts_with('/') {
        errors.push(ValidationError::new(
            format!("{field}.path"),
            format!("'{}' must start with '/'", options.path),
        ));
    }
    if options.name == Some("") {
        errors.push(ValidationError::new(format!("{field}.name"), "must not be empty"));
    }

    match head {
        HeadConfig::Static(head) => {
            let responses = head.all_responses();
            if responses.is_empty() {
                errors.push(ValidationError::new(
                    field,
                    "static head needs content, json, fixture or responses",
                ));
            }
            for (k, response) in head.responses.iter().enumerate() {
                if response.is_empty() {
                    errors.push(ValidationError::new(
                        format!("{field}.responses[{k}]"),
                        "response needs content, json or fixture",
                    ));
                }
            }
        }
        HeadConfig::Filesystem(head) => {
            if head.document_root.as_os_str().is_empty() {
                errors.push(ValidationError::new(
                    format!("{field}.document_root"),
                    "must not be empty",
                ));
            }
        }
        HeadConfig::Proxy(head) => match Url::parse(&head.proxy_to) {
            Ok(url) if url.scheme() == "http" && url.host_str().is_some() => {}
            Ok(_) => errors.push(ValidationError::new(
                format!("{field}.proxy_to"),
                format!("'{}' must be an http:// URL with a host", head.proxy_to),
            )),
            Err(e) => errors.push(ValidationError::new(
                format!("{field}.proxy_to"),
                format!("'{}' is not a URL: {e}", head.proxy_to),
            )),
        },
    }
}
