//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.
//! Unknown keys are rejected at every level.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::heads::RepeatMode;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct HydraConfig {
    /// Listener configuration (bind address, TLS, body limit).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin REST heads.
    pub admin: AdminConfig,

    /// Selection of hydra instances per request.
    pub summoner: SummonerConfig,

    /// Plugins declared in the file, loaded in order.
    pub plugins: Vec<DeclarativePlugin>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Largest request body buffered before dispatch.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            tls: None,
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutConfig {
    /// Whole-request timeout, including head handlers.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ObservabilityConfig {
    /// Filter used when `RUST_LOG` is unset.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Serve Prometheus metrics.
    pub metrics_enabled: bool,

    /// Metrics listener address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Admin REST heads.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdminConfig {
    pub enabled: bool,

    /// Path every admin head lives under.
    pub mount_path: String,

    /// Bearer token required when set.
    pub api_key: Option<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mount_path: "/hydra-admin".to_string(),
            api_key: None,
        }
    }
}

/// Hydra selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SummonerConfig {
    /// Request header naming the hydra to use. Absent: a single hydra.
    pub hydra_header: Option<String>,

    /// Names the header may select. Empty: any name.
    pub allowed_hydras: Vec<String>,

    /// Upper bound on live hydras, the default one included.
    pub max_hydras: usize,
}

impl Default for SummonerConfig {
    fn default() -> Self {
        Self {
            hydra_header: None,
            allowed_hydras: Vec::new(),
            max_hydras: 64,
        }
    }
}

/// A plugin declared in the configuration file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeclarativePlugin {
    pub name: String,

    /// Directory holding the plugin's `fixtures/`.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default)]
    pub heads: Vec<HeadConfig>,

    #[serde(default)]
    pub scenarios: BTreeMap<String, ScenarioConfig>,
}

/// A scenario: heads installed while it is active.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub instructions: Option<String>,

    pub heads: Vec<HeadConfig>,
}

/// A head, tagged by `type`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HeadConfig {
    Static(StaticHeadConfig),
    Filesystem(FilesystemHeadConfig),
    Proxy(ProxyHeadConfig),
}

/// Options every head accepts.
#[derive(Debug, Clone, Copy)]
pub struct HeadOptions<'a> {
    pub name: Option<&'a str>,
    pub path: &'a str,
    pub methods: &'a [String],
    pub hostname: Option<&'a str>,
    pub detached: bool,
}

impl HeadConfig {
    pub fn options(&self) -> HeadOptions<'_> {
        macro_rules! options {
            ($head:expr) => {
                HeadOptions {
                    name: $head.name.as_deref(),
                    path: &$head.path,
                    methods: &$head.methods,
                    hostname: $head.hostname.as_deref(),
                    detached: $head.detached,
                }
            };
        }
        match self {
            HeadConfig::Static(head) => options!(head),
            HeadConfig::Filesystem(head) => options!(head),
            HeadConfig::Proxy(head) => options!(head),
        }
    }
}

/// Canned response head.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StaticHeadConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub path: String,
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub detached: bool,

    /// Single response shorthand: literal body.
    #[serde(default)]
    pub content: Option<String>,

    /// Single response shorthand: JSON body.
    #[serde(default)]
    pub json: Option<serde_json::Value>,

    /// Single response shorthand: body read from the plugin's fixtures.
    #[serde(default)]
    pub fixture: Option<String>,

    #[serde(default)]
    pub content_type: Option<String>,

    #[serde(default)]
    pub status: Option<u16>,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Several responses served in turn.
    #[serde(default)]
    pub responses: Vec<StaticResponseConfig>,

    #[serde(default)]
    pub repeat: RepeatMode,
}

impl StaticHeadConfig {
    /// Every configured response: the shorthand one first, then `responses`.
    pub fn all_responses(&self) -> Vec<StaticResponseConfig> {
        let shorthand = StaticResponseConfig {
            content: self.content.clone(),
            json: self.json.clone(),
            fixture: self.fixture.clone(),
            content_type: self.content_type.clone(),
            status: self.status,
            headers: self.headers.clone(),
        };
        let mut all = Vec::with_capacity(self.responses.len() + 1);
        if !shorthand.is_empty() {
            all.push(shorthand);
        }
        all.extend(self.responses.iter().cloned());
        all
    }
}

/// One canned response.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StaticResponseConfig {
    /// Literal body.
    #[serde(default)]
    pub content: Option<String>,

    /// JSON body (sets `application/json`).
    #[serde(default)]
    pub json: Option<serde_json::Value>,

    /// Body read from the plugin's fixtures.
    #[serde(default)]
    pub fixture: Option<String>,

    #[serde(default)]
    pub content_type: Option<String>,

    #[serde(default)]
    pub status: Option<u16>,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl StaticResponseConfig {
    /// True when no body source was given.
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.json.is_none() && self.fixture.is_none()
    }
}

/// Document-root head.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FilesystemHeadConfig {
    #[serde(default)]
    pub name: Option<String>,
    /// Mount path.
    pub path: String,
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub detached: bool,

    pub document_root: PathBuf,

    #[serde(default)]
    pub index_files: Option<Vec<String>>,
}

/// Forwarding head.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyHeadConfig {
    #[serde(default)]
    pub name: Option<String>,
    /// Mount path.
    pub path: String,
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub detached: bool,

    /// Upstream base URL (`http` only).
    pub proxy_to: String,

    #[serde(default = "default_set_host_header")]
    pub set_host_header: bool,
}

fn default_set_host_header() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: HydraConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:3000");
        assert_eq!(config.timeouts.request_secs, 30);
        assert_eq!(config.admin.mount_path, "/hydra-admin");
        assert!(config.admin.enabled);
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
        assert!(config.plugins.is_empty());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(toml::from_str::<HydraConfig>("[listener]\nbind = \"x\"\n").is_err());
        assert!(toml::from_str::<HydraConfig>("unexpected = 1\n").is_err());
    }

    #[test]
    fn test_declarative_plugin_parsing() {
        let config: HydraConfig = toml::from_str(
            r#"
            [[plugins]]
            name = "shop"

            [[plugins.heads]]
            type = "static"
            name = "cart"
            path = "/cart"
            content = "[]"
            content_type = "application/json"

            [[plugins.heads]]
            type = "proxy"
            path = "/api"
            proxy_to = "http://127.0.0.1:9000"

            [plugins.scenarios.outage]
            instructions = "Checkout should show an error"

            [[plugins.scenarios.outage.heads]]
            type = "static"
            path = "/cart"
            status = 503
            content = "down"
            "#,
        )
        .unwrap();

        let plugin = &config.plugins[0];
        assert_eq!(plugin.heads.len(), 2);
        let HeadConfig::Static(cart) = &plugin.heads[0] else {
            panic!("expected a static head");
        };
        assert_eq!(cart.content.as_deref(), Some("[]"));
        assert_eq!(cart.all_responses().len(), 1);
        assert_eq!(plugin.heads[1].options().path, "/api");
        let HeadConfig::Proxy(proxy) = &plugin.heads[1] else {
            panic!("expected a proxy head");
        };
        assert!(proxy.set_host_header);

        let outage = &plugin.scenarios["outage"];
        assert_eq!(outage.heads.len(), 1);
    }

    #[test]
    fn test_scenario_requires_heads() {
        let result = toml::from_str::<HydraConfig>(
            r#"
            [[plugins]]
            name = "p"
            [plugins.scenarios.empty]
            instructions = "no heads"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_head_type_rejected() {
        let result = toml::from_str::<HydraConfig>(
            r#"
            [[plugins]]
            name = "p"
            [[plugins.heads]]
            type = "websocket"
            path = "/ws"
            "#,
        );
        assert!(result.is_err());
    }
}
