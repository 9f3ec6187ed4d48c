use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::dispatch::Hydra;
use crate::error::{HeadError, HydraError};
use crate::heads::Head;
use crate::model::{Request, Response};
use crate::registry::{Plugin, ADMIN};
use crate::scenario::ScenarioRef;

#[derive(Serialize)]
pub struct HeadStatus {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub path: String,
    pub mount: bool,
    pub attached: bool,
}

#[derive(Serialize)]
pub struct ScenarioStatus {
    pub name: String,
    pub instructions: Option<String>,
    pub active: bool,
}

#[derive(Serialize)]
pub struct PluginStatus {
    pub name: String,
    pub path: Option<String>,
    pub heads: Vec<HeadStatus>,
    pub scenarios: Vec<ScenarioStatus>,
}

impl HeadStatus {
    fn of(head: &Head) -> Self {
        Self {
            name: head.name().to_string(),
            kind: head.kind().type_name(),
            path: head.path().to_string(),
            mount: head.matcher().is_mount(),
            attached: head.is_attached(),
        }
    }
}

impl PluginStatus {
    fn of(plugin: &Plugin, current: &ScenarioRef) -> Self {
        Self {
            name: plugin.name().to_string(),
            path: plugin.path().map(|p| p.display().to_string()),
            heads: plugin.heads().iter().map(|h| HeadStatus::of(h)).collect(),
            scenarios: plugin
                .scenarios()
                .iter()
                .map(|(name, scenario)| ScenarioStatus {
                    name: name.clone(),
                    instructions: scenario.instructions().map(str::to_string),
                    active: current.plugin == plugin.name() && current.scenario == *name,
                })
                .collect(),
        }
    }
}

pub async fn list_plugins(_req: Request, res: Response, hydra: Arc<Hydra>) -> Result<(), HeadError> {
    let current = hydra.current_scenario();
    let plugins: Vec<_> = hydra
        .plugins()
        .iter()
        .filter(|p| p.name() != ADMIN)
        .map(|p| PluginStatus::of(p, &current))
        .collect();
    send_json(&res, 200, &json!({ "plugins": plugins }))
}

pub async fn get_plugin(req: Request, res: Response, hydra: Arc<Hydra>) -> Result<(), HeadError> {
    let name = param(&req, "plugin");
    match hydra.plugin(name) {
        Ok(plugin) => send_json(&res, 200, &PluginStatus::of(&plugin, &hydra.current_scenario())),
        Err(e) => send_error(&res, &e),
    }
}

/// Body: `attached=true|false`.
pub async fn set_head_attachment(
    req: Request,
    res: Response,
    hydra: Arc<Hydra>,
) -> Result<(), HeadError> {
    let plugin = param(&req, "plugin");
    let head = param(&req, "head");
    let Some(attached) = bool_param(&req, "attached") else {
        return send_bad_request(&res, "expected body parameter 'attached' (true or false)");
    };

    let outcome = if attached {
        hydra.attach_head(plugin, head)
    } else {
        hydra.detach_head(plugin, head)
    };
    match outcome.and_then(|()| hydra.find_head(plugin, head)) {
        Ok(head) => send_json(&res, 200, &HeadStatus::of(&head)),
        Err(e) => send_error(&res, &e),
    }
}

/// Body: `active=true|false`.
pub async fn set_scenario_activation(
    req: Request,
    res: Response,
    hydra: Arc<Hydra>,
) -> Result<(), HeadError> {
    let plugin = param(&req, "plugin");
    let scenario = param(&req, "scenario");
    let Some(active) = bool_param(&req, "active") else {
        return send_bad_request(&res, "expected body parameter 'active' (true or false)");
    };

    let outcome = if active {
        hydra.start_scenario(plugin, scenario)
    } else {
        hydra.stop_scenario()
    };
    match outcome {
        Ok(()) => send_json(&res, 200, &hydra.current_scenario()),
        Err(e) => send_error(&res, &e),
    }
}

pub async fn current_scenario(_req: Request, res: Response, hydra: Arc<Hydra>) -> Result<(), HeadError> {
    send_json(&res, 200, &hydra.current_scenario())
}

pub async fn stop_current_scenario(
    _req: Request,
    res: Response,
    hydra: Arc<Hydra>,
) -> Result<(), HeadError> {
    match hydra.stop_scenario() {
        Ok(()) => send_json(&res, 200, &hydra.current_scenario()),
        Err(e) => send_error(&res, &e),
    }
}

pub async fn test_results(_req: Request, res: Response, hydra: Arc<Hydra>) -> Result<(), HeadError> {
    send_json(&res, 200, &hydra.scenario_results())
}

pub fn unauthorized(res: &Response) -> Result<(), HeadError> {
    res.set_header("www-authenticate", "Bearer");
    send_json(res, 401, &json!({ "error": "unauthorized" }))
}

fn param<'a>(req: &'a Request, name: &str) -> &'a str {
    req.params.get(name).map(String::as_str).unwrap_or_default()
}

/// Read from the body, falling back to the query string.
fn bool_param(req: &Request, name: &str) -> Option<bool> {
    let value = match req.body_params().get(name) {
        Some(value) => value.clone(),
        None => req.query_params().remove(name)?,
    };
    value.trim().parse().ok()
}

fn send_json<T: Serialize>(res: &Response, status: u16, body: &T) -> Result<(), HeadError> {
    let body = serde_json::to_vec(body).map_err(|e| HeadError::msg(e.to_string()))?;
    res.set_status(status);
    res.set_header("content-type", "application/json");
    res.send(body)?;
    Ok(())
}

fn send_bad_request(res: &Response, message: &str) -> Result<(), HeadError> {
    send_json(res, 400, &json!({ "error": message }))
}

fn send_error(res: &Response, error: &HydraError) -> Result<(), HeadError> {
    let status = match error {
        HydraError::PluginNotFound(_)
        | HydraError::HeadNotFound { .. }
        | HydraError::InvalidScenario { .. } => 404,
        HydraError::InvalidHeadState { .. } => 409,
        _ => 400,
    };
    send_json(res, status, &json!({ "error": error.to_string() }))
}
