//! Admin REST surface, served by heads in the `*admin*` plugin.
//!
//! ```text
//! GET    {mount}/rest/plugins
//! GET    {mount}/rest/plugins/:plugin
//! POST   {mount}/rest/plugins/:plugin/heads/:head          attached=true|false
//! POST   {mount}/rest/plugins/:plugin/scenarios/:scenario  active=true|false
//! GET    {mount}/rest/current-scenario
//! DELETE {mount}/rest/current-scenario
//! GET    {mount}/rest/test-results
//! ```

pub mod auth;
pub mod handlers;

use std::future::Future;
use std::sync::Arc;

use crate::config::AdminConfig;
use crate::dispatch::{Hydra, Next};
use crate::error::{HeadError, HydraResult};
use crate::heads::Head;
use crate::model::{Request, Response};

use self::handlers::*;

/// Heads for `*admin*`. Empty when the admin surface is disabled.
pub fn admin_heads(config: &AdminConfig) -> HydraResult<Vec<Head>> {
    if !config.enabled {
        return Ok(Vec::new());
    }
    let mount = config.mount_path.trim_end_matches('/');
    let key: Option<Arc<str>> = config.api_key.as_deref().map(Arc::from);
    let route = |suffix: &str| format!("{mount}/rest{suffix}");

    Ok(vec![
        admin_head("plugins", "GET", route("/plugins"), key.clone(), list_plugins)?,
        admin_head("plugin", "GET", route("/plugins/:plugin"), key.clone(), get_plugin)?,
        admin_head(
            "head-attachment",
            "POST",
            route("/plugins/:plugin/heads/:head"),
            key.clone(),
            set_head_attachment,
        )?,
        admin_head(
            "scenario-activation",
            "POST",
            route("/plugins/:plugin/scenarios/:scenario"),
            key.clone(),
            set_scenario_activation,
        )?,
        admin_head(
            "current-scenario",
            "GET",
            route("/current-scenario"),
            key.clone(),
            current_scenario,
        )?,
        admin_head(
            "stop-scenario",
            "DELETE",
            route("/current-scenario"),
            key.clone(),
            stop_current_scenario,
        )?,
        admin_head("test-results", "GET", route("/test-results"), key, test_results)?,
    ])
}

fn admin_head<H, Fut>(
    name: &str,
    method: &str,
    path: String,
    api_key: Option<Arc<str>>,
    handler: H,
) -> HydraResult<Head>
where
    H: Fn(Request, Response, Arc<Hydra>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HeadError>> + Send + 'static,
{
    let handler = Arc::new(handler);
    Head::builder(path)
        .name(name)
        .method(method)
        .handler(move |req: Request, res: Response, next: Next| {
            let handler = handler.clone();
            let api_key = api_key.clone();
            async move {
                if !auth::is_authorized(&req, api_key.as_deref()) {
                    tracing::warn!(path = %req.path(), "Rejected unauthorized admin request");
                    return unauthorized(&res);
                }
                handler(req, res, next.hydra().clone()).await
            }
        })
}
