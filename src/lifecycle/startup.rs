//! Startup orchestration.
//!
//! # Responsibilities
//! - Build a fully loaded hydra: admin heads first, then declared plugins
//! - Wire the summoner that builds hydras on demand
//!
//! # Design Decisions
//! - Fail fast: a plugin that fails to load fails the whole hydra
//! - The default hydra is built eagerly so config mistakes surface at boot

use std::sync::Arc;

use crate::admin::admin_heads;
use crate::config::HydraConfig;
use crate::dispatch::Hydra;
use crate::error::HydraResult;
use crate::plugins::load_declared;
use crate::summoner::{Summoner, DEFAULT_HYDRA};

/// A hydra named `name` with every configured plugin loaded.
pub fn build_hydra(name: &str, config: &HydraConfig) -> HydraResult<Arc<Hydra>> {
    let hydra = Arc::new(Hydra::new(name));
    hydra.install_admin_heads(admin_heads(&config.admin)?)?;
    load_declared(&hydra, &config.plugins)?;

    tracing::info!(
        hydra = %name,
        plugins = config.plugins.len(),
        admin = config.admin.enabled,
        "Hydra ready"
    );
    Ok(hydra)
}

/// The process summoner, with the default hydra already built.
pub fn build_summoner(config: Arc<HydraConfig>) -> HydraResult<Summoner> {
    let settings = config.summoner.clone();
    let builder_config = config.clone();
    let mut summoner = Summoner::new(move |name: &str| build_hydra(name, &builder_config))
        .with_limit(settings.max_hydras);
    if let Some(header) = settings.hydra_header {
        summoner = summoner.with_header_picker(header);
    }
    if !settings.allowed_hydras.is_empty() {
        summoner = summoner.with_allowed(settings.allowed_hydras);
    }
    summoner.get_or_build(DEFAULT_HYDRA)?;
    Ok(summoner)
}
