//! Choosing a hydra per request.
//!
//! # Data Flow
//! ```text
//! Request
//!     → picker(request) → hydra name
//!     → DashMap lookup
//!         miss → builder(name) → cached
//!     → Arc<Hydra>
//! ```
//!
//! # Design Decisions
//! - Instances are built lazily, once per name
//! - A failed build is not cached; the next request tries again
//! - Client-chosen names are bounded by an optional allow-list and a cap
//!   on live instances

use dashmap::DashMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::dispatch::Hydra;
use crate::error::{HydraError, HydraResult};
use crate::model::Request;

/// Name of the hydra used when the picker has no opinion.
pub const DEFAULT_HYDRA: &str = "*default*";

/// Maps a request to a hydra name.
pub type Picker = Arc<dyn Fn(&Request) -> String + Send + Sync>;
/// Builds a fully loaded hydra for a name.
pub type Builder = Arc<dyn Fn(&str) -> HydraResult<Arc<Hydra>> + Send + Sync>;

/// Owns every hydra instance of the process.
pub struct Summoner {
    hydras: DashMap<String, Arc<Hydra>>,
    picker: Picker,
    builder: Builder,
    allowed: Option<HashSet<String>>,
    limit: Option<usize>,
}

impl fmt::Debug for Summoner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Summoner")
            .field("hydras", &self.hydras.len())
            .finish_non_exhaustive()
    }
}

impl Summoner {
    /// Always picks the default hydra.
    pub fn new<B>(builder: B) -> Self
    where
        B: Fn(&str) -> HydraResult<Arc<Hydra>> + Send + Sync + 'static,
    {
        Self {
            hydras: DashMap::new(),
            picker: Arc::new(|_: &Request| DEFAULT_HYDRA.to_string()),
            builder: Arc::new(builder),
            allowed: None,
            limit: None,
        }
    }

    /// Only these names (plus the default hydra) may be summoned.
    pub fn with_allowed<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Refuse to build more than `max` hydras.
    pub fn with_limit(mut self, max: usize) -> Self {
        self.limit = Some(max);
        self
    }

    pub fn with_picker<P>(mut self, picker: P) -> Self
    where
        P: Fn(&Request) -> String + Send + Sync + 'static,
    {
        self.picker = Arc::new(picker);
        self
    }

    /// Pick by header value, falling back to the default hydra.
    pub fn with_header_picker(self, header: impl Into<String>) -> Self {
        let header = header.into();
        self.with_picker(move |req| {
            req.header(&header)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .unwrap_or(DEFAULT_HYDRA)
                .to_string()
        })
    }

    /// The hydra for `req`, built on first use.
    pub fn summon(&self, req: &Request) -> HydraResult<Arc<Hydra>> {
        let name = (self.picker)(req);
        self.get_or_build(&name)
    }

    pub fn get_or_build(&self, name: &str) -> HydraResult<Arc<Hydra>> {
        if let Some(hydra) = self.hydras.get(name) {
            return Ok(hydra.clone());
        }
        if name != DEFAULT_HYDRA {
            if let Some(allowed) = &self.allowed {
                if !allowed.contains(name) {
                    return Err(HydraError::HydraNotAllowed(name.to_string()));
                }
            }
        }
        // checked before the entry lock; concurrent first requests may overshoot by a few
        if let Some(limit) = self.limit {
            if self.hydras.len() >= limit {
                tracing::warn!(hydra = name, limit, "Hydra limit reached");
                return Err(HydraError::HydraLimitReached {
                    name: name.to_string(),
                    limit,
                });
            }
        }
        let entry = self
            .hydras
            .entry(name.to_string())
            .or_try_insert_with(|| {
                tracing::info!(hydra = name, "Summoning new hydra");
                (self.builder)(name)
            })?;
        Ok(entry.clone())
    }

    /// Names of the hydras built so far.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.hydras.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}
