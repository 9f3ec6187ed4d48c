//! Files shipped alongside a plugin.

use bytes::Bytes;
use std::path::{Component, Path, PathBuf};

use crate::error::{HydraError, HydraResult};

const FIXTURES_DIR: &str = "fixtures";

/// Loads files from `<plugin path>/fixtures`.
#[derive(Debug, Clone)]
pub struct Fixtures {
    base: Option<PathBuf>,
}

impl Fixtures {
    pub fn new(plugin_path: Option<&Path>) -> Self {
        Self {
            base: plugin_path.map(|p| p.join(FIXTURES_DIR)),
        }
    }

    pub fn base(&self) -> Option<&Path> {
        self.base.as_deref()
    }

    /// Read a fixture. Absolute paths and `..` components are rejected.
    pub fn load(&self, relative: &str) -> HydraResult<Bytes> {
        let path = self.resolve(relative)?;
        std::fs::read(&path)
            .map(Bytes::from)
            .map_err(|e| HydraError::Fixture(format!("cannot read '{}': {e}", path.display())))
    }

    fn resolve(&self, relative: &str) -> HydraResult<PathBuf> {
        let base = self
            .base
            .as_ref()
            .ok_or_else(|| HydraError::Fixture(format!("no plugin path to load '{relative}' from")))?;
        let requested = Path::new(relative);
        let safe = requested
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if relative.is_empty() || !safe {
            return Err(HydraError::Fixture(format!("refusing fixture path '{relative}'")));
        }
        Ok(base.join(requested))
    }
}
