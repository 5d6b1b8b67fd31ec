//! Application state for the gateway's own endpoints

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::registry::ModuleDescriptor;

pub const APPLICATION_NAME: &str = "IR Pump-Probe Spectroscopy Control Interface";
pub const APPLICATION_VERSION: &str = "1.0.0";
pub const API_BASE: &str = "/api";

/// Name and mount point of a registered module
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleSummary {
    pub name: String,
    pub route_prefix: String,
}

impl From<&ModuleDescriptor> for ModuleSummary {
    fn from(module: &ModuleDescriptor) -> Self {
        Self {
            name: module.name.clone(),
            route_prefix: module.route_prefix.clone(),
        }
    }
}

/// State shared by the system and frontend handlers
#[derive(Clone)]
pub struct AppState {
    modules: Arc<Vec<ModuleSummary>>,
    static_dir: Arc<PathBuf>,
}

impl AppState {
    pub fn new(modules: Vec<ModuleSummary>, static_dir: impl Into<PathBuf>) -> Self {
        Self {
            modules: Arc::new(modules),
            static_dir: Arc::new(static_dir.into()),
        }
    }

    pub fn from_descriptors(modules: &[ModuleDescriptor], static_dir: impl Into<PathBuf>) -> Self {
        Self::new(modules.iter().map(ModuleSummary::from).collect(), static_dir)
    }

    pub fn modules(&self) -> &[ModuleSummary] {
        &self.modules
    }

    /// Registered module names, in registration order
    pub fn module_names(&self) -> Vec<String> {
        self.modules.iter().map(|m| m.name.clone()).collect()
    }

    pub fn static_dir(&self) -> &Path {
        &self.static_dir
    }
}
