//! Hardware module registry
//!
//! Each subdirectory of the modules root is a candidate hardware module. A
//! module is registered when its directory holds a `routes.toml` naming a
//! router that the [`ModuleCatalog`] knows how to build:
//!
//! ```toml
//! router = "arduino_uno_r4_router"   # or "<name>_bp"
//! prefix = "/api/arduino"            # optional, default "/api/<name>"
//! ```
//!
//! Discovery never fails as a whole. A module that cannot be loaded is
//! logged and skipped.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use irspec_core::CancellationToken;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::HardwareConfig;
use crate::handlers;

/// Route-binding artifact expected in every module directory
pub const ROUTE_ARTIFACT: &str = "routes.toml";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no {artifact} in {dir}")]
    MissingArtifact { dir: PathBuf, artifact: &'static str },

    #[error("cannot load {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("router '{router}' does not follow the '{module}_router' / '{module}_bp' convention")]
    Naming { module: String, router: String },

    #[error("no router named '{0}' is available")]
    UnknownRouter(String),

    #[error("invalid route prefix '{0}'")]
    InvalidPrefix(String),

    #[error("route prefix '{prefix}' already taken by module '{owner}'")]
    DuplicatePrefix { prefix: String, owner: String },

    #[error("router factory failed: {0}")]
    Factory(String),
}

/// What router factories get to build their module
#[derive(Clone)]
pub struct ModuleContext {
    pub config: Arc<HardwareConfig>,
    /// Cancelled when the server shuts down
    pub shutdown: CancellationToken,
}

impl ModuleContext {
    pub fn new(config: Arc<HardwareConfig>) -> Self {
        Self {
            config,
            shutdown: CancellationToken::new(),
        }
    }
}

/// Builds the router of one hardware module
pub type RouterFactory = fn(&ModuleContext) -> Result<Router, RegistryError>;

/// Router names that may appear in `routes.toml`, and their factories
#[derive(Clone, Default)]
pub struct ModuleCatalog {
    entries: Vec<(&'static str, RouterFactory)>,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The hardware modules shipped with this crate
    pub fn builtin() -> Self {
        Self::new()
            .register("arduino_uno_r4_router", handlers::arduino::arduino_uno_r4_router)
            .register("daylight_mircat_router", handlers::mircat::daylight_mircat_router)
    }

    pub fn register(mut self, router: &'static str, factory: RouterFactory) -> Self {
        self.entries.retain(|(name, _)| *name != router);
        self.entries.push((router, factory));
        self
    }

    pub fn get(&self, router: &str) -> Option<RouterFactory> {
        self.entries
            .iter()
            .find(|(name, _)| *name == router)
            .map(|(_, factory)| *factory)
    }

    pub fn router_names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(name, _)| *name).collect()
    }
}

#[derive(Debug, Deserialize)]
struct RouteBinding {
    router: String,
    #[serde(default)]
    prefix: Option<String>,
}

/// A registered hardware module
pub struct ModuleDescriptor {
    pub name: String,
    pub route_prefix: String,
    pub router: Router,
}

impl std::fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("name", &self.name)
            .field("route_prefix", &self.route_prefix)
            .finish_non_exhaustive()
    }
}

fn is_candidate(name: &str) -> bool {
    !name.starts_with("__") && !name.starts_with('.')
}

/// Paths owned by the gateway itself
const RESERVED_PREFIXES: [&str; 4] = ["/api", "/api/health", "/api/modules", "/api/system"];

/// Literal path segment: no captures, wildcards or dot segments
fn is_literal_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn check_prefix(prefix: &str) -> Result<(), RegistryError> {
    let reserved = RESERVED_PREFIXES
        .iter()
        .any(|r| prefix == *r || (*r != "/api" && prefix.starts_with(&format!("{r}/"))));
    let valid = !reserved
        && prefix
            .strip_prefix('/')
            .is_some_and(|path| path.split('/').all(is_literal_segment));
    if valid {
        Ok(())
    } else {
        Err(RegistryError::InvalidPrefix(prefix.to_string()))
    }
}

fn load_module(
    dir: &Path,
    name: &str,
    catalog: &ModuleCatalog,
    ctx: &ModuleContext,
) -> Result<ModuleDescriptor, RegistryError> {
    let path = dir.join(ROUTE_ARTIFACT);
    if !path.is_file() {
        return Err(RegistryError::MissingArtifact {
            dir: dir.to_path_buf(),
            artifact: ROUTE_ARTIFACT,
        });
    }

    let content = std::fs::read_to_string(&path).map_err(|e| RegistryError::Unreadable {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    let binding: RouteBinding = toml::from_str(&content).map_err(|e| RegistryError::Unreadable {
        path: path.clone(),
        reason: e.to_string(),
    })?;

    if binding.router != format!("{name}_router") && binding.router != format!("{name}_bp") {
        return Err(RegistryError::Naming {
            module: name.to_string(),
            router: binding.router,
        });
    }

    let factory = catalog
        .get(&binding.router)
        .ok_or_else(|| RegistryError::UnknownRouter(binding.router.clone()))?;

    let route_prefix = binding.prefix.unwrap_or_else(|| format!("/api/{name}"));
    check_prefix(&route_prefix)?;

    let router = factory(ctx)?;
    Ok(ModuleDescriptor {
        name: name.to_string(),
        route_prefix,
        router,
    })
}

/// Scan `root` and build every module that passes the checks, sorted by name
pub fn discover_modules(
    root: &Path,
    catalog: &ModuleCatalog,
    ctx: &ModuleContext,
) -> Vec<ModuleDescriptor> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(root = %root.display(), error = %e, "Modules root unavailable");
            return Vec::new();
        }
    };

    let mut candidates: Vec<(String, PathBuf)> = entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(root = %root.display(), error = %e, "Unreadable modules root entry");
                None
            }
        })
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_string();
            is_candidate(&name).then(|| (name, entry.path()))
        })
        .collect();
    candidates.sort();

    let mut modules: Vec<ModuleDescriptor> = Vec::new();
    for (name, dir) in candidates {
        match load_module(&dir, &name, catalog, ctx) {
            Ok(module) => {
                if let Some(owner) = modules.iter().find(|m| m.route_prefix == module.route_prefix)
                {
                    let err = RegistryError::DuplicatePrefix {
                        prefix: module.route_prefix.clone(),
                        owner: owner.name.clone(),
                    };
                    warn!(module = %name, error = %err, "Skipping module");
                    continue;
                }
                info!(module = %name, prefix = %module.route_prefix, "Registered module");
                modules.push(module);
            }
            Err(e) => {
                warn!(module = %name, error = %e, "Skipping module");
            }
        }
    }
    modules
}

/// Nest every module router under its prefix
pub fn bind(router: Router, modules: Vec<ModuleDescriptor>) -> Router {
    modules.into_iter().fold(router, |router, module| {
        router.nest(&module.route_prefix, module.router)
    })
}
