//! irspec-api - HTTP gateway for the IR spectroscopy control interface
//!
//! Serves the gateway's own endpoints (health, module list, system info),
//! mounts one router per discovered hardware module, and falls back to the
//! built frontend for every other path.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use irspec_api::{build_app, HardwareConfig, ModuleContext};
//!
//! let config = Arc::new(HardwareConfig::load_or_default("hardware_configuration.toml".as_ref()));
//! let app = build_app(&ModuleContext::new(config));
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod registry;
pub mod response;
pub mod state;

pub use config::{ConfigError, HardwareConfig, ServerConfig, DEFAULT_CONFIG_PATH};
pub use error::ApiError;
pub use registry::{
    bind, discover_modules, ModuleCatalog, ModuleContext, ModuleDescriptor, RegistryError,
};
pub use response::ApiResponse;
pub use state::{AppState, ModuleSummary};

use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Gateway router: system endpoints, the given modules and the fallback
pub fn create_router(state: AppState, modules: Vec<ModuleDescriptor>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let gateway = Router::new()
        .route("/api/health", get(handlers::system::health))
        .route("/api/modules", get(handlers::system::list_modules))
        .route("/api/system/info", get(handlers::system::system_info))
        .fallback(handlers::frontend::fallback)
        .with_state(state);

    bind(gateway, modules)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Discover the built-in modules under the configured modules root and
/// assemble the full gateway
pub fn build_app(ctx: &ModuleContext) -> Router {
    let server = &ctx.config.server;
    let modules = discover_modules(&server.modules_dir, &ModuleCatalog::builtin(), ctx);
    let names: Vec<&str> = modules.iter().map(|m| m.name.as_str()).collect();
    tracing::info!(count = modules.len(), modules = ?names, "Registered modules");

    let state = AppState::from_descriptors(&modules, server.static_dir.clone());
    create_router(state, modules)
}
