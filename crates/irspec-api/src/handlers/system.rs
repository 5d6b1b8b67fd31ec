//! Gateway endpoints: health, module list, system information

use axum::extract::State;
use serde::Serialize;

use crate::response::ApiResponse;
use crate::state::{AppState, API_BASE, APPLICATION_NAME, APPLICATION_VERSION};

pub const HEALTH_MESSAGE: &str = "IR Spectroscopy Control Interface API is running";

#[derive(Serialize)]
pub struct HealthData {
    pub modules_loaded: usize,
}

#[derive(Serialize)]
pub struct ModulesData {
    pub modules: Vec<String>,
    pub count: usize,
}

#[derive(Serialize)]
pub struct SystemInfo {
    pub application: &'static str,
    pub version: &'static str,
    pub modules: Vec<String>,
    pub api_base: &'static str,
}

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> ApiResponse<HealthData> {
    ApiResponse::success(HealthData {
        modules_loaded: state.modules().len(),
    })
    .with_message(HEALTH_MESSAGE)
}

/// GET /api/modules
pub async fn list_modules(State(state): State<AppState>) -> ApiResponse<ModulesData> {
    let modules = state.module_names();
    let count = modules.len();
    ApiResponse::success(ModulesData { modules, count })
}

/// GET /api/system/info
pub async fn system_info(State(state): State<AppState>) -> ApiResponse<SystemInfo> {
    ApiResponse::success(SystemInfo {
        application: APPLICATION_NAME,
        version: APPLICATION_VERSION,
        modules: state.module_names(),
        api_base: API_BASE,
    })
}
