//! Fallback for paths no route matched
//!
//! Unknown `/api/...` paths get a 404 envelope. Anything else is treated as
//! a frontend path: a file from the static directory, else `index.html` so
//! client-side routing works, else a JSON description of the API.

use std::path::{Component, Path, PathBuf};

use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::error::ApiError;
use crate::state::{AppState, API_BASE};

pub const NOT_FOUND_MESSAGE: &str = "Endpoint not found";

/// Served when there is no frontend to fall back to
#[derive(Serialize)]
pub struct ApiInfo {
    pub status: &'static str,
    pub message: &'static str,
    pub frontend: &'static str,
    pub api_endpoints: Vec<String>,
    pub modules: Vec<String>,
}

impl ApiInfo {
    pub fn new(state: &AppState) -> Self {
        let mut api_endpoints = vec![
            format!("{API_BASE}/health"),
            format!("{API_BASE}/modules"),
            format!("{API_BASE}/system/info"),
        ];
        api_endpoints.extend(state.modules().iter().map(|m| m.route_prefix.clone()));
        Self {
            status: "info",
            message: "IR Spectroscopy Control Interface API",
            frontend: "Not deployed",
            api_endpoints,
            modules: state.module_names(),
        }
    }
}

fn is_api_path(path: &str) -> bool {
    path == API_BASE || path.starts_with(&format!("{API_BASE}/"))
}

/// Map a request path onto `static_dir`, refusing anything that would
/// climb out of it
fn resolve(static_dir: &Path, request_path: &str) -> Option<PathBuf> {
    let relative = Path::new(request_path.trim_start_matches('/'));
    let mut resolved = static_dir.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(resolved)
}

async fn serve_file(path: PathBuf, request: Request) -> Response {
    match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

/// Router fallback
pub async fn fallback(State(state): State<AppState>, request: Request) -> Response {
    let path = request.uri().path().to_string();
    if is_api_path(&path) {
        return ApiError::NotFound(NOT_FOUND_MESSAGE.to_string()).into_response();
    }

    let static_dir = state.static_dir();
    if static_dir.is_dir() {
        if let Some(file) = resolve(static_dir, &path).filter(|p| p.is_file()) {
            return serve_file(file, request).await;
        }
        let index = static_dir.join("index.html");
        if index.is_file() {
            return serve_file(index, request).await;
        }
    }

    Json(ApiInfo::new(&state)).into_response()
}
