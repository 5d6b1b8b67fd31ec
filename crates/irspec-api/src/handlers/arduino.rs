//! Multiplexer controller endpoints, mounted under `/api/arduino`

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use irspec_serial::{DeviceSession, MuxController, MuxStatus, PositionRange};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ApiError;
use crate::registry::{ModuleContext, RegistryError};
use crate::response::ApiResponse;

#[derive(Debug, Deserialize)]
pub struct PositionRequest {
    pub position: i64,
}

#[derive(Serialize)]
pub struct ConnectionData {
    pub connected: bool,
}

#[derive(Serialize)]
pub struct CurrentPosition {
    pub current_position: i64,
}

#[derive(Serialize)]
pub struct PositionChange {
    pub current_position: i64,
    pub target_position: i64,
}

/// Router factory named in the module's `routes.toml`
pub fn arduino_uno_r4_router(ctx: &ModuleContext) -> Result<Router, RegistryError> {
    let controller = MuxController::from_config(ctx.config.arduino_uno_r4.clone())
        .map_err(|e| RegistryError::Factory(e.to_string()))?;
    Ok(router(Arc::new(controller)))
}

/// Routes for one controller
pub fn router(controller: Arc<MuxController>) -> Router {
    Router::new()
        .route("/connect", post(connect))
        .route("/disconnect", post(disconnect))
        .route("/status", get(status))
        .route("/mux/position", get(get_position).post(set_position))
        .route("/mux/positions", get(available_positions))
        .with_state(controller)
}

/// POST /connect
pub async fn connect(
    State(controller): State<Arc<MuxController>>,
) -> Result<ApiResponse<ConnectionData>, ApiError> {
    match controller.connect().await {
        Ok(()) => Ok(ApiResponse::success(ConnectionData { connected: true })
            .with_message("Connected to Arduino")),
        Err(e) => Err(ApiError::from(e).with_data(json!({ "connected": false }))),
    }
}

/// POST /disconnect
pub async fn disconnect(
    State(controller): State<Arc<MuxController>>,
) -> Result<ApiResponse<ConnectionData>, ApiError> {
    controller.disconnect().await?;
    Ok(ApiResponse::success(ConnectionData { connected: false })
        .with_message("Disconnected from Arduino"))
}

/// GET /status
pub async fn status(State(controller): State<Arc<MuxController>>) -> ApiResponse<MuxStatus> {
    ApiResponse::success(controller.status().await)
}

/// GET /mux/position
pub async fn get_position(
    State(controller): State<Arc<MuxController>>,
) -> Result<ApiResponse<CurrentPosition>, ApiError> {
    let current_position = controller.get_position().await?;
    Ok(ApiResponse::success(CurrentPosition { current_position }))
}

/// POST /mux/position
pub async fn set_position(
    State(controller): State<Arc<MuxController>>,
    payload: Result<Json<PositionRequest>, JsonRejection>,
) -> Result<ApiResponse<PositionChange>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection.body_text(), "Rejected position body");
        ApiError::BadRequest("Invalid position value".to_string())
    })?;

    let position = request.position;
    let config = controller.config();
    if !config.contains_position(position) {
        return Err(ApiError::BadRequest(format!(
            "Position {} out of range ({}-{})",
            position, config.min_position, config.max_position
        )));
    }

    controller.set_position(position).await?;
    Ok(ApiResponse::success(PositionChange {
        current_position: position,
        target_position: position,
    })
    .with_message(format!("MUX position set to {}", position)))
}

/// GET /mux/positions
pub async fn available_positions(
    State(controller): State<Arc<MuxController>>,
) -> ApiResponse<PositionRange> {
    ApiResponse::success(controller.available_positions())
}
