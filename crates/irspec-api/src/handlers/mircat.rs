//! Laser endpoints, mounted under `/api/mircat`
//!
//! Long operations (arm, tune, emission on, scan) hold the request open
//! until the laser reports completion. `POST /cancel` interrupts the one
//! in flight, and so does a client hanging up: the operation runs on its
//! own task and is cancelled, not abandoned, so the session can stop a scan
//! on the laser.

use std::future::Future;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use irspec_core::CancellationToken;
use irspec_mircat::{
    DeviceResult, DeviceSession, LaserSession, LaserStatus, ScanRequest, ScanSummary, TuneRequest,
    TuneResult,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ApiError;
use crate::registry::{ModuleContext, RegistryError};
use crate::response::ApiResponse;

#[derive(Clone)]
pub struct MircatState {
    pub session: Arc<LaserSession>,
    /// Parent of every operation token; cancelled on server shutdown
    pub shutdown: CancellationToken,
}

#[derive(Debug, Deserialize)]
pub struct EmissionRequest {
    pub on: bool,
}

#[derive(Serialize)]
pub struct ConnectionData {
    pub connected: bool,
}

#[derive(Serialize)]
pub struct ArmedData {
    pub armed: bool,
}

#[derive(Serialize)]
pub struct EmissionData {
    pub emitting: bool,
}

#[derive(Serialize)]
pub struct CancelData {
    pub cancelled: bool,
}

/// Run one laser operation on its own task
///
/// The operation gets a child of the shutdown token. Dropping the request
/// future cancels that token, and the task keeps running until the session
/// has cleaned up.
async fn detached<T, F, Fut>(state: &MircatState, operation: F) -> Result<T, ApiError>
where
    F: FnOnce(Arc<LaserSession>, CancellationToken) -> Fut,
    Fut: Future<Output = DeviceResult<T>> + Send + 'static,
    T: Send + 'static,
{
    let cancel = state.shutdown.child_token();
    let on_drop = cancel.clone().drop_guard();
    let task = tokio::spawn(operation(state.session.clone(), cancel));
    let result = task
        .await
        .map_err(|e| ApiError::Internal(format!("Laser task failed: {}", e)))?;
    on_drop.disarm();
    Ok(result?)
}

/// Router factory named in the module's `routes.toml`
pub fn daylight_mircat_router(ctx: &ModuleContext) -> Result<Router, RegistryError> {
    let session = LaserSession::from_config(ctx.config.daylight_mircat.clone())
        .map_err(|e| RegistryError::Factory(e.to_string()))?;
    Ok(router(MircatState {
        session: Arc::new(session),
        shutdown: ctx.shutdown.clone(),
    }))
}

pub fn router(state: MircatState) -> Router {
    Router::new()
        .route("/connect", post(connect))
        .route("/disconnect", post(disconnect))
        .route("/status", get(status))
        .route("/arm", post(arm))
        .route("/disarm", post(disarm))
        .route("/tune", post(tune))
        .route("/emission", post(emission))
        .route("/scan", post(scan))
        .route("/cancel", post(cancel))
        .with_state(state)
}

/// POST /connect
pub async fn connect(
    State(state): State<MircatState>,
) -> Result<ApiResponse<ConnectionData>, ApiError> {
    match state.session.connect().await {
        Ok(()) => Ok(ApiResponse::success(ConnectionData { connected: true })
            .with_message("Connected to MIRcat")),
        Err(e) => Err(ApiError::from(e).with_data(json!({ "connected": false }))),
    }
}

/// POST /disconnect
pub async fn disconnect(
    State(state): State<MircatState>,
) -> Result<ApiResponse<ConnectionData>, ApiError> {
    state.session.disconnect().await?;
    Ok(ApiResponse::success(ConnectionData { connected: false })
        .with_message("Disconnected from MIRcat"))
}

/// GET /status
pub async fn status(State(state): State<MircatState>) -> ApiResponse<LaserStatus> {
    ApiResponse::success(state.session.status())
}

/// POST /arm
pub async fn arm(State(state): State<MircatState>) -> Result<ApiResponse<ArmedData>, ApiError> {
    detached(&state, |session, cancel| async move { session.arm(&cancel).await }).await?;
    Ok(ApiResponse::success(ArmedData { armed: true }).with_message("Laser armed"))
}

/// POST /disarm
pub async fn disarm(
    State(state): State<MircatState>,
) -> Result<ApiResponse<ArmedData>, ApiError> {
    let armed = state.session.disarm().await?;
    Ok(ApiResponse::success(ArmedData { armed }))
}

/// POST /tune
pub async fn tune(
    State(state): State<MircatState>,
    payload: Result<Json<TuneRequest>, JsonRejection>,
) -> Result<ApiResponse<TuneResult>, ApiError> {
    let Json(request) = payload?;
    let result = detached(&state, |session, cancel| async move {
        session.tune(request, &cancel).await
    })
    .await?;
    Ok(ApiResponse::success(result))
}

/// POST /emission
pub async fn emission(
    State(state): State<MircatState>,
    payload: Result<Json<EmissionRequest>, JsonRejection>,
) -> Result<ApiResponse<EmissionData>, ApiError> {
    let Json(request) = payload?;
    let emitting = detached(&state, |session, cancel| async move {
        session.set_emission(request.on, &cancel).await
    })
    .await?;
    Ok(ApiResponse::success(EmissionData { emitting }))
}

/// POST /scan
pub async fn scan(
    State(state): State<MircatState>,
    payload: Result<Json<ScanRequest>, JsonRejection>,
) -> Result<ApiResponse<ScanSummary>, ApiError> {
    let Json(request) = payload?;
    let summary = detached(&state, |session, cancel| async move {
        session.scan(request, &cancel).await
    })
    .await?;
    Ok(ApiResponse::success(summary))
}

/// POST /cancel
pub async fn cancel(State(state): State<MircatState>) -> ApiResponse<CancelData> {
    ApiResponse::success(CancelData {
        cancelled: state.session.cancel_current(),
    })
}
