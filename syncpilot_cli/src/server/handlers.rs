//! Request handlers

use super::error::{ApiError, ApiResult};
use super::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use log::debug;
use serde::{Deserialize, Serialize};
use syncpilot_core::{InstanceId, InstanceSnapshot, Operation};

/// Answer to an operator operation
#[derive(Debug, Serialize, Deserialize)]
pub struct OperationResponse {
    pub success: bool,
    pub message: String,
    pub instance: InstanceId,
    /// Instance state right after the operation
    pub snapshot: InstanceSnapshot,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub version: String,
    pub uptime: String,
}

fn success_message(operation: Operation, id: &InstanceId) -> String {
    match operation {
        Operation::Start => format!("Sync started on instance {id}"),
        Operation::Stop => format!("Sync stopped on instance {id}"),
        Operation::Commit => format!("Commit completed for instance {id}"),
        Operation::Reverse => format!("Reverse sync started for instance {id}"),
        Operation::Query => format!("Status refreshed for instance {id}"),
    }
}

async fn run(state: AppState, id: String, operation: Operation) -> ApiResult<Json<OperationResponse>> {
    let id = InstanceId::from(id);
    debug!("{operation} requested for instance {id}");

    let snapshot = state
        .controller
        .execute(&id, operation)
        .await
        .map_err(|e| ApiError::from(e).for_instance(&id))?;
    Ok(Json(OperationResponse {
        success: true,
        message: success_message(operation, &id),
        instance: id,
        snapshot,
    }))
}

/// `POST /start_sync/:id`
pub async fn start_sync(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<OperationResponse>> {
    run(state, id, Operation::Start).await
}

/// `POST /stop_sync/:id`
pub async fn stop_sync(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<OperationResponse>> {
    run(state, id, Operation::Stop).await
}

/// `POST /commit_sync/:id`
pub async fn commit_sync(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<OperationResponse>> {
    run(state, id, Operation::Commit).await
}

/// `POST /reverse_sync/:id`
pub async fn reverse_sync(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<OperationResponse>> {
    run(state, id, Operation::Reverse).await
}

/// `GET /sync_status/:id`
///
/// Refreshes progress first; an unreachable instance still yields its last
/// known snapshot.
pub async fn sync_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<InstanceSnapshot>> {
    let id = InstanceId::from(id);
    let snapshot = state
        .controller
        .query(&id)
        .await
        .map_err(|e| ApiError::from(e).for_instance(&id))?;
    Ok(Json(snapshot))
}

/// `GET /instances`
pub async fn list_instances(State(state): State<AppState>) -> Json<Vec<InstanceSnapshot>> {
    Json(state.controller.snapshots().await)
}

/// `GET /health`
pub async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime: state.uptime(),
    })
}
