//! Model registry and probe HTTP handlers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use modelwatch_core::{ModelEndpoint, ModelEndpointId, ProbeStatus};
use tracing::info;

use crate::dto::{
    AddModelRequest, AddModelResponse, ModelInfo, ProbeStartedResponse, SuccessResponse,
    TestModelBody, TestModelResponse, UpdateModelRequest,
};
use crate::error::AppError;
use crate::services;
use crate::ServerState;

/// Lists registered models with their probe status.
pub async fn list(State(state): State<Arc<ServerState>>) -> Result<Json<Vec<ModelInfo>>, AppError> {
    services::model::list(&state).map(Json)
}

/// Registers a new model.
pub async fn add(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<AddModelRequest>,
) -> Result<(StatusCode, Json<AddModelResponse>), AppError> {
    info!("Registering model: {} ({})", req.model_name, req.model_type);
    let model_id = services::model::register(&state, req)?;
    Ok((StatusCode::CREATED, Json(AddModelResponse { success: true, model_id })))
}

/// Gets a single model.
pub async fn get(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<Json<ModelEndpoint>, AppError> {
    services::model::get(&state, &ModelEndpointId::new(id)).map(Json)
}

/// Edits a model.
pub async fn update(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateModelRequest>,
) -> Result<Json<ModelEndpoint>, AppError> {
    services::model::update(&state, &ModelEndpointId::new(id), req).map(Json)
}

/// Deletes a model.
pub async fn remove(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    services::model::remove(&state, &ModelEndpointId::new(id))?;
    Ok(Json(SuccessResponse { success: true }))
}

/// Gets the studio default model.
pub async fn get_default(State(state): State<Arc<ServerState>>) -> Result<Json<ModelEndpoint>, AppError> {
    services::model::get_default(&state).map(Json)
}

/// Makes a model the studio default.
pub async fn set_default(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    services::model::set_default(&state, &ModelEndpointId::new(id))?;
    Ok(Json(SuccessResponse { success: true }))
}

/// Returns the probe status of every model.
pub async fn statuses(State(state): State<Arc<ServerState>>) -> Json<HashMap<ModelEndpointId, ProbeStatus>> {
    Json(services::model::statuses(&state))
}

/// Starts a background probe.
pub async fn probe(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<ProbeStartedResponse>), AppError> {
    let model_id = ModelEndpointId::new(id);
    let status = services::model::probe(&state, &model_id)?;
    Ok((StatusCode::ACCEPTED, Json(ProbeStartedResponse { model_id, status })))
}

/// Sends one test request and returns the model's literal response.
pub async fn test(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<TestModelResponse>, AppError> {
    let body: TestModelBody = match body.is_empty() {
        true => TestModelBody::default(),
        false => serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("invalid test request: {e}")))?,
    };
    let message = body.message;
    services::model::test(&state, &ModelEndpointId::new(id), message).await.map(Json)
}
