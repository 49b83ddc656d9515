use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PutRequest {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct KeyRequest {
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct ValueResponse {
    pub value: String,
}

/// Parse a JSON request body regardless of its declared content type.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "malformed request body");
        ApiError::BAD_REQUEST
    })
}

/// Token cancelled when the handler future is dropped (client went away)
/// or finishes, whichever comes first.
fn request_context() -> (CancellationToken, tokio_util::sync::DropGuard) {
    let ctx = CancellationToken::new();
    let guard = ctx.clone().drop_guard();
    (ctx, guard)
}

/// `PUT /api/v1/store`
pub async fn put_handler(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>, ApiError> {
    let req: PutRequest = parse_body(&body)?;
    let (ctx, _guard) = request_context();
    state.service.put(&ctx, &req.key, &req.value).await?;
    Ok(Json(json!({})))
}

/// `GET /api/v1/store`
pub async fn get_handler(State(state): State<AppState>, body: Bytes) -> Result<Json<ValueResponse>, ApiError> {
    let req: KeyRequest = parse_body(&body)?;
    let (ctx, _guard) = request_context();
    let value = state.service.get(&ctx, &req.key).await?;
    Ok(Json(ValueResponse { value }))
}

/// `DELETE /api/v1/store`
pub async fn delete_handler(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>, ApiError> {
    let req: KeyRequest = parse_body(&body)?;
    let (ctx, _guard) = request_context();
    state.service.delete(&ctx, &req.key).await?;
    Ok(Json(json!({})))
}

/// `GET /liveness`
pub async fn liveness_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `GET /readiness`: 200 only while the object service is serving.
pub async fn readiness_handler(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let phase = state.service.phase();
    let status = if state.service.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(json!({ "status": phase.to_string() })))
}
