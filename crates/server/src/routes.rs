//! HTTP routes and request/response marshaling.
//!
//! All routes live under `/v1`. Request bodies are decoded explicitly so a
//! malformed payload maps to the store error taxonomy and comes back as a
//! 400 with `{"status":"error","message":...}` rather than a framework
//! default.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use propstore_core::{Snapshot, StoreError};
use propstore_engine::{Predicate, UpdateBatch};

use crate::context::AppContext;

/// Build the application router over a shared context.
pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/store/:store/update", post(update_store))
        .route("/v1/store/:store/query", post(query_store))
        .route("/v1/store/:store/backup", get(backup_store))
        .route("/v1/store/:store/restore", post(restore_store))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

#[derive(Serialize)]
struct StatusBody {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

fn success() -> Json<StatusBody> {
    Json(StatusBody { status: "success", message: None })
}

/// Store errors rendered as HTTP responses. Every request-time error is the
/// caller's fault or a backend fault it can retry, so they all map to 400.
struct ApiError(StoreError);

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = StatusBody { status: "error", message: Some(self.0.to_string()) };
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

async fn health() -> Json<StatusBody> {
    success()
}

async fn update_store(
    State(ctx): State<Arc<AppContext>>,
    Path(store): Path<String>,
    body: Bytes,
) -> Result<Json<StatusBody>, ApiError> {
    let pair = ctx.store(&store)?;
    let batch: UpdateBatch = serde_json::from_slice(&body).map_err(StoreError::from)?;
    pair.update(&batch)?;
    Ok(success())
}

async fn query_store(
    State(ctx): State<Arc<AppContext>>,
    Path(store): Path<String>,
    body: Bytes,
) -> Result<Json<Vec<String>>, ApiError> {
    let pair = ctx.store(&store)?;
    let predicate: Predicate = serde_json::from_slice(&body).map_err(StoreError::from)?;
    let matched = pair.query(&predicate)?;
    Ok(Json(matched))
}

async fn backup_store(
    State(ctx): State<Arc<AppContext>>,
    Path(store): Path<String>,
) -> Result<Json<Snapshot>, ApiError> {
    let pair = ctx.store(&store)?;
    let snapshot = pair.export()?;
    Ok(Json(snapshot))
}

async fn restore_store(
    State(ctx): State<Arc<AppContext>>,
    Path(store): Path<String>,
    body: Bytes,
) -> Result<Json<StatusBody>, ApiError> {
    let pair = ctx.store(&store)?;
    let snapshot: Snapshot = serde_json::from_slice(&body).map_err(StoreError::from)?;
    pair.restore(&snapshot)?;
    Ok(success())
}
