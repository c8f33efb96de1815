//! HTTP boundary of the catalog service.
//!
//! Writes go through `POST /api/command`: the body carries a `commandType`
//! discriminator plus the command fields; the handler stamps `ts` and `uid`
//! when absent, decodes tag-first and invokes the processor. Reads rebuild
//! the product by folding its Event Stream.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::domain::command::ProductCommand;
use crate::domain::product::{reduce, Product};
use crate::processor::{ProcessError, Processor};
use crate::store::EventStore;

/// Shared state of the HTTP boundary: the command processor for writes and
/// the store for queries.
#[derive(Clone)]
pub struct AppState {
    /// Store the query endpoints read from.
    pub store: Arc<dyn EventStore>,
    /// Processor the command endpoint dispatches to.
    pub processor: Processor,
}

/// Builds the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/command", post(submit_command))
        .route("/api/:namespace/products", get(list_products))
        .route("/api/:namespace/products/:sku", get(get_product))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// User-visible failure of an HTTP request. The body is the textual
/// diagnostic.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Decoding, validation, consistency, or stream-state failure.
    #[error("{0}")]
    BadRequest(String),

    /// A path component did not resolve.
    #[error("{0}")]
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        };

        (status, self.to_string()).into_response()
    }
}

impl From<ProcessError> for ApiError {
    fn from(error: ProcessError) -> Self {
        ApiError::BadRequest(error.to_string())
    }
}

async fn submit_command(
    State(state): State<AppState>,
    Json(mut body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let payload = body
        .as_object_mut()
        .ok_or_else(|| ApiError::BadRequest("command body must be a JSON object".to_owned()))?;

    let command_type = payload
        .get("commandType")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::BadRequest("missing commandType field".to_owned()))?
        .to_owned();

    // Commands the client did not timestamp or identify get server values.
    payload
        .entry("ts")
        .or_insert_with(|| json!(chrono::Utc::now().timestamp()));
    payload
        .entry("uid")
        .or_insert_with(|| json!(Uuid::new_v4().to_string()));

    let command = ProductCommand::parse(&command_type, body)
        .map_err(|error| ApiError::BadRequest(error.to_string()))?;

    state.processor.process(command).await?;

    Ok(Json(json!({ "ok": true })))
}

async fn list_products(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Json<Value> {
    // An unknown namespace reads as an empty one.
    let mut skus = state.store.streams(&namespace).await;
    skus.sort();

    Json(json!({ "namespace": namespace, "skus": skus }))
}

async fn get_product(
    State(state): State<AppState>,
    Path((namespace, sku)): Path<(String, String)>,
) -> Result<Json<Product>, ApiError> {
    if !state.store.namespace_exists(&namespace).await {
        return Err(ApiError::NotFound(format!(
            "namespace {namespace} not found"
        )));
    }

    if !state.store.stream_exists(&namespace, &sku).await {
        return Err(ApiError::NotFound(format!(
            "product {sku} not found in namespace {namespace}"
        )));
    }

    let events = state
        .store
        .event_range(&namespace, &sku, 0, -1)
        .await
        .map_err(|error| ApiError::BadRequest(error.to_string()))?;

    let product = reduce(Product::default(), &events)
        .map_err(|error| ApiError::BadRequest(error.to_string()))?;

    Ok(Json(product))
}
