use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::rejection::{BytesRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use shardline_store::ObjectStore;
use shardline_types::{Object, ObjectId, RequestContext};
use tracing::warn;

use crate::error::{ApiError, MessageResponse};

pub const INVALID_ID_MESSAGE: &str =
    "Invalid objectID. Must be alfa-numeric string between 1 and 32 characters.";

/// Content type served for objects stored without one.
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn ObjectStore>,
    root: RequestContext,
    request_timeout: Duration,
}

impl AppState {
    /// `root` is the server-wide context; cancelling it aborts every
    /// in-flight request.
    pub fn new(store: Arc<dyn ObjectStore>, root: RequestContext, request_timeout: Duration) -> Self {
        Self {
            store,
            root,
            request_timeout,
        }
    }

    fn request_context(&self) -> RequestContext {
        self.root.child().with_timeout(self.request_timeout)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}

/// Liveness check. Does not touch the storage nodes.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// Any path the extractor cannot decode (bad percent-encoding, non UTF-8)
/// is as invalid as a malformed id.
fn parse_id(path: Result<Path<String>, PathRejection>) -> Result<ObjectId, ApiError> {
    let invalid = || ApiError::new(StatusCode::BAD_REQUEST, INVALID_ID_MESSAGE);
    let Path(raw) = path.map_err(|rejection| {
        warn!(error = %rejection, "cannot decode object id");
        invalid()
    })?;
    ObjectId::try_from(raw).map_err(|_| invalid())
}

/// `GET|PUT /object/` with no id at all.
pub async fn missing_id_handler() -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, INVALID_ID_MESSAGE)
}

/// `GET /object/{id}`: the stored bytes under the stored content type.
pub async fn get_object(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Response, ApiError> {
    let id = parse_id(path)?;
    let ctx = state.request_context();

    let object = match state.store.get(&ctx, id.as_str()).await {
        Ok(Some(object)) => object,
        Ok(None) => {
            return Err(ApiError::new(
                StatusCode::NOT_FOUND,
                format!("Object doesn't exist: {id}"),
            ))
        }
        Err(err) => {
            warn!(id = %id, error = %err, "cannot retrieve object");
            return Err(ApiError::from_store(&err, format!("Error retrieving object: {id}")));
        }
    };

    let content_type = if object.content_type.is_empty() {
        FALLBACK_CONTENT_TYPE.to_string()
    } else {
        object.content_type
    };
    Ok(([(header::CONTENT_TYPE, content_type)], object.content).into_response())
}

/// `PUT /object/{id}`: store the body under the request's content type.
pub async fn put_object(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_id(path)?;
    let content = body.map_err(|rejection| {
        warn!(id = %id, error = %rejection, "cannot read request body");
        let status = match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        ApiError::new(status, "Cannot read request body")
    })?;
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let object = Object::new(id.as_str(), content_type, content);
    let ctx = state.request_context();
    if let Err(err) = state.store.put(&ctx, &object).await {
        warn!(id = %id, error = %err, "cannot store object");
        return Err(ApiError::from_store(&err, format!("Cannot store object: {id}")));
    }

    Ok(Json(MessageResponse::new(format!(
        "Object was successfully stored with ID: {id}"
    ))))
}
