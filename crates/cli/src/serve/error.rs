//! Mapping from workflow errors to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use convenios_workflow::WorkflowError;
use tracing::error;

/// A handler error rendered as `{"error": ..., "kind": ...}`.
#[derive(Debug)]
pub(crate) struct ApiError(pub(crate) WorkflowError);

impl From<WorkflowError> for ApiError {
    fn from(e: WorkflowError) -> Self {
        ApiError(e)
    }
}

pub(crate) fn status_for(e: &WorkflowError) -> StatusCode {
    match e {
        WorkflowError::Unauthenticated => StatusCode::UNAUTHORIZED,
        WorkflowError::Unauthorized => StatusCode::FORBIDDEN,
        WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
        WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
        WorkflowError::Conflict(_) => StatusCode::CONFLICT,
        WorkflowError::Dependency { .. } => StatusCode::BAD_GATEWAY,
        WorkflowError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let message = match &self.0 {
            WorkflowError::Internal(detail) => {
                error!(%detail, "internal error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        let body = serde_json::json!({
            "error": message,
            "kind": self.0.kind(),
        });
        (status, Json(body)).into_response()
    }
}
