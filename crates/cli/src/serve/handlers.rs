//! Agreement route handlers: health, types, agreements, activity and admin
//! review.
//!
//! Handlers resolve the session before looking at the body or the query, so
//! an anonymous or under-privileged caller never gets a validation error.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use convenios_workflow::{
    parse_limit, CreateAgreement, TransitionRequest, WorkflowError, DEFAULT_ACTIVITY_LIMIT,
    DEFAULT_AGREEMENT_LIMIT,
};
use serde::Deserialize;
use serde_json::json;

use super::error::ApiError;
use super::json_error;
use super::middleware::{Origin, Session};
use super::state::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct LimitQuery {
    limit: Option<String>,
}

/// Unwrap a JSON body, turning extractor rejections into validation errors.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| ApiError(WorkflowError::Validation(e.body_text())))
}

/// Unwrap query parameters, turning extractor rejections into validation
/// errors.
pub(crate) fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    query
        .map(|Query(value)| value)
        .map_err(|e| ApiError(WorkflowError::Validation(e.body_text())))
}

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /health
pub(crate) async fn handle_health() -> impl IntoResponse {
    let response = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(response))
}

/// GET /convenio-types
pub(crate) async fn handle_list_types(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<impl IntoResponse, ApiError> {
    let types = state.workflow.list_agreement_types(session.token()).await?;
    Ok(Json(json!({ "types": types })))
}

/// GET /convenios?limit=
pub(crate) async fn handle_list_convenios(
    State(state): State<Arc<AppState>>,
    session: Session,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    state.workflow.authenticate(session.token()).await?;
    let query = query_params(query)?;
    let limit = parse_limit(query.limit.as_deref(), DEFAULT_AGREEMENT_LIMIT)?;
    let convenios = state
        .workflow
        .list_agreements(session.token(), limit)
        .await?;
    Ok(Json(json!({ "convenios": convenios })))
}

/// POST /convenios
pub(crate) async fn handle_create_convenio(
    State(state): State<Arc<AppState>>,
    session: Session,
    Origin(origin): Origin,
    payload: Result<Json<CreateAgreement>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    state.workflow.authenticate(session.token()).await?;
    let request = json_body(payload)?;
    let outcome = state
        .workflow
        .create_agreement(session.token(), request, &origin)
        .await?;
    let body = json!({
        "success": true,
        "convenio": outcome.value,
        "warnings": outcome.warnings,
    });
    Ok((StatusCode::CREATED, Json(body)))
}

/// GET /convenios/{id}
pub(crate) async fn handle_get_convenio(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state.workflow.agreement_detail(session.token(), &id).await?;
    Ok(Json(detail))
}

/// GET /activity?limit=
pub(crate) async fn handle_activity(
    State(state): State<Arc<AppState>>,
    session: Session,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    state.workflow.authenticate(session.token()).await?;
    let query = query_params(query)?;
    let limit = parse_limit(query.limit.as_deref(), DEFAULT_ACTIVITY_LIMIT)?;
    let activity = state.workflow.activity_feed(session.token(), limit).await?;
    Ok(Json(json!({ "activity": activity })))
}

/// POST /admin/convenios/{id}/actions
pub(crate) async fn handle_admin_action(
    State(state): State<Arc<AppState>>,
    session: Session,
    Origin(origin): Origin,
    Path(id): Path<String>,
    payload: Result<Json<TransitionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    state.workflow.require_admin(session.token()).await?;
    let request = json_body(payload)?;
    let outcome = state
        .workflow
        .transition(session.token(), &id, request, &origin)
        .await?;
    let receipt = outcome.value;
    Ok(Json(json!({
        "success": true,
        "convenio_id": receipt.agreement_id,
        "status_from": receipt.status_from,
        "status_to": receipt.status_to,
        "version": receipt.version,
        "warnings": outcome.warnings,
    })))
}
