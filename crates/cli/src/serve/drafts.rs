//! Draft route handlers.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use convenios_workflow::draft::{AgreementDraft, DraftStepInput, StartDraft};
use serde_json::json;

use super::error::ApiError;
use super::handlers::json_body;
use super::middleware::{Origin, Session};
use super::state::AppState;

fn draft_body(draft: &AgreementDraft) -> serde_json::Value {
    json!({
        "draft": draft,
        "version": draft.version,
        "current_step": draft.current_step(),
        "progress": draft.progress_percent(),
    })
}

/// POST /drafts
pub(crate) async fn handle_start_draft(
    State(state): State<Arc<AppState>>,
    session: Session,
    payload: Result<Json<StartDraft>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    state.workflow.authenticate(session.token()).await?;
    let start = json_body(payload)?;
    let draft = state.workflow.start_draft(session.token(), start).await?;
    Ok((StatusCode::CREATED, Json(draft_body(&draft))))
}

/// GET /drafts/{id}
pub(crate) async fn handle_get_draft(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let draft = state.workflow.get_draft(session.token(), &id).await?;
    Ok(Json(draft_body(&draft)))
}

/// PUT /drafts/{id}
pub(crate) async fn handle_update_draft(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<String>,
    payload: Result<Json<DraftStepInput>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    state.workflow.authenticate(session.token()).await?;
    let input = json_body(payload)?;
    let draft = state
        .workflow
        .update_draft_step(session.token(), &id, input)
        .await?;
    Ok(Json(draft_body(&draft)))
}

/// POST /drafts/{id}/submit
pub(crate) async fn handle_submit_draft(
    State(state): State<Arc<AppState>>,
    session: Session,
    Origin(origin): Origin,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .workflow
        .submit_draft(session.token(), &id, &origin)
        .await?;
    let body = json!({
        "success": true,
        "convenio": outcome.value,
        "warnings": outcome.warnings,
    });
    Ok((StatusCode::CREATED, Json(body)))
}
