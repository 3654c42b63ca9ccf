use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::catalog::HousingCatalog;
use super::domain::{Attachment, DocumentKind, HousingOptionId, IntakeStage, SectionUpdate};
use super::machine::WorkflowError;
use super::service::{IntakeService, IntakeServiceError, SessionId};
use super::submission::{AdvanceOutcome, ApplicationSubmitter, SubmissionErrorKind};

type SharedService<C, S> = Arc<IntakeService<C, S>>;

#[derive(Debug, Deserialize)]
pub(crate) struct JumpRequest {
    pub(crate) stage: IntakeStage,
}

/// Router builder exposing the intake workflow over JSON endpoints.
pub fn application_router<C, S>(service: SharedService<C, S>) -> Router
where
    C: HousingCatalog + 'static,
    S: ApplicationSubmitter + 'static,
{
    Router::new()
        .route(
            "/api/v1/intake/housing-options",
            get(housing_options_handler::<C, S>),
        )
        .route("/api/v1/intake/sessions", post(start_handler::<C, S>))
        .route(
            "/api/v1/intake/sessions/:session_id",
            get(view_handler::<C, S>).patch(update_handler::<C, S>),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/housing/:option_id/toggle",
            post(toggle_handler::<C, S>),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/documents/:kind",
            put(attach_handler::<C, S>).delete(remove_handler::<C, S>),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/advance",
            post(advance_handler::<C, S>),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/retreat",
            post(retreat_handler::<C, S>),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/jump",
            post(jump_handler::<C, S>),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/submit",
            post(submit_handler::<C, S>),
        )
        .with_state(service)
}

pub(crate) async fn housing_options_handler<C, S>(
    State(service): State<SharedService<C, S>>,
) -> Response
where
    C: HousingCatalog + 'static,
    S: ApplicationSubmitter + 'static,
{
    let options = service.housing_options().await;
    (StatusCode::OK, Json(json!({ "options": options }))).into_response()
}

pub(crate) async fn start_handler<C, S>(State(service): State<SharedService<C, S>>) -> Response
where
    C: HousingCatalog + 'static,
    S: ApplicationSubmitter + 'static,
{
    let view = service.start().await;
    (StatusCode::CREATED, Json(view)).into_response()
}

pub(crate) async fn view_handler<C, S>(
    State(service): State<SharedService<C, S>>,
    Path(session_id): Path<String>,
) -> Response
where
    C: HousingCatalog + 'static,
    S: ApplicationSubmitter + 'static,
{
    match service.view(&SessionId(session_id)).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn update_handler<C, S>(
    State(service): State<SharedService<C, S>>,
    Path(session_id): Path<String>,
    Json(update): Json<SectionUpdate>,
) -> Response
where
    C: HousingCatalog + 'static,
    S: ApplicationSubmitter + 'static,
{
    match service.update_section(&SessionId(session_id), update).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn toggle_handler<C, S>(
    State(service): State<SharedService<C, S>>,
    Path((session_id, option_id)): Path<(String, u64)>,
) -> Response
where
    C: HousingCatalog + 'static,
    S: ApplicationSubmitter + 'static,
{
    let result = service
        .toggle_housing(&SessionId(session_id), HousingOptionId(option_id))
        .await;
    match result {
        Ok((change, view)) => {
            (StatusCode::OK, Json(json!({ "change": change, "session": view }))).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn attach_handler<C, S>(
    State(service): State<SharedService<C, S>>,
    Path((session_id, kind)): Path<(String, DocumentKind)>,
    Json(attachment): Json<Attachment>,
) -> Response
where
    C: HousingCatalog + 'static,
    S: ApplicationSubmitter + 'static,
{
    match service
        .attach_document(&SessionId(session_id), kind, attachment)
        .await
    {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn remove_handler<C, S>(
    State(service): State<SharedService<C, S>>,
    Path((session_id, kind)): Path<(String, DocumentKind)>,
) -> Response
where
    C: HousingCatalog + 'static,
    S: ApplicationSubmitter + 'static,
{
    match service.remove_document(&SessionId(session_id), kind).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn advance_handler<C, S>(
    State(service): State<SharedService<C, S>>,
    Path(session_id): Path<String>,
) -> Response
where
    C: HousingCatalog + 'static,
    S: ApplicationSubmitter + 'static,
{
    match service.advance(&SessionId(session_id)).await {
        Ok((AdvanceOutcome::Moved { from, to }, view)) => {
            let payload = json!({
                "outcome": "moved",
                "from": from,
                "to": to,
                "session": view,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Ok((AdvanceOutcome::Submitted(reference), view)) => {
            let payload = json!({
                "outcome": "submitted",
                "reference": reference,
                "session": view,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn retreat_handler<C, S>(
    State(service): State<SharedService<C, S>>,
    Path(session_id): Path<String>,
) -> Response
where
    C: HousingCatalog + 'static,
    S: ApplicationSubmitter + 'static,
{
    match service.retreat(&SessionId(session_id)).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn jump_handler<C, S>(
    State(service): State<SharedService<C, S>>,
    Path(session_id): Path<String>,
    Json(request): Json<JumpRequest>,
) -> Response
where
    C: HousingCatalog + 'static,
    S: ApplicationSubmitter + 'static,
{
    match service.jump_to(&SessionId(session_id), request.stage).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_handler<C, S>(
    State(service): State<SharedService<C, S>>,
    Path(session_id): Path<String>,
) -> Response
where
    C: HousingCatalog + 'static,
    S: ApplicationSubmitter + 'static,
{
    match service.submit(&SessionId(session_id)).await {
        Ok((reference, view)) => {
            let payload = json!({ "reference": reference, "session": view });
            (StatusCode::ACCEPTED, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) fn error_response(error: IntakeServiceError) -> Response {
    let message = error.to_string();
    match error {
        IntakeServiceError::SessionNotFound(_) => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
        }
        IntakeServiceError::SubmissionInFlight(_) => {
            (StatusCode::CONFLICT, Json(json!({ "error": message }))).into_response()
        }
        IntakeServiceError::Workflow(error) => workflow_error_response(error, message),
    }
}

fn workflow_error_response(error: WorkflowError, message: String) -> Response {
    match error {
        WorkflowError::ValidationFailed { stage, missing } => {
            let payload = json!({
                "error": message,
                "stage": stage,
                "missing": missing,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        WorkflowError::JumpBlocked {
            target,
            blocking,
            missing,
        } => {
            let payload = json!({
                "error": message,
                "target": target,
                "stage": blocking,
                "missing": missing,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        WorkflowError::Attachment(_) | WorkflowError::UnknownHousingOption(_) => {
            (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "error": message }))).into_response()
        }
        WorkflowError::AtFirstStage
        | WorkflowError::Frozen { .. }
        | WorkflowError::NotAtReview { .. } => {
            (StatusCode::CONFLICT, Json(json!({ "error": message }))).into_response()
        }
        WorkflowError::Submission(error) => {
            let status = match error.kind {
                SubmissionErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::BAD_GATEWAY,
            };
            let payload = json!({
                "error": message,
                "kind": error.kind,
                "retryable": error.kind.is_retryable(),
                "stage": IntakeStage::Review,
            });
            (status, Json(payload)).into_response()
        }
    }
}
