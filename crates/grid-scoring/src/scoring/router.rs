use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::profile::ApplicationId;
use super::repository::{AttributeSetProvider, GridDefinitionProvider, ResultStore};
use super::result::EvaluationId;
use super::service::{EvaluationError, EvaluationOrchestrator};

/// Query parameters accepted by the create endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEvaluationParams {
    pub application_id: Option<String>,
    pub grid_name: Option<String>,
}

/// Router builder exposing evaluation creation and lookups.
pub fn evaluation_router<G, A, S>(orchestrator: Arc<EvaluationOrchestrator<G, A, S>>) -> Router
where
    G: GridDefinitionProvider + 'static,
    A: AttributeSetProvider + 'static,
    S: ResultStore + 'static,
{
    Router::new()
        .route("/api/evaluations/create", post(create_handler::<G, A, S>))
        .route(
            "/api/evaluations/:evaluation_id",
            get(result_handler::<G, A, S>),
        )
        .route(
            "/api/evaluations/application/:application_id",
            get(history_handler::<G, A, S>),
        )
        .route(
            "/api/evaluations/application/:application_id/latest",
            get(latest_handler::<G, A, S>),
        )
        .with_state(orchestrator)
}

pub(crate) async fn create_handler<G, A, S>(
    State(orchestrator): State<Arc<EvaluationOrchestrator<G, A, S>>>,
    Query(params): Query<CreateEvaluationParams>,
) -> Response
where
    G: GridDefinitionProvider + 'static,
    A: AttributeSetProvider + 'static,
    S: ResultStore + 'static,
{
    let application_id = params
        .application_id
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
    let grid_name = params
        .grid_name
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    let (Some(application_id), Some(grid_name)) = (application_id, grid_name) else {
        return failure(
            StatusCode::BAD_REQUEST,
            "applicationId and gridName are required".to_string(),
        );
    };

    match orchestrator.evaluate(&ApplicationId(application_id), &grid_name) {
        Ok(result) => (StatusCode::CREATED, axum::Json(result.summary())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn result_handler<G, A, S>(
    State(orchestrator): State<Arc<EvaluationOrchestrator<G, A, S>>>,
    Path(evaluation_id): Path<String>,
) -> Response
where
    G: GridDefinitionProvider + 'static,
    A: AttributeSetProvider + 'static,
    S: ResultStore + 'static,
{
    match orchestrator.result(&EvaluationId(evaluation_id)) {
        Ok(result) => (StatusCode::OK, axum::Json(result)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn history_handler<G, A, S>(
    State(orchestrator): State<Arc<EvaluationOrchestrator<G, A, S>>>,
    Path(application_id): Path<String>,
) -> Response
where
    G: GridDefinitionProvider + 'static,
    A: AttributeSetProvider + 'static,
    S: ResultStore + 'static,
{
    match orchestrator.history(&ApplicationId(application_id)) {
        Ok(results) => (StatusCode::OK, axum::Json(results)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn latest_handler<G, A, S>(
    State(orchestrator): State<Arc<EvaluationOrchestrator<G, A, S>>>,
    Path(application_id): Path<String>,
) -> Response
where
    G: GridDefinitionProvider + 'static,
    A: AttributeSetProvider + 'static,
    S: ResultStore + 'static,
{
    match orchestrator.latest(&ApplicationId(application_id)) {
        Ok(result) => (StatusCode::OK, axum::Json(result)).into_response(),
        Err(error) => error_response(error),
    }
}

fn error_response(error: EvaluationError) -> Response {
    let status = match &error {
        EvaluationError::GridNotFound(_)
        | EvaluationError::ProfileNotFound(_)
        | EvaluationError::EvaluationNotFound(_)
        | EvaluationError::NoEvaluations(_) => StatusCode::NOT_FOUND,
        EvaluationError::InvalidGridDefinition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        EvaluationError::SourceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        EvaluationError::Persistence { .. } | EvaluationError::Store(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    failure(status, error.to_string())
}

fn failure(status: StatusCode, message: String) -> Response {
    let payload = json!({
        "success": false,
        "message": message,
    });
    (status, axum::Json(payload)).into_response()
}
