use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use orchestrator::PipelineKind;
use phasestream_core::PhaseRegistry;

use crate::auth::require_admin;
use crate::error::{AppError, ErrorResponse};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/admin/pipelines/{name}/phases",
    params(
        ("name" = String, Path, description = "Pipeline name: demo, demo-friend or tests"),
    ),
    responses(
        (status = 200, description = "Declared phases of the pipeline", body = PhaseRegistry),
        (status = 401, description = "Missing or invalid admin token", body = ErrorResponse),
        (status = 404, description = "Unknown pipeline", body = ErrorResponse),
    ),
    tag = "pipelines"
)]
pub async fn get_pipeline_phases(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Result<Json<PhaseRegistry>, AppError> {
    require_admin(&state.config.server, &headers)?;
    let kind: PipelineKind = name.parse()?;
    Ok(Json(kind.registry()))
}
