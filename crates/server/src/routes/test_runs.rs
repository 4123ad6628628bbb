use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use orchestrator::{PipelineKind, TestRunRequest};
use tracing::debug;

use crate::auth::require_admin;
use crate::error::{AppError, ErrorResponse};
use crate::routes::body::optional_json;
use crate::routes::sse::stream_run;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/api/admin/tests/run",
    request_body(content = TestRunRequest, description = "Filter and suite selection"),
    responses(
        (
            status = 200,
            description = "Progress event stream",
            content_type = "text/event-stream",
            body = events::ProgressEvent
        ),
        (status = 400, description = "Malformed body", body = ErrorResponse),
        (status = 401, description = "Missing or invalid admin token", body = ErrorResponse),
    ),
    tag = "tests"
)]
pub async fn run_tests(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&state.config.server, &headers)?;
    let request: TestRunRequest = optional_json(&body)?;
    debug!(?request, "Test run requested");
    Ok(stream_run(&state, PipelineKind::Tests, request))
}
