use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use orchestrator::{PipelineKind, TestRunRequest};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::require_admin;
use crate::error::{AppError, ErrorResponse};
use crate::routes::body::optional_json;
use crate::routes::sse::stream_run;
use crate::state::AppState;

/// Demo runs take no options; an empty object (or no body) is expected
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct DemoRunRequest {}

#[utoipa::path(
    post,
    path = "/api/admin/demo/provision",
    request_body(content = DemoRunRequest, description = "Optional empty object"),
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
    tag = "demo"
)]
pub async fn provision_demo(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&state.config.server, &headers)?;
    let _: DemoRunRequest = optional_json(&body)?;
    Ok(stream_run(&state, PipelineKind::Demo, TestRunRequest::default()))
}

#[utoipa::path(
    post,
    path = "/api/admin/demo/friend",
    request_body(content = DemoRunRequest, description = "Optional empty object"),
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
    tag = "demo"
)]
pub async fn seed_demo_friend(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&state.config.server, &headers)?;
    let _: DemoRunRequest = optional_json(&body)?;
    Ok(stream_run(&state, PipelineKind::DemoFriend, TestRunRequest::default()))
}
