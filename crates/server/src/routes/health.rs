use axum::Json;
use orchestrator::PipelineKind;
use serde::Serialize;
use utoipa::ToSchema;

const ENGINE_NAME: &str = "phasestream";

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    engine: String,
    version: String,
    /// Pipelines this engine can stream, by route name
    pipelines: Vec<String>,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Engine liveness and served pipelines", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        engine: ENGINE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        pipelines: PipelineKind::ALL
            .iter()
            .map(|kind| kind.name().to_string())
            .collect(),
    })
}
