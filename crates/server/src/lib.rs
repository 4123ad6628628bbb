pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Phasestream API",
        version = "0.1.0",
        description = "Admin operations streamed as phased progress events"
    ),
    paths(
        routes::health_check,
        routes::get_pipeline_phases,
        routes::provision_demo,
        routes::seed_demo_friend,
        routes::run_tests,
    ),
    components(schemas(
        routes::HealthResponse,
        routes::DemoRunRequest,
        error::ErrorResponse,
        events::ProgressEvent,
        events::Level,
        orchestrator::TestRunRequest,
        phasestream_core::PhaseRegistry,
        phasestream_core::PhaseEntry,
        phasestream_core::PreconditionRef,
    )),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "pipelines", description = "Pipeline phase listings"),
        (name = "demo", description = "Demo environment provisioning (SSE)"),
        (name = "tests", description = "Integration test runs (SSE)"),
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health_check))
        .route("/api/openapi.json", get(openapi_json))
        .route(
            "/api/admin/pipelines/{name}/phases",
            get(routes::get_pipeline_phases),
        )
        .route("/api/admin/demo/provision", post(routes::provision_demo))
        .route("/api/admin/demo/friend", post(routes::seed_demo_friend))
        .route("/api/admin/tests/run", post(routes::run_tests))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
