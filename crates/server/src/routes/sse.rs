use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use events::ProgressEvent;
use futures::stream::{Stream, StreamExt};
use orchestrator::{PipelineKind, ProgressRun, TestRunRequest};
use tracing::{info, warn};

use crate::state::AppState;

pub const SSE_KEEP_ALIVE_TEXT: &str = "keep-alive";

/// One progress event as an SSE frame: `data: <json>`.
pub fn progress_to_sse_event(event: &ProgressEvent) -> Event {
    let data = event.to_json().unwrap_or_else(|_| "{}".to_string());
    Event::default().data(data)
}

/// Forward a run's events until the stream ends or `budget` elapses.
///
/// Hitting the budget only stops forwarding; the run itself keeps going in
/// the background.
pub fn progress_sse(
    kind: PipelineKind,
    run: ProgressRun,
    budget: Duration,
    keep_alive: Duration,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let pipeline = kind.name();
    let deadline = async move {
        tokio::time::sleep(budget).await;
        warn!(
            pipeline,
            budget_secs = budget.as_secs(),
            "Run budget elapsed, closing event stream"
        );
    };

    let stream = run
        .events
        .take_until(deadline)
        .map(|event| Ok(progress_to_sse_event(&event)));

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(keep_alive)
            .text(SSE_KEEP_ALIVE_TEXT),
    )
}

/// Start a run and answer with its event stream.
pub fn stream_run(
    state: &AppState,
    kind: PipelineKind,
    request: TestRunRequest,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(pipeline = kind.name(), "Starting run for admin request");
    let run = state.start(kind, request);
    progress_sse(
        kind,
        run,
        state.run_budget(kind),
        state.config.keep_alive(),
    )
}
