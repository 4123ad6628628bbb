//! Stream publisher: owns the outbound progress channel of one run.
//!
//! The operation runs in its own task so that neither an error nor a panic
//! can leave the stream open. Whatever happens, exactly one terminal event
//! reaches the subscriber and the stream then ends.

use std::any::Any;
use std::future::Future;

use events::{progress_channel, ProgressStream};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::engine::OrderedEventEmitter;
use crate::error::Result;
use crate::state_machine::RunState;

/// A started run: its event stream and a handle resolving to the final state
pub struct ProgressRun {
    pub events: ProgressStream,
    pub completion: JoinHandle<RunState>,
}

pub struct StreamPublisher {
    pipeline: String,
}

impl StreamPublisher {
    pub fn new(pipeline: impl Into<String>) -> Self {
        Self {
            pipeline: pipeline.into(),
        }
    }

    /// Start `operation` in the background and hand back its stream.
    ///
    /// The run keeps going if the subscriber drops the stream; its side
    /// effects complete and the final state is still available through
    /// [`ProgressRun::completion`].
    pub fn start<F, Fut>(self, operation: F) -> ProgressRun
    where
        F: FnOnce(OrderedEventEmitter) -> Fut + Send + 'static,
        Fut: Future<Output = Result<RunState>> + Send + 'static,
    {
        let (sender, events) = progress_channel();
        let emitter = OrderedEventEmitter::new(sender.clone(), self.pipeline.as_str());
        let pipeline = self.pipeline;

        let completion = tokio::spawn(async move {
            info!(pipeline = %pipeline, "Run started");
            let run = tokio::spawn(operation(emitter.clone()));

            let state = match run.await {
                Ok(Ok(state)) if emitter.is_terminated() => state,
                Ok(Ok(state)) => {
                    warn!(
                        pipeline = %pipeline,
                        state = %state,
                        "Run ended without a terminal event"
                    );
                    emitter.fail(format!("{} ended without reporting completion", pipeline));
                    RunState::Failed
                }
                Ok(Err(e)) => {
                    error!(pipeline = %pipeline, error = %e, "Run failed");
                    if !emitter.is_terminated() {
                        emitter.fail(format!("{} failed: {}", pipeline, e));
                    }
                    RunState::Failed
                }
                Err(join_error) => {
                    let reason = if join_error.is_panic() {
                        panic_message(join_error.into_panic())
                    } else {
                        "task was cancelled".to_string()
                    };
                    error!(pipeline = %pipeline, reason = %reason, "Run aborted");
                    if !emitter.is_terminated() {
                        emitter.fail(format!("{} aborted: {}", pipeline, reason));
                    }
                    RunState::Failed
                }
            };

            info!(
                pipeline = %pipeline,
                state = %state,
                events = sender.event_count(),
                listener_gone = sender.is_disconnected(),
                "Run finished"
            );
            state
        });

        ProgressRun { events, completion }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
