//! Ordered event emitter with terminal-once guarantees.
//!
//! Every pipeline writes through this emitter. Events are validated, numbered
//! and forwarded in call order; the first terminal event closes the channel and
//! everything after it is dropped.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use events::{
    Level, ProgressEvent, ProgressSender, SendOutcome, COMPLETE_PHASE_NAME, FATAL_PHASE_NAME,
    PHASE_COMPLETE,
};
use phasestream_core::PhaseEntry;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct OrderedEventEmitter {
    sender: ProgressSender,
    pipeline: Arc<str>,
    sequence: Arc<AtomicU64>,
    disconnect_logged: Arc<AtomicBool>,
}

impl OrderedEventEmitter {
    pub fn new(sender: ProgressSender, pipeline: impl Into<Arc<str>>) -> Self {
        Self {
            sender,
            pipeline: pipeline.into(),
            sequence: Arc::new(AtomicU64::new(0)),
            disconnect_logged: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Emit an event with the next sequence number.
    ///
    /// A client that went away is not an error: the event is dropped and the
    /// run carries on for its side effects.
    pub fn emit(&self, event: ProgressEvent) -> SendOutcome {
        let event = match event.validate() {
            Ok(()) => event,
            Err(e) if event.is_terminal() => {
                warn!(pipeline = %self.pipeline, error = %e, "Repairing invalid terminal event");
                repair(event)
            }
            Err(e) => {
                warn!(pipeline = %self.pipeline, error = %e, "Dropping invalid progress event");
                return SendOutcome::Closed;
            }
        };

        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        debug!(
            pipeline = %self.pipeline,
            seq,
            phase = event.phase,
            level = %event.level,
            message = %event.message,
            "Progress event"
        );

        let outcome = self.sender.send(event);
        match outcome {
            SendOutcome::Disconnected => {
                if !self.disconnect_logged.swap(true, Ordering::Relaxed) {
                    warn!(
                        pipeline = %self.pipeline,
                        "Client disconnected, continuing run without a listener"
                    );
                }
            }
            SendOutcome::Closed => {
                warn!(
                    pipeline = %self.pipeline,
                    seq,
                    "Event emitted after terminal event was dropped"
                );
            }
            SendOutcome::Delivered => {}
        }
        outcome
    }

    /// Emit an event tagged with a registry entry.
    pub fn phase(&self, entry: &PhaseEntry, level: Level, message: impl AsRef<str>) -> SendOutcome {
        self.emit(ProgressEvent::new(entry.index, &entry.name, level, message))
    }

    /// Emit the terminal summary (`phase = 99`, `Complete`).
    pub fn complete(&self, level: Level, message: impl AsRef<str>) -> SendOutcome {
        self.emit(ProgressEvent::complete(level, message))
    }

    /// Emit the terminal summary under a pipeline-specific phase name.
    pub fn complete_as(
        &self,
        phase_name: &str,
        level: Level,
        message: impl AsRef<str>,
    ) -> SendOutcome {
        self.emit(ProgressEvent::new(PHASE_COMPLETE, phase_name, level, message))
    }

    /// Emit the terminal fatal event (`phase = -1`).
    pub fn fail(&self, message: impl AsRef<str>) -> SendOutcome {
        self.emit(ProgressEvent::fatal(message))
    }

    /// Whether the terminal event has been emitted.
    pub fn is_terminated(&self) -> bool {
        self.sender.is_closed()
    }

    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    /// Get the current sequence number (for debugging/testing).
    pub fn current_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

fn repair(event: ProgressEvent) -> ProgressEvent {
    let fallback = if event.phase == PHASE_COMPLETE {
        COMPLETE_PHASE_NAME
    } else {
        FATAL_PHASE_NAME
    };
    let name = event.phase_name.replace(['\n', '\r'], " ");
    let name = if name.trim().is_empty() {
        fallback.to_string()
    } else {
        name
    };
    ProgressEvent::new(event.phase, name, event.level, &event.message)
}
