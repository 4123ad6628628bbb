//! Step trait and report types for native phase execution.

use async_trait::async_trait;
use events::Level;

use crate::error::Result;
use crate::gate::StatusSnapshot;

/// State threaded through the steps of one run.
///
/// Steps record the identifiers they produce here so later steps can use them;
/// the executor reads it to evaluate per-phase preconditions and to build the
/// final summary.
pub trait StepContext: Send {
    /// Current view of external state for precondition evaluation.
    fn snapshot(&self) -> StatusSnapshot;

    /// Human-readable enumeration of everything the run created.
    fn summary(&self) -> String;
}

/// One asynchronous step bound to a registry entry.
#[async_trait]
pub trait PhaseStep<C: StepContext>: Send + Sync {
    /// Run the step. An error aborts the remaining pipeline.
    async fn run(&self, ctx: &mut C) -> Result<StepReport>;
}

/// Events a successful step reports, in order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    lines: Vec<(Level, String)>,
}

impl StepReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new().with(Level::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new().with(Level::Success, message)
    }

    pub fn with(mut self, level: Level, message: impl Into<String>) -> Self {
        self.lines.push((level, message.into()));
        self
    }

    pub fn lines(&self) -> &[(Level, String)] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
