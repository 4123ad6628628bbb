use thiserror::Error;

use crate::collaborators::CollaboratorError;
use crate::state_machine::RunState;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Invalid run state transition from {from} to {to}")]
    InvalidTransition { from: RunState, to: RunState },

    #[error("{0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Precondition not met: {0}")]
    PreconditionFailed(String),

    #[error("Failed to start {program}: {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("Invalid pipeline definition: {0}")]
    Registry(#[from] phasestream_core::CoreError),

    #[error("Pipeline {pipeline} has {phases} phases but {steps} steps")]
    StepCountMismatch {
        pipeline: String,
        phases: usize,
        steps: usize,
    },

    #[error("Unknown pipeline: {0}")]
    UnknownPipeline(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

impl OrchestratorError {
    /// Create a spawn failed error.
    pub fn spawn_failed(program: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::SpawnFailed {
            program: program.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
