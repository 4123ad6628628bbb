use serde::Serialize;

use crate::error::{OrchestratorError, Result};

/// Lifecycle of one run: `NotStarted → Running(i) → {Running(i+1) | Failed | Completed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "step", rename_all = "snake_case")]
pub enum RunState {
    NotStarted,
    /// Zero-based position of the step being executed
    Running(usize),
    Failed,
    Completed,
}

impl RunState {
    pub fn validate_transition(from: &RunState, to: &RunState) -> Result<()> {
        if Self::allowed(from, to) {
            Ok(())
        } else {
            Err(OrchestratorError::InvalidTransition {
                from: *from,
                to: *to,
            })
        }
    }

    fn allowed(from: &RunState, to: &RunState) -> bool {
        match (from, to) {
            (RunState::NotStarted, RunState::Running(0)) => true,
            (RunState::NotStarted, RunState::Failed | RunState::Completed) => true,
            (RunState::Running(current), RunState::Running(next)) => *next == current + 1,
            (RunState::Running(_), RunState::Failed | RunState::Completed) => true,
            _ => false,
        }
    }

    pub fn can_transition(from: &RunState, to: &RunState) -> bool {
        Self::validate_transition(from, to).is_ok()
    }

    /// Move to `to`, rejecting transitions the lifecycle does not allow.
    pub fn advance(&mut self, to: RunState) -> Result<()> {
        Self::validate_transition(self, &to)?;
        *self = to;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Failed | RunState::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::NotStarted => "not_started",
            RunState::Running(_) => "running",
            RunState::Failed => "failed",
            RunState::Completed => "completed",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Running(step) => write!(f, "running({})", step),
            other => f.write_str(other.as_str()),
        }
    }
}
