//! Progress event types for the phased operation protocol

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Phase used before any ordinal phase has started.
pub const PHASE_SETUP: i32 = 0;
/// Terminal phase for a run that finished (successfully or as a no-op).
pub const PHASE_COMPLETE: i32 = 99;
/// Terminal phase for a run that failed outside any declared phase.
pub const PHASE_FATAL: i32 = -1;

pub const COMPLETE_PHASE_NAME: &str = "Complete";
pub const FATAL_PHASE_NAME: &str = "Error";

const FRAME_PREFIX: &str = "data: ";

/// Errors raised when an event violates the wire schema
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("message contains an embedded newline")]
    EmbeddedNewline,

    #[error("phase name must not be empty")]
    EmptyPhaseName,

    #[error("frame is missing the `data: ` prefix")]
    MissingDataPrefix,

    #[error("malformed event payload: {0}")]
    Malformed(String),
}

/// Severity of a progress event.
///
/// Variants are ordered by severity so that `max` yields the more severe level.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "info",
            Level::Success => "success",
            Level::Warning => "warning",
            Level::Error => "error",
        }
    }

    /// Raise this level to `floor` if it is less severe.
    pub fn at_least(self, floor: Level) -> Level {
        self.max(floor)
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of the streamed protocol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProgressEvent {
    /// `0` setup, positive ordinal phases, `99` terminal summary, `-1` fatal error
    pub phase: i32,
    /// Human-readable label, stable for a given `phase` within a run
    pub phase_name: String,
    pub level: Level,
    /// Single-line free text
    pub message: String,
}

impl ProgressEvent {
    /// Build an event, folding any line breaks in `message` into spaces.
    pub fn new(
        phase: i32,
        phase_name: impl Into<String>,
        level: Level,
        message: impl AsRef<str>,
    ) -> Self {
        Self {
            phase,
            phase_name: phase_name.into(),
            level,
            message: single_line(message.as_ref()),
        }
    }

    /// Terminal summary event (`phase = 99`).
    pub fn complete(level: Level, message: impl AsRef<str>) -> Self {
        Self::new(PHASE_COMPLETE, COMPLETE_PHASE_NAME, level, message)
    }

    /// Terminal fatal event (`phase = -1`).
    pub fn fatal(message: impl AsRef<str>) -> Self {
        Self::new(PHASE_FATAL, FATAL_PHASE_NAME, Level::Error, message)
    }

    pub fn is_terminal(&self) -> bool {
        self.phase == PHASE_COMPLETE || self.phase == PHASE_FATAL
    }

    /// Check the event against the wire schema.
    pub fn validate(&self) -> Result<(), EventError> {
        if self.phase_name.trim().is_empty() {
            return Err(EventError::EmptyPhaseName);
        }
        if self.message.contains(['\n', '\r']) || self.phase_name.contains(['\n', '\r']) {
            return Err(EventError::EmbeddedNewline);
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, EventError> {
        serde_json::to_string(self).map_err(|e| EventError::Malformed(e.to_string()))
    }

    /// Encode as an event-stream frame: `data: <json>` followed by a blank line.
    pub fn to_frame(&self) -> Result<String, EventError> {
        self.validate()?;
        Ok(format!("{}{}\n\n", FRAME_PREFIX, self.to_json()?))
    }

    /// Decode and validate one event-stream frame.
    pub fn from_frame(frame: &str) -> Result<Self, EventError> {
        let payload = frame
            .trim_end_matches(['\n', '\r'])
            .strip_prefix(FRAME_PREFIX)
            .ok_or(EventError::MissingDataPrefix)?;
        let event: ProgressEvent =
            serde_json::from_str(payload).map_err(|e| EventError::Malformed(e.to_string()))?;
        event.validate()?;
        Ok(event)
    }
}

fn single_line(message: &str) -> String {
    if !message.contains(['\n', '\r']) {
        return message.to_string();
    }
    message
        .split(['\n', '\r'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
