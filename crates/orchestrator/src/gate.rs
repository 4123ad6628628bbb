//! Precondition gate.
//!
//! Decides, before any work is spent, whether a pipeline or one of its phases
//! may run given the current external state. The gate is pure apart from the
//! single status lookup in [`PreconditionGate::resolve`], which is never
//! retried: a failed lookup becomes a rejection.

use phasestream_core::{DemoStatus, PreconditionRef};
use tracing::warn;

use crate::collaborators::DemoDirectory;

/// Outcome of a precondition check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    /// The work is already done; end the run as a no-op.
    Skip(String),
    /// The run may not start; end it with an error.
    Reject(String),
}

impl GateDecision {
    pub fn is_proceed(&self) -> bool {
        matches!(self, GateDecision::Proceed)
    }
}

/// Which sub-suite a test run skips or isolates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteSelection {
    pub suite: String,
    pub skip: bool,
    pub only: bool,
}

/// Resolved view of external state the gate decides on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// `None` when the demo status was never resolved.
    pub demo: Option<DemoStatus>,
    pub suite_selection: Option<SuiteSelection>,
}

impl StatusSnapshot {
    pub fn demo(status: DemoStatus) -> Self {
        Self {
            demo: Some(status),
            suite_selection: None,
        }
    }

    pub fn suite(selection: SuiteSelection) -> Self {
        Self {
            demo: None,
            suite_selection: Some(selection),
        }
    }
}

pub struct PreconditionGate;

impl PreconditionGate {
    /// Look up the demo status once.
    pub async fn resolve(directory: &dyn DemoDirectory) -> Result<StatusSnapshot, GateDecision> {
        match directory.resolve_demo_status().await {
            Ok(status) => Ok(StatusSnapshot::demo(status)),
            Err(e) => {
                warn!(error = %e, "Demo status lookup failed");
                Err(GateDecision::Reject(format!(
                    "Failed to check demo account status: {}",
                    e
                )))
            }
        }
    }

    pub fn evaluate(precondition: PreconditionRef, snapshot: &StatusSnapshot) -> GateDecision {
        match precondition {
            PreconditionRef::DemoAccountAbsent => match &snapshot.demo {
                None => Self::unresolved(),
                Some(status) if status.exists => GateDecision::Skip(match &status.uid {
                    Some(uid) => format!("Demo account already exists ({})", uid),
                    None => "Demo account already exists".to_string(),
                }),
                Some(_) => GateDecision::Proceed,
            },
            PreconditionRef::FriendSeedable => match &snapshot.demo {
                None => Self::unresolved(),
                Some(status) if !status.exists => GateDecision::Reject(
                    "No demo account found. Provision the demo account first.".to_string(),
                ),
                Some(status) if status.friend_exists => Self::friend_exists(status),
                Some(_) => GateDecision::Proceed,
            },
            PreconditionRef::FriendAbsent => match &snapshot.demo {
                None => Self::unresolved(),
                Some(status) if status.friend_exists => Self::friend_exists(status),
                Some(_) => GateDecision::Proceed,
            },
            PreconditionRef::AccountResolved => {
                match snapshot.demo.as_ref().and_then(|s| s.uid.as_ref()) {
                    Some(_) => GateDecision::Proceed,
                    None => {
                        GateDecision::Reject("Demo account id has not been resolved".to_string())
                    }
                }
            }
            PreconditionRef::SuiteSelectionConsistent => match &snapshot.suite_selection {
                Some(selection) if selection.skip && selection.only => {
                    GateDecision::Reject(format!(
                        "Cannot both skip and only run the {} suite",
                        selection.suite
                    ))
                }
                _ => GateDecision::Proceed,
            },
        }
    }

    fn unresolved() -> GateDecision {
        GateDecision::Reject("Demo account status is unavailable".to_string())
    }

    fn friend_exists(status: &DemoStatus) -> GateDecision {
        GateDecision::Skip(format!(
            "Demo friend already exists: {}",
            status.friend_display_name.as_deref().unwrap_or("unknown")
        ))
    }
}
