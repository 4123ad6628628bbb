//! Concrete pipelines served by the engine.
//!
//! - [`DemoPipeline`] - Native demo provisioning and friend seeding
//! - [`TestRunPipeline`] - Integration test run wrapped as a process

mod demo;
mod test_run;

use std::str::FromStr;

use phasestream_core::PhaseRegistry;
use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;

pub use demo::{friend_registry, provision_registry, DemoPipeline, DemoRunContext};
pub use test_run::{test_run_registry, TestRunPipeline, TestRunRequest, TestRunSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineKind {
    /// Full demo account provisioning
    Demo,
    /// Friend seeding for an existing demo account
    DemoFriend,
    /// Integration test run
    Tests,
}

impl PipelineKind {
    pub const ALL: [PipelineKind; 3] = [Self::Demo, Self::DemoFriend, Self::Tests];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Demo => "demo",
            Self::DemoFriend => "demo-friend",
            Self::Tests => "tests",
        }
    }

    /// Declared phases of this pipeline.
    pub fn registry(&self) -> PhaseRegistry {
        match self {
            Self::Demo => provision_registry(),
            Self::DemoFriend => friend_registry(),
            Self::Tests => test_run_registry(),
        }
    }
}

impl FromStr for PipelineKind {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| OrchestratorError::UnknownPipeline(s.to_string()))
    }
}

impl std::fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
