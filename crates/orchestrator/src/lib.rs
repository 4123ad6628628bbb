pub mod collaborators;
pub mod engine;
pub mod error;
pub mod gate;
pub mod pipelines;
pub mod process;
pub mod publisher;
pub mod state_machine;

pub use collaborators::{
    CollaboratorError, DemoDirectory, MemoryDemoDirectory, SeedQuantities,
};
pub use error::{OrchestratorError, Result};
pub use gate::{GateDecision, PreconditionGate, StatusSnapshot};
pub use pipelines::{
    DemoPipeline, PipelineKind, TestRunPipeline, TestRunRequest, TestRunSettings,
};
pub use publisher::{ProgressRun, StreamPublisher};
pub use state_machine::RunState;
