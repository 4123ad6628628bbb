use std::sync::Arc;
use std::time::Duration;

use orchestrator::process::{ProcessLauncher, TokioLauncher};
use orchestrator::{
    DemoDirectory, DemoPipeline, MemoryDemoDirectory, PipelineKind, ProgressRun, StreamPublisher,
    TestRunPipeline, TestRunRequest,
};

use crate::config::EngineConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EngineConfig>,
    pub directory: Arc<dyn DemoDirectory>,
    pub launcher: Arc<dyn ProcessLauncher>,
}

impl AppState {
    /// State backed by the in-memory directory and real processes.
    pub fn new(config: EngineConfig) -> Self {
        let directory = Arc::new(MemoryDemoDirectory::new(config.demo.quantities.clone()));
        Self {
            config: Arc::new(config),
            directory,
            launcher: Arc::new(TokioLauncher),
        }
    }

    pub fn with_directory(mut self, directory: Arc<dyn DemoDirectory>) -> Self {
        self.directory = directory;
        self
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn ProcessLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Start a run of `kind` in the background and return its stream.
    ///
    /// `request` only applies to test runs.
    pub fn start(&self, kind: PipelineKind, request: TestRunRequest) -> ProgressRun {
        let publisher = StreamPublisher::new(kind.name());
        let profiles = self.config.demo.profiles.clone();

        match kind {
            PipelineKind::Demo => {
                let pipeline = DemoPipeline::provision(Arc::clone(&self.directory), profiles);
                publisher.start(move |emitter| async move { pipeline.run(&emitter).await })
            }
            PipelineKind::DemoFriend => {
                let pipeline = DemoPipeline::friend(Arc::clone(&self.directory), profiles);
                publisher.start(move |emitter| async move { pipeline.run(&emitter).await })
            }
            PipelineKind::Tests => {
                let pipeline = TestRunPipeline::new(
                    Arc::clone(&self.launcher),
                    self.config.tests.settings.clone(),
                    request,
                );
                publisher.start(move |emitter| async move { pipeline.run(&emitter).await })
            }
        }
    }

    /// How long the stream of a `kind` run is forwarded to a client.
    pub fn run_budget(&self, kind: PipelineKind) -> Duration {
        match kind {
            PipelineKind::Demo | PipelineKind::DemoFriend => self.config.demo_budget(),
            PipelineKind::Tests => self.config.tests_budget(),
        }
    }
}
