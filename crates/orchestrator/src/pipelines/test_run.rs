use std::path::PathBuf;
use std::sync::Arc;

use events::PHASE_SETUP;
use phasestream_core::{PhaseEntry, PhaseRegistry, PreconditionRef};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::OrderedEventEmitter;
use crate::error::Result;
use crate::gate::{GateDecision, PreconditionGate, StatusSnapshot, SuiteSelection};
use crate::process::{
    ProcessLauncher, ProcessPhaseAdapter, ProcessSpec, SETUP_PHASE_NAME, TESTS_PHASE_NAME,
};
use crate::state_machine::RunState;

use super::PipelineKind;

/// Pass-through options a caller may set on a test run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase", default)]
pub struct TestRunRequest {
    /// Only run tests whose name matches this filter
    pub filter: Option<String>,
    /// Skip the configured sub-suite
    pub skip_suite: bool,
    /// Run only the configured sub-suite
    pub only_suite: bool,
}

impl TestRunRequest {
    fn filter(&self) -> Option<&str> {
        self.filter
            .as_deref()
            .map(str::trim)
            .filter(|filter| !filter.is_empty())
    }
}

/// How the test process is launched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestRunSettings {
    pub program: String,
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    /// Flag placed before the filter value; `None` passes the filter positionally.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_flag: Option<String>,
    /// Sub-suite that `skipSuite` / `onlySuite` refer to
    pub suite: String,
}

impl Default for TestRunSettings {
    fn default() -> Self {
        Self {
            program: "npm".to_string(),
            args: vec![
                "run".to_string(),
                "test:integration".to_string(),
                "--".to_string(),
            ],
            working_dir: None,
            filter_flag: Some("--filter".to_string()),
            suite: "e2e".to_string(),
        }
    }
}

impl TestRunSettings {
    /// Build the command for one request: configured arguments, then the
    /// filter, then the suite flag.
    pub fn process_spec(&self, request: &TestRunRequest) -> ProcessSpec {
        let mut spec = ProcessSpec::new(&self.program).args(self.args.iter().cloned());

        if let Some(filter) = request.filter() {
            if let Some(flag) = &self.filter_flag {
                spec = spec.args([flag.as_str()]);
            }
            spec = spec.args([filter]);
        }
        if request.skip_suite {
            spec = spec.args([format!("--skip-{}", self.suite)]);
        }
        if request.only_suite {
            spec = spec.args([format!("--only-{}", self.suite)]);
        }
        if let Some(dir) = &self.working_dir {
            spec = spec.working_dir(dir);
        }
        spec
    }

    fn selection(&self, request: &TestRunRequest) -> SuiteSelection {
        SuiteSelection {
            suite: self.suite.clone(),
            skip: request.skip_suite,
            only: request.only_suite,
        }
    }
}

pub fn test_run_registry() -> PhaseRegistry {
    PhaseRegistry {
        pipeline: PipelineKind::Tests.name().to_string(),
        entries: vec![
            PhaseEntry::new(PHASE_SETUP, SETUP_PHASE_NAME)
                .requires(PreconditionRef::SuiteSelectionConsistent),
            PhaseEntry::new(1, TESTS_PHASE_NAME),
        ],
    }
}

/// One integration test run
pub struct TestRunPipeline {
    launcher: Arc<dyn ProcessLauncher>,
    settings: TestRunSettings,
    request: TestRunRequest,
}

impl TestRunPipeline {
    pub fn new(
        launcher: Arc<dyn ProcessLauncher>,
        settings: TestRunSettings,
        request: TestRunRequest,
    ) -> Self {
        Self {
            launcher,
            settings,
            request,
        }
    }

    pub async fn run(self, emitter: &OrderedEventEmitter) -> Result<RunState> {
        let snapshot = StatusSnapshot::suite(self.settings.selection(&self.request));
        for precondition in test_run_registry()
            .entries
            .iter()
            .filter_map(|entry| entry.precondition)
        {
            if let GateDecision::Reject(reason) | GateDecision::Skip(reason) =
                PreconditionGate::evaluate(precondition, &snapshot)
            {
                info!(pipeline = PipelineKind::Tests.name(), reason = %reason, "Test run rejected");
                emitter.fail(reason);
                return Ok(RunState::Failed);
            }
        }

        let spec = self.settings.process_spec(&self.request);
        ProcessPhaseAdapter::new(self.launcher, spec).run(emitter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{ExitOutcome, SpawnedProcess};
    use events::{progress_channel, Level};
    use futures::StreamExt;
    use std::io;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingLauncher {
        spawned: Mutex<Vec<ProcessSpec>>,
    }

    impl ProcessLauncher for RecordingLauncher {
        fn spawn(&self, spec: &ProcessSpec) -> io::Result<SpawnedProcess> {
            self.spawned.lock().unwrap().push(spec.clone());
            Ok(SpawnedProcess {
                stdout: Box::new(&b"PASS suite\n"[..]),
                stderr: Box::new(&b""[..]),
                exit: Box::pin(async { Ok(ExitOutcome { code: Some(0) }) }),
            })
        }
    }

    #[test]
    fn test_request_defaults_from_empty_object() {
        let request: TestRunRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request, TestRunRequest::default());

        let request: TestRunRequest =
            serde_json::from_str(r#"{"filter":"login","skipSuite":true}"#).unwrap();
        assert_eq!(request.filter.as_deref(), Some("login"));
        assert!(request.skip_suite);
        assert!(!request.only_suite);
    }

    #[test]
    fn test_arguments_forwarded_in_order() {
        let settings = TestRunSettings::default();
        let request = TestRunRequest {
            filter: Some("  checkout ".to_string()),
            skip_suite: true,
            only_suite: false,
        };
        let spec = settings.process_spec(&request);
        assert_eq!(spec.program, "npm");
        assert_eq!(
            spec.args,
            vec!["run", "test:integration", "--", "--filter", "checkout", "--skip-e2e"]
        );
    }

    #[test]
    fn test_blank_filter_and_positional_filter() {
        let mut settings = TestRunSettings::default();
        let blank = TestRunRequest {
            filter: Some("   ".to_string()),
            ..TestRunRequest::default()
        };
        assert_eq!(settings.process_spec(&blank).args, settings.args);

        settings.filter_flag = None;
        settings.working_dir = Some(PathBuf::from("/srv/app"));
        let request = TestRunRequest {
            filter: Some("auth".to_string()),
            only_suite: true,
            ..TestRunRequest::default()
        };
        let spec = settings.process_spec(&request);
        assert_eq!(spec.args[3..], ["auth".to_string(), "--only-e2e".to_string()]);
        assert_eq!(spec.working_dir, Some(PathBuf::from("/srv/app")));
    }

    #[tokio::test]
    async fn test_conflicting_suite_flags_rejected_without_spawn() {
        let launcher = Arc::new(RecordingLauncher::default());
        let pipeline = TestRunPipeline::new(
            launcher.clone(),
            TestRunSettings::default(),
            TestRunRequest {
                filter: None,
                skip_suite: true,
                only_suite: true,
            },
        );

        let (tx, rx) = progress_channel();
        let emitter = OrderedEventEmitter::new(tx, "tests");
        let state = pipeline.run(&emitter).await.unwrap();
        let events: Vec<_> = rx.collect().await;

        assert_eq!(state, RunState::Failed);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].phase, -1);
        assert_eq!(events[0].message, "Cannot both skip and only run the e2e suite");
        assert!(launcher.spawned.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_streams_process_output() {
        let launcher = Arc::new(RecordingLauncher::default());
        let pipeline = TestRunPipeline::new(
            launcher.clone(),
            TestRunSettings::default(),
            TestRunRequest::default(),
        );

        let (tx, rx) = progress_channel();
        let emitter = OrderedEventEmitter::new(tx, "tests");
        let state = pipeline.run(&emitter).await.unwrap();
        let events: Vec<_> = rx.collect().await;

        assert_eq!(state, RunState::Completed);
        assert_eq!(launcher.spawned.lock().unwrap().len(), 1);
        assert_eq!(events[1].level, Level::Success);
        assert_eq!(events.last().unwrap().message, "1 passed, 0 failed (exit code 0)");
    }

    #[test]
    fn test_registry_has_setup_phase() {
        let registry = test_run_registry();
        assert!(registry.validate().is_ok());
        assert_eq!(registry.name_of(0), Some("Setup"));
        assert_eq!(registry.name_of(1), Some("Tests"));
    }
}
