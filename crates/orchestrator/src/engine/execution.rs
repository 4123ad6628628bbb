//! Native phase executor.
//!
//! Runs a fixed, ordered list of steps against a registry. Steps execute
//! strictly one after another because each may depend on identifiers produced
//! by the previous one; the first failure aborts the rest.

use std::sync::Arc;

use events::Level;
use phasestream_core::PhaseRegistry;
use tracing::{debug, error, info};

use crate::error::{OrchestratorError, Result};
use crate::gate::{GateDecision, PreconditionGate};
use crate::state_machine::RunState;

use super::events::OrderedEventEmitter;
use super::phase::{PhaseStep, StepContext};

pub struct NativePhaseExecutor<C: StepContext> {
    registry: Arc<PhaseRegistry>,
    steps: Vec<Box<dyn PhaseStep<C>>>,
}

impl<C: StepContext> NativePhaseExecutor<C> {
    /// Pair each registry entry with its step, in order.
    pub fn new(registry: Arc<PhaseRegistry>, steps: Vec<Box<dyn PhaseStep<C>>>) -> Result<Self> {
        registry.validate()?;
        if registry.len() != steps.len() {
            return Err(OrchestratorError::StepCountMismatch {
                pipeline: registry.pipeline.clone(),
                phases: registry.len(),
                steps: steps.len(),
            });
        }
        Ok(Self { registry, steps })
    }

    pub fn registry(&self) -> &PhaseRegistry {
        &self.registry
    }

    /// Execute every step, emitting progress as it goes.
    ///
    /// Always ends the stream: a summary at phase 99 on success, a warning at
    /// phase 99 when a precondition says the work is already done, or an
    /// error at the failing phase followed by a fatal event.
    pub async fn run(&self, ctx: &mut C, emitter: &OrderedEventEmitter) -> Result<RunState> {
        let pipeline = self.registry.pipeline.as_str();
        let mut state = RunState::NotStarted;

        info!(pipeline, phases = self.registry.len(), "Starting native pipeline");

        for (position, (entry, step)) in self.registry.entries().iter().zip(&self.steps).enumerate()
        {
            state.advance(RunState::Running(position))?;

            if let Some(precondition) = entry.precondition {
                match PreconditionGate::evaluate(precondition, &ctx.snapshot()) {
                    GateDecision::Proceed => {}
                    GateDecision::Skip(reason) => {
                        info!(
                            pipeline,
                            phase = entry.index,
                            reason = %reason,
                            "Phase skipped, work already done"
                        );
                        emitter.complete(Level::Warning, &reason);
                        state.advance(RunState::Completed)?;
                        return Ok(state);
                    }
                    GateDecision::Reject(reason) => {
                        info!(
                            pipeline,
                            phase = entry.index,
                            reason = %reason,
                            "Phase precondition rejected"
                        );
                        emitter.phase(entry, Level::Error, &reason);
                        emitter.fail(format!("{} failed: {}", entry.name, reason));
                        state.advance(RunState::Failed)?;
                        return Ok(state);
                    }
                }
            }

            debug!(pipeline, phase = entry.index, name = %entry.name, "Running phase");

            match step.run(ctx).await {
                Ok(report) => {
                    if report.is_empty() {
                        emitter.phase(entry, Level::Success, format!("{} done", entry.name));
                    }
                    for (level, message) in report.lines() {
                        emitter.phase(entry, *level, message);
                    }
                }
                Err(e) => {
                    error!(
                        pipeline,
                        phase = entry.index,
                        name = %entry.name,
                        error = %e,
                        "Phase failed"
                    );
                    emitter.phase(entry, Level::Error, e.to_string());
                    emitter.fail(format!("{} failed: {}", entry.name, e));
                    state.advance(RunState::Failed)?;
                    return Ok(state);
                }
            }
        }

        emitter.complete(Level::Success, ctx.summary());
        state.advance(RunState::Completed)?;
        info!(pipeline, "Native pipeline completed");
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::CollaboratorError;
    use crate::gate::StatusSnapshot;
    use crate::engine::StepReport;
    use async_trait::async_trait;
    use events::{progress_channel, ProgressEvent};
    use futures::StreamExt;
    use phasestream_core::{DemoStatus, PreconditionRef};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<usize>>,
    }

    struct TestContext {
        status: DemoStatus,
        produced: Vec<usize>,
    }

    impl StepContext for TestContext {
        fn snapshot(&self) -> StatusSnapshot {
            StatusSnapshot::demo(self.status.clone())
        }

        fn summary(&self) -> String {
            format!("ran {} steps", self.produced.len())
        }
    }

    struct CountingStep {
        id: usize,
        fail: bool,
        recorder: Arc<Recorder>,
    }

    #[async_trait]
    impl PhaseStep<TestContext> for CountingStep {
        async fn run(&self, ctx: &mut TestContext) -> Result<StepReport> {
            self.recorder.calls.lock().unwrap().push(self.id);
            if self.fail {
                return Err(CollaboratorError::new(format!("step {} exploded", self.id)).into());
            }
            ctx.produced.push(self.id);
            Ok(StepReport::success(format!("created {} items", self.id)))
        }
    }

    fn executor(
        phases: &[(&str, Option<PreconditionRef>)],
        failing: Option<usize>,
        recorder: &Arc<Recorder>,
    ) -> NativePhaseExecutor<TestContext> {
        let registry = Arc::new(PhaseRegistry::sequential("test", phases));
        let steps = (1..=phases.len())
            .map(|id| {
                Box::new(CountingStep {
                    id,
                    fail: failing == Some(id),
                    recorder: Arc::clone(recorder),
                }) as Box<dyn PhaseStep<TestContext>>
            })
            .collect();
        NativePhaseExecutor::new(registry, steps).unwrap()
    }

    async fn run(
        executor: &NativePhaseExecutor<TestContext>,
        status: DemoStatus,
    ) -> (RunState, Vec<ProgressEvent>) {
        let (tx, rx) = progress_channel();
        let emitter = OrderedEventEmitter::new(tx, "test");
        let mut ctx = TestContext {
            status,
            produced: Vec::new(),
        };
        let state = executor.run(&mut ctx, &emitter).await.unwrap();
        (state, rx.collect().await)
    }

    const FIVE: [(&str, Option<PreconditionRef>); 5] = [
        ("One", None),
        ("Two", None),
        ("Three", None),
        ("Four", None),
        ("Five", None),
    ];

    #[tokio::test]
    async fn test_all_steps_complete() {
        let recorder = Arc::new(Recorder::default());
        let executor = executor(&FIVE, None, &recorder);
        let (state, events) = run(&executor, DemoStatus::absent()).await;

        assert_eq!(state, RunState::Completed);
        assert_eq!(*recorder.calls.lock().unwrap(), vec![1, 2, 3, 4, 5]);
        let phases: Vec<_> = events.iter().map(|e| e.phase).collect();
        assert_eq!(phases, vec![1, 2, 3, 4, 5, 99]);
        let last = events.last().unwrap();
        assert_eq!(last.level, Level::Success);
        assert_eq!(last.message, "ran 5 steps");
    }

    #[tokio::test]
    async fn test_failing_step_aborts_rest() {
        let recorder = Arc::new(Recorder::default());
        let executor = executor(&FIVE, Some(3), &recorder);
        let (state, events) = run(&executor, DemoStatus::absent()).await;

        assert_eq!(state, RunState::Failed);
        assert_eq!(*recorder.calls.lock().unwrap(), vec![1, 2, 3]);

        let step_events: Vec<_> = events.iter().filter(|e| !e.is_terminal()).collect();
        let phases: Vec<_> = step_events.iter().map(|e| e.phase).collect();
        assert_eq!(phases, vec![1, 2, 3]);
        assert_eq!(step_events[2].level, Level::Error);
        assert_eq!(step_events[2].message, "step 3 exploded");
        assert!(!events.iter().any(|e| e.phase == 4 || e.phase == 5));

        let terminal = events.last().unwrap();
        assert_eq!(terminal.phase, -1);
        assert_eq!(terminal.message, "Three failed: step 3 exploded");
    }

    #[tokio::test]
    async fn test_phase_precondition_skip_ends_run() {
        let recorder = Arc::new(Recorder::default());
        let executor = executor(
            &[
                ("Status", None),
                ("Friend", Some(PreconditionRef::FriendAbsent)),
                ("Posts", None),
            ],
            None,
            &recorder,
        );
        let status = DemoStatus::existing(phasestream_core::Uid::new("u1")).with_friend("Sarah");
        let (state, events) = run(&executor, status).await;

        assert_eq!(state, RunState::Completed);
        assert_eq!(*recorder.calls.lock().unwrap(), vec![1]);
        let terminal = events.last().unwrap();
        assert_eq!(terminal.phase, 99);
        assert_eq!(terminal.level, Level::Warning);
        assert!(terminal.message.contains("Sarah"));
    }

    #[tokio::test]
    async fn test_phase_precondition_reject_fails_run() {
        let recorder = Arc::new(Recorder::default());
        let executor = executor(
            &[
                ("Status", None),
                ("Link", Some(PreconditionRef::AccountResolved)),
            ],
            None,
            &recorder,
        );
        let (state, events) = run(&executor, DemoStatus::absent()).await;

        assert_eq!(state, RunState::Failed);
        assert_eq!(*recorder.calls.lock().unwrap(), vec![1]);
        assert_eq!(events[1].phase, 2);
        assert_eq!(events[1].level, Level::Error);
        assert_eq!(events.last().unwrap().phase, -1);
    }

    #[test]
    fn test_step_count_mismatch() {
        let registry = Arc::new(PhaseRegistry::sequential("test", &FIVE));
        let result = NativePhaseExecutor::<TestContext>::new(registry, Vec::new());
        assert!(matches!(
            result,
            Err(OrchestratorError::StepCountMismatch { phases: 5, steps: 0, .. })
        ));
    }
}
