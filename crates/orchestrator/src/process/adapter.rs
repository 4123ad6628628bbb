//! Wraps an external process as a phased operation.
//!
//! Output lines become progress events in arrival order. Phase numbers come
//! from a counter bumped on section dividers rather than from a registry, and
//! the exit code decides the terminal level.
//!
//! The exit watcher is serviced alongside both output streams. A process may
//! leave a background child holding its pipes open, so once it exits the
//! readers get a short grace period to deliver what is already written before
//! they are closed.

use std::sync::Arc;
use std::time::Duration;

use events::{Level, ProgressEvent, PHASE_SETUP};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{mpsc, watch};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::engine::OrderedEventEmitter;
use crate::error::{OrchestratorError, Result};
use crate::state_machine::RunState;

use super::classify::{classify, is_divider, strip_ansi};
use super::launcher::{ExitOutcome, ProcessLauncher, ProcessSpec};
use super::lines::LineBuffer;

pub const SETUP_PHASE_NAME: &str = "Setup";
pub const TESTS_PHASE_NAME: &str = "Tests";

const READ_CHUNK: usize = 8 * 1024;

/// How long output may keep arriving after the process has exited.
const EXIT_DRAIN_GRACE: Duration = Duration::from_millis(500);

type OutputLine = (OutputSource, String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSource {
    Stdout,
    Stderr,
}

impl OutputSource {
    fn as_str(&self) -> &'static str {
        match self {
            OutputSource::Stdout => "stdout",
            OutputSource::Stderr => "stderr",
        }
    }
}

#[derive(Debug, Default)]
struct Tally {
    passed: u32,
    failed: u32,
}

impl Tally {
    fn record(&mut self, level: Level) {
        match level {
            Level::Success => self.passed += 1,
            Level::Error => self.failed += 1,
            _ => {}
        }
    }

    fn summary(&self, exit: &ExitOutcome) -> String {
        let ending = match exit.code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        };
        format!("{} passed, {} failed ({})", self.passed, self.failed, ending)
    }
}

/// Turns raw output lines into events under the divider-driven counter.
struct OutputTracker<'a> {
    emitter: &'a OrderedEventEmitter,
    counter: i32,
    tally: Tally,
}

impl<'a> OutputTracker<'a> {
    fn new(emitter: &'a OrderedEventEmitter) -> Self {
        Self {
            emitter,
            counter: 1,
            tally: Tally::default(),
        }
    }

    fn line(&mut self, source: OutputSource, raw: &str) {
        let line = strip_ansi(raw);
        let line = line.trim_end();
        if line.trim().is_empty() {
            return;
        }
        if is_divider(line) {
            self.counter += 1;
            debug!(phase = self.counter, "Output section divider");
            return;
        }

        let level = classify(line, source == OutputSource::Stderr);
        self.tally.record(level);
        self.emitter
            .emit(ProgressEvent::new(self.counter, TESTS_PHASE_NAME, level, line));
    }

    /// Take whatever output arrives within the grace period, then close the
    /// readers and take what they flush.
    async fn drain_after_exit(
        &mut self,
        lines: &mut mpsc::UnboundedReceiver<OutputLine>,
        stop: &watch::Sender<bool>,
    ) {
        let deadline = Instant::now() + EXIT_DRAIN_GRACE;
        loop {
            match timeout_at(deadline, lines.recv()).await {
                Ok(Some((source, raw))) => self.line(source, &raw),
                Ok(None) => return,
                Err(_) => break,
            }
        }

        debug!("Output still open after process exit, closing readers");
        let _ = stop.send(true);
        while let Some((source, raw)) = lines.recv().await {
            self.line(source, &raw);
        }
    }
}

pub struct ProcessPhaseAdapter {
    launcher: Arc<dyn ProcessLauncher>,
    spec: ProcessSpec,
}

impl ProcessPhaseAdapter {
    pub fn new(launcher: Arc<dyn ProcessLauncher>, spec: ProcessSpec) -> Self {
        Self { launcher, spec }
    }

    pub fn spec(&self) -> &ProcessSpec {
        &self.spec
    }

    /// Spawn the process and stream its output until it exits.
    pub async fn run(&self, emitter: &OrderedEventEmitter) -> Result<RunState> {
        let mut state = RunState::NotStarted;
        let command_line = self.spec.command_line();

        let spawned = match self.launcher.spawn(&self.spec) {
            Ok(spawned) => spawned,
            Err(e) => {
                let err = OrchestratorError::spawn_failed(&self.spec.program, e);
                warn!(command = %command_line, error = %err, "Process spawn failed");
                emitter.fail(err.to_string());
                state.advance(RunState::Failed)?;
                return Ok(state);
            }
        };

        state.advance(RunState::Running(0))?;
        info!(command = %command_line, "Process started");
        emitter.emit(ProgressEvent::new(
            PHASE_SETUP,
            SETUP_PHASE_NAME,
            Level::Info,
            format!("Running {}", command_line),
        ));

        let (line_tx, mut line_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);
        tokio::spawn(pump(
            spawned.stdout,
            OutputSource::Stdout,
            line_tx.clone(),
            stop_rx.clone(),
        ));
        tokio::spawn(pump(spawned.stderr, OutputSource::Stderr, line_tx, stop_rx));
        let mut exit = tokio::spawn(spawned.exit);

        let mut tracker = OutputTracker::new(emitter);
        let exited_first = loop {
            tokio::select! {
                line = line_rx.recv() => match line {
                    Some((source, raw)) => tracker.line(source, &raw),
                    None => break None,
                },
                result = &mut exit => break Some(result),
            }
        };
        let exited = match exited_first {
            Some(result) => {
                tracker.drain_after_exit(&mut line_rx, &stop_tx).await;
                result
            }
            None => exit.await,
        };

        let outcome = match exited {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                let message = format!("Failed to wait for {}: {}", self.spec.program, e);
                warn!(command = %command_line, error = %e, "Process wait failed");
                emitter.fail(&message);
                state.advance(RunState::Failed)?;
                return Ok(state);
            }
            Err(e) => {
                return Err(OrchestratorError::ExecutionFailed(format!(
                    "Exit watcher for {} stopped: {}",
                    self.spec.program, e
                )));
            }
        };

        let level = if outcome.success() {
            Level::Success
        } else {
            Level::Error
        };
        let tally = &tracker.tally;
        info!(
            command = %command_line,
            exit_code = ?outcome.code,
            passed = tally.passed,
            failed = tally.failed,
            "Process finished"
        );
        emitter.complete_as(TESTS_PHASE_NAME, level, tally.summary(&outcome));

        state.advance(if outcome.success() {
            RunState::Completed
        } else {
            RunState::Failed
        })?;
        Ok(state)
    }
}

/// Forward complete lines from one stream until it closes or `stop` fires,
/// then flush the trailing partial line.
async fn pump(
    mut reader: Box<dyn AsyncRead + Send + Unpin>,
    source: OutputSource,
    lines: mpsc::UnboundedSender<OutputLine>,
    mut stop: watch::Receiver<bool>,
) {
    let mut buffer = LineBuffer::new();
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        tokio::select! {
            read = reader.read(&mut chunk) => match read {
                Ok(0) => break,
                Ok(n) => {
                    for line in buffer.push(&chunk[..n]) {
                        if lines.send((source, line)).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    warn!(stream = source.as_str(), error = %e, "Output read failed");
                    break;
                }
            },
            _ = stop.changed() => {
                debug!(stream = source.as_str(), "Output reader closed after exit");
                break;
            }
        }
    }

    if let Some(line) = buffer.finish() {
        let _ = lines.send((source, line));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::SpawnedProcess;
    use events::progress_channel;
    use futures::StreamExt;
    use std::io;
    use std::sync::Mutex;
    use tokio::io::{AsyncWriteExt, DuplexStream};
    use tokio::time::timeout;

    /// Replays canned stdout and stderr, then exits with a fixed code.
    struct ScriptedLauncher {
        stdout: &'static str,
        stderr: &'static str,
        code: Option<i32>,
    }

    impl ProcessLauncher for ScriptedLauncher {
        fn spawn(&self, _: &ProcessSpec) -> io::Result<SpawnedProcess> {
            let code = self.code;
            Ok(SpawnedProcess {
                stdout: Box::new(self.stdout.as_bytes()),
                stderr: Box::new(self.stderr.as_bytes()),
                exit: Box::pin(async move { Ok(ExitOutcome { code }) }),
            })
        }
    }

    struct BrokenLauncher;

    impl ProcessLauncher for BrokenLauncher {
        fn spawn(&self, _: &ProcessSpec) -> io::Result<SpawnedProcess> {
            Err(io::Error::new(io::ErrorKind::NotFound, "No such file or directory"))
        }
    }

    async fn run(launcher: impl ProcessLauncher + 'static) -> (RunState, Vec<ProgressEvent>) {
        let (tx, rx) = progress_channel();
        let emitter = OrderedEventEmitter::new(tx, "tests");
        let adapter = ProcessPhaseAdapter::new(
            Arc::new(launcher),
            ProcessSpec::new("npm").args(["run", "test:integration"]),
        );
        let state = adapter.run(&emitter).await.unwrap();
        (state, rx.collect().await)
    }

    #[tokio::test]
    async fn test_divider_bumps_phase() {
        let (state, events) = run(ScriptedLauncher {
            stdout: "===\n✓ test one passed\n",
            stderr: "",
            code: Some(0),
        })
        .await;

        assert_eq!(state, RunState::Completed);
        assert_eq!(events[0].phase, 0);
        assert_eq!(events[0].phase_name, "Setup");
        assert_eq!(events[0].message, "Running npm run test:integration");

        assert_eq!(events[1].phase, 2);
        assert_eq!(events[1].phase_name, "Tests");
        assert_eq!(events[1].level, Level::Success);
        assert_eq!(events.len(), 3);
    }

    #[tokio::test]
    async fn test_exit_code_decides_terminal_level() {
        let (_, events) = run(ScriptedLauncher {
            stdout: "✓ a passed\n✓ b passed\n",
            stderr: "",
            code: Some(0),
        })
        .await;
        let terminal = events.last().unwrap();
        assert_eq!(terminal.phase, 99);
        assert_eq!(terminal.level, Level::Success);
        assert_eq!(terminal.message, "2 passed, 0 failed (exit code 0)");

        let (state, events) = run(ScriptedLauncher {
            stdout: "✓ a passed\n✗ b failed\n",
            stderr: "",
            code: Some(1),
        })
        .await;
        assert_eq!(state, RunState::Failed);
        let terminal = events.last().unwrap();
        assert_eq!(terminal.phase, 99);
        assert_eq!(terminal.level, Level::Error);
        assert_eq!(terminal.message, "1 passed, 1 failed (exit code 1)");
    }

    #[tokio::test]
    async fn test_signal_exit_is_error() {
        let (_, events) = run(ScriptedLauncher {
            stdout: "",
            stderr: "",
            code: None,
        })
        .await;
        let terminal = events.last().unwrap();
        assert_eq!(terminal.level, Level::Error);
        assert!(terminal.message.ends_with("(terminated by signal)"));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_single_fatal_event() {
        let (state, events) = run(BrokenLauncher).await;
        assert_eq!(state, RunState::Failed);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].phase, -1);
        assert_eq!(events[0].level, Level::Error);
        assert!(events[0].message.contains("Failed to start npm"));
    }

    #[tokio::test]
    async fn test_stderr_lines_are_warnings() {
        let (_, events) = run(ScriptedLauncher {
            stdout: "",
            stderr: "deprecation notice\n",
            code: Some(0),
        })
        .await;
        assert_eq!(events[1].level, Level::Warning);
        assert_eq!(events[1].message, "deprecation notice");
    }

    #[tokio::test]
    async fn test_ansi_blank_and_partial_lines() {
        let (_, events) = run(ScriptedLauncher {
            stdout: "\x1b[32m✓ colored passed\x1b[0m\n\n   \ntrailing without newline",
            stderr: "",
            code: Some(0),
        })
        .await;
        let messages: Vec<_> = events[1..events.len() - 1]
            .iter()
            .map(|e| e.message.as_str())
            .collect();
        assert_eq!(messages, vec!["✓ colored passed", "trailing without newline"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_real_process() {
        use crate::process::TokioLauncher;

        let (tx, rx) = progress_channel();
        let emitter = OrderedEventEmitter::new(tx, "tests");
        let adapter = ProcessPhaseAdapter::new(
            Arc::new(TokioLauncher),
            ProcessSpec::new("sh").args([
                "-c",
                "echo '✓ one passed'; echo ====; echo 'FAIL two'; exit 1",
            ]),
        );
        let state = adapter.run(&emitter).await.unwrap();
        let events: Vec<_> = rx.collect().await;

        assert_eq!(state, RunState::Failed);
        let phases: Vec<_> = events.iter().map(|e| e.phase).collect();
        assert_eq!(phases, vec![0, 1, 2, 99]);
        assert_eq!(events[3].message, "1 passed, 1 failed (exit code 1)");
    }

    /// Output that stays open after the process has exited.
    struct LingeringLauncher {
        stdout: Mutex<Option<DuplexStream>>,
    }

    impl ProcessLauncher for LingeringLauncher {
        fn spawn(&self, _: &ProcessSpec) -> io::Result<SpawnedProcess> {
            let stdout = self.stdout.lock().unwrap().take().expect("spawned twice");
            Ok(SpawnedProcess {
                stdout: Box::new(stdout),
                stderr: Box::new(&b""[..]),
                exit: Box::pin(async { Ok(ExitOutcome { code: Some(1) }) }),
            })
        }
    }

    #[tokio::test]
    async fn test_exit_ends_run_while_output_still_open() {
        let (mut writer, reader) = tokio::io::duplex(1024);
        writer
            .write_all("✓ login passed\n✗ checkout failed".as_bytes())
            .await
            .unwrap();
        let launcher = LingeringLauncher {
            stdout: Mutex::new(Some(reader)),
        };

        let (state, events) = timeout(Duration::from_secs(5), run(launcher))
            .await
            .expect("run did not finish after the process exited");
        drop(writer);

        assert_eq!(state, RunState::Failed);
        let messages: Vec<_> = events.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages[1..],
            [
                "✓ login passed",
                "✗ checkout failed",
                "1 passed, 1 failed (exit code 1)"
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_line_with_equals_run_is_kept() {
        let (_, events) = run(ScriptedLauncher {
            stdout: "✗ expected status === 200\n",
            stderr: "",
            code: Some(1),
        })
        .await;

        assert_eq!(events.len(), 3);
        assert_eq!(events[1].phase, 1);
        assert_eq!(events[1].level, Level::Error);
        assert_eq!(events[1].message, "✗ expected status === 200");
        assert_eq!(events[2].message, "0 passed, 1 failed (exit code 1)");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_background_child_does_not_hold_run_open() {
        use crate::process::TokioLauncher;

        let (tx, rx) = progress_channel();
        let emitter = OrderedEventEmitter::new(tx, "tests");
        let adapter = ProcessPhaseAdapter::new(
            Arc::new(TokioLauncher),
            ProcessSpec::new("sh").args(["-c", "sleep 20 & echo '✓ started server'; exit 0"]),
        );

        let state = timeout(Duration::from_secs(5), adapter.run(&emitter))
            .await
            .expect("terminal event withheld by background child")
            .unwrap();
        drop(emitter);
        let events: Vec<_> = rx.collect().await;

        assert_eq!(state, RunState::Completed);
        let terminal = events.last().unwrap();
        assert_eq!(terminal.phase, 99);
        assert_eq!(terminal.level, Level::Success);
        assert_eq!(terminal.message, "1 passed, 0 failed (exit code 0)");
    }
}
