use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use futures::future::BoxFuture;
use tokio::io::AsyncRead;
use tokio::process::Command;
use tracing::debug;

/// Program, arguments and working directory for one external process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Command line for display purposes.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How a process ended; `code` is `None` when it was killed by a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    pub code: Option<i32>,
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// A running process: its two output streams and a future resolving on exit
pub struct SpawnedProcess {
    pub stdout: Box<dyn AsyncRead + Send + Unpin>,
    pub stderr: Box<dyn AsyncRead + Send + Unpin>,
    pub exit: BoxFuture<'static, io::Result<ExitOutcome>>,
}

/// Spawning seam so tests can feed scripted output
pub trait ProcessLauncher: Send + Sync {
    fn spawn(&self, spec: &ProcessSpec) -> io::Result<SpawnedProcess>;
}

/// Spawns real processes with tokio.
///
/// Output is piped on two separate streams, stdin is closed, and the child is
/// killed if its exit future is dropped before completion so it never
/// outlives its run unreaped.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioLauncher;

impl ProcessLauncher for TokioLauncher {
    fn spawn(&self, spec: &ProcessSpec) -> io::Result<SpawnedProcess> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn()?;
        debug!(pid = ?child.id(), command = %spec.command_line(), "Process spawned");

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "stderr was not captured"))?;

        let exit = Box::pin(async move {
            let status = child.wait().await?;
            Ok(ExitOutcome {
                code: status.code(),
            })
        });

        Ok(SpawnedProcess {
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
            exit,
        })
    }
}
