use crate::error::ProcessError;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use tokio::io::AsyncRead;

/// Unique identifier for a running process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(pub u32);

impl From<u32> for ProcessId {
    fn from(pid: u32) -> Self {
        ProcessId(pid)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Executable and argument list of a job, fixed when the handle is built
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandLine {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandLine {
    pub fn new<P, S, I>(program: P, args: I) -> Self
    where
        P: Into<PathBuf>,
        S: ToString,
        I: IntoIterator<Item = S>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Unsuccessful termination status reaped from a process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitFailure {
    /// Exit code, if the process exited on its own
    pub code: Option<i32>,
    /// Terminating signal, if the process was killed (Unix only)
    pub signal: Option<i32>,
}

impl ExitFailure {
    pub fn with_code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn with_signal(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    /// Classify an exit status, returning `None` when it reports success
    pub fn from_status(status: ExitStatus) -> Option<Self> {
        if status.success() {
            return None;
        }

        #[cfg(unix)]
        let signal = std::os::unix::process::ExitStatusExt::signal(&status);
        #[cfg(not(unix))]
        let signal = None;

        Some(Self {
            code: status.code(),
            signal,
        })
    }
}

impl fmt::Display for ExitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit status {code}"),
            (None, Some(signal)) => write!(f, "terminated by signal {signal}"),
            (None, None) => write!(f, "exit status unknown"),
        }
    }
}

/// Readable standard output of a started process
pub type ProcessOutput = Box<dyn AsyncRead + Send + Unpin>;

/// Trait representing a handle to one OS process
///
/// A handle is created unstarted by a [`CommandBuilder`](crate::CommandBuilder).
/// After a successful `start` the pid is known and `stdout_reader` yields the
/// output stream, which can be taken once. `wait` reaps the exit status and
/// must be called exactly once for a started process.
#[async_trait]
pub trait ProcessHandle: Send + 'static {
    /// The command this handle runs
    fn command_line(&self) -> &CommandLine;

    /// Get the process ID (None before a successful start)
    fn pid(&self) -> Option<ProcessId>;

    /// Launch the process
    async fn start(&mut self) -> Result<(), ProcessError>;

    /// Take the standard output stream of the started process
    fn stdout_reader(&mut self) -> Result<ProcessOutput, ProcessError>;

    /// Best-effort kill; a process that is already gone is not an error
    async fn kill(&mut self) -> Result<(), ProcessError>;

    /// Wait for the process to exit; non-zero exit is `ProcessError::Exit`
    async fn wait(&mut self) -> Result<(), ProcessError>;

    /// Human-readable description for diagnostics
    fn describe(&self) -> String {
        self.command_line().to_string()
    }
}
