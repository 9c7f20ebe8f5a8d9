use crate::process::ExitFailure;
use thiserror::Error;

/// Errors raised by a single process handle
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Process has not been started")]
    NotStarted,

    #[error("Process was already started")]
    AlreadyStarted,

    #[error("Failed to spawn process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Standard output is not available")]
    StdoutUnavailable,

    #[error("{0}")]
    Exit(ExitFailure),

    #[error("Failed to signal process: {0}")]
    Signal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcessError {
    /// Check if this error is a non-zero exit reaped by `wait`
    pub fn is_exit_failure(&self) -> bool {
        matches!(self, ProcessError::Exit(_))
    }
}

/// Errors delivered to job callbacks or returned by the supervisor surface
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Error starting {command}: {source}")]
    Start {
        command: String,
        #[source]
        source: ProcessError,
    },

    #[error("Could not read output of {command}: {source}")]
    Stdout {
        command: String,
        #[source]
        source: ProcessError,
    },

    #[error("Bad command {command}: {source}")]
    BadCommand {
        command: String,
        #[source]
        source: ProcessError,
    },

    #[error("A job is already running")]
    Busy,

    #[error("Supervisor has been shut down")]
    Shutdown,
}

impl JobError {
    /// The invocation string of the failing command, if the error carries one
    pub fn command(&self) -> Option<&str> {
        match self {
            JobError::Start { command, .. }
            | JobError::Stdout { command, .. }
            | JobError::BadCommand { command, .. } => Some(command),
            _ => None,
        }
    }

    /// Check if this error reports a command that ran and exited with failure
    pub fn is_bad_command(&self) -> bool {
        matches!(self, JobError::BadCommand { .. })
    }

    /// Check if this error ended the job before any output was collected
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobError::Start { .. } | JobError::Stdout { .. })
    }
}
