use jobvisor_core::{CommandBuilder, CommandLine, JobParams, ToolCommands, ToolPaths};
use std::path::Path;

#[cfg(unix)]
mod unix_impl {
    use async_trait::async_trait;
    use jobvisor_core::{
        CommandLine, ExitFailure, ProcessError, ProcessHandle, ProcessId, ProcessOutput,
    };
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid as NixPid;
    use std::process::Stdio;
    use tokio::process::{Child, Command};
    use tracing::{debug, info, warn};

    /// Unix-specific process handle over `tokio::process`
    ///
    /// The child runs in its own process group so a kill also reaches any
    /// helpers it spawned and that could otherwise hold stdout open.
    pub struct UnixProcessHandle {
        command_line: CommandLine,
        child: Option<Child>,
    }

    impl UnixProcessHandle {
        pub fn new(command_line: CommandLine) -> Self {
            Self {
                command_line,
                child: None,
            }
        }

        fn child_mut(&mut self) -> Result<&mut Child, ProcessError> {
            self.child.as_mut().ok_or(ProcessError::NotStarted)
        }
    }

    #[async_trait]
    impl ProcessHandle for UnixProcessHandle {
        fn command_line(&self) -> &CommandLine {
            &self.command_line
        }

        fn pid(&self) -> Option<ProcessId> {
            self.child.as_ref().and_then(Child::id).map(ProcessId::from)
        }

        async fn start(&mut self) -> Result<(), ProcessError> {
            if self.child.is_some() {
                return Err(ProcessError::AlreadyStarted);
            }

            let mut cmd = Command::new(self.command_line.program());
            cmd.args(self.command_line.args())
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .process_group(0);

            let child = cmd.spawn().map_err(ProcessError::Spawn)?;
            debug!(
                "Spawned Unix process: {} (PID: {:?})",
                self.command_line,
                child.id()
            );
            self.child = Some(child);
            Ok(())
        }

        fn stdout_reader(&mut self) -> Result<ProcessOutput, ProcessError> {
            let child = self.child_mut()?;
            child
                .stdout
                .take()
                .map(|stdout| Box::new(stdout) as ProcessOutput)
                .ok_or(ProcessError::StdoutUnavailable)
        }

        async fn kill(&mut self) -> Result<(), ProcessError> {
            let Some(pid) = self.pid() else {
                return Ok(());
            };
            let pgid = NixPid::from_raw(pid.0 as i32);

            match signal::killpg(pgid, Signal::SIGKILL) {
                Ok(()) => {
                    info!("Sent SIGKILL to process group {}", pid);
                    Ok(())
                }
                Err(nix::errno::Errno::ESRCH) => {
                    debug!("Process group {} already gone", pid);
                    Ok(())
                }
                Err(e) => {
                    warn!("Failed to send SIGKILL to process group {}: {}", pid, e);
                    Err(ProcessError::Signal(format!("SIGKILL failed: {e}")))
                }
            }
        }

        async fn wait(&mut self) -> Result<(), ProcessError> {
            let status = self.child_mut()?.wait().await?;
            match ExitFailure::from_status(status) {
                None => Ok(()),
                Some(failure) => Err(ProcessError::Exit(failure)),
            }
        }
    }
}

// Re-export the Unix implementation when on Unix systems
#[cfg(unix)]
pub use unix_impl::UnixProcessHandle;

// Provide a stub implementation for non-Unix systems
#[cfg(not(unix))]
pub struct UnixProcessHandle {
    command_line: CommandLine,
}

#[cfg(not(unix))]
impl UnixProcessHandle {
    pub fn new(command_line: CommandLine) -> Self {
        Self { command_line }
    }

    pub fn command_line(&self) -> &CommandLine {
        &self.command_line
    }
}

/// Builds jobs as Unix child processes
#[derive(Debug, Clone, Default)]
pub struct UnixCommandBuilder {
    commands: ToolCommands,
}

impl UnixCommandBuilder {
    pub fn new(tools: ToolPaths) -> Self {
        Self {
            commands: ToolCommands::new(tools),
        }
    }

    pub fn command_line(&self, target: &Path, params: &JobParams) -> CommandLine {
        self.commands.command_line(target, params)
    }
}

#[cfg(unix)]
impl CommandBuilder for UnixCommandBuilder {
    type Handle = UnixProcessHandle;

    fn build(&self, target: &Path, params: &JobParams) -> UnixProcessHandle {
        UnixProcessHandle::new(self.command_line(target, params))
    }
}
