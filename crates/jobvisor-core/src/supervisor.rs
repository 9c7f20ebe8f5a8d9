//! Cancellable supervision of one external job at a time.
//!
//! A job runs as two tracked tasks. The job task builds the process handle,
//! starts it, drains its output and notifies the callbacks. The watcher task
//! selects over two one-shot facts, "the process is running" (which hands it
//! the started handle) and "the job was cancelled". Once both facts are known
//! it kills the process, at most once, then reaps it, reports a failed exit
//! and hands the handle back. The handle is dropped after `end`.
//!
//! ```text
//! job task:     begin ─► start ─► launch ─► drain ─► data/ack ─► cancel ─► end/ack ─► release
//!                                   │                              │
//! watcher:      select { launch, cancelled } ◄─────────────────────┘
//!                          └─► kill (both known) ─► wait ─► error (unless suppressed) ─► hand back
//! ```

use crate::callbacks::{Ack, JobCallbacks};
use crate::command::{CommandBuilder, JobParams};
use crate::config::SupervisorConfig;
use crate::drain::drain;
use crate::error::{JobError, ProcessError};
use crate::process::{ProcessHandle, ProcessId};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// What the job task tells the watcher after attempting to start
enum Launch<H> {
    Running { pid: ProcessId, handle: H },
    NeverStarted,
}

struct JobSlot {
    id: u64,
    token: CancellationToken,
}

struct Shared<B> {
    builder: B,
    /// Cancelling this cancels every job token
    parent: CancellationToken,
    slot: Mutex<Option<JobSlot>>,
    next_job: AtomicU64,
    suppress_errors: AtomicBool,
    tracker: TaskTracker,
}

/// Runs jobs built by `B`, one at a time
///
/// Dropping the supervisor shuts it down and kills any running job.
pub struct Supervisor<B: CommandBuilder> {
    shared: Arc<Shared<B>>,
}

impl<B: CommandBuilder> Supervisor<B> {
    /// Create a supervisor whose jobs are cancelled along with `parent`
    ///
    /// Every task the supervisor spawns is registered on `tracker`.
    pub fn new(
        builder: B,
        parent: &CancellationToken,
        tracker: TaskTracker,
        config: &SupervisorConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                builder,
                parent: parent.child_token(),
                slot: Mutex::new(None),
                next_job: AtomicU64::new(1),
                suppress_errors: AtomicBool::new(config.suppress_errors),
                tracker,
            }),
        }
    }

    /// Start a job in the background
    ///
    /// Returns `JobError::Busy` while another job is in flight and
    /// `JobError::Shutdown` once the supervisor was shut down. The outcome
    /// of the job itself is reported through `callbacks`.
    pub fn start<C>(
        &self,
        target: impl AsRef<Path>,
        params: JobParams,
        callbacks: Arc<C>,
    ) -> Result<(), JobError>
    where
        C: JobCallbacks + ?Sized,
    {
        let shared = &self.shared;
        if shared.parent.is_cancelled() {
            return Err(JobError::Shutdown);
        }

        let token = shared.parent.child_token();
        let job = shared.next_job.fetch_add(1, Ordering::Relaxed);
        {
            let mut slot = shared.lock_slot();
            if slot.is_some() {
                return Err(JobError::Busy);
            }
            *slot = Some(JobSlot {
                id: job,
                token: token.clone(),
            });
        }

        debug!("Queued {} job {}", params.kind(), job);
        let target = target.as_ref().to_path_buf();
        shared
            .tracker
            .spawn(Arc::clone(shared).run_job(job, target, params, token, callbacks));
        Ok(())
    }

    /// Request cancellation of the current job, if any
    ///
    /// Returns immediately; the kill happens in the watcher task.
    pub fn stop(&self) {
        if let Some(slot) = self.shared.lock_slot().as_ref() {
            debug!("Stopping job {}", slot.id);
            slot.token.cancel();
        }
    }

    /// Suppress error reporting and cancel every current and future job
    pub fn shutdown(&self) {
        self.set_suppress_errors(true);
        self.shared.parent.cancel();
    }

    pub fn is_busy(&self) -> bool {
        self.shared.lock_slot().is_some()
    }

    pub fn set_suppress_errors(&self, suppress: bool) {
        self.shared.suppress_errors.store(suppress, Ordering::Relaxed);
    }

    pub fn suppress_errors(&self) -> bool {
        self.shared.suppress_errors.load(Ordering::Relaxed)
    }
}

impl<B: CommandBuilder> Drop for Supervisor<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Frees the job slot when the job task finishes or unwinds
struct SlotRelease<'a, B> {
    shared: &'a Shared<B>,
    job: u64,
}

impl<B> Drop for SlotRelease<'_, B> {
    fn drop(&mut self) {
        let mut slot = self.shared.lock_slot();
        if slot.as_ref().is_some_and(|s| s.id == self.job) {
            *slot = None;
        }
    }
}

impl<B> Shared<B> {
    fn lock_slot(&self) -> MutexGuard<'_, Option<JobSlot>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<B: CommandBuilder> Shared<B> {
    async fn run_job<C>(
        self: Arc<Self>,
        job: u64,
        target: PathBuf,
        params: JobParams,
        token: CancellationToken,
        callbacks: Arc<C>,
    ) where
        C: JobCallbacks + ?Sized,
    {
        // dropped in reverse order: the token is cancelled before the slot is freed
        let _release = SlotRelease {
            shared: &*self,
            job,
        };
        let _cancel = token.clone().drop_guard();

        let handle = self.builder.build(&target, &params);
        let command = handle.describe();

        let (launch_tx, launch_rx) = oneshot::channel();
        let (reaped_tx, reaped_rx) = oneshot::channel();
        self.tracker.spawn(Arc::clone(&self).watch(
            command.clone(),
            launch_rx,
            reaped_tx,
            token.clone(),
            Arc::clone(&callbacks),
        ));

        callbacks.begin();
        let (success, unreaped) =
            Self::load(handle, launch_tx, &token, &command, &*callbacks).await;

        token.cancel();
        let (ack, wait) = Ack::pair();
        callbacks.end(success, ack);
        wait.wait("end").await;

        // the watcher returns the handle once it has been reaped
        let reaped = reaped_rx.await.ok();
        drop((unreaped, reaped));
        debug!("Job {} finished ({})", job, command);
    }

    /// Start, drain and deliver
    ///
    /// Returns whether output was produced, and the handle if it was not
    /// passed on to the watcher.
    async fn load<C>(
        mut handle: B::Handle,
        launch: oneshot::Sender<Launch<B::Handle>>,
        token: &CancellationToken,
        command: &str,
        callbacks: &C,
    ) -> (bool, Option<B::Handle>)
    where
        C: JobCallbacks + ?Sized,
    {
        if token.is_cancelled() {
            info!("Job cancelled before starting {}", command);
            let _ = launch.send(Launch::NeverStarted);
            return (false, Some(handle));
        }

        if let Err(source) = handle.start().await {
            let _ = launch.send(Launch::NeverStarted);
            callbacks.error(JobError::Start {
                command: command.to_string(),
                source,
            });
            return (false, Some(handle));
        }

        let stdout = handle.stdout_reader();

        let unreaped = match handle.pid() {
            Some(pid) => {
                info!("Started command {} with pid {}", command, pid);
                let _ = launch.send(Launch::Running { pid, handle });
                None
            }
            None => {
                warn!("Command {} reported no pid after starting", command);
                let _ = launch.send(Launch::NeverStarted);
                Some(handle)
            }
        };

        let stdout = match stdout {
            Ok(stdout) => stdout,
            Err(source) => {
                callbacks.error(JobError::Stdout {
                    command: command.to_string(),
                    source,
                });
                return (false, unreaped);
            }
        };

        let mut output = String::new();
        if let Err(e) = drain(stdout, &mut output).await {
            warn!("Reading output of {} failed: {}", command, e);
        }

        let (ack, wait) = Ack::pair();
        callbacks.data(output, ack);
        wait.wait("data").await;
        (true, unreaped)
    }

    async fn watch<C>(
        self: Arc<Self>,
        command: String,
        mut launch: oneshot::Receiver<Launch<B::Handle>>,
        reaped: oneshot::Sender<B::Handle>,
        token: CancellationToken,
        callbacks: Arc<C>,
    ) where
        C: JobCallbacks + ?Sized,
    {
        let mut launched = false;
        let mut cancelled = false;
        let mut running: Option<B::Handle> = None;

        while !(launched && (cancelled || running.is_none())) {
            tokio::select! {
                result = &mut launch, if !launched => {
                    launched = true;
                    // a dropped sender means the process never started
                    if let Ok(Launch::Running { pid, handle }) = result {
                        debug!("Watching {} (pid {})", command, pid);
                        running = Some(handle);
                    }
                }
                _ = token.cancelled(), if !cancelled => {
                    cancelled = true;
                }
            }
        }

        let Some(mut handle) = running else {
            debug!("Nothing to reap for {}", command);
            return;
        };

        if let Err(e) = handle.kill().await {
            info!("Did not kill {}: {}", command, e);
        }

        match handle.wait().await {
            Ok(()) => debug!("{} exited successfully", command),
            Err(source) if source.is_exit_failure() => {
                if self.suppress_errors.load(Ordering::Relaxed) {
                    debug!("Suppressed failure of {}: {}", command, source);
                } else {
                    callbacks.error(JobError::BadCommand { command, source });
                }
            }
            Err(e) => error!("Waiting for {} failed: {}", command, e),
        }

        let _ = reaped.send(handle);
    }
}
