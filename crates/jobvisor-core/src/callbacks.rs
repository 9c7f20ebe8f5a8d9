use crate::error::JobError;
use std::sync::Mutex;
use tokio::sync::oneshot;
use tracing::warn;

/// One-shot acknowledgment handed to a callback
///
/// The supervisor does not proceed until the consumer calls [`Ack::done`].
/// A consumer that holds an `Ack` forever stalls its supervisor forever.
/// Dropping an `Ack` without calling `done` counts as acknowledging it.
#[derive(Debug)]
pub struct Ack {
    tx: oneshot::Sender<()>,
}

impl Ack {
    pub(crate) fn pair() -> (Ack, AckWait) {
        let (tx, rx) = oneshot::channel();
        (Ack { tx }, AckWait { rx })
    }

    /// Signal the supervisor that the notification has been processed
    pub fn done(self) {
        let _ = self.tx.send(());
    }
}

pub(crate) struct AckWait {
    rx: oneshot::Receiver<()>,
}

impl AckWait {
    pub(crate) async fn wait(self, stage: &str) {
        if self.rx.await.is_err() {
            warn!("Acknowledgment for {} dropped without being signaled", stage);
        }
    }
}

/// Lifecycle notifications for one job
///
/// Order per job: `begin`, then either `error` or `data`, then `end`.
/// `error` may also arrive from the watcher task after `data`, at any time
/// up to shortly after `end`. `data` and `end` carry an [`Ack`] that must be
/// signaled before the supervisor continues.
pub trait JobCallbacks: Send + Sync + 'static {
    fn begin(&self) {}

    fn data(&self, data: String, ack: Ack);

    fn error(&self, error: JobError);

    fn end(&self, success: bool, ack: Ack);
}

/// Result of a job collected by [`OutputCollector`]
#[derive(Debug, Default)]
pub struct JobOutput {
    pub data: Option<String>,
    pub errors: Vec<JobError>,
    pub success: bool,
}

/// Sink that gathers a job's output and hands it over when the job ends
///
/// Errors reported by the watcher after `end` are not included.
pub struct OutputCollector {
    state: Mutex<Collecting>,
}

struct Collecting {
    output: JobOutput,
    done: Option<oneshot::Sender<JobOutput>>,
}

impl OutputCollector {
    pub fn channel() -> (Self, oneshot::Receiver<JobOutput>) {
        let (tx, rx) = oneshot::channel();
        let collector = Self {
            state: Mutex::new(Collecting {
                output: JobOutput::default(),
                done: Some(tx),
            }),
        };
        (collector, rx)
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut Collecting) -> R) -> R {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut state)
    }
}

impl JobCallbacks for OutputCollector {
    fn data(&self, data: String, ack: Ack) {
        self.with_state(|state| state.output.data = Some(data));
        ack.done();
    }

    fn error(&self, error: JobError) {
        self.with_state(|state| state.output.errors.push(error));
    }

    fn end(&self, success: bool, ack: Ack) {
        self.with_state(|state| {
            state.output.success = success;
            if let Some(done) = state.done.take() {
                let _ = done.send(std::mem::take(&mut state.output));
            }
        });
        ack.done();
    }
}
