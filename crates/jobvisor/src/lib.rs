//! Supervised execution of packet-analysis jobs.
//!
//! The platform command builder is selected at compile time. A
//! [`Loader`] runs one job at a time and reports through
//! [`JobCallbacks`]; [`FieldCompleter`] serves display-filter field names
//! loaded through one.

pub mod completer;

pub use completer::FieldCompleter;
pub use jobvisor_core::*;

#[cfg(unix)]
pub use jobvisor_unix::{capture_with_fallback, find_executable, run_with_fallback};

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
pub type PlatformCommandBuilder = jobvisor_unix::UnixCommandBuilder;

#[cfg(unix)]
pub type PlatformProcessHandle = jobvisor_unix::UnixProcessHandle;

/// Supervisor over the platform's real processes
#[cfg(unix)]
pub type Loader = Supervisor<PlatformCommandBuilder>;

/// Platform-independent factory that selects the appropriate implementation at compile time
pub struct PlatformCommandBuilderFactory;

#[cfg(unix)]
impl PlatformCommandBuilderFactory {
    pub fn create_command_builder(config: &SupervisorConfig) -> PlatformCommandBuilder {
        jobvisor_unix::UnixCommandBuilderFactory::create_command_builder(config)
    }

    pub fn platform_name() -> &'static str {
        jobvisor_unix::UnixCommandBuilderFactory::platform_name()
    }
}

/// Validate `config` and create a loader whose jobs die with `parent`
#[cfg(unix)]
pub fn new_loader(
    parent: &CancellationToken,
    tracker: TaskTracker,
    config: &SupervisorConfig,
) -> anyhow::Result<Loader> {
    config.validate()?;
    let builder = PlatformCommandBuilderFactory::create_command_builder(config);
    Ok(Supervisor::new(builder, parent, tracker, config))
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install a formatting subscriber filtered by `RUST_LOG`
///
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(false)
        .with_line_number(true)
        .try_init();
}

/// Like [`init_tracing`], emitting one JSON object per event
pub fn init_json_tracing() {
    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter())
        .try_init();
}
