#[cfg(unix)]
mod fallback;
mod unix_process;

#[cfg(unix)]
pub use fallback::{capture_with_fallback, find_executable, run_with_fallback};
pub use unix_process::{UnixCommandBuilder, UnixProcessHandle};

pub struct UnixCommandBuilderFactory;

impl UnixCommandBuilderFactory {
    pub fn create_command_builder(
        config: &jobvisor_core::SupervisorConfig,
    ) -> UnixCommandBuilder {
        UnixCommandBuilder::new(config.tools.clone())
    }

    pub fn platform_name() -> &'static str {
        "Unix"
    }
}
