use anyhow::{Context, Result, anyhow};
use jobvisor_core::ToolPaths;
use std::ffi::OsStr;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{info, warn};

/// Locate an executable the way a shell would
///
/// Names containing a `/` are checked as given, anything else is searched
/// for on `PATH`.
pub fn find_executable(name: &Path) -> Option<PathBuf> {
    if name.as_os_str().is_empty() {
        return None;
    }
    if name.to_string_lossy().contains('/') {
        return is_executable(name).then(|| name.to_path_buf());
    }

    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Run `primary` in the foreground, replacing this process with `secondary`
/// if it fails
///
/// Both programs get the same arguments and inherit stdio. Returns `Ok` if
/// the primary succeeded. Otherwise this only returns when the secondary
/// could not be found or executed.
pub fn run_with_fallback<S: AsRef<OsStr>>(
    primary: &Path,
    secondary: &Path,
    args: &[S],
) -> Result<()> {
    info!("Starting command {}", primary.display());
    let status = Command::new(primary)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status();

    match status {
        Ok(status) if status.success() => return Ok(()),
        Ok(status) => warn!("{} failed with {}", primary.display(), status),
        Err(e) => warn!("Could not run {}: {}", primary.display(), e),
    }

    let secondary = find_executable(secondary)
        .ok_or_else(|| anyhow!("{} not found on PATH", secondary.display()))?;
    info!("Retrying with command {}", secondary.display());

    let err = Command::new(&secondary).args(args).exec();
    Err(err).with_context(|| format!("Failed to execute {}", secondary.display()))
}

/// Capture with the dedicated capture tool, falling back to the analysis
/// tool for interfaces only it supports
pub fn capture_with_fallback<S: AsRef<OsStr>>(tools: &ToolPaths, args: &[S]) -> Result<()> {
    run_with_fallback(&tools.dumpcap, &tools.tshark, args)
}
