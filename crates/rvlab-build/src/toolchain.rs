use crate::config::BuildConfig;
use rvlab_store::Workspace;
use std::process::Stdio;
use tokio::process::Command;

/// Captured outcome of one toolchain run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildResult {
    pub success: bool,
    pub message: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

impl BuildResult {
    /// Text surfaced to the user: stderr when there is any, else stdout.
    pub fn output(&self) -> &str {
        if self.stderr.is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }

    fn failed(program: &str, reason: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            message: format!("Failed to run {program} command: {reason}"),
            ..Self::default()
        }
    }
}

/// Runs the toolchain in the workspace and waits for it, up to the configured
/// timeout. Never returns an error: spawn failures, non-zero exits and
/// timeouts all come back as `success == false`.
pub async fn build(config: &BuildConfig, workspace: &Workspace) -> BuildResult {
    let program = config.toolchain.program.as_str();
    let mut cmd = Command::new(program);
    cmd.args(&config.toolchain.args)
        .current_dir(workspace.path())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            tracing::error!("failed to start {program} in {}: {err}", workspace.name());
            return BuildResult::failed(program, err);
        }
    };
    let pgid = child.id();

    let output = match tokio::time::timeout(config.timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(err)) => {
            tracing::error!("{program} in {} failed: {err}", workspace.name());
            return BuildResult::failed(program, err);
        }
        Err(_) => {
            if let Some(pgid) = pgid {
                kill_group(pgid);
            }
            tracing::error!(
                "{program} in {} timed out after {:?}",
                workspace.name(),
                config.timeout
            );
            return BuildResult {
                timed_out: true,
                ..BuildResult::failed(
                    program,
                    format!("timed out after {}s", config.timeout.as_secs_f64()),
                )
            };
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    let exit_code = output.status.code();

    if !output.status.success() {
        let status = match exit_code {
            Some(code) => format!("exited with status {code}"),
            None => "terminated by signal".to_string(),
        };
        tracing::error!("{program} in {} {status}", workspace.name());
        return BuildResult {
            stdout,
            stderr,
            exit_code,
            ..BuildResult::failed(program, status)
        };
    }

    if !stderr.is_empty() {
        tracing::warn!("{program} warnings in {}: {stderr}", workspace.name());
    }
    tracing::debug!("{program} output in {}: {stdout}", workspace.name());
    BuildResult {
        success: true,
        message: format!("{program} command executed successfully"),
        stdout,
        stderr,
        exit_code,
        timed_out: false,
    }
}

/// Kills every process the toolchain started, not just its leader.
#[cfg(unix)]
fn kill_group(pgid: u32) {
    // SAFETY: kill(2) with a negative pid signals the group and touches no memory.
    let rc = unsafe { libc::kill(-(pgid as i32), libc::SIGKILL) };
    if rc == -1 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            tracing::warn!("failed to kill process group {pgid}: {err}");
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}
