// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess helpers.
//!
//! Every child runs in its own process group so cancellation and timeouts
//! can kill the whole tree, not just the immediate child.

use std::process::{Output, Stdio};
use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio_util::sync::CancellationToken;

use crate::error::MuxError;

/// Timeout for git worktree/branch operations.
pub const GIT_TIMEOUT: Duration = Duration::from_secs(60);
/// Timeout for multiplexer control commands.
pub const MUX_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout for sandbox CLI operations (create/sync can be slow).
pub const SANDBOX_TIMEOUT: Duration = Duration::from_secs(300);

/// SIGKILL the process group rooted at `pid`.
pub fn kill_process_group(pid: u32) {
    let Ok(pid) = i32::try_from(pid) else { return };
    if let Err(e) = signal::kill(Pid::from_raw(-pid), Signal::SIGKILL) {
        tracing::debug!(pid, error = %e, "failed to kill process group");
    }
}

fn configure(cmd: &mut tokio::process::Command) {
    cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped()).process_group(0);
}

/// Run a command to completion with a hard timeout.
///
/// On timeout the child's process group is killed and `MuxError::Timeout`
/// is returned.
pub async fn run_with_timeout(
    mut cmd: tokio::process::Command,
    timeout: Duration,
    label: &str,
) -> Result<Output, MuxError> {
    configure(&mut cmd);
    let child = cmd
        .spawn()
        .map_err(|e| MuxError::command(label, format!("spawn failed: {}", e)))?;
    let pid = child.id();

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => {
            result.map_err(|e| MuxError::command(label, format!("wait failed: {}", e)))
        }
        Err(_) => {
            if let Some(pid) = pid {
                kill_process_group(pid);
            }
            Err(MuxError::Timeout { label: label.to_string() })
        }
    }
}

/// Run a command bound to a cancellation token.
///
/// When the token fires mid-flight the child's process group is killed and
/// `MuxError::Canceled` is returned.
pub async fn run_cancellable(
    mut cmd: tokio::process::Command,
    cancel: &CancellationToken,
    label: &str,
) -> Result<Output, MuxError> {
    if cancel.is_cancelled() {
        return Err(MuxError::Canceled);
    }
    configure(&mut cmd);
    let child = cmd
        .spawn()
        .map_err(|e| MuxError::command(label, format!("spawn failed: {}", e)))?;
    let pid = child.id();

    tokio::select! {
        result = child.wait_with_output() => {
            result.map_err(|e| MuxError::command(label, format!("wait failed: {}", e)))
        }
        _ = cancel.cancelled() => {
            if let Some(pid) = pid {
                kill_process_group(pid);
            }
            Err(MuxError::Canceled)
        }
    }
}

/// Map a non-success exit into `CommandFailed` with trimmed stderr.
pub fn require_success(output: Output, label: &str) -> Result<Output, MuxError> {
    if output.status.success() {
        Ok(output)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(MuxError::command(label, stderr.trim().to_string()))
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
