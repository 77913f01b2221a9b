// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tmux-backed multiplexer driver.
//!
//! Sessions are addressed with the `=` exact-match prefix so `gt-demo-toast`
//! never matches `gt-demo-toast2`. All control commands run through
//! [`crate::subprocess`] with a short timeout; tmux is local and fast, a
//! stuck server should fail loudly rather than hang the lifecycle.

use async_trait::async_trait;
use std::path::Path;
use std::process::Output;
use std::time::Duration;

use gt_core::SessionId;

use crate::driver::MuxDriver;
use crate::error::MuxError;
use crate::process;
use crate::subprocess::{run_with_timeout, MUX_TIMEOUT};

/// Interval between foreground-command polls in `wait_for_command`.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);
/// Grace between SIGTERM and SIGKILL during session teardown.
const KILL_GRACE: Duration = Duration::from_millis(100);

/// Driver over a local tmux server.
#[derive(Debug, Clone, Default)]
pub struct TmuxDriver {
    /// Private server socket (`tmux -L`); isolates test runs from the
    /// operator's own sessions.
    socket: Option<String>,
}

impl TmuxDriver {
    pub fn new() -> Self {
        Self { socket: None }
    }

    pub fn with_socket(socket: impl Into<String>) -> Self {
        Self { socket: Some(socket.into()) }
    }

    fn command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new("tmux");
        if let Some(socket) = &self.socket {
            cmd.arg("-L").arg(socket);
        }
        cmd
    }

    async fn run(&self, args: &[&str], label: &str) -> Result<Output, MuxError> {
        let mut cmd = self.command();
        cmd.args(args);
        run_with_timeout(cmd, MUX_TIMEOUT, label).await
    }

    /// PIDs of all panes in the session.
    async fn pane_pids(&self, id: &SessionId) -> Result<Vec<u32>, MuxError> {
        let target = format!("={}", id);
        let output = self
            .run(&["list-panes", "-s", "-t", &target, "-F", "#{pane_pid}"], "tmux list-panes")
            .await?;
        if !output.status.success() {
            return Err(MuxError::SessionNotFound(id.to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(|l| l.trim().parse().ok())
            .collect())
    }
}

#[async_trait]
impl MuxDriver for TmuxDriver {
    async fn has_session(&self, id: &SessionId) -> Result<bool, MuxError> {
        let target = format!("={}", id);
        let output = self.run(&["has-session", "-t", &target], "tmux has-session").await?;
        Ok(output.status.success())
    }

    async fn new_session_with_command(
        &self,
        id: &SessionId,
        cwd: &Path,
        command: &str,
    ) -> Result<(), MuxError> {
        let cwd_str = cwd.display().to_string();
        let output = self
            .run(
                &["new-session", "-d", "-s", id.as_str(), "-c", &cwd_str, command],
                "tmux new-session",
            )
            .await?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("duplicate session") {
            Err(MuxError::SessionExists(id.to_string()))
        } else {
            Err(MuxError::command("tmux new-session", stderr.trim().to_string()))
        }
    }

    async fn kill_session_with_processes(&self, id: &SessionId) -> Result<(), MuxError> {
        let pids = match self.pane_pids(id).await {
            Ok(pids) => pids,
            Err(MuxError::SessionNotFound(_)) => return Ok(()),
            Err(e) => return Err(e),
        };
        for pid in pids {
            process::kill_tree(pid, KILL_GRACE).await;
        }
        let target = format!("={}", id);
        let output = self.run(&["kill-session", "-t", &target], "tmux kill-session").await?;
        if !output.status.success() {
            // The session can disappear on its own once its panes die.
            tracing::debug!(session = %id, "kill-session after process teardown reported failure");
        }
        Ok(())
    }

    async fn send_keys_raw(&self, id: &SessionId, keys: &str) -> Result<(), MuxError> {
        let target = format!("={}", id);
        let output = self.run(&["send-keys", "-t", &target, keys], "tmux send-keys").await?;
        crate::subprocess::require_success(output, "tmux send-keys").map(drop)
    }

    async fn send_keys_debounced(
        &self,
        id: &SessionId,
        text: &str,
        delay: Duration,
    ) -> Result<(), MuxError> {
        let target = format!("={}", id);
        let output = self
            .run(&["send-keys", "-t", &target, "-l", "--", text], "tmux send-keys -l")
            .await?;
        crate::subprocess::require_success(output, "tmux send-keys -l")?;
        tokio::time::sleep(delay).await;
        self.send_keys_raw(id, "Enter").await
    }

    async fn capture_pane(&self, id: &SessionId, lines: u32) -> Result<String, MuxError> {
        let target = format!("={}", id);
        let start = format!("-{}", lines);
        let output = self
            .run(&["capture-pane", "-p", "-t", &target, "-S", &start], "tmux capture-pane")
            .await?;
        if !output.status.success() {
            return Err(MuxError::SessionNotFound(id.to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn set_environment(
        &self,
        id: &SessionId,
        key: &str,
        value: &str,
    ) -> Result<(), MuxError> {
        let target = format!("={}", id);
        let output = self
            .run(&["set-environment", "-t", &target, key, value], "tmux set-environment")
            .await?;
        crate::subprocess::require_success(output, "tmux set-environment").map(drop)
    }

    async fn apply_theme(&self, id: &SessionId, theme: &str) -> Result<(), MuxError> {
        let style = match theme {
            "rust" => "bg=colour130,fg=colour230",
            "chrome" => "bg=colour250,fg=colour232",
            "nux" => "bg=colour24,fg=colour255",
            _ => "bg=colour235,fg=colour250",
        };
        let target = format!("={}", id);
        let output = self
            .run(&["set-option", "-t", &target, "status-style", style], "tmux set-option")
            .await?;
        crate::subprocess::require_success(output, "tmux set-option").map(drop)
    }

    async fn wait_for_command(
        &self,
        id: &SessionId,
        shells: &[&str],
        timeout: Duration,
    ) -> Result<bool, MuxError> {
        let target = format!("={}", id);
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let output = self
                .run(
                    &["display-message", "-p", "-t", &target, "#{pane_current_command}"],
                    "tmux display-message",
                )
                .await?;
            if output.status.success() {
                let current = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if shells.contains(&current.as_str()) {
                    return Ok(true);
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    async fn attach_session(&self, id: &SessionId) -> Result<(), MuxError> {
        let target = format!("={}", id);
        let mut cmd = self.command();
        cmd.args(["attach-session", "-t", &target]);
        let status = cmd
            .status()
            .await
            .map_err(|e| MuxError::command("tmux attach-session", e.to_string()))?;
        if status.success() {
            Ok(())
        } else {
            Err(MuxError::SessionNotFound(id.to_string()))
        }
    }

    async fn is_agent_running(
        &self,
        id: &SessionId,
        process_names: &[&str],
    ) -> Result<bool, MuxError> {
        let pids = match self.pane_pids(id).await {
            Ok(pids) => pids,
            Err(MuxError::SessionNotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        for pid in pids {
            for entry in process::descendants(pid).await? {
                if process_names.iter().any(|name| entry.command.ends_with(name)) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    async fn list_sessions(&self, prefix: &str) -> Result<Vec<SessionId>, MuxError> {
        let output = self
            .run(&["list-sessions", "-F", "#{session_name}"], "tmux list-sessions")
            .await?;
        // A missing server is an empty list, not an error.
        if !output.status.success() {
            return Ok(Vec::new());
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|name| name.starts_with(prefix))
            .map(SessionId::from)
            .collect())
    }
}

#[cfg(test)]
#[path = "tmux_tests.rs"]
mod tests;
