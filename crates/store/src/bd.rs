// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI-backed store adapter.
//!
//! Shells out to the `bd` binary with `--json` output. Every invocation runs
//! in its own process group and is killed as a tree when the caller's
//! cancellation token fires. Daemon auto-start is disabled on every call so
//! concurrent invocations never race to spawn one.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio_util::sync::CancellationToken;

use gt_core::{AgentBead, Dep, Issue, IssueType};

use crate::error::StoreError;
use crate::store::{IssueStore, IssueUpdate};

/// Issue store driven through the `bd` CLI.
#[derive(Debug, Clone)]
pub struct BdCliStore {
    bin: PathBuf,
    /// Database directory passed as `--dir`; `None` lets `bd` discover it.
    beads_dir: Option<PathBuf>,
}

impl BdCliStore {
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        Self { bin: bin.into(), beads_dir: None }
    }

    pub fn with_beads_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.beads_dir = Some(dir.into());
        self
    }

    /// Run one `bd` invocation bound to the cancellation token.
    async fn run(
        &self,
        args: &[&str],
        cancel: &CancellationToken,
    ) -> Result<String, StoreError> {
        if cancel.is_cancelled() {
            return Err(StoreError::Canceled);
        }

        let mut cmd = tokio::process::Command::new(&self.bin);
        cmd.args(args)
            .env("BEADS_AUTO_START_DAEMON", "false")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0);
        if let Some(dir) = &self.beads_dir {
            cmd.arg("--dir").arg(dir);
        }

        let child = cmd
            .spawn()
            .map_err(|e| StoreError::Backend(format!("failed to spawn bd: {}", e)))?;
        let pid = child.id();

        let output = tokio::select! {
            output = child.wait_with_output() => {
                output.map_err(|e| StoreError::Backend(format!("bd wait failed: {}", e)))?
            }
            _ = cancel.cancelled() => {
                if let Some(pid) = pid {
                    kill_group(pid);
                }
                return Err(StoreError::Canceled);
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = if stderr.trim().is_empty() { stdout.trim() } else { stderr.trim() };
        if detail.contains("not found") || detail.contains("no such issue") {
            Err(StoreError::NotFound(detail.to_string()))
        } else {
            Err(StoreError::Backend(detail.to_string()))
        }
    }

    fn parse<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, StoreError> {
        serde_json::from_str(raw.trim()).map_err(|e| StoreError::Parse(e.to_string()))
    }
}

/// SIGKILL an entire process group.
fn kill_group(pid: u32) {
    let Ok(pid) = i32::try_from(pid) else { return };
    if let Err(e) = signal::kill(Pid::from_raw(-pid), Signal::SIGKILL) {
        tracing::debug!(pid, error = %e, "failed to kill bd process group");
    }
}

#[async_trait]
impl IssueStore for BdCliStore {
    async fn get_issue(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Issue, StoreError> {
        let raw = self.run(&["show", id, "--json"], cancel).await?;
        Self::parse(&raw)
    }

    async fn get_issues_by_ids(
        &self,
        ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<Issue>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut args: Vec<&str> = vec!["show"];
        args.extend(ids.iter().map(String::as_str));
        args.push("--json");
        let raw = self.run(&args, cancel).await?;
        // A single id yields an object, several yield an array.
        if raw.trim_start().starts_with('[') {
            Self::parse(&raw)
        } else {
            Self::parse::<Issue>(&raw).map(|issue| vec![issue])
        }
    }

    async fn update_issue(
        &self,
        id: &str,
        update: IssueUpdate,
        actor: &str,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        if update.is_empty() {
            return Ok(());
        }
        let status = update.status.map(|s| s.to_string());
        let mut args: Vec<&str> = vec!["update", id];
        if let Some(status) = status.as_deref() {
            args.push("--status");
            args.push(status);
        }
        if update.clear_assignee {
            args.push("--no-assignee");
        } else if let Some(assignee) = update.assignee.as_deref() {
            args.push("--assignee");
            args.push(assignee);
        }
        args.push("--actor");
        args.push(actor);
        self.run(&args, cancel).await.map(drop)
    }

    async fn get_dependencies_with_metadata(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Dep>, StoreError> {
        let raw = self.run(&["dep", "list", id, "--json"], cancel).await?;
        Self::parse(&raw)
    }

    async fn get_dependents_with_metadata(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Dep>, StoreError> {
        let raw = self.run(&["dep", "list", id, "--reverse", "--json"], cancel).await?;
        Self::parse(&raw)
    }

    async fn get_assigned_issue(
        &self,
        assignee: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Issue>, StoreError> {
        let raw = self
            .run(
                &["list", "--assignee", assignee, "--status", "open,in_progress", "--json"],
                cancel,
            )
            .await?;
        let issues: Vec<Issue> = Self::parse(&raw)?;
        Ok(issues.into_iter().next())
    }

    async fn list_open_issues_by_type(
        &self,
        issue_type: IssueType,
        cancel: &CancellationToken,
    ) -> Result<Vec<Issue>, StoreError> {
        let type_str = issue_type.to_string();
        let raw = self
            .run(&["list", "--type", &type_str, "--status", "open", "--json"], cancel)
            .await?;
        Self::parse(&raw)
    }

    async fn create_agent_bead(
        &self,
        bead: &AgentBead,
        actor: &str,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        let payload =
            serde_json::to_string(bead).map_err(|e| StoreError::Parse(e.to_string()))?;
        self.run(&["agent", "create", &bead.address, "--fields", &payload, "--actor", actor], cancel)
            .await
            .map(drop)
    }

    async fn get_agent_bead(
        &self,
        address: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<AgentBead>, StoreError> {
        match self.run(&["agent", "show", address, "--json"], cancel).await {
            Ok(raw) => Self::parse(&raw).map(Some),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn delete_agent_bead(
        &self,
        address: &str,
        actor: &str,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        match self.run(&["agent", "delete", address, "--actor", actor], cancel).await {
            Ok(_) | Err(StoreError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[path = "bd_tests.rs"]
mod tests;
