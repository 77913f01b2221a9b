// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daytona sandbox backend, driven through the `daytona` CLI.
//!
//! Sandbox ids are whatever the CLI prints on create; PTY ids come back from
//! `exec --pty`. Sync moves whole directories: the remote side has no shared
//! filesystem, so partial-sync bookkeeping is not worth the complexity.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;

use crate::error::MuxError;
use crate::sandbox::{PtyId, SandboxBackend, SandboxId};
use crate::subprocess::{require_success, run_with_timeout, SANDBOX_TIMEOUT};

/// Sandbox backend over the `daytona` CLI.
#[derive(Debug, Clone)]
pub struct DaytonaBackend {
    bin: PathBuf,
}

impl DaytonaBackend {
    pub fn new() -> Self {
        Self { bin: PathBuf::from("daytona") }
    }

    pub fn with_binary(bin: impl Into<PathBuf>) -> Self {
        Self { bin: bin.into() }
    }

    async fn run(&self, args: &[&str], label: &str) -> Result<Output, MuxError> {
        let mut cmd = tokio::process::Command::new(&self.bin);
        cmd.args(args);
        let output = run_with_timeout(cmd, SANDBOX_TIMEOUT, label).await?;
        require_success(output, label)
    }
}

impl Default for DaytonaBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn first_line(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[async_trait]
impl SandboxBackend for DaytonaBackend {
    async fn create(
        &self,
        name: &str,
        env: &[(String, String)],
    ) -> Result<SandboxId, MuxError> {
        let mut args: Vec<String> = vec!["sandbox".into(), "create".into(), name.into()];
        for (key, value) in env {
            args.push("--env".into());
            args.push(format!("{}={}", key, value));
        }
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.run(&arg_refs, "daytona sandbox create").await?;
        let id = first_line(&output);
        if id.is_empty() {
            return Err(MuxError::command(
                "daytona sandbox create",
                "no sandbox id on stdout",
            ));
        }
        Ok(SandboxId::new(id))
    }

    async fn start_command(
        &self,
        sandbox: &SandboxId,
        cwd: &str,
        command: &str,
    ) -> Result<PtyId, MuxError> {
        let output = self
            .run(
                &["sandbox", "exec", sandbox.as_str(), "--pty", "--cwd", cwd, "--", command],
                "daytona sandbox exec",
            )
            .await?;
        let pty = first_line(&output);
        if pty.is_empty() {
            return Err(MuxError::command("daytona sandbox exec", "no pty id on stdout"));
        }
        Ok(PtyId::new(pty))
    }

    async fn send_input(
        &self,
        sandbox: &SandboxId,
        pty: &PtyId,
        text: &str,
    ) -> Result<(), MuxError> {
        self.run(
            &["sandbox", "input", sandbox.as_str(), "--pty", pty.as_str(), "--text", text],
            "daytona sandbox input",
        )
        .await
        .map(drop)
    }

    async fn destroy(&self, sandbox: &SandboxId) -> Result<(), MuxError> {
        self.run(&["sandbox", "delete", sandbox.as_str(), "--force"], "daytona sandbox delete")
            .await
            .map(drop)
    }

    async fn sync_up(
        &self,
        local: &Path,
        sandbox: &SandboxId,
        remote_path: &str,
    ) -> Result<(), MuxError> {
        let local_str = local.display().to_string();
        let target = format!("{}:{}", sandbox, remote_path);
        self.run(&["sandbox", "cp", "-r", &local_str, &target], "daytona sandbox cp (up)")
            .await
            .map(drop)
    }

    async fn sync_down(
        &self,
        sandbox: &SandboxId,
        remote_path: &str,
        local: &Path,
    ) -> Result<(), MuxError> {
        let source = format!("{}:{}", sandbox, remote_path);
        let local_str = local.display().to_string();
        self.run(&["sandbox", "cp", "-r", &source, &local_str], "daytona sandbox cp (down)")
            .await
            .map(drop)
    }

    async fn is_running(&self, sandbox: &SandboxId) -> Result<bool, MuxError> {
        let output = match self
            .run(&["sandbox", "info", sandbox.as_str(), "--json"], "daytona sandbox info")
            .await
        {
            Ok(output) => output,
            Err(MuxError::CommandFailed { .. }) => return Ok(false),
            Err(e) => return Err(e),
        };
        let stdout = String::from_utf8_lossy(&output.stdout);
        let state = serde_json::from_str::<serde_json::Value>(stdout.trim())
            .ok()
            .and_then(|v| v.get("state").and_then(|s| s.as_str()).map(str::to_string))
            .unwrap_or_default();
        Ok(state == "started" || state == "running")
    }
}

#[cfg(test)]
#[path = "daytona_tests.rs"]
mod tests;
