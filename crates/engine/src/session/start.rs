// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session startup and remote teardown.
//!
//! Startup order matters: everything fatal (settings, command templates,
//! session create) happens before anything best-effort (environment, theme,
//! readiness wait, nudges), and any failure after the session exists kills
//! it rather than leaving a zombie behind.

use gt_core::{Clock, SessionBackend, SessionInfo, SessionId};
use gt_mux::{debounce_delay, RemoteSessionState, RemoteStateDir, SandboxId};

use crate::commands::provision_commands;
use crate::settings::{materialize_settings, write_settings};

use super::env::{agent_env, export_prefix, shell_quote, EnvOptions};
use super::{SessionError, SessionManager, SessionSpec, WaitPolicy, PROPULSION_NUDGE};

/// Remote work directory inside a sandbox.
const SANDBOX_WORKDIR: &str = "/workspace";

impl<C: Clock> SessionManager<C> {
    pub(super) async fn start_local(
        &self,
        spec: &SessionSpec,
    ) -> Result<SessionInfo, SessionError> {
        let id = spec.session_id();
        let provider = spec.provider();

        // Reap a zombie holding the id; a live agent is a hard precondition
        // failure.
        if self.mux.has_session(&id).await? {
            if self.mux.is_agent_running(&id, provider.process_names()).await? {
                return Err(SessionError::AlreadyRunning(id));
            }
            tracing::info!(session = %id, "reaping zombie session");
            self.mux.kill_session_with_processes(&id).await?;
        }

        std::fs::create_dir_all(&spec.work_dir)?;
        self.prepare_work_dir(spec)?;

        let env = self.compose_env(spec);
        let command = compose_command(spec, &env);
        self.mux
            .new_session_with_command(&id, &spec.work_dir, &command)
            .await
            .map_err(|e| match e {
                gt_mux::MuxError::SessionExists(_) => SessionError::AlreadyRunning(id.clone()),
                other => SessionError::Mux(other),
            })?;

        // Everything below is best-effort except a fatal readiness timeout.
        for (key, value) in &env {
            if let Err(e) = self.mux.set_environment(&id, key, value).await {
                tracing::debug!(session = %id, key, error = %e, "set-environment failed");
            }
        }
        if let Some(theme) = &spec.theme {
            if let Err(e) = self.mux.apply_theme(&id, theme).await {
                tracing::debug!(session = %id, theme, error = %e, "theme apply failed");
            }
        }

        if spec.wait != WaitPolicy::None {
            let ready = match self
                .mux
                .wait_for_command(&id, provider.process_names(), self.config.ready_timeout)
                .await
            {
                Ok(ready) => ready,
                Err(e) => {
                    tracing::debug!(session = %id, error = %e, "readiness poll failed");
                    false
                }
            };
            if !ready {
                match spec.wait {
                    WaitPolicy::FatalOnTimeout => {
                        self.mux.kill_session_with_processes(&id).await?;
                        return Err(SessionError::ReadyTimeout(id));
                    }
                    _ => {
                        tracing::debug!(session = %id, "agent prompt not observed, continuing");
                    }
                }
            }
        }

        if spec.accept_permissions {
            if let Err(e) = self.mux.send_keys_debounced(&id, "2", debounce_delay(1)).await {
                tracing::debug!(session = %id, error = %e, "permissions dismissal failed");
            }
        }

        let delay = self.config.ready_delay_override.unwrap_or_else(|| provider.ready_delay());
        tokio::time::sleep(delay).await;

        if let Err(e) = self
            .mux
            .send_keys_debounced(&id, PROPULSION_NUDGE, debounce_delay(PROPULSION_NUDGE.len()))
            .await
        {
            tracing::debug!(session = %id, error = %e, "propulsion nudge failed");
        }

        let mut info = SessionInfo::new(id, SessionBackend::Local, true);
        info.created_at_ms = Some(self.clock.epoch_ms());
        Ok(info)
    }

    pub(super) async fn start_remote(
        &self,
        spec: &SessionSpec,
    ) -> Result<SessionInfo, SessionError> {
        let id = spec.session_id();
        let dir = self.remote_dir_for(spec);
        let agent_name = remote_agent_key(spec);

        if let Some(state) = dir.load(&agent_name) {
            let sandbox = SandboxId::new(state.sandbox_id.clone());
            if self.sandbox.is_running(&sandbox).await.unwrap_or(false) {
                return Err(SessionError::AlreadyRunning(id));
            }
            // Stale record: the sandbox died out from under us.
            tracing::info!(session = %id, sandbox = %sandbox, "dropping stale remote record");
            dir.remove(&agent_name);
        }

        std::fs::create_dir_all(&spec.work_dir)?;
        self.prepare_work_dir(spec)?;

        let env = self.compose_env(spec);
        let sandbox = self.sandbox.create(id.as_str(), &env).await?;
        self.sandbox.sync_up(&spec.work_dir, &sandbox, SANDBOX_WORKDIR).await?;

        let mut state = RemoteSessionState {
            session_id: id.clone(),
            sandbox_id: sandbox.to_string(),
            pty_id: String::new(),
            backend: "daytona".to_string(),
            metadata: Default::default(),
            created_at_ms: self.clock.epoch_ms(),
        };
        state
            .metadata
            .insert("work_dir".to_string(), spec.work_dir.display().to_string());
        if spec.auto_respawn {
            state.metadata.insert("auto_respawn".to_string(), "true".to_string());
        }
        dir.save(&agent_name, &state)?;

        let provider = spec.provider();
        let pty = self
            .sandbox
            .start_command(&sandbox, SANDBOX_WORKDIR, provider.binary())
            .await?;
        state.pty_id = pty.to_string();
        dir.save(&agent_name, &state)?;

        tokio::time::sleep(self.config.remote_ready_wait).await;

        let prompt = match &spec.beacon {
            Some(beacon) => beacon.render(),
            None => PROPULSION_NUDGE.to_string(),
        };
        if let Err(e) = self.sandbox.send_input(&sandbox, &pty, &prompt).await {
            tracing::debug!(session = %id, error = %e, "initial remote prompt failed");
        }

        let mut info = SessionInfo::new(id, SessionBackend::Remote, true);
        info.created_at_ms = Some(state.created_at_ms);
        info.metadata.insert("sandbox".to_string(), sandbox.to_string());
        Ok(info)
    }

    /// Tear down a remote session: sync the sandbox work dir back, commit
    /// what changed, destroy the sandbox, drop the record. Sync and commit
    /// failures are logged, never fatal.
    pub(super) async fn stop_remote(
        &self,
        dir: &RemoteStateDir,
        agent_name: &str,
        state: &RemoteSessionState,
    ) {
        let sandbox = SandboxId::new(state.sandbox_id.clone());
        if let Some(work_dir) = state.metadata.get("work_dir") {
            let local = std::path::Path::new(work_dir);
            if let Err(e) = self.sandbox.sync_down(&sandbox, SANDBOX_WORKDIR, local).await {
                tracing::warn!(session = %state.session_id, error = %e, "sandbox sync-down failed");
            } else {
                commit_synced_changes(local, &state.session_id, self.clock.epoch_ms()).await;
            }
        }
        if let Err(e) = self.sandbox.destroy(&sandbox).await {
            tracing::warn!(session = %state.session_id, error = %e, "sandbox destroy failed");
        }
        dir.remove(agent_name);
    }

    /// Settings and slash commands; both fatal. An agent without its hooks
    /// must not start.
    fn prepare_work_dir(&self, spec: &SessionSpec) -> Result<(), SessionError> {
        let provider = spec.provider();
        let layers: Vec<&str> = spec.settings_layers.iter().map(String::as_str).collect();
        if !layers.is_empty() {
            let merged = materialize_settings(&layers)?;
            write_settings(&provider.settings_dir(&spec.work_dir), &merged)?;
        }
        provision_commands(&spec.work_dir, provider)?;
        Ok(())
    }

    fn compose_env(&self, spec: &SessionSpec) -> Vec<(String, String)> {
        let opts = EnvOptions {
            root: spec.root.as_deref(),
            beads_dir: spec.beads_dir.as_deref(),
            config_dir: spec.config_dir.as_deref(),
            no_daemon: true,
        };
        agent_env(&spec.address, &opts)
    }

    fn remote_dir_for(&self, spec: &SessionSpec) -> RemoteStateDir {
        match spec.address.rig() {
            Some(rig) => RemoteStateDir::new(self.town.rig(rig).remote_sessions_dir()),
            None => RemoteStateDir::new(
                self.town.root().join(".runtime").join("daytona-sessions"),
            ),
        }
    }
}

/// `export …; ` prefix, agent binary, optional quoted beacon.
fn compose_command(spec: &SessionSpec, env: &[(String, String)]) -> String {
    let mut command = export_prefix(env);
    command.push_str(spec.provider().binary());
    if let Some(beacon) = &spec.beacon {
        command.push(' ');
        command.push_str(&shell_quote(&beacon.render()));
    }
    command
}

/// On-disk key for a remote session record.
fn remote_agent_key(spec: &SessionSpec) -> String {
    spec.address
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| spec.address.role().to_string())
}

/// Best-effort commit of files brought back from the sandbox.
async fn commit_synced_changes(work_dir: &std::path::Path, session: &SessionId, now_ms: u64) {
    let status = tokio::process::Command::new("git")
        .args(["add", "-A"])
        .current_dir(work_dir)
        .output()
        .await;
    if !matches!(status, Ok(ref o) if o.status.success()) {
        tracing::debug!(session = %session, "git add after sync-down failed");
        return;
    }
    let message = format!("sandbox sync for {} at {}", session, now_ms);
    let commit = tokio::process::Command::new("git")
        .args(["commit", "-m", &message])
        .current_dir(work_dir)
        .output()
        .await;
    match commit {
        Ok(output) if output.status.success() => {
            tracing::info!(session = %session, "committed sandbox changes");
        }
        // Nothing to commit lands here too; that is fine.
        Ok(_) | Err(_) => {
            tracing::debug!(session = %session, "no sandbox changes committed");
        }
    }
}

#[cfg(test)]
#[path = "start_tests.rs"]
mod tests;
