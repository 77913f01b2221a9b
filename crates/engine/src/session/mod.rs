// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session lifecycle engine.
//!
//! Turns a [`SessionSpec`] into a live, supervised, addressable session on
//! either the local multiplexer or a remote sandbox, detects zombies (session
//! exists, hosted agent dead), and tears sessions down without orphaning
//! descendants.

pub mod env;
mod start;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use gt_core::{
    AgentAddress, AgentProvider, Clock, SessionBackend, SessionId, SessionInfo, SystemClock, Town,
};
use gt_mux::{
    debounce_delay, MuxDriver, MuxError, RemoteSessionState, RemoteStateDir, SandboxBackend,
    SandboxId,
};

use crate::settings::SettingsError;

/// Process names that count as a hosted agent, across providers. Used when
/// the provider of an existing session is unknown (zombie checks, status).
pub const AGENT_PROCESS_NAMES: &[&str] = &["claude", "opencode", "node", "bun"];

/// Standing instruction sent once the session is ready: begin autonomous
/// work discovery. Distinct from the beacon, which is the first user-visible
/// prompt.
pub const PROPULSION_NUDGE: &str = "Check your mail queue and your assigned issue, then get to \
work. If nothing is assigned, find the next ready issue in your rig and claim it.";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session already running: {0}")]
    AlreadyRunning(SessionId),
    #[error("session not running: {0}")]
    NotRunning(SessionId),
    #[error("agent prompt never appeared in session {0}")]
    ReadyTimeout(SessionId),
    #[error("operation {op} is not supported for remote sessions")]
    RemoteUnsupported { op: &'static str },
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Mux(#[from] MuxError),
    #[error("session io error: {0}")]
    Io(#[from] std::io::Error),
}

/// How long to wait for the hosted agent before declaring the session ready.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WaitPolicy {
    /// Do not wait at all.
    None,
    /// Wait, but continue on timeout.
    #[default]
    BestEffort,
    /// Wait; on timeout kill the session and fail.
    FatalOnTimeout,
}

/// The startup prompt injected as the agent's very first input.
#[derive(Debug, Clone)]
pub struct Beacon {
    pub recipient: String,
    pub sender: String,
    pub topic: String,
    pub issue: Option<String>,
}

impl Beacon {
    /// Render the first user-visible prompt.
    pub fn render(&self) -> String {
        let mut prompt = format!(
            "Mail for {} from {}: {}",
            self.recipient, self.sender, self.topic
        );
        if let Some(issue) = &self.issue {
            prompt.push_str(&format!(" [re: {}]", issue));
        }
        prompt
    }
}

/// Everything needed to start one session.
#[derive(Debug, Clone)]
pub struct SessionSpec {
    pub address: AgentAddress,
    pub work_dir: PathBuf,
    pub backend: SessionBackend,
    /// Explicit session id; derived from the address when absent.
    pub id: Option<SessionId>,
    /// Provider override alias (`claude`, `opencode`).
    pub agent_override: Option<String>,
    pub beacon: Option<Beacon>,
    pub theme: Option<String>,
    pub wait: WaitPolicy,
    pub auto_respawn: bool,
    pub accept_permissions: bool,
    /// Ordered settings fragments (global, rig, agent).
    pub settings_layers: Vec<String>,
    /// Town root for `GT_ROOT`.
    pub root: Option<PathBuf>,
    /// Issue database for `BEADS_DIR`.
    pub beads_dir: Option<PathBuf>,
    /// Config path selector for `CLAUDE_CONFIG_DIR`.
    pub config_dir: Option<PathBuf>,
}

impl SessionSpec {
    pub fn new(address: AgentAddress, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            address,
            work_dir: work_dir.into(),
            backend: SessionBackend::Local,
            id: None,
            agent_override: None,
            beacon: None,
            theme: None,
            wait: WaitPolicy::default(),
            auto_respawn: false,
            accept_permissions: false,
            settings_layers: Vec::new(),
            root: None,
            beads_dir: None,
            config_dir: None,
        }
    }

    gt_core::setters! {
        set {
            backend: SessionBackend,
            wait: WaitPolicy,
            auto_respawn: bool,
            accept_permissions: bool,
            settings_layers: Vec<String>,
        }
        option {
            id: SessionId,
            agent_override: String,
            theme: String,
            root: PathBuf,
            beads_dir: PathBuf,
            config_dir: PathBuf,
        }
    }

    pub fn beacon(mut self, beacon: Beacon) -> Self {
        self.beacon = Some(beacon);
        self
    }

    /// Effective session id.
    pub fn session_id(&self) -> SessionId {
        self.id.clone().unwrap_or_else(|| self.address.session_id())
    }

    /// Effective provider: override alias when recognized, else the default.
    pub fn provider(&self) -> AgentProvider {
        self.agent_override
            .as_deref()
            .and_then(AgentProvider::from_alias)
            .unwrap_or_default()
    }
}

/// Runtime tuning for the lifecycle engine.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Readiness wait for the agent prompt.
    pub ready_timeout: Duration,
    /// Remote agent readiness wait after start.
    pub remote_ready_wait: Duration,
    /// Pause between the interrupt and the kill on graceful shutdown.
    pub shutdown_pause: Duration,
    /// Override of the provider-specific post-readiness delay.
    pub ready_delay_override: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ready_timeout: Duration::from_secs(30),
            remote_ready_wait: Duration::from_secs(10),
            shutdown_pause: Duration::from_millis(100),
            ready_delay_override: None,
        }
    }
}

/// Composes the multiplexer driver and sandbox backend into the session
/// lifecycle operations.
pub struct SessionManager<C: Clock = SystemClock> {
    mux: Arc<dyn MuxDriver>,
    sandbox: Arc<dyn SandboxBackend>,
    town: Town,
    clock: C,
    config: SessionConfig,
}

impl SessionManager<SystemClock> {
    pub fn new(mux: Arc<dyn MuxDriver>, sandbox: Arc<dyn SandboxBackend>, town: Town) -> Self {
        Self { mux, sandbox, town, clock: SystemClock, config: SessionConfig::default() }
    }
}

impl<C: Clock> SessionManager<C> {
    pub fn with_clock(
        mux: Arc<dyn MuxDriver>,
        sandbox: Arc<dyn SandboxBackend>,
        town: Town,
        clock: C,
    ) -> Self {
        Self { mux, sandbox, town, clock, config: SessionConfig::default() }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Start a session per its spec.
    pub async fn start(&self, spec: &SessionSpec) -> Result<SessionInfo, SessionError> {
        match spec.backend {
            SessionBackend::Local => self.start_local(spec).await,
            SessionBackend::Remote => self.start_remote(spec).await,
        }
    }

    /// Stop a session. Graceful shutdown interrupts the foreground pane and
    /// pauses before killing; `force` skips both.
    pub async fn stop(&self, id: &SessionId, force: bool) -> Result<(), SessionError> {
        if self.mux.has_session(id).await? {
            if !force {
                if let Err(e) = self.mux.send_keys_raw(id, "C-c").await {
                    tracing::debug!(session = %id, error = %e, "interrupt before kill failed");
                }
                tokio::time::sleep(self.config.shutdown_pause).await;
            }
            self.mux.kill_session_with_processes(id).await?;
            return Ok(());
        }
        if let Some((dir, agent, state)) = self.find_remote(id) {
            self.stop_remote(&dir, &agent, &state).await;
            return Ok(());
        }
        Err(SessionError::NotRunning(id.clone()))
    }

    /// Whether a live session with a live agent exists.
    pub async fn is_running(&self, id: &SessionId) -> Result<bool, SessionError> {
        if self.mux.has_session(id).await? {
            return Ok(self.mux.is_agent_running(id, AGENT_PROCESS_NAMES).await?);
        }
        if let Some((_, _, state)) = self.find_remote(id) {
            let sandbox = SandboxId::new(state.sandbox_id);
            return Ok(self.sandbox.is_running(&sandbox).await?);
        }
        Ok(false)
    }

    /// Point-in-time status.
    pub async fn status(&self, id: &SessionId) -> Result<SessionInfo, SessionError> {
        if self.mux.has_session(id).await? {
            let running = self.mux.is_agent_running(id, AGENT_PROCESS_NAMES).await?;
            return Ok(SessionInfo::new(id.clone(), SessionBackend::Local, running));
        }
        if let Some((_, _, state)) = self.find_remote(id) {
            let sandbox = SandboxId::new(state.sandbox_id.clone());
            let running = self.sandbox.is_running(&sandbox).await.unwrap_or(false);
            let mut info = SessionInfo::new(id.clone(), SessionBackend::Remote, running);
            info.created_at_ms = Some(state.created_at_ms);
            info.metadata = state.metadata.clone();
            info.metadata.insert("sandbox".to_string(), state.sandbox_id.clone());
            info.metadata.insert("pty".to_string(), state.pty_id.clone());
            return Ok(info);
        }
        Ok(SessionInfo::new(id.clone(), SessionBackend::Local, false))
    }

    /// All sessions of a rig, local and remote.
    pub async fn list(&self, rig: &str) -> Result<Vec<SessionInfo>, SessionError> {
        let prefix = format!("gt-{}-", rig);
        let mut infos = Vec::new();
        for id in self.mux.list_sessions(&prefix).await? {
            let running = self.mux.is_agent_running(&id, AGENT_PROCESS_NAMES).await?;
            infos.push(SessionInfo::new(id, SessionBackend::Local, running));
        }
        let dir = RemoteStateDir::new(self.town.rig(rig).remote_sessions_dir());
        for agent in dir.list() {
            if let Some(state) = dir.load(&agent) {
                let sandbox = SandboxId::new(state.sandbox_id.clone());
                let running = self.sandbox.is_running(&sandbox).await.unwrap_or(false);
                let mut info =
                    SessionInfo::new(state.session_id.clone(), SessionBackend::Remote, running);
                info.created_at_ms = Some(state.created_at_ms);
                infos.push(info);
            }
        }
        Ok(infos)
    }

    /// Last `lines` lines of the visible pane. Local only.
    pub async fn capture(&self, id: &SessionId, lines: u32) -> Result<String, SessionError> {
        if self.mux.has_session(id).await? {
            return Ok(self.mux.capture_pane(id, lines).await?);
        }
        if self.find_remote(id).is_some() {
            return Err(SessionError::RemoteUnsupported { op: "capture" });
        }
        Err(SessionError::NotRunning(id.clone()))
    }

    /// Inject text into the hosted agent, debounced by message size.
    pub async fn inject(&self, id: &SessionId, text: &str) -> Result<(), SessionError> {
        if self.mux.has_session(id).await? {
            self.mux.send_keys_debounced(id, text, debounce_delay(text.len())).await?;
            return Ok(());
        }
        if let Some((_, _, state)) = self.find_remote(id) {
            let sandbox = SandboxId::new(state.sandbox_id);
            let pty = gt_mux::PtyId::new(state.pty_id);
            self.sandbox.send_input(&sandbox, &pty, text).await?;
            return Ok(());
        }
        Err(SessionError::NotRunning(id.clone()))
    }

    /// Transfer terminal control to the caller. Local only.
    pub async fn attach(&self, id: &SessionId) -> Result<(), SessionError> {
        if self.find_remote(id).is_some() {
            return Err(SessionError::RemoteUnsupported { op: "attach" });
        }
        Ok(self.mux.attach_session(id).await?)
    }

    /// Remote state directories in scope: town-level plus one per routed rig.
    fn remote_dirs(&self) -> Vec<RemoteStateDir> {
        let mut dirs = vec![RemoteStateDir::new(
            self.town.root().join(".runtime").join("daytona-sessions"),
        )];
        for route in self.town.load_routes().routes() {
            dirs.push(RemoteStateDir::new(
                self.town.rig(route.rig_name()).remote_sessions_dir(),
            ));
        }
        dirs
    }

    /// Locate the persisted record for a remote session id.
    fn find_remote(&self, id: &SessionId) -> Option<(RemoteStateDir, String, RemoteSessionState)> {
        for dir in self.remote_dirs() {
            for agent in dir.list() {
                if let Some(state) = dir.load(&agent) {
                    if state.session_id == *id {
                        return Some((dir, agent, state));
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
