// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake multiplexer driver and sandbox backend for deterministic testing.
//!
//! Both record every call and allow programmatic control over session and
//! sandbox state (alive flags, captured output, scripted failures).

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use gt_core::SessionId;

use crate::driver::MuxDriver;
use crate::error::MuxError;
use crate::sandbox::{PtyId, SandboxBackend, SandboxId};

/// Recorded call to [`FakeMuxDriver`].
#[derive(Debug, Clone)]
pub enum MuxCall {
    NewSession { id: SessionId, command: String },
    Kill { id: SessionId },
    SendRaw { id: SessionId, keys: String },
    SendDebounced { id: SessionId, text: String, delay: Duration },
    SetEnvironment { id: SessionId, key: String, value: String },
    ApplyTheme { id: SessionId, theme: String },
    Attach { id: SessionId },
}

#[derive(Debug, Clone)]
struct FakeSession {
    command: String,
    agent_alive: bool,
    captured: String,
    env: Vec<(String, String)>,
}

#[derive(Default)]
struct FakeMuxState {
    sessions: HashMap<String, FakeSession>,
    calls: Vec<MuxCall>,
    wait_result: bool,
    create_error: Option<String>,
}

/// Scriptable in-memory multiplexer.
#[derive(Clone)]
pub struct FakeMuxDriver {
    inner: Arc<Mutex<FakeMuxState>>,
}

impl Default for FakeMuxDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeMuxDriver {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeMuxState {
                wait_result: true,
                ..FakeMuxState::default()
            })),
        }
    }

    /// Seed a pre-existing session, optionally with a dead hosted agent.
    pub fn seed_session(&self, id: &SessionId, agent_alive: bool) {
        self.inner.lock().sessions.insert(
            id.to_string(),
            FakeSession {
                command: String::new(),
                agent_alive,
                captured: String::new(),
                env: Vec::new(),
            },
        );
    }

    /// Mark the hosted agent of an existing session dead (zombie).
    pub fn kill_agent_process(&self, id: &SessionId) {
        if let Some(session) = self.inner.lock().sessions.get_mut(id.as_str()) {
            session.agent_alive = false;
        }
    }

    pub fn set_captured(&self, id: &SessionId, text: &str) {
        if let Some(session) = self.inner.lock().sessions.get_mut(id.as_str()) {
            session.captured = text.to_string();
        }
    }

    /// Script the readiness-wait outcome (default: prompt observed).
    pub fn set_wait_result(&self, ready: bool) {
        self.inner.lock().wait_result = ready;
    }

    /// Make the next create fail with the given detail.
    pub fn fail_next_create(&self, detail: &str) {
        self.inner.lock().create_error = Some(detail.to_string());
    }

    pub fn calls(&self) -> Vec<MuxCall> {
        self.inner.lock().calls.clone()
    }

    /// The command a session was created with.
    pub fn session_command(&self, id: &SessionId) -> Option<String> {
        self.inner.lock().sessions.get(id.as_str()).map(|s| s.command.clone())
    }

    /// Environment set on the session handle, in call order.
    pub fn session_env(&self, id: &SessionId) -> Vec<(String, String)> {
        self.inner
            .lock()
            .sessions
            .get(id.as_str())
            .map(|s| s.env.clone())
            .unwrap_or_default()
    }

    /// Text injections sent to the session, in order.
    pub fn injected(&self, id: &SessionId) -> Vec<String> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                MuxCall::SendDebounced { id: call_id, text, .. } if call_id == id => {
                    Some(text.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Raw keystroke sends to the session, in order.
    pub fn raw_keys(&self, id: &SessionId) -> Vec<String> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                MuxCall::SendRaw { id: call_id, keys } if call_id == id => Some(keys.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn kill_count(&self, id: &SessionId) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, MuxCall::Kill { id: call_id } if call_id == id))
            .count()
    }
}

#[async_trait]
impl MuxDriver for FakeMuxDriver {
    async fn has_session(&self, id: &SessionId) -> Result<bool, MuxError> {
        Ok(self.inner.lock().sessions.contains_key(id.as_str()))
    }

    async fn new_session_with_command(
        &self,
        id: &SessionId,
        _cwd: &Path,
        command: &str,
    ) -> Result<(), MuxError> {
        let mut inner = self.inner.lock();
        if let Some(detail) = inner.create_error.take() {
            return Err(MuxError::command("fake new-session", detail));
        }
        if inner.sessions.contains_key(id.as_str()) {
            return Err(MuxError::SessionExists(id.to_string()));
        }
        inner.calls.push(MuxCall::NewSession { id: id.clone(), command: command.to_string() });
        inner.sessions.insert(
            id.to_string(),
            FakeSession {
                command: command.to_string(),
                agent_alive: true,
                captured: String::new(),
                env: Vec::new(),
            },
        );
        Ok(())
    }

    async fn kill_session_with_processes(&self, id: &SessionId) -> Result<(), MuxError> {
        let mut inner = self.inner.lock();
        inner.calls.push(MuxCall::Kill { id: id.clone() });
        inner.sessions.remove(id.as_str());
        Ok(())
    }

    async fn send_keys_raw(&self, id: &SessionId, keys: &str) -> Result<(), MuxError> {
        let mut inner = self.inner.lock();
        if !inner.sessions.contains_key(id.as_str()) {
            return Err(MuxError::SessionNotFound(id.to_string()));
        }
        inner.calls.push(MuxCall::SendRaw { id: id.clone(), keys: keys.to_string() });
        Ok(())
    }

    async fn send_keys_debounced(
        &self,
        id: &SessionId,
        text: &str,
        delay: Duration,
    ) -> Result<(), MuxError> {
        let mut inner = self.inner.lock();
        if !inner.sessions.contains_key(id.as_str()) {
            return Err(MuxError::SessionNotFound(id.to_string()));
        }
        inner.calls.push(MuxCall::SendDebounced {
            id: id.clone(),
            text: text.to_string(),
            delay,
        });
        Ok(())
    }

    async fn capture_pane(&self, id: &SessionId, _lines: u32) -> Result<String, MuxError> {
        self.inner
            .lock()
            .sessions
            .get(id.as_str())
            .map(|s| s.captured.clone())
            .ok_or_else(|| MuxError::SessionNotFound(id.to_string()))
    }

    async fn set_environment(
        &self,
        id: &SessionId,
        key: &str,
        value: &str,
    ) -> Result<(), MuxError> {
        let mut inner = self.inner.lock();
        inner.calls.push(MuxCall::SetEnvironment {
            id: id.clone(),
            key: key.to_string(),
            value: value.to_string(),
        });
        match inner.sessions.get_mut(id.as_str()) {
            Some(session) => {
                session.env.push((key.to_string(), value.to_string()));
                Ok(())
            }
            None => Err(MuxError::SessionNotFound(id.to_string())),
        }
    }

    async fn apply_theme(&self, id: &SessionId, theme: &str) -> Result<(), MuxError> {
        let mut inner = self.inner.lock();
        inner.calls.push(MuxCall::ApplyTheme { id: id.clone(), theme: theme.to_string() });
        Ok(())
    }

    async fn wait_for_command(
        &self,
        _id: &SessionId,
        _shells: &[&str],
        _timeout: Duration,
    ) -> Result<bool, MuxError> {
        Ok(self.inner.lock().wait_result)
    }

    async fn attach_session(&self, id: &SessionId) -> Result<(), MuxError> {
        let mut inner = self.inner.lock();
        if !inner.sessions.contains_key(id.as_str()) {
            return Err(MuxError::SessionNotFound(id.to_string()));
        }
        inner.calls.push(MuxCall::Attach { id: id.clone() });
        Ok(())
    }

    async fn is_agent_running(
        &self,
        id: &SessionId,
        _process_names: &[&str],
    ) -> Result<bool, MuxError> {
        Ok(self
            .inner
            .lock()
            .sessions
            .get(id.as_str())
            .map(|s| s.agent_alive)
            .unwrap_or(false))
    }

    async fn list_sessions(&self, prefix: &str) -> Result<Vec<SessionId>, MuxError> {
        let mut ids: Vec<SessionId> = self
            .inner
            .lock()
            .sessions
            .keys()
            .filter(|name| name.starts_with(prefix))
            .map(|name| SessionId::new(name.clone()))
            .collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(ids)
    }
}

/// Recorded call to [`FakeSandbox`].
#[derive(Debug, Clone)]
pub enum SandboxCall {
    Create { name: String },
    StartCommand { sandbox: SandboxId, command: String },
    SendInput { sandbox: SandboxId, text: String },
    Destroy { sandbox: SandboxId },
    SyncUp { sandbox: SandboxId, remote_path: String },
    SyncDown { sandbox: SandboxId, remote_path: String },
}

#[derive(Default)]
struct FakeSandboxState {
    running: HashMap<String, bool>,
    calls: Vec<SandboxCall>,
    next_id: u64,
}

/// Scriptable in-memory sandbox provider.
#[derive(Clone, Default)]
pub struct FakeSandbox {
    inner: Arc<Mutex<FakeSandboxState>>,
}

impl FakeSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<SandboxCall> {
        self.inner.lock().calls.clone()
    }
}

#[async_trait]
impl SandboxBackend for FakeSandbox {
    async fn create(
        &self,
        name: &str,
        _env: &[(String, String)],
    ) -> Result<SandboxId, MuxError> {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = SandboxId::new(format!("sb-{}", inner.next_id));
        inner.running.insert(id.to_string(), true);
        inner.calls.push(SandboxCall::Create { name: name.to_string() });
        Ok(id)
    }

    async fn start_command(
        &self,
        sandbox: &SandboxId,
        _cwd: &str,
        command: &str,
    ) -> Result<PtyId, MuxError> {
        self.inner.lock().calls.push(SandboxCall::StartCommand {
            sandbox: sandbox.clone(),
            command: command.to_string(),
        });
        Ok(PtyId::new("pty-0"))
    }

    async fn send_input(
        &self,
        sandbox: &SandboxId,
        _pty: &PtyId,
        text: &str,
    ) -> Result<(), MuxError> {
        self.inner.lock().calls.push(SandboxCall::SendInput {
            sandbox: sandbox.clone(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn destroy(&self, sandbox: &SandboxId) -> Result<(), MuxError> {
        let mut inner = self.inner.lock();
        inner.running.remove(sandbox.as_str());
        inner.calls.push(SandboxCall::Destroy { sandbox: sandbox.clone() });
        Ok(())
    }

    async fn sync_up(
        &self,
        _local: &Path,
        sandbox: &SandboxId,
        remote_path: &str,
    ) -> Result<(), MuxError> {
        self.inner.lock().calls.push(SandboxCall::SyncUp {
            sandbox: sandbox.clone(),
            remote_path: remote_path.to_string(),
        });
        Ok(())
    }

    async fn sync_down(
        &self,
        sandbox: &SandboxId,
        remote_path: &str,
        _local: &Path,
    ) -> Result<(), MuxError> {
        self.inner.lock().calls.push(SandboxCall::SyncDown {
            sandbox: sandbox.clone(),
            remote_path: remote_path.to_string(),
        });
        Ok(())
    }

    async fn is_running(&self, sandbox: &SandboxId) -> Result<bool, MuxError> {
        Ok(*self.inner.lock().running.get(sandbox.as_str()).unwrap_or(&false))
    }
}
