// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The terminal-multiplexer capability surface.
//!
//! The session lifecycle engine consumes this trait; [`crate::TmuxDriver`]
//! is the production implementation and `FakeMuxDriver` the scriptable one.
//! Remote sandboxes implement the sibling [`crate::SandboxBackend`] shape.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

use gt_core::SessionId;

use crate::error::MuxError;

/// Base pause before submitting injected text.
const DEBOUNCE_BASE: Duration = Duration::from_millis(200);
/// Additional pause per KiB of injected text.
const DEBOUNCE_PER_KIB: Duration = Duration::from_millis(100);
/// Upper bound on the injection pause.
const DEBOUNCE_CAP: Duration = Duration::from_millis(1500);

/// Pause between writing injected text and submitting it: `200ms + 100ms/KiB`,
/// capped at 1500ms. Larger pastes need longer for the hosted TUI to settle.
pub fn debounce_delay(text_len: usize) -> Duration {
    let kib = (text_len / 1024) as u32;
    (DEBOUNCE_BASE + DEBOUNCE_PER_KIB * kib).min(DEBOUNCE_CAP)
}

/// Capability interface over a terminal multiplexer.
#[async_trait]
pub trait MuxDriver: Send + Sync + 'static {
    /// True iff a session with this id exists.
    async fn has_session(&self, id: &SessionId) -> Result<bool, MuxError>;

    /// Atomically create a session bound to `command`.
    ///
    /// Create-and-start in one call: a create-then-send-keys sequence loses
    /// keystrokes when the shell has not finished initializing.
    async fn new_session_with_command(
        &self,
        id: &SessionId,
        cwd: &Path,
        command: &str,
    ) -> Result<(), MuxError>;

    /// Kill all descendant processes (SIGTERM, pause, SIGKILL), then remove
    /// the session. The only teardown entry point; nothing orphans hosted
    /// processes by removing a session first.
    async fn kill_session_with_processes(&self, id: &SessionId) -> Result<(), MuxError>;

    /// Write keystroke tokens verbatim (`C-c`, `Enter`, literal words).
    async fn send_keys_raw(&self, id: &SessionId, keys: &str) -> Result<(), MuxError>;

    /// Write literal text, pause `delay`, then submit.
    async fn send_keys_debounced(
        &self,
        id: &SessionId,
        text: &str,
        delay: Duration,
    ) -> Result<(), MuxError>;

    /// Last `lines` lines of the visible pane.
    async fn capture_pane(&self, id: &SessionId, lines: u32) -> Result<String, MuxError>;

    /// Best-effort; affects panes created after the call.
    async fn set_environment(
        &self,
        id: &SessionId,
        key: &str,
        value: &str,
    ) -> Result<(), MuxError>;

    /// Best-effort session theming (status-bar colors keyed by theme name).
    async fn apply_theme(&self, id: &SessionId, theme: &str) -> Result<(), MuxError>;

    /// Poll until the pane's foreground command is one of `shells` (the agent
    /// prompt has returned), or the timeout elapses. Returns whether the
    /// prompt was observed.
    async fn wait_for_command(
        &self,
        id: &SessionId,
        shells: &[&str],
        timeout: Duration,
    ) -> Result<bool, MuxError>;

    /// Transfer terminal control to the caller. Local backend only.
    async fn attach_session(&self, id: &SessionId) -> Result<(), MuxError>;

    /// True iff one of `process_names` is among the session's descendants.
    async fn is_agent_running(
        &self,
        id: &SessionId,
        process_names: &[&str],
    ) -> Result<bool, MuxError>;

    /// Session ids starting with `prefix`.
    async fn list_sessions(&self, prefix: &str) -> Result<Vec<SessionId>, MuxError>;
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
