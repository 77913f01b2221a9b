// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote sandbox capability surface.
//!
//! The same shape as [`crate::MuxDriver`] but for sandboxes that outlive the
//! orchestrator process: identity is a provider-issued sandbox id plus a PTY
//! id, and work-directory content moves by explicit sync rather than a shared
//! filesystem.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::MuxError;

/// Provider-issued sandbox identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SandboxId(pub String);

impl SandboxId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SandboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an interactive PTY running inside a sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PtyId(pub String);

impl PtyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PtyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Capability interface over a remote sandbox provider.
#[async_trait]
pub trait SandboxBackend: Send + Sync + 'static {
    /// Create a sandbox with the given environment.
    async fn create(
        &self,
        name: &str,
        env: &[(String, String)],
    ) -> Result<SandboxId, MuxError>;

    /// Start an interactive command in a fresh PTY.
    async fn start_command(
        &self,
        sandbox: &SandboxId,
        cwd: &str,
        command: &str,
    ) -> Result<PtyId, MuxError>;

    /// Write input to a running PTY.
    async fn send_input(
        &self,
        sandbox: &SandboxId,
        pty: &PtyId,
        text: &str,
    ) -> Result<(), MuxError>;

    /// Destroy the sandbox and everything in it.
    async fn destroy(&self, sandbox: &SandboxId) -> Result<(), MuxError>;

    /// Copy a local directory into the sandbox.
    async fn sync_up(
        &self,
        local: &Path,
        sandbox: &SandboxId,
        remote_path: &str,
    ) -> Result<(), MuxError>;

    /// Copy a sandbox directory back to the local filesystem.
    async fn sync_down(
        &self,
        sandbox: &SandboxId,
        remote_path: &str,
        local: &Path,
    ) -> Result<(), MuxError>;

    /// Whether the sandbox exists and is started.
    async fn is_running(&self, sandbox: &SandboxId) -> Result<bool, MuxError>;
}
