// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted remote-session records.
//!
//! Remote sandboxes outlive the orchestrator process, so `is_running`,
//! `status`, and `inject` reload these records on demand. This is the only
//! on-disk state the core owns about a running session. Writes are atomic
//! (`.tmp` + rename) so a crash never leaves a half-written record.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use gt_core::SessionId;

use crate::error::MuxError;

/// One remote session, keyed on disk by agent name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSessionState {
    pub session_id: SessionId,
    pub sandbox_id: String,
    pub pty_id: String,
    /// Backend tag (`daytona`).
    pub backend: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub metadata: IndexMap<String, String>,
    #[serde(default)]
    pub created_at_ms: u64,
}

/// Directory of remote-session records (`.runtime/daytona-sessions/`).
#[derive(Debug, Clone)]
pub struct RemoteStateDir {
    dir: PathBuf,
}

impl RemoteStateDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn record_path(&self, agent_name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", agent_name))
    }

    /// Persist a record atomically.
    pub fn save(&self, agent_name: &str, state: &RemoteSessionState) -> Result<(), MuxError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.record_path(agent_name);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| MuxError::command("remote state encode", e.to_string()))?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Load a record; `None` when absent or unreadable.
    pub fn load(&self, agent_name: &str) -> Option<RemoteSessionState> {
        let raw = std::fs::read_to_string(self.record_path(agent_name)).ok()?;
        match serde_json::from_str(&raw) {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::warn!(agent = agent_name, error = %e, "corrupt remote session record");
                None
            }
        }
    }

    pub fn remove(&self, agent_name: &str) {
        let _ = std::fs::remove_file(self.record_path(agent_name));
    }

    /// Agent names with persisted records.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.dir)
            .into_iter()
            .flatten()
            .flatten()
            .filter_map(|e| {
                let name = e.file_name().into_string().ok()?;
                name.strip_suffix(".json").map(str::to_string)
            })
            .collect();
        names.sort();
        names
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
#[path = "remote_state_tests.rs"]
mod tests;
