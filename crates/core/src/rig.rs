// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rig path algebra.
//!
//! A rig is a project-scoped workspace under the town root: a shared bare
//! repository (or a legacy tracked checkout), a shared issue database, and
//! the polecat work directories carved out of it.

use std::path::{Path, PathBuf};

/// A rig identified by `(town root, name)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rig {
    town_root: PathBuf,
    name: String,
}

impl Rig {
    pub fn new(town_root: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self { town_root: town_root.into(), name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn town_root(&self) -> &Path {
        &self.town_root
    }

    /// `{town}/{rig}`
    pub fn path(&self) -> PathBuf {
        self.town_root.join(&self.name)
    }

    /// Shared bare repository at `{rig}/.repo.git`, if present.
    pub fn bare_repo(&self) -> Option<PathBuf> {
        let path = self.path().join(".repo.git");
        path.is_dir().then_some(path)
    }

    /// Legacy tracked checkout at `{rig}/mayor/rig`.
    pub fn legacy_repo(&self) -> PathBuf {
        self.path().join("mayor").join("rig")
    }

    /// Shared issue database directory at `{rig}/.beads`.
    pub fn beads_dir(&self) -> PathBuf {
        self.path().join(".beads")
    }

    /// True when `{rig}/.beads` exists and contains at least one entry.
    pub fn has_shared_beads(&self) -> bool {
        std::fs::read_dir(self.beads_dir())
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false)
    }

    /// `{rig}/.runtime`
    pub fn runtime_dir(&self) -> PathBuf {
        self.path().join(".runtime")
    }

    /// `{rig}/.runtime/namepool-state.json`
    pub fn namepool_state_path(&self) -> PathBuf {
        self.runtime_dir().join("namepool-state.json")
    }

    /// `{rig}/.runtime/daytona-sessions/`, the persisted remote-session records.
    pub fn remote_sessions_dir(&self) -> PathBuf {
        self.runtime_dir().join("daytona-sessions")
    }

    /// `{rig}/polecats`
    pub fn polecats_dir(&self) -> PathBuf {
        self.path().join("polecats")
    }

    /// `{rig}/polecats/{name}`, a worker's work directory.
    pub fn polecat_dir(&self, name: &str) -> PathBuf {
        self.polecats_dir().join(name)
    }

    /// Names of workers present on disk (directories under `polecats/`).
    ///
    /// This is the authoritative in-use set: a worker exists iff its work
    /// directory exists.
    pub fn list_polecat_names(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.polecats_dir())
            .into_iter()
            .flatten()
            .flatten()
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
#[path = "rig_tests.rs"]
mod tests;
