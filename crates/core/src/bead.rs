// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! First-class agent record kept in the issue store.
//!
//! An agent bead is created when an agent is spawned, updated by the agent
//! itself as it works, and deleted on teardown. The `cleanup_status` field is
//! the worker's own assessment of whether its worktree is safe to destroy;
//! when reported it takes precedence over git inspection.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Agent record as stored alongside ordinary issues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentBead {
    /// Canonical agent address (the actor string).
    pub address: String,
    /// Role tag (`polecat`, `witness`, …).
    pub role: String,
    #[serde(default)]
    pub rig: Option<String>,
    pub state: BeadState,
    /// Issue the agent was spawned to work on, when assigned at spawn time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook_bead: Option<String>,
    /// Self-reported worktree safety; absent until the agent reports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleanup_status: Option<CleanupStatus>,
    #[serde(default)]
    pub created_at_ms: u64,
    #[serde(default)]
    pub updated_at_ms: u64,
}

/// Lifecycle state declared on an agent bead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeadState {
    Spawning,
    Running,
    Done,
    Stuck,
    Gone,
}

crate::simple_display! {
    BeadState {
        Spawning => "spawning",
        Running => "running",
        Done => "done",
        Stuck => "stuck",
        Gone => "gone",
    }
}

/// Self-reported worktree cleanliness.
///
/// Unknown tags block removal; a worker that reports something the core does
/// not understand is treated as having unsaved work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CleanupStatus {
    Clean,
    HasUncommitted,
    HasStash,
    HasUnpushed,
    Unknown,
    Other(String),
}

impl CleanupStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "clean" => Self::Clean,
            "has_uncommitted" => Self::HasUncommitted,
            "has_stash" => Self::HasStash,
            "has_unpushed" => Self::HasUnpushed,
            "" | "unknown" => Self::Unknown,
            _ => Self::Other(s.to_string()),
        }
    }

    /// True when the agent has actually reported something usable.
    pub fn is_reported(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for CleanupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clean => f.write_str("clean"),
            Self::HasUncommitted => f.write_str("has_uncommitted"),
            Self::HasStash => f.write_str("has_stash"),
            Self::HasUnpushed => f.write_str("has_unpushed"),
            Self::Unknown => f.write_str("unknown"),
            Self::Other(raw) => f.write_str(raw),
        }
    }
}

impl From<String> for CleanupStatus {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<CleanupStatus> for String {
    fn from(s: CleanupStatus) -> Self {
        s.to_string()
    }
}

#[cfg(test)]
#[path = "bead_tests.rs"]
mod tests;
