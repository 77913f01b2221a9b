// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Issue model consumed from the shared issue store.
//!
//! Statuses, types, and dependency kinds arrive as free-form strings from the
//! store; the enums here parse the values the core acts on and carry anything
//! else through unmodified so round-trips never lose data.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Issue status as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IssueStatus {
    Open,
    InProgress,
    Closed,
    /// Any `staged_*` status: a tracker not yet launched. The full raw
    /// value is preserved.
    Staged(String),
    Other(String),
}

impl IssueStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "open" => Self::Open,
            "in_progress" => Self::InProgress,
            "closed" => Self::Closed,
            _ if s.starts_with("staged_") => Self::Staged(s.to_string()),
            _ => Self::Other(s.to_string()),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    pub fn is_staged(&self) -> bool {
        matches!(self, Self::Staged(_))
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("open"),
            Self::InProgress => f.write_str("in_progress"),
            Self::Closed => f.write_str("closed"),
            Self::Staged(raw) | Self::Other(raw) => f.write_str(raw),
        }
    }
}

impl From<String> for IssueStatus {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<IssueStatus> for String {
    fn from(s: IssueStatus) -> Self {
        s.to_string()
    }
}

/// Issue type as reported by the store.
///
/// Only leaf work items are slingable; containers (epics, convoys) and
/// signalling items (decisions, messages, events) stay with their owners.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IssueType {
    Task,
    Bug,
    Feature,
    Chore,
    Epic,
    SubEpic,
    Convoy,
    Decision,
    Message,
    Event,
    Agent,
    /// Missing type on legacy issues; treated as a plain task.
    #[default]
    Unspecified,
    Other(String),
}

impl IssueType {
    pub fn parse(s: &str) -> Self {
        match s {
            "task" => Self::Task,
            "bug" => Self::Bug,
            "feature" => Self::Feature,
            "chore" => Self::Chore,
            "epic" => Self::Epic,
            "sub-epic" => Self::SubEpic,
            "convoy" => Self::Convoy,
            "decision" => Self::Decision,
            "message" => Self::Message,
            "event" => Self::Event,
            "agent" => Self::Agent,
            "" => Self::Unspecified,
            _ => Self::Other(s.to_string()),
        }
    }

    /// True for types that can be dispatched to a worker.
    pub fn is_slingable(&self) -> bool {
        matches!(
            self,
            Self::Task | Self::Bug | Self::Feature | Self::Chore | Self::Unspecified
        )
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Task => f.write_str("task"),
            Self::Bug => f.write_str("bug"),
            Self::Feature => f.write_str("feature"),
            Self::Chore => f.write_str("chore"),
            Self::Epic => f.write_str("epic"),
            Self::SubEpic => f.write_str("sub-epic"),
            Self::Convoy => f.write_str("convoy"),
            Self::Decision => f.write_str("decision"),
            Self::Message => f.write_str("message"),
            Self::Event => f.write_str("event"),
            Self::Agent => f.write_str("agent"),
            Self::Unspecified => f.write_str(""),
            Self::Other(raw) => f.write_str(raw),
        }
    }
}

impl From<String> for IssueType {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<IssueType> for String {
    fn from(t: IssueType) -> Self {
        t.to_string()
    }
}

/// Dependency relationship kinds the core acts on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DepKind {
    Tracks,
    Blocks,
    ConditionalBlocks,
    WaitsFor,
    ParentChild,
    Other(String),
}

impl DepKind {
    pub fn parse(s: &str) -> Self {
        match s {
            "tracks" => Self::Tracks,
            "blocks" => Self::Blocks,
            "conditional-blocks" => Self::ConditionalBlocks,
            "waits-for" => Self::WaitsFor,
            "parent-child" => Self::ParentChild,
            _ => Self::Other(s.to_string()),
        }
    }

    /// True for kinds whose unclosed targets gate dispatch.
    ///
    /// `parent-child` is structural and never blocks.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::Blocks | Self::ConditionalBlocks | Self::WaitsFor)
    }
}

impl fmt::Display for DepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tracks => f.write_str("tracks"),
            Self::Blocks => f.write_str("blocks"),
            Self::ConditionalBlocks => f.write_str("conditional-blocks"),
            Self::WaitsFor => f.write_str("waits-for"),
            Self::ParentChild => f.write_str("parent-child"),
            Self::Other(raw) => f.write_str(raw),
        }
    }
}

impl From<String> for DepKind {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<DepKind> for String {
    fn from(k: DepKind) -> Self {
        k.to_string()
    }
}

/// A work item in the shared store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub status: IssueStatus,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub issue_type: IssueType,
    #[serde(default)]
    pub updated_at_ms: u64,
}

impl Issue {
    pub fn new(id: impl Into<String>, status: IssueStatus) -> Self {
        Self {
            id: id.into(),
            status,
            assignee: None,
            priority: 2,
            issue_type: IssueType::default(),
            updated_at_ms: 0,
        }
    }

    crate::setters! {
        into {
            priority: i64,
        }
        set {
            issue_type: IssueType,
        }
        option {
            assignee: String,
        }
    }
}

/// A dependency edge plus a snapshot of the target's metadata.
///
/// The snapshot can be stale across rigs; consumers refresh from the store
/// before acting on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dep {
    pub issue_id: String,
    pub kind: DepKind,
    pub status: IssueStatus,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub issue_type: IssueType,
}

#[cfg(test)]
#[path = "issue_tests.rs"]
mod tests;
