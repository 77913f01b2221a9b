// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake issue store for deterministic testing.
//!
//! Allows programmatic control over issues, dependency edges, and agent
//! beads, and records every mutation for assertions.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use gt_core::{AgentBead, Dep, DepKind, Issue, IssueType};

use crate::error::StoreError;
use crate::store::{IssueStore, IssueUpdate};

/// Recorded mutation against the fake store.
#[derive(Debug, Clone)]
pub enum StoreCall {
    UpdateIssue { id: String, update: IssueUpdate, actor: String },
    CreateAgentBead { address: String, actor: String },
    DeleteAgentBead { address: String, actor: String },
}

/// In-memory issue store for tests.
#[derive(Clone, Default)]
pub struct FakeStore {
    inner: Arc<Mutex<FakeStoreState>>,
}

#[derive(Default)]
struct FakeStoreState {
    issues: HashMap<String, Issue>,
    /// Edges `(from, kind, to)`: `from --kind--> to`.
    edges: Vec<(String, DepKind, String)>,
    beads: HashMap<String, AgentBead>,
    calls: Vec<StoreCall>,
    /// When set, dependency queries fail with this backend message.
    dep_error: Option<String>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_issue(&self, issue: Issue) {
        self.inner.lock().issues.insert(issue.id.clone(), issue);
    }

    /// Record `from --kind--> to`.
    pub fn add_edge(&self, from: &str, kind: DepKind, to: &str) {
        self.inner.lock().edges.push((from.to_string(), kind, to.to_string()));
    }

    pub fn put_bead(&self, bead: AgentBead) {
        self.inner.lock().beads.insert(bead.address.clone(), bead);
    }

    /// Make all dependency queries fail until cleared.
    pub fn fail_dep_queries(&self, message: &str) {
        self.inner.lock().dep_error = Some(message.to_string());
    }

    pub fn issue(&self, id: &str) -> Option<Issue> {
        self.inner.lock().issues.get(id).cloned()
    }

    pub fn bead(&self, address: &str) -> Option<AgentBead> {
        self.inner.lock().beads.get(address).cloned()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.inner.lock().calls.clone()
    }

    fn dep_snapshot(state: &FakeStoreState, target: &str) -> Dep {
        match state.issues.get(target) {
            Some(issue) => Dep {
                issue_id: issue.id.clone(),
                kind: DepKind::Other(String::new()),
                status: issue.status.clone(),
                assignee: issue.assignee.clone(),
                issue_type: issue.issue_type.clone(),
            },
            None => Dep {
                issue_id: target.to_string(),
                kind: DepKind::Other(String::new()),
                status: gt_core::IssueStatus::Other("unknown".to_string()),
                assignee: None,
                issue_type: IssueType::Unspecified,
            },
        }
    }
}

#[async_trait]
impl IssueStore for FakeStore {
    async fn get_issue(
        &self,
        id: &str,
        _cancel: &CancellationToken,
    ) -> Result<Issue, StoreError> {
        self.inner
            .lock()
            .issues
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn get_issues_by_ids(
        &self,
        ids: &[String],
        _cancel: &CancellationToken,
    ) -> Result<Vec<Issue>, StoreError> {
        let inner = self.inner.lock();
        Ok(ids.iter().filter_map(|id| inner.issues.get(id).cloned()).collect())
    }

    async fn update_issue(
        &self,
        id: &str,
        update: IssueUpdate,
        actor: &str,
        _cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.calls.push(StoreCall::UpdateIssue {
            id: id.to_string(),
            update: update.clone(),
            actor: actor.to_string(),
        });
        let issue = inner
            .issues
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if let Some(status) = update.status {
            issue.status = status;
        }
        if update.clear_assignee {
            issue.assignee = None;
        } else if let Some(assignee) = update.assignee {
            issue.assignee = Some(assignee);
        }
        Ok(())
    }

    async fn get_dependencies_with_metadata(
        &self,
        id: &str,
        _cancel: &CancellationToken,
    ) -> Result<Vec<Dep>, StoreError> {
        let inner = self.inner.lock();
        if let Some(message) = &inner.dep_error {
            return Err(StoreError::Backend(message.clone()));
        }
        Ok(inner
            .edges
            .iter()
            .filter(|(from, _, _)| from == id)
            .map(|(_, kind, to)| {
                let mut dep = Self::dep_snapshot(&inner, to);
                dep.kind = kind.clone();
                dep
            })
            .collect())
    }

    async fn get_dependents_with_metadata(
        &self,
        id: &str,
        _cancel: &CancellationToken,
    ) -> Result<Vec<Dep>, StoreError> {
        let inner = self.inner.lock();
        if let Some(message) = &inner.dep_error {
            return Err(StoreError::Backend(message.clone()));
        }
        Ok(inner
            .edges
            .iter()
            .filter(|(_, _, to)| to == id)
            .map(|(from, kind, _)| {
                let mut dep = Self::dep_snapshot(&inner, from);
                dep.kind = kind.clone();
                dep
            })
            .collect())
    }

    async fn get_assigned_issue(
        &self,
        assignee: &str,
        _cancel: &CancellationToken,
    ) -> Result<Option<Issue>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .issues
            .values()
            .find(|i| i.assignee.as_deref() == Some(assignee) && !i.status.is_closed())
            .cloned())
    }

    async fn list_open_issues_by_type(
        &self,
        issue_type: IssueType,
        _cancel: &CancellationToken,
    ) -> Result<Vec<Issue>, StoreError> {
        let inner = self.inner.lock();
        let mut issues: Vec<Issue> = inner
            .issues
            .values()
            .filter(|i| i.issue_type == issue_type && i.status.is_open())
            .cloned()
            .collect();
        issues.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(issues)
    }

    async fn create_agent_bead(
        &self,
        bead: &AgentBead,
        actor: &str,
        _cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.calls.push(StoreCall::CreateAgentBead {
            address: bead.address.clone(),
            actor: actor.to_string(),
        });
        inner.beads.insert(bead.address.clone(), bead.clone());
        Ok(())
    }

    async fn get_agent_bead(
        &self,
        address: &str,
        _cancel: &CancellationToken,
    ) -> Result<Option<AgentBead>, StoreError> {
        Ok(self.inner.lock().beads.get(address).cloned())
    }

    async fn delete_agent_bead(
        &self,
        address: &str,
        actor: &str,
        _cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.calls.push(StoreCall::DeleteAgentBead {
            address: address.to_string(),
            actor: actor.to_string(),
        });
        inner.beads.remove(address);
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
