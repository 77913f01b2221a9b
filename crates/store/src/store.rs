// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The issue-store capability surface.
//!
//! All operations take a cancellation token; implementations must honor it
//! between I/O steps and bind any subprocess they spawn to it. The store is
//! assumed to serialize single-issue updates itself; callers never get
//! multi-issue transactions.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use gt_core::{AgentBead, Dep, Issue, IssueStatus, IssueType};

use crate::error::StoreError;

/// Partial update applied to a single issue.
///
/// `assign` sets both the assignee and the status in one store call, which
/// is how workers are attached to issues without a window where the issue
/// is assigned but still `open`.
#[derive(Debug, Clone, Default)]
pub struct IssueUpdate {
    pub status: Option<IssueStatus>,
    pub assignee: Option<String>,
    pub clear_assignee: bool,
}

impl IssueUpdate {
    pub fn status(status: IssueStatus) -> Self {
        Self { status: Some(status), ..Self::default() }
    }

    /// Assignee + `in_progress` in a single update.
    pub fn assign(assignee: impl Into<String>) -> Self {
        Self {
            status: Some(IssueStatus::InProgress),
            assignee: Some(assignee.into()),
            clear_assignee: false,
        }
    }

    pub fn unassign() -> Self {
        Self { clear_assignee: true, ..Self::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.assignee.is_none() && !self.clear_assignee
    }
}

/// Capability interface over the shared issue store.
#[async_trait]
pub trait IssueStore: Send + Sync + 'static {
    async fn get_issue(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Issue, StoreError>;

    async fn get_issues_by_ids(
        &self,
        ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<Issue>, StoreError>;

    async fn update_issue(
        &self,
        id: &str,
        update: IssueUpdate,
        actor: &str,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError>;

    /// Forward dependency edges of `id`, with target metadata.
    async fn get_dependencies_with_metadata(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Dep>, StoreError>;

    /// Reverse dependency edges: issues that depend on `id`.
    async fn get_dependents_with_metadata(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Dep>, StoreError>;

    /// The issue currently assigned to the given agent address, if any.
    async fn get_assigned_issue(
        &self,
        assignee: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Issue>, StoreError>;

    /// Open issues of a given type; used by the decision poller.
    async fn list_open_issues_by_type(
        &self,
        issue_type: IssueType,
        cancel: &CancellationToken,
    ) -> Result<Vec<Issue>, StoreError>;

    async fn create_agent_bead(
        &self,
        bead: &AgentBead,
        actor: &str,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError>;

    async fn get_agent_bead(
        &self,
        address: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<AgentBead>, StoreError>;

    async fn delete_agent_bead(
        &self,
        address: &str,
        actor: &str,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError>;
}
