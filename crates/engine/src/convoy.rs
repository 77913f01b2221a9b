// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Convoy operator: event-driven work dispatch.
//!
//! When a work item closes, every tracker that `tracks` it gets a
//! completion check, and, if the tracker stays open, the next ready
//! tracked item is fed to a worker in its rig. One item per feed call; the
//! next closure triggers the next feed. Decisions consult only edges
//! incident to the relevant item, never the transitive graph, so dependency
//! cycles are harmless here.
//!
//! Availability beats correctness for the blocking check: a failed
//! dependency query treats the item as unblocked. A duplicate dispatch is
//! cheaper than a stalled convoy.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use gt_core::{normalize_id, DepKind, IssueStatus, Town};
use gt_mux::subprocess::run_cancellable;
use gt_mux::MuxError;
use gt_store::IssueStore;

#[derive(Debug, Error)]
pub enum ConvoyError {
    #[error("operation canceled")]
    Canceled,
}

type Logger = Arc<dyn Fn(&str) + Send + Sync>;
type ParkedPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// One closure-event invocation of the operator.
pub struct ConvoyCtx {
    /// `None` skips everything: there is nothing to consult.
    store: Option<Arc<dyn IssueStore>>,
    town: Town,
    closed_id: String,
    caller: String,
    logger: Option<Logger>,
    dispatcher_bin: PathBuf,
    is_rig_parked: Option<ParkedPredicate>,
}

impl ConvoyCtx {
    pub fn new(
        town: Town,
        closed_id: impl Into<String>,
        dispatcher_bin: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store: None,
            town,
            closed_id: closed_id.into(),
            caller: "convoy".to_string(),
            logger: None,
            dispatcher_bin: dispatcher_bin.into(),
            is_rig_parked: None,
        }
    }

    pub fn store(mut self, store: Arc<dyn IssueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn caller(mut self, caller: impl Into<String>) -> Self {
        self.caller = caller.into();
        self
    }

    pub fn logger(mut self, logger: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.logger = Some(Arc::new(logger));
        self
    }

    pub fn is_rig_parked(
        mut self,
        predicate: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.is_rig_parked = Some(Arc::new(predicate));
        self
    }

    fn log(&self, message: &str) {
        if let Some(logger) = &self.logger {
            logger(&format!("{}: {}", self.caller, message));
        }
        tracing::debug!(caller = %self.caller, "{}", message);
    }

    fn parked(&self, rig: &str) -> bool {
        self.is_rig_parked.as_ref().map(|p| p(rig)).unwrap_or(false)
    }

    /// React to the closure of `closed_id`.
    ///
    /// Returns the ids dispatched (at most one per open tracker).
    pub async fn on_issue_closed(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ConvoyError> {
        let Some(store) = self.store.clone() else {
            self.log("no store handle, skipping convoy reaction");
            return Ok(Vec::new());
        };
        if cancel.is_cancelled() {
            return Err(ConvoyError::Canceled);
        }

        let dependents = match store.get_dependents_with_metadata(&self.closed_id, cancel).await
        {
            Ok(dependents) => dependents,
            Err(e) => {
                // Fail-open: a stale snapshot means no dependents this round.
                self.log(&format!("dependents query failed ({}), treating as none", e));
                return Ok(Vec::new());
            }
        };

        let mut dispatched = Vec::new();
        for dep in dependents.iter().filter(|d| d.kind == DepKind::Tracks) {
            if cancel.is_cancelled() {
                return Err(ConvoyError::Canceled);
            }
            let tracker_id = normalize_id(&dep.issue_id).to_string();
            let tracker = match store.get_issue(&tracker_id, cancel).await {
                Ok(tracker) => tracker,
                Err(e) => {
                    self.log(&format!("tracker {} unreadable ({}), skipping", tracker_id, e));
                    continue;
                }
            };
            if tracker.status.is_closed() {
                self.log(&format!("tracker {} closed, skipping", tracker.id));
                continue;
            }
            if tracker.status.is_staged() {
                self.log(&format!(
                    "tracker {} staged ({}), not yet launched, skipping",
                    tracker.id, tracker.status
                ));
                continue;
            }

            // Idempotent completion check; tolerant of already-closed trackers.
            if let Err(e) = self
                .run_dispatcher(&["convoy", "check", &tracker.id], cancel)
                .await
            {
                self.log(&format!("convoy check for {} failed: {}", tracker.id, e));
            }

            // Re-read: the check may have closed it.
            let status = store
                .get_issue(&tracker.id, cancel)
                .await
                .map(|t| t.status)
                .unwrap_or(IssueStatus::Closed);
            if status.is_closed() {
                self.log(&format!("tracker {} completed", tracker.id));
                continue;
            }

            if let Some(id) = self.feed_next_ready_issue(&store, &tracker.id, cancel).await? {
                dispatched.push(id);
            }
        }
        Ok(dispatched)
    }

    /// Dispatch the first tracked item that is open, unassigned, slingable,
    /// unblocked, and routed to a known, unparked rig. Exactly one item per
    /// call.
    pub async fn feed_next_ready_issue(
        &self,
        store: &Arc<dyn IssueStore>,
        tracker_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, ConvoyError> {
        let routes = self.town.load_routes();
        let deps = match store.get_dependencies_with_metadata(tracker_id, cancel).await {
            Ok(deps) => deps,
            Err(e) => {
                self.log(&format!("tracked items of {} unreadable ({})", tracker_id, e));
                return Ok(None);
            }
        };
        let tracked_ids: Vec<String> = deps
            .iter()
            .filter(|d| d.kind == DepKind::Tracks)
            .map(|d| normalize_id(&d.issue_id).to_string())
            .collect();

        // The tracker's own dependency snapshot goes stale across rigs;
        // refresh every candidate from the store.
        let issues = match store.get_issues_by_ids(&tracked_ids, cancel).await {
            Ok(issues) => issues,
            Err(e) => {
                self.log(&format!("refresh of tracked items failed ({})", e));
                return Ok(None);
            }
        };

        for issue in issues {
            if cancel.is_cancelled() {
                return Err(ConvoyError::Canceled);
            }
            if !issue.status.is_open() {
                continue;
            }
            if issue.assignee.as_deref().is_some_and(|a| !a.is_empty()) {
                continue;
            }
            if !issue.issue_type.is_slingable() {
                continue;
            }
            if self.is_blocked(store, &issue.id, cancel).await {
                self.log(&format!("{} blocked, skipping", issue.id));
                continue;
            }
            let Some(rig) = routes.rig_for(&issue.id).map(str::to_string) else {
                self.log(&format!("{} has no routed rig, skipping", issue.id));
                continue;
            };
            if self.parked(&rig) {
                self.log(&format!("rig {} parked, skipping {}", rig, issue.id));
                continue;
            }

            match self
                .run_dispatcher(&["sling", &issue.id, &rig, "--no-boot"], cancel)
                .await
            {
                Ok(()) => {
                    self.log(&format!("dispatched {} to {}", issue.id, rig));
                    return Ok(Some(issue.id));
                }
                Err(e) => {
                    self.log(&format!("dispatch of {} failed ({}), trying next", issue.id, e));
                }
            }
        }
        Ok(None)
    }

    /// An item is blocked when a blocking-kind dependency targets an item
    /// that is neither closed nor a tombstone. Query failure fails open.
    async fn is_blocked(
        &self,
        store: &Arc<dyn IssueStore>,
        issue_id: &str,
        cancel: &CancellationToken,
    ) -> bool {
        match store.get_dependencies_with_metadata(issue_id, cancel).await {
            Ok(deps) => deps.iter().any(|d| {
                d.kind.is_blocking() && !d.status.is_closed() && !is_tombstone(&d.status)
            }),
            Err(e) => {
                self.log(&format!(
                    "blocking query for {} failed ({}), treating as unblocked",
                    issue_id, e
                ));
                false
            }
        }
    }

    async fn run_dispatcher(
        &self,
        args: &[&str],
        cancel: &CancellationToken,
    ) -> Result<(), String> {
        let mut cmd = tokio::process::Command::new(&self.dispatcher_bin);
        cmd.args(args);
        let output = run_cancellable(cmd, cancel, "dispatcher").await.map_err(|e| match e {
            MuxError::Canceled => "canceled".to_string(),
            other => other.to_string(),
        })?;
        if output.status.success() {
            Ok(())
        } else {
            Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
        }
    }
}

fn is_tombstone(status: &IssueStatus) -> bool {
    matches!(status, IssueStatus::Other(raw) if raw == "tombstone")
}

#[cfg(test)]
#[path = "convoy_tests.rs"]
mod tests;
