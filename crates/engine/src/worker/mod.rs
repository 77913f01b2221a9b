// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker (polecat) manager.
//!
//! Creates, inventories, repairs, and destroys workers in a rig. A worker
//! exists iff its work directory exists; everything else (assignment,
//! progress) derives from the issue store. No sidecar files are
//! authoritative.

pub mod cleanup;
pub mod git;

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use gt_core::{
    AgentAddress, AgentBead, AgentProvider, BeadState, BranchTemplate, BranchTemplateError,
    CleanupStatus, Clock, Rig, SystemClock,
};
use gt_store::{IssueStore, IssueUpdate, StoreError};

use crate::commands::provision_commands;
use crate::namepool::{NamePool, PoolError};

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("worker already exists: {0}")]
    AlreadyExists(String),
    #[error("worker not found: {0}")]
    NotFound(String),
    #[error("removal of {name} blocked by cleanup status {status}; pass --{unblock} to override")]
    RemovalBlocked {
        name: String,
        status: CleanupStatus,
        unblock: &'static str,
    },
    #[error("no repository for rig (neither .repo.git nor mayor/rig exists)")]
    NoRepository,
    #[error("git error: {0}")]
    Git(String),
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Branch(#[from] BranchTemplateError),
    #[error("worker io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Derived worker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// An issue is assigned to the worker's address.
    Working,
    /// No issue assigned.
    Idle,
    /// Transient self-report: finished, awaiting teardown.
    Done,
    /// Transient self-report: needs help.
    Stuck,
}

gt_core::simple_display! {
    WorkerState {
        Working => "working",
        Idle => "idle",
        Done => "done",
        Stuck => "stuck",
    }
}

/// A worker present on disk.
#[derive(Debug, Clone)]
pub struct Worker {
    pub name: String,
    pub work_dir: PathBuf,
    pub branch: Option<String>,
    pub state: WorkerState,
}

/// Options applied when spawning a worker.
#[derive(Debug, Clone)]
pub struct PolecatOptions {
    pub branch_template: BranchTemplate,
    pub provider: AgentProvider,
    /// Issue the worker is being spawned for; recorded on the agent bead at
    /// creation so assignment is never observable half-done.
    pub hook_bead: Option<String>,
}

impl Default for PolecatOptions {
    fn default() -> Self {
        Self {
            branch_template: BranchTemplate::default(),
            provider: AgentProvider::default(),
            hook_bead: None,
        }
    }
}

impl PolecatOptions {
    gt_core::setters! {
        set {
            branch_template: BranchTemplate,
            provider: AgentProvider,
        }
        option {
            hook_bead: String,
        }
    }
}

/// Manages the worker pool of one rig.
pub struct PolecatManager<C: Clock = SystemClock> {
    rig: Rig,
    store: Arc<dyn IssueStore>,
    pool: NamePool,
    clock: C,
    /// Actor attributed on store mutations performed by the manager.
    actor: String,
}

impl PolecatManager<SystemClock> {
    pub fn new(
        rig: Rig,
        store: Arc<dyn IssueStore>,
        actor: impl Into<String>,
    ) -> Result<Self, WorkerError> {
        let pool = NamePool::load(rig.clone())?;
        Ok(Self { rig, store, pool, clock: SystemClock, actor: actor.into() })
    }
}

impl<C: Clock> PolecatManager<C> {
    pub fn with_clock(
        rig: Rig,
        store: Arc<dyn IssueStore>,
        actor: impl Into<String>,
        pool: NamePool,
        clock: C,
    ) -> Self {
        Self { rig, store, pool, clock, actor: actor.into() }
    }

    pub fn rig(&self) -> &Rig {
        &self.rig
    }

    fn address(&self, name: &str) -> AgentAddress {
        AgentAddress::Polecat { rig: self.rig.name().to_string(), name: name.to_string() }
    }

    /// The repository worktrees are carved from: shared bare repo preferred,
    /// legacy tracked checkout otherwise.
    fn source_repo(&self) -> Result<PathBuf, WorkerError> {
        if let Some(bare) = self.rig.bare_repo() {
            return Ok(bare);
        }
        let legacy = self.rig.legacy_repo();
        if legacy.is_dir() {
            return Ok(legacy);
        }
        Err(WorkerError::NoRepository)
    }

    /// Take a name from the pool.
    pub fn allocate_name(&self) -> Result<String, WorkerError> {
        Ok(self.pool.allocate()?)
    }

    /// Return a name to the pool.
    pub fn release_name(&self, name: &str) -> Result<(), WorkerError> {
        Ok(self.pool.release(name)?)
    }

    /// Create a worker: fresh-branch worktree, shared-database redirect,
    /// slash commands, and a `spawning` agent bead.
    pub async fn add(
        &self,
        name: &str,
        opts: &PolecatOptions,
        cancel: &CancellationToken,
    ) -> Result<Worker, WorkerError> {
        let work_dir = self.rig.polecat_dir(name);
        if work_dir.exists() {
            return Err(WorkerError::AlreadyExists(name.to_string()));
        }
        let repo = self.source_repo()?;
        let branch =
            opts.branch_template
                .render(self.rig.name(), name, self.clock.epoch_ms());

        git::worktree_add(&repo, &branch, &work_dir, "HEAD").await?;
        self.init_beads_redirect(&work_dir)?;
        provision_commands(&work_dir, opts.provider)?;

        let now = self.clock.epoch_ms();
        let bead = AgentBead {
            address: self.address(name).actor(),
            role: "polecat".to_string(),
            rig: Some(self.rig.name().to_string()),
            state: BeadState::Spawning,
            hook_bead: opts.hook_bead.clone(),
            cleanup_status: None,
            created_at_ms: now,
            updated_at_ms: now,
        };
        self.store.create_agent_bead(&bead, &self.actor, cancel).await?;

        // The directory exists now; a crash can no longer leak the name.
        self.pool.clear_reservation(name)?;

        tracing::info!(rig = self.rig.name(), worker = name, %branch, "worker created");
        Ok(Worker {
            name: name.to_string(),
            work_dir,
            branch: Some(branch),
            state: WorkerState::Idle,
        })
    }

    /// Destroy and re-create a worker. The old branch stays behind for
    /// garbage collection.
    pub async fn recreate(
        &self,
        name: &str,
        force: bool,
        opts: &PolecatOptions,
        cancel: &CancellationToken,
    ) -> Result<Worker, WorkerError> {
        self.remove(name, force, false, cancel).await?;
        self.add(name, opts, cancel).await
    }

    /// Destroy a worker after the cleanup safety gate passes.
    pub async fn remove(
        &self,
        name: &str,
        force: bool,
        nuclear: bool,
        cancel: &CancellationToken,
    ) -> Result<(), WorkerError> {
        let work_dir = self.rig.polecat_dir(name);
        if !work_dir.exists() {
            return Err(WorkerError::NotFound(name.to_string()));
        }

        let address = self.address(name).actor();
        let reported = self
            .store
            .get_agent_bead(&address, cancel)
            .await
            .unwrap_or_default()
            .and_then(|bead| bead.cleanup_status)
            .filter(CleanupStatus::is_reported);
        match reported {
            Some(status) => cleanup::gate_reported(name, &status, force, nuclear)?,
            None => cleanup::gate_inspected(name, &work_dir, force, nuclear).await?,
        }

        git::worktree_remove(&work_dir).await?;
        if let Ok(repo) = self.source_repo() {
            git::worktree_prune(&repo).await;
        }
        self.pool.release(name)?;
        if let Err(e) = self.store.delete_agent_bead(&address, &self.actor, cancel).await {
            tracing::warn!(worker = name, error = %e, "agent bead delete failed");
        }
        tracing::info!(rig = self.rig.name(), worker = name, "worker removed");
        Ok(())
    }

    /// Workers on disk, with state derived from the store.
    pub async fn list(&self, cancel: &CancellationToken) -> Result<Vec<Worker>, WorkerError> {
        let mut workers = Vec::new();
        for name in self.rig.list_polecat_names() {
            let work_dir = self.rig.polecat_dir(&name);
            let branch = git::current_branch(&work_dir).await;
            let state = self.derive_state(&name, cancel).await;
            workers.push(Worker { name, work_dir, branch, state });
        }
        Ok(workers)
    }

    /// Assign an issue: assignee and `in_progress` in one store update.
    pub async fn assign_issue(
        &self,
        name: &str,
        issue_id: &str,
        cancel: &CancellationToken,
    ) -> Result<(), WorkerError> {
        let address = self.address(name).actor();
        self.store
            .update_issue(issue_id, IssueUpdate::assign(address), &self.actor, cancel)
            .await?;
        Ok(())
    }

    /// Clear the worker's current assignment; no-op when idle.
    pub async fn clear_issue(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), WorkerError> {
        let address = self.address(name).actor();
        let Some(issue) = self.store.get_assigned_issue(&address, cancel).await? else {
            return Ok(());
        };
        self.store
            .update_issue(&issue.id, IssueUpdate::unassign(), &self.actor, cancel)
            .await?;
        Ok(())
    }

    /// Delete `polecat/*` branches not referenced by any current worker.
    pub async fn cleanup_stale_branches(&self) -> Result<Vec<String>, WorkerError> {
        let repo = self.source_repo()?;
        let mut live = Vec::new();
        for name in self.rig.list_polecat_names() {
            if let Some(branch) = git::current_branch(&self.rig.polecat_dir(&name)).await {
                live.push(branch);
            }
        }
        let mut deleted = Vec::new();
        for branch in git::list_branches(&repo, "polecat/*").await? {
            if !live.contains(&branch) {
                match git::delete_branch(&repo, &branch).await {
                    Ok(()) => deleted.push(branch),
                    Err(e) => {
                        tracing::debug!(%branch, error = %e, "stale branch delete failed")
                    }
                }
            }
        }
        Ok(deleted)
    }

    /// `working`/`idle` from assignment; transient `done`/`stuck` from the
    /// bead self-report. A legacy `active` assignment counts as working.
    async fn derive_state(&self, name: &str, cancel: &CancellationToken) -> WorkerState {
        let address = self.address(name).actor();
        if let Ok(Some(bead)) = self.store.get_agent_bead(&address, cancel).await {
            match bead.state {
                BeadState::Done => return WorkerState::Done,
                BeadState::Stuck => return WorkerState::Stuck,
                _ => {}
            }
        }
        match self.store.get_assigned_issue(&address, cancel).await {
            Ok(Some(_)) => WorkerState::Working,
            Ok(None) => WorkerState::Idle,
            Err(e) => {
                tracing::debug!(worker = name, error = %e, "assignment lookup failed");
                WorkerState::Idle
            }
        }
    }

    /// Purge any issue database copied in from the source branch and point
    /// the worker at the rig's shared database instead. Per-worker databases
    /// must not exist.
    fn init_beads_redirect(&self, work_dir: &std::path::Path) -> Result<(), WorkerError> {
        let beads = work_dir.join(".beads");
        if beads.exists() {
            std::fs::remove_dir_all(&beads)?;
        }
        std::fs::create_dir_all(&beads)?;
        let target = if self.rig.has_shared_beads() {
            "../../.beads"
        } else {
            "../../mayor/rig/.beads"
        };
        std::fs::write(beads.join("redirect"), format!("{}\n", target))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
