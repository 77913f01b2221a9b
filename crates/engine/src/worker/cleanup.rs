// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cleanup safety gate.
//!
//! The worker's self-reported `cleanup_status` governs removal when present:
//! the agent owns its worktree and knows what it intends to keep. Git
//! inspection is the fallback for workers that have not reported. `force`
//! tolerates uncommitted work files; `nuclear` is the operator override for
//! everything.

use std::path::Path;

use gt_core::CleanupStatus;

use super::{git, WorkerError};

/// Flag that would allow a blocked removal to proceed.
pub const UNBLOCK_FORCE: &str = "force";
pub const UNBLOCK_NUCLEAR: &str = "nuclear";

/// Apply force/nuclear semantics to a known cleanup status.
pub fn gate_reported(
    name: &str,
    status: &CleanupStatus,
    force: bool,
    nuclear: bool,
) -> Result<(), WorkerError> {
    if nuclear {
        return Ok(());
    }
    match status {
        CleanupStatus::Clean => Ok(()),
        CleanupStatus::HasUncommitted if force => Ok(()),
        CleanupStatus::HasUncommitted => Err(WorkerError::RemovalBlocked {
            name: name.to_string(),
            status: status.clone(),
            unblock: UNBLOCK_FORCE,
        }),
        // Stashes and unpushed commits are unrecoverable once the worktree
        // goes; force is not enough.
        CleanupStatus::HasStash | CleanupStatus::HasUnpushed => {
            Err(WorkerError::RemovalBlocked {
                name: name.to_string(),
                status: status.clone(),
                unblock: UNBLOCK_NUCLEAR,
            })
        }
        // A tag this code does not understand blocks conservatively.
        CleanupStatus::Unknown | CleanupStatus::Other(_) => Err(WorkerError::RemovalBlocked {
            name: name.to_string(),
            status: status.clone(),
            unblock: UNBLOCK_NUCLEAR,
        }),
    }
}

/// Inspect the worktree directly and apply the same semantics.
///
/// Used when the agent bead carries no usable report.
pub async fn gate_inspected(
    name: &str,
    work_dir: &Path,
    force: bool,
    nuclear: bool,
) -> Result<(), WorkerError> {
    if nuclear {
        return Ok(());
    }
    let status = inspect(work_dir).await?;
    gate_reported(name, &status, force, nuclear)
}

/// Derive a cleanup status from git state. Severity order: stash and
/// unpushed commits outrank uncommitted changes.
pub async fn inspect(work_dir: &Path) -> Result<CleanupStatus, WorkerError> {
    if git::stash_count(work_dir).await? > 0 {
        return Ok(CleanupStatus::HasStash);
    }
    if git::has_unpushed(work_dir).await? {
        return Ok(CleanupStatus::HasUnpushed);
    }
    if git::has_uncommitted(work_dir).await? {
        return Ok(CleanupStatus::HasUncommitted);
    }
    Ok(CleanupStatus::Clean)
}

#[cfg(test)]
#[path = "cleanup_tests.rs"]
mod tests;
