// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git plumbing for worker worktrees.
//!
//! Worktrees are created from the rig's shared bare repository (or the
//! legacy tracked checkout) on a fresh branch per spawn. Inspection helpers
//! feed the cleanup safety gate when a worker has not self-reported.

use std::path::Path;
use std::process::Output;

use gt_mux::subprocess::{run_with_timeout, GIT_TIMEOUT};

use super::WorkerError;

async fn run_git(args: &[&str], cwd: Option<&Path>, label: &str) -> Result<Output, WorkerError> {
    let mut cmd = tokio::process::Command::new("git");
    cmd.args(args).env_remove("GIT_DIR").env_remove("GIT_WORK_TREE");
    if let Some(cwd) = cwd {
        cmd.current_dir(cwd);
    }
    run_with_timeout(cmd, GIT_TIMEOUT, label)
        .await
        .map_err(|e| WorkerError::Git(e.to_string()))
}

fn require_success(output: Output, label: &str) -> Result<Output, WorkerError> {
    if output.status.success() {
        Ok(output)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(WorkerError::Git(format!("{}: {}", label, stderr.trim())))
    }
}

fn stdout_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

/// Create a worktree on a new branch.
pub async fn worktree_add(
    repo: &Path,
    branch: &str,
    path: &Path,
    start_point: &str,
) -> Result<(), WorkerError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| WorkerError::Git(format!("worktree parent: {}", e)))?;
    }
    let repo_str = repo.display().to_string();
    let path_str = path.display().to_string();
    let output = run_git(
        &["-C", &repo_str, "worktree", "add", "-b", branch, &path_str, start_point],
        None,
        "git worktree add",
    )
    .await?;
    require_success(output, "git worktree add").map(drop)
}

/// Unregister and delete a worktree. Best-effort: remnants are removed with
/// a plain directory delete afterwards.
pub async fn worktree_remove(path: &Path) -> Result<(), WorkerError> {
    if path.join(".git").exists() {
        let path_str = path.display().to_string();
        let output =
            run_git(&["worktree", "remove", "--force", &path_str], Some(path), "git worktree remove")
                .await;
        if let Ok(output) = output {
            if !output.status.success() {
                tracing::debug!(path = %path.display(), "git worktree remove reported failure");
            }
        }
    }
    if path.exists() {
        tokio::fs::remove_dir_all(path)
            .await
            .map_err(|e| WorkerError::Git(format!("remove worktree dir: {}", e)))?;
    }
    Ok(())
}

/// Drop stale worktree registrations after a directory delete, so the same
/// path can be re-added. Best-effort.
pub async fn worktree_prune(repo: &Path) {
    let repo_str = repo.display().to_string();
    if let Ok(output) =
        run_git(&["-C", &repo_str, "worktree", "prune"], None, "git worktree prune").await
    {
        if !output.status.success() {
            tracing::debug!(repo = %repo.display(), "git worktree prune reported failure");
        }
    }
}

/// Whether the worktree has staged or unstaged changes.
pub async fn has_uncommitted(dir: &Path) -> Result<bool, WorkerError> {
    let output = run_git(&["status", "--porcelain"], Some(dir), "git status").await?;
    let output = require_success(output, "git status")?;
    Ok(!stdout_lines(&output).is_empty())
}

/// Number of stash entries in the worktree.
pub async fn stash_count(dir: &Path) -> Result<usize, WorkerError> {
    let output = run_git(&["stash", "list"], Some(dir), "git stash list").await?;
    let output = require_success(output, "git stash list")?;
    Ok(stdout_lines(&output).len())
}

/// Whether local commits exist that no remote-tracking branch has.
pub async fn has_unpushed(dir: &Path) -> Result<bool, WorkerError> {
    let output = run_git(
        &["log", "--oneline", "--not", "--remotes", "-n", "1", "HEAD"],
        Some(dir),
        "git log",
    )
    .await?;
    // A repo with no commits at all has nothing unpushed.
    if !output.status.success() {
        return Ok(false);
    }
    Ok(!stdout_lines(&output).is_empty())
}

/// Current branch of a worktree; `None` for detached HEAD or missing dir.
pub async fn current_branch(dir: &Path) -> Option<String> {
    if !dir.exists() {
        return None;
    }
    let output = run_git(&["rev-parse", "--abbrev-ref", "HEAD"], Some(dir), "git rev-parse")
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!branch.is_empty() && branch != "HEAD").then_some(branch)
}

/// Branches matching a glob in the given repository.
pub async fn list_branches(repo: &Path, pattern: &str) -> Result<Vec<String>, WorkerError> {
    let repo_str = repo.display().to_string();
    let output = run_git(
        &["-C", &repo_str, "branch", "--list", pattern, "--format", "%(refname:short)"],
        None,
        "git branch --list",
    )
    .await?;
    let output = require_success(output, "git branch --list")?;
    Ok(stdout_lines(&output))
}

/// Force-delete a branch in the given repository.
pub async fn delete_branch(repo: &Path, branch: &str) -> Result<(), WorkerError> {
    let repo_str = repo.display().to_string();
    let output =
        run_git(&["-C", &repo_str, "branch", "-D", branch], None, "git branch -D").await?;
    require_success(output, "git branch -D").map(drop)
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
