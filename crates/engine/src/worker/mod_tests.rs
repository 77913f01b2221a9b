// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gt_core::{FakeClock, Issue, IssueStatus};
use gt_store::{FakeStore, StoreCall};

async fn sh(dir: &std::path::Path, script: &str) {
    let status = tokio::process::Command::new("sh")
        .args(["-c", script])
        .current_dir(dir)
        .env_remove("GIT_DIR")
        .env_remove("GIT_WORK_TREE")
        .status()
        .await
        .unwrap();
    assert!(status.success(), "script failed: {script}");
}

struct Harness {
    manager: PolecatManager<FakeClock>,
    store: FakeStore,
    clock: FakeClock,
    rig: Rig,
    _temp: tempfile::TempDir,
}

/// A rig with a bare `.repo.git` seeded from one commit.
async fn harness() -> Harness {
    let temp = tempfile::tempdir().unwrap();
    let town = temp.path().to_path_buf();
    std::fs::create_dir_all(town.join("seed")).unwrap();
    sh(
        &town.join("seed"),
        "git init -q -b main && git config user.email t@t && git config user.name t && \
         echo hello > README && git add . && git commit -qm init",
    )
    .await;
    std::fs::create_dir_all(town.join("demo")).unwrap();
    sh(&town, "git clone -q --bare seed demo/.repo.git").await;

    let rig = Rig::new(&town, "demo");
    let store = FakeStore::new();
    let clock = FakeClock::new();
    let pool = NamePool::load_with_theme(
        rig.clone(),
        vec!["toast".to_string(), "dag".to_string()],
    )
    .unwrap();
    let manager = PolecatManager::with_clock(
        rig.clone(),
        Arc::new(store.clone()),
        "demo/witness",
        pool,
        clock.clone(),
    );
    Harness { manager, store, clock, rig, _temp: temp }
}

fn cancel() -> CancellationToken {
    CancellationToken::new()
}

#[tokio::test]
async fn add_creates_worktree_with_fresh_branch_and_bead() {
    let h = harness().await;
    h.clock.set_epoch_ms(36);

    let opts = PolecatOptions::default().hook_bead("gt-7");
    let worker = h.manager.add("toast", &opts, &cancel()).await.unwrap();

    assert_eq!(worker.name, "toast");
    assert_eq!(worker.branch.as_deref(), Some("polecat/toast-10"));
    assert!(worker.work_dir.join("README").is_file());

    let bead = h.store.bead("demo/polecats/toast").unwrap();
    assert_eq!(bead.state, BeadState::Spawning);
    assert_eq!(bead.hook_bead.as_deref(), Some("gt-7"));
    assert_eq!(bead.rig.as_deref(), Some("demo"));
}

#[tokio::test]
async fn add_redirects_to_legacy_database_when_rig_has_none() {
    let h = harness().await;
    h.manager.add("toast", &PolecatOptions::default(), &cancel()).await.unwrap();

    let redirect =
        std::fs::read_to_string(h.rig.polecat_dir("toast").join(".beads/redirect")).unwrap();
    assert_eq!(redirect, "../../mayor/rig/.beads\n");
}

#[tokio::test]
async fn add_redirects_to_shared_database_when_populated() {
    let h = harness().await;
    std::fs::create_dir_all(h.rig.beads_dir()).unwrap();
    std::fs::write(h.rig.beads_dir().join("issues.db"), b"x").unwrap();

    h.manager.add("toast", &PolecatOptions::default(), &cancel()).await.unwrap();
    let redirect =
        std::fs::read_to_string(h.rig.polecat_dir("toast").join(".beads/redirect")).unwrap();
    assert_eq!(redirect, "../../.beads\n");
}

#[tokio::test]
async fn add_purges_database_copied_from_branch() {
    let h = harness().await;
    // Seed the source repo with a committed database directory.
    let seed = h.rig.town_root().join("seed");
    sh(
        &seed,
        "mkdir -p .beads && echo data > .beads/issues.db && git add -f .beads && \
         git commit -qm db && git push -q ../demo/.repo.git main",
    )
    .await;

    h.manager.add("toast", &PolecatOptions::default(), &cancel()).await.unwrap();
    let beads = h.rig.polecat_dir("toast").join(".beads");
    assert!(!beads.join("issues.db").exists());
    assert!(beads.join("redirect").is_file());
}

#[tokio::test]
async fn add_twice_is_already_exists() {
    let h = harness().await;
    h.manager.add("toast", &PolecatOptions::default(), &cancel()).await.unwrap();
    let err = h.manager.add("toast", &PolecatOptions::default(), &cancel()).await.unwrap_err();
    assert!(matches!(err, WorkerError::AlreadyExists(_)));
}

#[tokio::test]
async fn add_provisions_slash_commands() {
    let h = harness().await;
    h.manager.add("toast", &PolecatOptions::default(), &cancel()).await.unwrap();
    assert!(h.rig.polecat_dir("toast").join(".claude/commands/handoff.md").is_file());
}

#[tokio::test]
async fn remove_clean_worker_releases_name_and_bead() {
    let h = harness().await;
    let name = h.manager.allocate_name().unwrap();
    assert_eq!(name, "toast");
    h.manager.add(&name, &PolecatOptions::default(), &cancel()).await.unwrap();

    // Fresh worktree from a bare clone has no remote-tracking refs, so git
    // inspection would block; the agent reports clean.
    let mut bead = h.store.bead("demo/polecats/toast").unwrap();
    bead.cleanup_status = Some(CleanupStatus::Clean);
    h.store.put_bead(bead);

    h.manager.remove(&name, false, false, &cancel()).await.unwrap();
    assert!(!h.rig.polecat_dir("toast").exists());
    assert!(h.store.bead("demo/polecats/toast").is_none());
    // Name is available again.
    assert_eq!(h.manager.allocate_name().unwrap(), "toast");
}

#[tokio::test]
async fn remove_missing_worker_is_not_found() {
    let h = harness().await;
    let err = h.manager.remove("ghost", false, false, &cancel()).await.unwrap_err();
    assert!(matches!(err, WorkerError::NotFound(_)));
}

#[tokio::test]
async fn self_reported_stash_blocks_even_forced_removal() {
    let h = harness().await;
    h.manager.add("toast", &PolecatOptions::default(), &cancel()).await.unwrap();
    let mut bead = h.store.bead("demo/polecats/toast").unwrap();
    bead.cleanup_status = Some(CleanupStatus::HasStash);
    h.store.put_bead(bead);

    let err = h.manager.remove("toast", true, false, &cancel()).await.unwrap_err();
    assert!(matches!(
        err,
        WorkerError::RemovalBlocked { unblock: cleanup::UNBLOCK_NUCLEAR, .. }
    ));

    h.manager.remove("toast", false, true, &cancel()).await.unwrap();
    assert!(!h.rig.polecat_dir("toast").exists());
}

#[tokio::test]
async fn self_report_outranks_git_state() {
    let h = harness().await;
    h.manager.add("toast", &PolecatOptions::default(), &cancel()).await.unwrap();
    // Git would say the tree is dirty, but the agent declared it clean.
    std::fs::write(h.rig.polecat_dir("toast").join("scratch.txt"), "wip").unwrap();
    let mut bead = h.store.bead("demo/polecats/toast").unwrap();
    bead.cleanup_status = Some(CleanupStatus::Clean);
    h.store.put_bead(bead);

    h.manager.remove("toast", false, false, &cancel()).await.unwrap();
}

#[tokio::test]
async fn unreported_worker_falls_back_to_git_inspection() {
    let h = harness().await;
    h.manager.add("toast", &PolecatOptions::default(), &cancel()).await.unwrap();
    std::fs::write(h.rig.polecat_dir("toast").join("scratch.txt"), "wip").unwrap();

    let err = h.manager.remove("toast", false, false, &cancel()).await.unwrap_err();
    assert!(matches!(err, WorkerError::RemovalBlocked { .. }));
}

#[tokio::test]
async fn assign_issue_sets_assignee_and_status_in_one_update() {
    let h = harness().await;
    h.store.put_issue(Issue::new("gt-1", IssueStatus::Open));
    h.manager.assign_issue("toast", "gt-1", &cancel()).await.unwrap();

    let issue = h.store.issue("gt-1").unwrap();
    assert_eq!(issue.assignee.as_deref(), Some("demo/polecats/toast"));
    assert_eq!(issue.status, IssueStatus::InProgress);

    let updates = h
        .store
        .calls()
        .iter()
        .filter(|c| matches!(c, StoreCall::UpdateIssue { .. }))
        .count();
    assert_eq!(updates, 1);
}

#[tokio::test]
async fn clear_issue_is_noop_when_unassigned() {
    let h = harness().await;
    h.manager.clear_issue("toast", &cancel()).await.unwrap();
    assert!(h.store.calls().is_empty());
}

#[tokio::test]
async fn clear_issue_unassigns_current_issue() {
    let h = harness().await;
    h.store.put_issue(
        Issue::new("gt-1", IssueStatus::InProgress).assignee("demo/polecats/toast"),
    );
    h.manager.clear_issue("toast", &cancel()).await.unwrap();
    assert!(h.store.issue("gt-1").unwrap().assignee.is_none());
}

#[tokio::test]
async fn list_derives_state_from_store() {
    let h = harness().await;
    h.manager.add("toast", &PolecatOptions::default(), &cancel()).await.unwrap();
    h.manager.add("dag", &PolecatOptions::default(), &cancel()).await.unwrap();
    h.store.put_issue(
        Issue::new("gt-1", IssueStatus::InProgress).assignee("demo/polecats/toast"),
    );

    let workers = h.manager.list(&cancel()).await.unwrap();
    let toast = workers.iter().find(|w| w.name == "toast").unwrap();
    assert_eq!(toast.state, WorkerState::Working);
    let dag = workers.iter().find(|w| w.name == "dag").unwrap();
    assert_eq!(dag.state, WorkerState::Idle);
}

#[tokio::test]
async fn bead_self_report_surfaces_done_and_stuck() {
    let h = harness().await;
    h.manager.add("toast", &PolecatOptions::default(), &cancel()).await.unwrap();
    let mut bead = h.store.bead("demo/polecats/toast").unwrap();
    bead.state = BeadState::Stuck;
    h.store.put_bead(bead);

    let workers = h.manager.list(&cancel()).await.unwrap();
    assert_eq!(workers[0].state, WorkerState::Stuck);
}

#[tokio::test]
async fn recreate_spawns_fresh_branch() {
    let h = harness().await;
    h.clock.set_epoch_ms(36);
    h.manager.add("toast", &PolecatOptions::default(), &cancel()).await.unwrap();
    let mut bead = h.store.bead("demo/polecats/toast").unwrap();
    bead.cleanup_status = Some(CleanupStatus::Clean);
    h.store.put_bead(bead);

    h.clock.set_epoch_ms(72);
    let worker = h
        .manager
        .recreate("toast", false, &PolecatOptions::default(), &cancel())
        .await
        .unwrap();
    assert_eq!(worker.branch.as_deref(), Some("polecat/toast-20"));
}

#[tokio::test]
async fn cleanup_stale_branches_keeps_live_ones() {
    let h = harness().await;
    h.clock.set_epoch_ms(36);
    h.manager.add("toast", &PolecatOptions::default(), &cancel()).await.unwrap();
    let mut bead = h.store.bead("demo/polecats/toast").unwrap();
    bead.cleanup_status = Some(CleanupStatus::Clean);
    h.store.put_bead(bead);

    // Recreate leaves polecat/toast-10 behind and checks out polecat/toast-20.
    h.clock.set_epoch_ms(72);
    h.manager.recreate("toast", false, &PolecatOptions::default(), &cancel()).await.unwrap();

    let deleted = h.manager.cleanup_stale_branches().await.unwrap();
    assert_eq!(deleted, vec!["polecat/toast-10".to_string()]);

    let repo = h.rig.bare_repo().unwrap();
    let remaining = git::list_branches(&repo, "polecat/*").await.unwrap();
    assert_eq!(remaining, vec!["polecat/toast-20".to_string()]);
}
