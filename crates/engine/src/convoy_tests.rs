// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gt_core::{Issue, IssueType};
use gt_store::FakeStore;
use parking_lot::Mutex;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Dispatcher stub that records argv lines to `calls.log`.
fn stub_dispatcher(dir: &Path) -> PathBuf {
    let bin = dir.join("gt");
    let script = format!("#!/bin/sh\necho \"$@\" >> {}/calls.log\n", dir.display());
    std::fs::write(&bin, script).unwrap();
    std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();
    bin
}

fn dispatcher_calls(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("calls.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

struct Harness {
    store: FakeStore,
    temp: tempfile::TempDir,
    logs: Arc<Mutex<Vec<String>>>,
}

/// Town with one routed rig `gastown` owning the `gt-` prefix.
fn harness() -> Harness {
    let temp = tempfile::tempdir().unwrap();
    let town_root = temp.path().join("town");
    std::fs::create_dir_all(town_root.join(".beads")).unwrap();
    std::fs::write(
        town_root.join(".beads").join("routes.jsonl"),
        format!(
            "{}\n",
            serde_json::json!({
                "prefix": "gt-",
                "path": town_root.join("gastown").display().to_string()
            })
        ),
    )
    .unwrap();
    Harness { store: FakeStore::new(), temp, logs: Arc::new(Mutex::new(Vec::new())) }
}

impl Harness {
    fn ctx(&self, closed_id: &str) -> ConvoyCtx {
        let logs = Arc::clone(&self.logs);
        ConvoyCtx::new(
            Town::new(self.temp.path().join("town")),
            closed_id,
            stub_dispatcher(self.temp.path()),
        )
        .store(Arc::new(self.store.clone()))
        .caller("test")
        .logger(move |line| logs.lock().push(line.to_string()))
    }

    fn logged(&self, needle: &str) -> bool {
        self.logs.lock().iter().any(|l| l.contains(needle))
    }
}

fn open_task(id: &str) -> Issue {
    Issue::new(id, IssueStatus::Open).issue_type(IssueType::Task)
}

#[tokio::test]
async fn feeds_first_ready_tracked_item() {
    let h = harness();
    let cancel = CancellationToken::new();
    h.store.put_issue(Issue::new("gt-conv", IssueStatus::Open).issue_type(IssueType::Convoy));
    h.store.put_issue(Issue::new("gt-other", IssueStatus::Closed));
    h.store.put_issue(Issue::new("gt-epic", IssueStatus::Open).issue_type(IssueType::Epic));
    h.store.put_issue(open_task("gt-blocker"));
    h.store.put_issue(open_task("gt-task2"));
    h.store.put_issue(open_task("gt-ready"));
    h.store.add_edge("gt-conv", DepKind::Tracks, "gt-other");
    h.store.add_edge("gt-conv", DepKind::Tracks, "gt-epic");
    h.store.add_edge("gt-conv", DepKind::Tracks, "gt-task2");
    h.store.add_edge("gt-conv", DepKind::Tracks, "gt-ready");
    // gt-task2 is blocked by the still-open gt-blocker.
    h.store.add_edge("gt-task2", DepKind::Blocks, "gt-blocker");

    let dispatched = h.ctx("gt-other").on_issue_closed(&cancel).await.unwrap();
    assert_eq!(dispatched, vec!["gt-ready".to_string()]);

    let calls = dispatcher_calls(h.temp.path());
    assert!(calls.iter().any(|c| c == "convoy check gt-conv"));
    let slings: Vec<&String> = calls.iter().filter(|c| c.starts_with("sling")).collect();
    assert_eq!(slings, vec![&"sling gt-ready gastown --no-boot".to_string()]);
}

#[tokio::test]
async fn staged_tracker_is_skipped_without_check_or_feed() {
    let h = harness();
    let cancel = CancellationToken::new();
    h.store.put_issue(
        Issue::new("gt-conv", IssueStatus::Staged("staged_ready".into()))
            .issue_type(IssueType::Convoy),
    );
    h.store.put_issue(Issue::new("gt-done", IssueStatus::Closed));
    h.store.add_edge("gt-conv", DepKind::Tracks, "gt-done");

    let dispatched = h.ctx("gt-done").on_issue_closed(&cancel).await.unwrap();
    assert!(dispatched.is_empty());
    assert!(h.logged("staged"));
    assert!(h.logged("skipping"));
    assert!(dispatcher_calls(h.temp.path()).is_empty());
}

#[tokio::test]
async fn closed_tracker_is_skipped() {
    let h = harness();
    let cancel = CancellationToken::new();
    h.store.put_issue(Issue::new("gt-conv", IssueStatus::Closed).issue_type(IssueType::Convoy));
    h.store.put_issue(Issue::new("gt-done", IssueStatus::Closed));
    h.store.add_edge("gt-conv", DepKind::Tracks, "gt-done");

    let dispatched = h.ctx("gt-done").on_issue_closed(&cancel).await.unwrap();
    assert!(dispatched.is_empty());
    assert!(dispatcher_calls(h.temp.path()).is_empty());
}

#[tokio::test]
async fn assigned_items_are_not_fed() {
    let h = harness();
    let cancel = CancellationToken::new();
    h.store.put_issue(Issue::new("gt-conv", IssueStatus::Open).issue_type(IssueType::Convoy));
    h.store.put_issue(Issue::new("gt-done", IssueStatus::Closed));
    h.store.put_issue(open_task("gt-busy").assignee("gastown/polecats/toast"));
    h.store.add_edge("gt-conv", DepKind::Tracks, "gt-done");
    h.store.add_edge("gt-conv", DepKind::Tracks, "gt-busy");

    let dispatched = h.ctx("gt-done").on_issue_closed(&cancel).await.unwrap();
    assert!(dispatched.is_empty());
}

#[tokio::test]
async fn parent_child_does_not_block() {
    let h = harness();
    let cancel = CancellationToken::new();
    h.store.put_issue(Issue::new("gt-conv", IssueStatus::Open).issue_type(IssueType::Convoy));
    h.store.put_issue(Issue::new("gt-done", IssueStatus::Closed));
    h.store.put_issue(open_task("gt-child"));
    h.store.put_issue(Issue::new("gt-parent", IssueStatus::Open).issue_type(IssueType::Epic));
    h.store.add_edge("gt-conv", DepKind::Tracks, "gt-done");
    h.store.add_edge("gt-conv", DepKind::Tracks, "gt-child");
    h.store.add_edge("gt-child", DepKind::ParentChild, "gt-parent");

    let dispatched = h.ctx("gt-done").on_issue_closed(&cancel).await.unwrap();
    assert_eq!(dispatched, vec!["gt-child".to_string()]);
}

#[tokio::test]
async fn closed_and_tombstone_blockers_do_not_block() {
    let h = harness();
    let cancel = CancellationToken::new();
    h.store.put_issue(Issue::new("gt-conv", IssueStatus::Open).issue_type(IssueType::Convoy));
    h.store.put_issue(Issue::new("gt-done", IssueStatus::Closed));
    h.store.put_issue(open_task("gt-task"));
    h.store.put_issue(Issue::new("gt-gone", IssueStatus::Closed));
    h.store.put_issue(Issue::new("gt-dead", IssueStatus::Other("tombstone".into())));
    h.store.add_edge("gt-conv", DepKind::Tracks, "gt-done");
    h.store.add_edge("gt-conv", DepKind::Tracks, "gt-task");
    h.store.add_edge("gt-task", DepKind::Blocks, "gt-gone");
    h.store.add_edge("gt-task", DepKind::WaitsFor, "gt-dead");

    let dispatched = h.ctx("gt-done").on_issue_closed(&cancel).await.unwrap();
    assert_eq!(dispatched, vec!["gt-task".to_string()]);
}

#[tokio::test]
async fn parked_rig_suppresses_dispatch() {
    let h = harness();
    let cancel = CancellationToken::new();
    h.store.put_issue(Issue::new("gt-conv", IssueStatus::Open).issue_type(IssueType::Convoy));
    h.store.put_issue(Issue::new("gt-done", IssueStatus::Closed));
    h.store.put_issue(open_task("gt-task"));
    h.store.add_edge("gt-conv", DepKind::Tracks, "gt-done");
    h.store.add_edge("gt-conv", DepKind::Tracks, "gt-task");

    let ctx = h.ctx("gt-done").is_rig_parked(|rig| rig == "gastown");
    let dispatched = ctx.on_issue_closed(&cancel).await.unwrap();
    assert!(dispatched.is_empty());
    assert!(h.logged("parked"));
}

#[tokio::test]
async fn external_qualifier_is_stripped_for_routing() {
    let h = harness();
    let cancel = CancellationToken::new();
    h.store.put_issue(Issue::new("gt-conv", IssueStatus::Open).issue_type(IssueType::Convoy));
    h.store.put_issue(Issue::new("gt-done", IssueStatus::Closed));
    h.store.put_issue(open_task("gt-task"));
    h.store.add_edge("gt-conv", DepKind::Tracks, "gt-done");
    h.store.add_edge("gt-conv", DepKind::Tracks, "external:gt:gt-task");

    // The fake store keys deps by raw edge target; seed the refreshed issue
    // under its bare id so the lookup after normalization succeeds.
    let dispatched = h.ctx("gt-done").on_issue_closed(&cancel).await.unwrap();
    assert_eq!(dispatched, vec!["gt-task".to_string()]);
}

#[tokio::test]
async fn dependency_query_failure_fails_open() {
    let h = harness();
    let cancel = CancellationToken::new();
    h.store.put_issue(Issue::new("gt-conv", IssueStatus::Open).issue_type(IssueType::Convoy));
    h.store.put_issue(open_task("gt-task"));

    // Dependents succeed first; then fail every dependency query so both the
    // tracked-item listing and the blocking check go through the fail paths.
    h.store.add_edge("gt-conv", DepKind::Tracks, "gt-done");
    h.store.put_issue(Issue::new("gt-done", IssueStatus::Closed));
    h.store.fail_dep_queries("db locked");

    let dispatched = h.ctx("gt-done").on_issue_closed(&cancel).await.unwrap();
    // Dependents query failed: treated as "no dependents", not an error.
    assert!(dispatched.is_empty());
    assert!(h.logged("treating as none"));
}

#[tokio::test]
async fn missing_store_skips_everything() {
    let h = harness();
    let cancel = CancellationToken::new();
    let logs = Arc::clone(&h.logs);
    let ctx = ConvoyCtx::new(
        Town::new(h.temp.path().join("town")),
        "gt-done",
        stub_dispatcher(h.temp.path()),
    )
    .logger(move |line| logs.lock().push(line.to_string()));

    let dispatched = ctx.on_issue_closed(&cancel).await.unwrap();
    assert!(dispatched.is_empty());
    assert!(h.logged("no store handle"));
}

#[tokio::test]
async fn canceled_token_aborts() {
    let h = harness();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = h.ctx("gt-done").on_issue_closed(&cancel).await.unwrap_err();
    assert!(matches!(err, ConvoyError::Canceled));
}

#[tokio::test]
async fn dispatch_failure_tries_next_candidate() {
    let h = harness();
    let cancel = CancellationToken::new();
    h.store.put_issue(Issue::new("gt-conv", IssueStatus::Open).issue_type(IssueType::Convoy));
    h.store.put_issue(Issue::new("gt-done", IssueStatus::Closed));
    h.store.put_issue(open_task("gt-aaa"));
    h.store.put_issue(open_task("gt-bbb"));
    h.store.add_edge("gt-conv", DepKind::Tracks, "gt-done");
    h.store.add_edge("gt-conv", DepKind::Tracks, "gt-aaa");
    h.store.add_edge("gt-conv", DepKind::Tracks, "gt-bbb");

    // Dispatcher fails sling for gt-aaa only.
    let bin = h.temp.path().join("gt");
    let script = format!(
        "#!/bin/sh\necho \"$@\" >> {}/calls.log\ncase \"$*\" in *gt-aaa*) exit 1;; esac\n",
        h.temp.path().display()
    );
    std::fs::write(&bin, script).unwrap();
    std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();

    let logs = Arc::clone(&h.logs);
    let ctx = ConvoyCtx::new(Town::new(h.temp.path().join("town")), "gt-done", bin)
        .store(Arc::new(h.store.clone()))
        .logger(move |line| logs.lock().push(line.to_string()));

    let dispatched = ctx.on_issue_closed(&cancel).await.unwrap();
    assert_eq!(dispatched, vec!["gt-bbb".to_string()]);
    assert!(h.logged("trying next"));
}
