// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gt_core::{AgentAddress, FakeClock, Town};
use gt_mux::{FakeMuxDriver, FakeSandbox, MuxDriver, SandboxCall};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::session::{Beacon, SessionConfig, SessionError, SessionManager, WaitPolicy};

fn fast_config() -> SessionConfig {
    SessionConfig {
        ready_timeout: Duration::from_millis(50),
        remote_ready_wait: Duration::ZERO,
        shutdown_pause: Duration::ZERO,
        ready_delay_override: Some(Duration::ZERO),
    }
}

struct Harness {
    mux: FakeMuxDriver,
    sandbox: FakeSandbox,
    manager: SessionManager<FakeClock>,
    _temp: tempfile::TempDir,
    town_root: PathBuf,
}

fn harness() -> Harness {
    let temp = tempfile::tempdir().unwrap();
    let town_root = temp.path().to_path_buf();
    std::fs::create_dir_all(town_root.join(".beads")).unwrap();
    std::fs::write(
        town_root.join(".beads").join("routes.jsonl"),
        format!(
            "{}\n",
            serde_json::json!({"prefix": "gt-", "path": town_root.join("demo").display().to_string()})
        ),
    )
    .unwrap();

    let mux = FakeMuxDriver::new();
    let sandbox = FakeSandbox::new();
    let manager = SessionManager::with_clock(
        Arc::new(mux.clone()),
        Arc::new(sandbox.clone()),
        Town::new(&town_root),
        FakeClock::new(),
    )
    .with_config(fast_config());
    Harness { mux, sandbox, manager, _temp: temp, town_root }
}

fn spec(h: &Harness) -> SessionSpec {
    let address = AgentAddress::Polecat { rig: "demo".into(), name: "toast".into() };
    SessionSpec::new(address, h.town_root.join("demo/polecats/toast"))
}

#[tokio::test]
async fn start_composes_sorted_export_prefix_and_binary() {
    let h = harness();
    let info = h.manager.start(&spec(&h)).await.unwrap();
    assert!(info.running);

    let id = SessionId::new("gt-demo-toast");
    let command = h.mux.session_command(&id).unwrap();
    assert!(command.starts_with("export BD_ACTOR='demo/polecats/toast'; "));
    assert!(command.contains("export GT_ROLE='polecat'; "));
    assert!(command.contains("export BEADS_AUTO_START_DAEMON='false'; "));
    assert!(command.ends_with("claude"));

    // Environment keys appear in sorted order inside the prefix.
    let role_pos = command.find("GT_ROLE").unwrap();
    let rig_pos = command.find("GT_RIG").unwrap();
    assert!(rig_pos < role_pos);
}

#[tokio::test]
async fn start_provisions_work_dir_and_commands() {
    let h = harness();
    h.manager.start(&spec(&h)).await.unwrap();

    let work_dir = h.town_root.join("demo/polecats/toast");
    assert!(work_dir.is_dir());
    assert!(work_dir.join(".claude/commands/prime.md").is_file());
}

#[tokio::test]
async fn start_materializes_settings_layers() {
    let h = harness();
    let spec = spec(&h).settings_layers(vec![
        r#"{"model":"sonnet"}"#.to_string(),
        r#"{"model":"opus"}"#.to_string(),
    ]);
    h.manager.start(&spec).await.unwrap();

    let settings = std::fs::read_to_string(
        h.town_root.join("demo/polecats/toast/.claude/settings.json"),
    )
    .unwrap();
    assert!(settings.contains("\"opus\""));
}

#[tokio::test]
async fn settings_parse_error_is_fatal_before_create() {
    let h = harness();
    let spec = spec(&h).settings_layers(vec!["{broken".to_string()]);
    let err = h.manager.start(&spec).await.unwrap_err();
    assert!(matches!(err, SessionError::Settings(_)));
    assert!(!h.mux.has_session(&SessionId::new("gt-demo-toast")).await.unwrap());
}

#[tokio::test]
async fn live_session_blocks_start() {
    let h = harness();
    let id = SessionId::new("gt-demo-toast");
    h.mux.seed_session(&id, true);

    let err = h.manager.start(&spec(&h)).await.unwrap_err();
    assert!(matches!(err, SessionError::AlreadyRunning(_)));
    assert_eq!(h.mux.kill_count(&id), 0);
}

#[tokio::test]
async fn zombie_session_is_reaped_before_start() {
    let h = harness();
    let id = SessionId::new("gt-demo-toast");
    h.mux.seed_session(&id, false);

    h.manager.start(&spec(&h)).await.unwrap();
    assert_eq!(h.mux.kill_count(&id), 1);
    assert!(h.mux.has_session(&id).await.unwrap());
    assert!(h.mux.session_command(&id).is_some());
}

#[tokio::test]
async fn fatal_wait_policy_kills_session_on_timeout() {
    let h = harness();
    h.mux.set_wait_result(false);
    let spec = spec(&h).wait(WaitPolicy::FatalOnTimeout);

    let err = h.manager.start(&spec).await.unwrap_err();
    assert!(matches!(err, SessionError::ReadyTimeout(_)));
    assert!(!h.mux.has_session(&SessionId::new("gt-demo-toast")).await.unwrap());
}

#[tokio::test]
async fn best_effort_wait_continues_on_timeout() {
    let h = harness();
    h.mux.set_wait_result(false);
    let spec = spec(&h).wait(WaitPolicy::BestEffort);

    h.manager.start(&spec).await.unwrap();
    assert!(h.mux.has_session(&SessionId::new("gt-demo-toast")).await.unwrap());
}

#[tokio::test]
async fn propulsion_nudge_is_sent_after_start() {
    let h = harness();
    h.manager.start(&spec(&h)).await.unwrap();

    let injected = h.mux.injected(&SessionId::new("gt-demo-toast"));
    assert_eq!(injected.last().map(String::as_str), Some(PROPULSION_NUDGE));
}

#[tokio::test]
async fn accept_permissions_sends_dismissal_before_nudge() {
    let h = harness();
    let spec = spec(&h).accept_permissions(true);
    h.manager.start(&spec).await.unwrap();

    let injected = h.mux.injected(&SessionId::new("gt-demo-toast"));
    assert_eq!(injected.first().map(String::as_str), Some("2"));
    assert_eq!(injected.last().map(String::as_str), Some(PROPULSION_NUDGE));
}

#[tokio::test]
async fn beacon_becomes_quoted_command_argument() {
    let h = harness();
    let spec = spec(&h).beacon(Beacon {
        recipient: "demo/polecats/toast".to_string(),
        sender: "mayor".to_string(),
        topic: "it's urgent".to_string(),
        issue: None,
    });
    h.manager.start(&spec).await.unwrap();

    let command = h.mux.session_command(&SessionId::new("gt-demo-toast")).unwrap();
    assert!(command.contains("claude 'Mail for demo/polecats/toast from mayor: it'\\''s urgent'"));
}

#[tokio::test]
async fn environment_is_set_on_session_handle() {
    let h = harness();
    h.manager.start(&spec(&h)).await.unwrap();

    let env = h.mux.session_env(&SessionId::new("gt-demo-toast"));
    assert!(env.iter().any(|(k, v)| k == "GT_POLECAT" && v == "toast"));
}

#[tokio::test]
async fn remote_start_creates_syncs_and_persists() {
    let h = harness();
    let spec = spec(&h).backend(gt_core::SessionBackend::Remote);
    let info = h.manager.start(&spec).await.unwrap();
    assert_eq!(info.metadata.get("sandbox").map(String::as_str), Some("sb-1"));

    let calls = h.sandbox.calls();
    assert!(matches!(calls[0], SandboxCall::Create { .. }));
    assert!(matches!(calls[1], SandboxCall::SyncUp { .. }));
    assert!(matches!(calls[2], SandboxCall::StartCommand { .. }));
    // Initial prompt flows into the sandbox PTY.
    assert!(calls.iter().any(|c| matches!(c, SandboxCall::SendInput { text, .. } if text == PROPULSION_NUDGE)));

    let record_dir = h.town_root.join("demo/.runtime/daytona-sessions");
    assert!(record_dir.join("toast.json").is_file());
}

#[tokio::test]
async fn remote_start_twice_is_already_running() {
    let h = harness();
    let spec = spec(&h).backend(gt_core::SessionBackend::Remote);
    h.manager.start(&spec).await.unwrap();
    let err = h.manager.start(&spec).await.unwrap_err();
    assert!(matches!(err, SessionError::AlreadyRunning(_)));
}

#[tokio::test]
async fn remote_stop_syncs_down_destroys_and_forgets() {
    let h = harness();
    let spec = spec(&h).backend(gt_core::SessionBackend::Remote);
    h.manager.start(&spec).await.unwrap();

    let id = SessionId::new("gt-demo-toast");
    h.manager.stop(&id, false).await.unwrap();

    let calls = h.sandbox.calls();
    assert!(calls.iter().any(|c| matches!(c, SandboxCall::SyncDown { .. })));
    assert!(calls.iter().any(|c| matches!(c, SandboxCall::Destroy { .. })));
    assert!(!h.town_root.join("demo/.runtime/daytona-sessions/toast.json").exists());
}

#[tokio::test]
async fn remote_beacon_is_first_input() {
    let h = harness();
    let spec = spec(&h)
        .backend(gt_core::SessionBackend::Remote)
        .beacon(Beacon {
            recipient: "demo/polecats/toast".to_string(),
            sender: "mayor".to_string(),
            topic: "start here".to_string(),
            issue: None,
        });
    h.manager.start(&spec).await.unwrap();

    let inputs: Vec<String> = h
        .sandbox
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            SandboxCall::SendInput { text, .. } => Some(text),
            _ => None,
        })
        .collect();
    assert_eq!(inputs, vec!["Mail for demo/polecats/toast from mayor: start here".to_string()]);
}
