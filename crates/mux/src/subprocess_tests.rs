// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn run_with_timeout_returns_output() {
    let mut cmd = tokio::process::Command::new("echo");
    cmd.arg("hello");
    let output = run_with_timeout(cmd, Duration::from_secs(5), "echo").await.unwrap();
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
}

#[tokio::test]
async fn run_with_timeout_kills_slow_commands() {
    let mut cmd = tokio::process::Command::new("sleep");
    cmd.arg("30");
    let err = run_with_timeout(cmd, Duration::from_millis(50), "sleep").await.unwrap_err();
    assert!(matches!(err, MuxError::Timeout { .. }));
}

#[tokio::test]
async fn run_cancellable_honors_token() {
    let cancel = CancellationToken::new();
    let mut cmd = tokio::process::Command::new("sleep");
    cmd.arg("30");

    let canceler = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceler.cancel();
    });

    let err = run_cancellable(cmd, &cancel, "sleep").await.unwrap_err();
    assert!(matches!(err, MuxError::Canceled));
}

#[tokio::test]
async fn run_cancellable_short_circuits_on_pre_canceled_token() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let cmd = tokio::process::Command::new("echo");
    let err = run_cancellable(cmd, &cancel, "echo").await.unwrap_err();
    assert!(matches!(err, MuxError::Canceled));
}

#[tokio::test]
async fn require_success_maps_failure_to_command_failed() {
    let mut cmd = tokio::process::Command::new("sh");
    cmd.args(["-c", "echo boom >&2; exit 3"]);
    let output = run_with_timeout(cmd, Duration::from_secs(5), "sh").await.unwrap();
    let err = require_success(output, "sh").unwrap_err();
    match err {
        MuxError::CommandFailed { detail, .. } => assert_eq!(detail, "boom"),
        other => panic!("unexpected error: {other:?}"),
    }
}
