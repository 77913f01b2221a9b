// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-tree inspection and teardown.
//!
//! Zombie detection needs to know whether the hosted agent still exists among
//! a session's descendants, and teardown must kill the whole tree before the
//! session is removed.

use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

use crate::error::MuxError;
use crate::subprocess::{run_with_timeout, MUX_TIMEOUT};

/// One row of the process table.
#[derive(Debug, Clone)]
pub struct ProcessEntry {
    pub pid: u32,
    pub ppid: u32,
    pub command: String,
}

/// Check whether a process with the given PID is alive (signal 0).
pub fn is_alive(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    signal::kill(Pid::from_raw(pid), None).is_ok()
}

/// Snapshot the system process table.
pub async fn process_table() -> Result<Vec<ProcessEntry>, MuxError> {
    let mut cmd = tokio::process::Command::new("ps");
    cmd.args(["-eo", "pid=,ppid=,comm="]);
    let output = run_with_timeout(cmd, MUX_TIMEOUT, "ps").await?;
    let stdout = String::from_utf8_lossy(&output.stdout);

    Ok(stdout
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let pid = fields.next()?.parse().ok()?;
            let ppid = fields.next()?.parse().ok()?;
            let command = fields.next()?.to_string();
            Some(ProcessEntry { pid, ppid, command })
        })
        .collect())
}

/// All descendants of `root` (excluding `root` itself), breadth-first.
pub async fn descendants(root: u32) -> Result<Vec<ProcessEntry>, MuxError> {
    let table = process_table().await?;
    let mut found = Vec::new();
    let mut frontier = vec![root];
    while let Some(parent) = frontier.pop() {
        for entry in table.iter().filter(|e| e.ppid == parent) {
            frontier.push(entry.pid);
            found.push(entry.clone());
        }
    }
    Ok(found)
}

/// SIGTERM the tree rooted at `root`, wait `grace`, SIGKILL survivors.
///
/// The root is signalled last so parents do not reap children before the
/// children have seen the TERM.
pub async fn kill_tree(root: u32, grace: Duration) {
    let mut pids: Vec<u32> = match descendants(root).await {
        Ok(entries) => entries.iter().map(|e| e.pid).collect(),
        Err(e) => {
            tracing::debug!(root, error = %e, "descendant walk failed, killing root only");
            Vec::new()
        }
    };
    pids.push(root);

    for pid in &pids {
        send_signal(*pid, Signal::SIGTERM);
    }
    tokio::time::sleep(grace).await;
    for pid in &pids {
        if is_alive(*pid) {
            send_signal(*pid, Signal::SIGKILL);
        }
    }
}

fn send_signal(pid: u32, sig: Signal) {
    let Ok(pid) = i32::try_from(pid) else { return };
    if let Err(e) = signal::kill(Pid::from_raw(pid), sig) {
        tracing::debug!(pid, signal = %sig, error = %e, "signal failed");
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
