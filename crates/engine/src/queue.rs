// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk JSONL message queues.
//!
//! Two instances of the same shape: the per-session injection queue under the
//! worker's own directory, and the town-scoped nudge queue addressable by
//! session name so any agent can queue for any peer without knowing the
//! recipient's work directory.
//!
//! Writers within one session are sequential (hooks fire in order); the
//! advisory flock exists to make `drain` atomic against a concurrent
//! `enqueue`. Where flock is unsupported the lock degrades to a no-op, which
//! the single-writer discipline makes acceptable.

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use gt_core::{Clock, SessionId, SystemClock, Town};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("queue encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Kind of queued message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Mail,
    Decision,
    Nudge,
}

gt_core::simple_display! {
    EntryKind {
        Mail => "mail",
        Decision => "decision",
        Nudge => "nudge",
    }
}

/// One queued message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub content: String,
    pub timestamp: u64,
}

/// Append-only JSONL queue with flock-guarded drain.
#[derive(Debug, Clone)]
pub struct JsonlQueue<C: Clock = SystemClock> {
    path: PathBuf,
    clock: C,
}

impl JsonlQueue<SystemClock> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), clock: SystemClock }
    }

    /// Injection queue for a session: `{work_dir}/.runtime/inject-queue/{id}.jsonl`.
    pub fn inject(work_dir: &Path, session_id: &SessionId) -> Self {
        Self::new(
            work_dir
                .join(".runtime")
                .join("inject-queue")
                .join(format!("{}.jsonl", session_id)),
        )
    }

    /// Town-scoped nudge queue for a named peer.
    pub fn nudge(town: &Town, session_name: &str) -> Self {
        Self::new(town.nudge_queue_dir().join(format!("{}.jsonl", session_name)))
    }
}

impl<C: Clock> JsonlQueue<C> {
    pub fn with_clock(path: impl Into<PathBuf>, clock: C) -> Self {
        Self { path: path.into(), clock }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry under an exclusive lock.
    pub fn enqueue(&self, kind: EntryKind, content: &str) -> Result<(), QueueError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let entry = QueueEntry {
            kind,
            content: content.to_string(),
            timestamp: self.clock.epoch_ms(),
        };
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        lock_exclusive(&file);
        let mut file = file;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Read all entries and delete the file, atomically with respect to
    /// concurrent enqueues. A missing file is an empty drain; a corrupt line
    /// is skipped, not fatal.
    pub fn drain(&self) -> Result<Vec<QueueEntry>, QueueError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        lock_exclusive(&file);
        let entries = read_entries(&file)?;
        std::fs::remove_file(&self.path)?;
        Ok(entries)
    }

    /// Read entries without consuming them.
    pub fn peek(&self) -> Result<Vec<QueueEntry>, QueueError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if let Err(e) = file.lock_shared() {
            tracing::debug!(path = %self.path.display(), error = %e, "shared flock unavailable");
        }
        read_entries(&file)
    }

    pub fn count(&self) -> Result<usize, QueueError> {
        Ok(self.peek()?.len())
    }

    /// Delete all pending entries.
    pub fn clear(&self) -> Result<(), QueueError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        lock_exclusive(&file);
        std::fs::remove_file(&self.path)?;
        Ok(())
    }
}

fn lock_exclusive(file: &File) {
    if let Err(e) = file.lock_exclusive() {
        tracing::debug!(error = %e, "exclusive flock unavailable, proceeding unlocked");
    }
}

fn read_entries(mut file: &File) -> Result<Vec<QueueEntry>, QueueError> {
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| match serde_json::from_str(l) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "skipping corrupt queue line");
                None
            }
        })
        .collect())
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
