// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Governance gate: optional choke point consulted before promotion
//! actions.
//!
//! State lives under `mayor/governance/`. A freeze is committed to
//! `system_mode.json` before any artifact is written, so a crash can leave a
//! freeze without its artifact but never an artifact without its freeze.
//! Every freeze and unfreeze is journaled to an append-only file whose
//! entries chain a SHA-256 hash of the previous entry for tamper evidence.

use fs2::FileExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;

use gt_core::{base36, Clock, SystemClock, Town};

/// Minimum anchor health score required to unfreeze.
const DEFAULT_MIN_HEALTH: f64 = 0.8;

#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("promotions are frozen: {reason}")]
    Frozen { reason: String },
    #[error("system is not frozen")]
    NotFrozen,
    #[error("freeze artifact not found: {0}")]
    UnknownArtifact(String),
    #[error("unfreeze requires an external attestation")]
    MissingAttestation,
    #[error("anchor health snapshot unavailable")]
    HealthUnavailable,
    #[error("anchor health {score} below required {min}")]
    HealthBelowThreshold { score: f64, min: f64 },
    #[error("governance io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("governance state error: {0}")]
    State(#[from] serde_json::Error),
}

/// Town-wide operating mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemMode {
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub updated_at_ms: u64,
}

impl SystemMode {
    pub fn is_frozen(&self) -> bool {
        self.mode == "anchor_frozen"
    }
}

/// Record of one anchor freeze.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreezeArtifact {
    pub id: String,
    pub reason: String,
    pub frozen_at_ms: u64,
}

/// Health snapshot written by the anchor monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorHealth {
    pub score: f64,
    #[serde(default)]
    pub checked_at_ms: u64,
}

/// One hash-chained journal line.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct JournalEntry {
    action: String,
    artifact_id: String,
    #[serde(default)]
    detail: String,
    at_ms: u64,
    prev: String,
    hash: String,
}

/// The gate itself: in-process mutex plus an advisory file lock around all
/// state writes.
pub struct GovernanceGate<C: Clock = SystemClock> {
    town: Town,
    clock: C,
    min_health: f64,
    lock: Mutex<()>,
}

impl GovernanceGate<SystemClock> {
    pub fn new(town: Town) -> Self {
        Self { town, clock: SystemClock, min_health: DEFAULT_MIN_HEALTH, lock: Mutex::new(()) }
    }
}

impl<C: Clock> GovernanceGate<C> {
    pub fn with_clock(town: Town, clock: C) -> Self {
        Self { town, clock, min_health: DEFAULT_MIN_HEALTH, lock: Mutex::new(()) }
    }

    pub fn with_min_health(mut self, min_health: f64) -> Self {
        self.min_health = min_health;
        self
    }

    fn dir(&self) -> PathBuf {
        self.town.governance_dir()
    }

    fn mode_path(&self) -> PathBuf {
        self.dir().join("system_mode.json")
    }

    fn health_path(&self) -> PathBuf {
        self.dir().join("anchor_health.json")
    }

    fn artifacts_dir(&self) -> PathBuf {
        self.dir().join("anchor_freeze_artifacts")
    }

    fn journal_path(&self) -> PathBuf {
        self.dir().join("anchor_freeze_artifacts.jsonl")
    }

    /// Current mode; a missing or corrupt file reads as `normal`.
    pub fn current_mode(&self) -> SystemMode {
        std::fs::read_to_string(self.mode_path())
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or(SystemMode {
                mode: "normal".to_string(),
                reason: None,
                updated_at_ms: 0,
            })
    }

    /// Gate a promotion action on the current mode.
    pub fn check_promotion_allowed(&self) -> Result<(), GovernanceError> {
        let mode = self.current_mode();
        if mode.is_frozen() {
            return Err(GovernanceError::Frozen {
                reason: mode.reason.unwrap_or_else(|| "anchor frozen".to_string()),
            });
        }
        Ok(())
    }

    /// Freeze promotions.
    ///
    /// The mode flips first; the artifact write retries on id collisions and
    /// is best-effort beyond that. A freeze without its artifact is safe,
    /// the reverse is not.
    pub fn freeze_anchor(&self, reason: &str) -> Result<FreezeArtifact, GovernanceError> {
        let _guard = self.lock.lock();
        let _file_lock = self.file_lock()?;
        let now = self.clock.epoch_ms();

        self.write_mode(&SystemMode {
            mode: "anchor_frozen".to_string(),
            reason: Some(reason.to_string()),
            updated_at_ms: now,
        })?;

        std::fs::create_dir_all(self.artifacts_dir())?;
        let mut artifact = FreezeArtifact {
            id: format!("frz-{}", base36(now)),
            reason: reason.to_string(),
            frozen_at_ms: now,
        };
        for attempt in 0.. {
            let path = self.artifacts_dir().join(format!("{}.json", artifact.id));
            if path.exists() {
                artifact.id = format!("frz-{}-{}", base36(now), attempt + 1);
                continue;
            }
            if let Err(e) = std::fs::write(&path, serde_json::to_string_pretty(&artifact)?) {
                tracing::warn!(error = %e, "freeze artifact write failed; freeze stands");
            }
            break;
        }

        self.journal_append("freeze", &artifact.id, reason, now)?;
        tracing::info!(artifact = %artifact.id, %reason, "anchor frozen");
        Ok(artifact)
    }

    /// Unfreeze promotions. Requires the freeze artifact to exist, a
    /// non-empty external attestation, and a passing health revalidation.
    pub fn unfreeze_anchor(
        &self,
        artifact_id: &str,
        attestation: &str,
    ) -> Result<(), GovernanceError> {
        let _guard = self.lock.lock();
        let _file_lock = self.file_lock()?;

        if !self.current_mode().is_frozen() {
            return Err(GovernanceError::NotFrozen);
        }
        if attestation.trim().is_empty() {
            return Err(GovernanceError::MissingAttestation);
        }
        let artifact_path = self.artifacts_dir().join(format!("{}.json", artifact_id));
        if !artifact_path.is_file() {
            return Err(GovernanceError::UnknownArtifact(artifact_id.to_string()));
        }

        // Health revalidation is mandatory, never cached.
        let health: AnchorHealth = std::fs::read_to_string(self.health_path())
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .ok_or(GovernanceError::HealthUnavailable)?;
        if health.score < self.min_health {
            return Err(GovernanceError::HealthBelowThreshold {
                score: health.score,
                min: self.min_health,
            });
        }

        let now = self.clock.epoch_ms();
        self.write_mode(&SystemMode {
            mode: "normal".to_string(),
            reason: None,
            updated_at_ms: now,
        })?;
        self.journal_append("unfreeze", artifact_id, attestation, now)?;
        tracing::info!(artifact = artifact_id, "anchor unfrozen");
        Ok(())
    }

    /// Verify the journal's hash chain end to end.
    pub fn verify_journal(&self) -> Result<bool, GovernanceError> {
        let raw = match std::fs::read_to_string(self.journal_path()) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(e.into()),
        };
        let mut prev = String::new();
        for line in raw.lines().filter(|l| !l.trim().is_empty()) {
            let entry: JournalEntry = serde_json::from_str(line)?;
            if entry.prev != prev
                || entry.hash
                    != chain_hash(
                        &entry.prev,
                        &entry.action,
                        &entry.artifact_id,
                        &entry.detail,
                        entry.at_ms,
                    )
            {
                return Ok(false);
            }
            prev = entry.hash;
        }
        Ok(true)
    }

    fn write_mode(&self, mode: &SystemMode) -> Result<(), GovernanceError> {
        std::fs::create_dir_all(self.dir())?;
        let path = self.mode_path();
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(mode)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn journal_append(
        &self,
        action: &str,
        artifact_id: &str,
        detail: &str,
        at_ms: u64,
    ) -> Result<(), GovernanceError> {
        let prev = last_hash(&self.journal_path())?;
        let entry = JournalEntry {
            action: action.to_string(),
            artifact_id: artifact_id.to_string(),
            detail: detail.to_string(),
            at_ms,
            hash: chain_hash(&prev, action, artifact_id, detail, at_ms),
            prev,
        };
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');
        let mut file =
            OpenOptions::new().create(true).append(true).open(self.journal_path())?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    fn file_lock(&self) -> Result<std::fs::File, GovernanceError> {
        std::fs::create_dir_all(self.dir())?;
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(self.dir().join(".lock"))?;
        if let Err(e) = file.lock_exclusive() {
            tracing::debug!(error = %e, "governance flock unavailable");
        }
        Ok(file)
    }
}

fn chain_hash(prev: &str, action: &str, artifact_id: &str, detail: &str, at_ms: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev.as_bytes());
    hasher.update(action.as_bytes());
    hasher.update(artifact_id.as_bytes());
    hasher.update(detail.as_bytes());
    hasher.update(at_ms.to_le_bytes());
    format!("{:x}", hasher.finalize())
}

fn last_hash(journal: &std::path::Path) -> Result<String, GovernanceError> {
    let raw = match std::fs::read_to_string(journal) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(String::new()),
        Err(e) => return Err(e.into()),
    };
    Ok(raw
        .lines()
        .filter(|l| !l.trim().is_empty())
        .next_back()
        .and_then(|line| serde_json::from_str::<JournalEntry>(line).ok())
        .map(|entry| entry.hash)
        .unwrap_or_default())
}

#[cfg(test)]
#[path = "governance_tests.rs"]
mod tests;
