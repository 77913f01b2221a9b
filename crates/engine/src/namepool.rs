// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded reusable name allocator, one per rig.
//!
//! The in-use set is always rebuilt from the filesystem (worker directories
//! are the source of truth); only the reserved set, the overflow counter, and
//! the pool bound persist across restarts. A name is available iff it is in
//! neither set. Overflow names are minted `{rig}-{n}` and never reused.
//!
//! Reservations bridge the gap between allocation and directory creation: a
//! crash in that window leaks nothing because the caller clears the
//! reservation once the directory exists and `reconcile` drops reservations
//! whose directory has appeared.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use thiserror::Error;

use gt_core::Rig;

/// Default bound on themed allocations.
const DEFAULT_MAX_SIZE: usize = 50;

/// Built-in name themes.
const WASTELAND: &[&str] = &[
    "toast", "dag", "cheedo", "capable", "fragile", "nux", "slit", "ace", "morsov", "rictus",
    "valkyrie", "keeper", "glory", "scrotus", "chumbucket", "coma", "organic", "doof", "savannah",
    "gilly",
];
const FORGE: &[&str] = &[
    "anvil", "bellows", "crucible", "ember", "flux", "ingot", "quench", "slag", "temper", "tongs",
];

/// Resolve a built-in theme by name.
pub fn theme_names(theme: &str) -> Option<&'static [&'static str]> {
    match theme {
        "wasteland" => Some(WASTELAND),
        "forge" => Some(FORGE),
        _ => None,
    }
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("name pool io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("name pool state error: {0}")]
    State(#[from] serde_json::Error),
}

/// Persisted slice of the pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PoolState {
    #[serde(default)]
    reserved: BTreeSet<String>,
    #[serde(default)]
    overflow_counter: u64,
    #[serde(default = "default_max_size")]
    max_size: usize,
}

fn default_max_size() -> usize {
    DEFAULT_MAX_SIZE
}

impl Default for PoolState {
    fn default() -> Self {
        Self { reserved: BTreeSet::new(), overflow_counter: 0, max_size: DEFAULT_MAX_SIZE }
    }
}

struct PoolInner {
    state: PoolState,
    in_use: BTreeSet<String>,
}

/// Per-rig name allocator.
pub struct NamePool {
    rig: Rig,
    theme: Vec<String>,
    state_path: PathBuf,
    inner: Mutex<PoolInner>,
}

impl NamePool {
    /// Load pool state for a rig with the default theme.
    pub fn load(rig: Rig) -> Result<Self, PoolError> {
        Self::load_with_theme(rig, WASTELAND.iter().map(|s| s.to_string()).collect())
    }

    /// Load pool state with a custom ordered name list.
    pub fn load_with_theme(rig: Rig, theme: Vec<String>) -> Result<Self, PoolError> {
        let state_path = rig.namepool_state_path();
        let state = match std::fs::read_to_string(&state_path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "corrupt name pool state, starting fresh");
                PoolState::default()
            }),
            Err(_) => PoolState::default(),
        };
        let in_use: BTreeSet<String> = rig.list_polecat_names().into_iter().collect();
        Ok(Self { rig, theme, state_path, inner: Mutex::new(PoolInner { state, in_use }) })
    }

    pub fn with_max_size(self, max_size: usize) -> Self {
        self.inner.lock().state.max_size = max_size;
        self
    }

    /// Allocate the next available name.
    ///
    /// The in-use set is reconciled from disk first, so a directory created
    /// out-of-band occupies its name. When the themed list is exhausted an
    /// overflow name is minted.
    pub fn allocate(&self) -> Result<String, PoolError> {
        let on_disk: BTreeSet<String> = self.rig.list_polecat_names().into_iter().collect();
        let mut inner = self.inner.lock();
        inner.in_use = on_disk;

        let max = inner.state.max_size;
        let candidate = self
            .theme
            .iter()
            .take(max)
            .find(|name| !inner.in_use.contains(*name) && !inner.state.reserved.contains(*name))
            .cloned();

        let name = match candidate {
            Some(name) => {
                inner.in_use.insert(name.clone());
                inner.state.reserved.insert(name.clone());
                name
            }
            None => {
                let name = format!("{}-{}", self.rig.name(), inner.state.overflow_counter);
                inner.state.overflow_counter += 1;
                name
            }
        };
        self.persist(&inner.state)?;
        Ok(name)
    }

    /// Return a themed name to the pool. Overflow names are ignored.
    pub fn release(&self, name: &str) -> Result<(), PoolError> {
        if !self.theme.iter().any(|n| n == name) {
            return Ok(());
        }
        let mut inner = self.inner.lock();
        inner.in_use.remove(name);
        inner.state.reserved.remove(name);
        self.persist(&inner.state)
    }

    /// Drop a reservation once the worker directory exists on disk.
    pub fn clear_reservation(&self, name: &str) -> Result<(), PoolError> {
        let mut inner = self.inner.lock();
        if inner.state.reserved.remove(name) {
            self.persist(&inner.state)?;
        }
        Ok(())
    }

    /// Rebuild the in-use set and drop reservations whose directory now
    /// exists.
    pub fn reconcile(&self, worker_names: &[String]) -> Result<(), PoolError> {
        let mut inner = self.inner.lock();
        inner.in_use = worker_names.iter().cloned().collect();
        let mut changed = false;
        for name in worker_names {
            changed |= inner.state.reserved.remove(name);
        }
        if changed {
            self.persist(&inner.state)?;
        }
        Ok(())
    }

    pub fn reserved(&self) -> Vec<String> {
        self.inner.lock().state.reserved.iter().cloned().collect()
    }

    /// Atomic state write: `.tmp` sibling then rename over.
    fn persist(&self, state: &PoolState) -> Result<(), PoolError> {
        if let Some(parent) = self.state_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.state_path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(state)?)?;
        std::fs::rename(&tmp, &self.state_path)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "namepool_tests.rs"]
mod tests;
