// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Town root discovery and issue-id routing.
//!
//! A town is the root workspace: it holds one or more rigs, the town-scoped
//! nudge queue, governance state, and the routing table that maps issue-id
//! prefixes to rig directories.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::rig::Rig;

/// Root workspace containing rigs and town-scoped state.
#[derive(Debug, Clone)]
pub struct Town {
    root: PathBuf,
}

impl Town {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Walk up from `start` to the nearest directory that looks like a town
    /// root (has `.beads/routes.jsonl` or a `mayor/` directory).
    pub fn discover(start: &Path) -> Option<Self> {
        let mut dir = Some(start);
        while let Some(d) = dir {
            if d.join(".beads").join("routes.jsonl").is_file() || d.join("mayor").is_dir() {
                return Some(Self::new(d));
            }
            dir = d.parent();
        }
        None
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn rig(&self, name: impl Into<String>) -> Rig {
        Rig::new(self.root.clone(), name)
    }

    /// `{town}/.beads/routes.jsonl`
    pub fn routes_path(&self) -> PathBuf {
        self.root.join(".beads").join("routes.jsonl")
    }

    /// `{town}/.runtime/nudge-queue/`, addressable by session name.
    pub fn nudge_queue_dir(&self) -> PathBuf {
        self.root.join(".runtime").join("nudge-queue")
    }

    /// `{town}/mayor/governance/`
    pub fn governance_dir(&self) -> PathBuf {
        self.root.join("mayor").join("governance")
    }

    /// Load the routing table. A missing file yields an empty table.
    pub fn load_routes(&self) -> RouteTable {
        match std::fs::read_to_string(self.routes_path()) {
            Ok(content) => RouteTable::from_jsonl(&content),
            Err(_) => RouteTable::default(),
        }
    }
}

/// One routing entry: issue-id prefix to rig path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub prefix: String,
    pub path: String,
}

impl Route {
    /// Final component of the route path, i.e. the rig name.
    pub fn rig_name(&self) -> &str {
        self.path.trim_end_matches('/').rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Prefix routing table parsed from `routes.jsonl`.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Parse one JSON object per line; corrupt lines are skipped.
    pub fn from_jsonl(content: &str) -> Self {
        let routes = content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| serde_json::from_str::<Route>(l).ok())
            .collect();
        Self { routes }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Resolve an issue id to its route by longest matching prefix.
    ///
    /// External qualifiers (`external:{prefix}:{id}`) are stripped first.
    pub fn resolve(&self, issue_id: &str) -> Option<&Route> {
        let id = normalize_id(issue_id);
        self.routes
            .iter()
            .filter(|r| !r.prefix.is_empty() && id.starts_with(&r.prefix))
            .max_by_key(|r| r.prefix.len())
    }

    /// Resolve an issue id to the owning rig name.
    pub fn rig_for(&self, issue_id: &str) -> Option<&str> {
        self.resolve(issue_id).map(Route::rig_name)
    }
}

/// Strip an `external:{prefix}:` qualifier from an issue id, if present.
pub fn normalize_id(id: &str) -> &str {
    if let Some(rest) = id.strip_prefix("external:") {
        match rest.split_once(':') {
            Some((_, bare)) if !bare.is_empty() => bare,
            _ => rest,
        }
    } else {
        id
    }
}

#[cfg(test)]
#[path = "town_tests.rs"]
mod tests;
