// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent environment composition.
//!
//! The environment is rendered as a deterministic `export K=V; …` prefix
//! ahead of the agent invocation (keys sorted, values single-quoted) so
//! two spawns of the same spec produce byte-identical session commands.

use std::collections::BTreeMap;
use std::path::Path;

use gt_core::AgentAddress;

/// Optional environment inputs beyond the address itself.
#[derive(Debug, Default)]
pub struct EnvOptions<'a> {
    /// Town root, exported as `GT_ROOT`.
    pub root: Option<&'a Path>,
    /// Issue database directory, exported as `BEADS_DIR`.
    pub beads_dir: Option<&'a Path>,
    /// Config path selector, exported as `CLAUDE_CONFIG_DIR`.
    pub config_dir: Option<&'a Path>,
    /// Export `BEADS_NO_DAEMON=1`.
    pub no_daemon: bool,
}

/// Compose the full environment for an agent, sorted by key.
pub fn agent_env(address: &AgentAddress, opts: &EnvOptions<'_>) -> Vec<(String, String)> {
    let mut env = BTreeMap::new();
    env.insert("GT_ROLE".to_string(), address.role().to_string());

    if let Some(rig) = address.rig() {
        env.insert("GT_RIG".to_string(), rig.to_string());
    }
    if let (Some(rig), Some(name)) = (address.rig(), address.name()) {
        let var = match address {
            AgentAddress::Crew { .. } => "GT_CREW",
            _ => "GT_POLECAT",
        };
        env.insert(var.to_string(), name.to_string());
        env.insert("BEADS_AGENT_NAME".to_string(), format!("{}/{}", rig, name));
    }

    let actor = address.actor();
    env.insert("BD_ACTOR".to_string(), actor.clone());
    env.insert("GIT_AUTHOR_NAME".to_string(), actor);

    if let Some(root) = opts.root {
        env.insert("GT_ROOT".to_string(), root.display().to_string());
    }
    if let Some(beads_dir) = opts.beads_dir {
        env.insert("BEADS_DIR".to_string(), beads_dir.display().to_string());
    }
    if let Some(config_dir) = opts.config_dir {
        env.insert("CLAUDE_CONFIG_DIR".to_string(), config_dir.display().to_string());
    }
    if opts.no_daemon {
        env.insert("BEADS_NO_DAEMON".to_string(), "1".to_string());
    }
    // Concurrent bd invocations must never race to start a daemon.
    env.insert("BEADS_AUTO_START_DAEMON".to_string(), "false".to_string());

    env.into_iter().collect()
}

/// Render `export K='V'; export K2='V2'; ` for a sorted environment.
pub fn export_prefix(env: &[(String, String)]) -> String {
    let mut out = String::new();
    for (key, value) in env {
        out.push_str("export ");
        out.push_str(key);
        out.push('=');
        out.push_str(&shell_quote(value));
        out.push_str("; ");
    }
    out
}

/// Single-quote a string for POSIX shells.
pub fn shell_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        if ch == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(ch);
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
