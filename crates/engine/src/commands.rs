// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Slash-command provisioning.
//!
//! Command bodies are agent-agnostic; only the frontmatter differs per
//! provider. Files land in the provider's command directory inside the
//! agent's work dir and are rewritten on every spawn so template drift never
//! survives a respawn.

use std::path::{Path, PathBuf};

use gt_core::AgentProvider;

/// A provisioned slash command.
pub struct SlashCommand {
    pub name: &'static str,
    pub description: &'static str,
    pub body: &'static str,
}

/// Standing commands every hosted agent receives.
pub const COMMANDS: &[SlashCommand] = &[
    SlashCommand {
        name: "prime",
        description: "Orient in this workspace and report status",
        body: "Read the issue currently assigned to you, inspect the working tree, and \
               summarize: what the issue asks for, what has been done so far, and your next \
               step. If nothing is assigned, say so and stop.\n",
    },
    SlashCommand {
        name: "mail",
        description: "Drain and act on queued messages",
        body: "Check your injection queue for pending mail, decisions, and nudges. Handle \
               each entry in order: answer decisions, acknowledge mail, and fold nudges into \
               your current plan.\n",
    },
    SlashCommand {
        name: "handoff",
        description: "Record progress and declare worktree safety",
        body: "Commit or stash any work in progress, then update your agent record: set your \
               state, and report your worktree cleanup status as one of clean, \
               has_uncommitted, has_stash, or has_unpushed.\n",
    },
];

/// Write all standing commands for the given provider.
///
/// Returns the paths written.
pub fn provision_commands(
    work_dir: &Path,
    provider: AgentProvider,
) -> std::io::Result<Vec<PathBuf>> {
    let dir = provider.commands_dir(work_dir);
    std::fs::create_dir_all(&dir)?;
    let mut written = Vec::with_capacity(COMMANDS.len());
    for command in COMMANDS {
        let path = dir.join(format!("{}.md", command.name));
        std::fs::write(&path, render(provider, command))?;
        written.push(path);
    }
    Ok(written)
}

/// Provider frontmatter + shared body.
fn render(provider: AgentProvider, command: &SlashCommand) -> String {
    match provider {
        AgentProvider::Claude => format!(
            "---\ndescription: {}\n---\n\n{}",
            command.description, command.body
        ),
        AgentProvider::OpenCode => format!(
            "---\ndescription: {}\nagent: build\n---\n\n{}",
            command.description, command.body
        ),
    }
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
