// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent addressing.
//!
//! Every agent has a canonical address that derives its actor string (used
//! for issue-store attribution and git authorship), its multiplexer session
//! id, and its role environment. Mayor and deacon are town singletons; all
//! other roles are rig-scoped.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::session::SessionId;

/// Canonical address of an agent in the town.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum AgentAddress {
    Mayor,
    Deacon,
    DeaconBoot,
    Witness { rig: String },
    Refinery { rig: String },
    Polecat { rig: String, name: String },
    Crew { rig: String, name: String },
}

impl AgentAddress {
    /// The `GT_ROLE` value for this address.
    pub fn role(&self) -> &'static str {
        match self {
            Self::Mayor => "mayor",
            Self::Deacon => "deacon",
            Self::DeaconBoot => "deacon-boot",
            Self::Witness { .. } => "witness",
            Self::Refinery { .. } => "refinery",
            Self::Polecat { .. } => "polecat",
            Self::Crew { .. } => "crew",
        }
    }

    /// Rig name for rig-scoped roles.
    pub fn rig(&self) -> Option<&str> {
        match self {
            Self::Mayor | Self::Deacon | Self::DeaconBoot => None,
            Self::Witness { rig } | Self::Refinery { rig } => Some(rig),
            Self::Polecat { rig, .. } | Self::Crew { rig, .. } => Some(rig),
        }
    }

    /// Worker name for named roles (polecat, crew).
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Polecat { name, .. } | Self::Crew { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Actor string used for `BD_ACTOR` and `GIT_AUTHOR_NAME`.
    ///
    /// `{rig}/witness`, `{rig}/refinery`, `{rig}/polecats/{name}`,
    /// `{rig}/crew/{name}`, or the bare singleton role name.
    pub fn actor(&self) -> String {
        match self {
            Self::Mayor => "mayor".to_string(),
            Self::Deacon => "deacon".to_string(),
            Self::DeaconBoot => "deacon-boot".to_string(),
            Self::Witness { rig } => format!("{}/witness", rig),
            Self::Refinery { rig } => format!("{}/refinery", rig),
            Self::Polecat { rig, name } => format!("{}/polecats/{}", rig, name),
            Self::Crew { rig, name } => format!("{}/crew/{}", rig, name),
        }
    }

    /// The multiplexer session id hosting this agent.
    ///
    /// Mayor and deacon are singletons (`gt-mayor`, `gt-deacon`); rig-scoped
    /// agents get `gt-{rig}-{name}`.
    pub fn session_id(&self) -> SessionId {
        let id = match self {
            Self::Mayor => "gt-mayor".to_string(),
            Self::Deacon | Self::DeaconBoot => "gt-deacon".to_string(),
            Self::Witness { rig } => format!("gt-{}-witness", rig),
            Self::Refinery { rig } => format!("gt-{}-refinery", rig),
            Self::Polecat { rig, name } | Self::Crew { rig, name } => {
                format!("gt-{}-{}", rig, name)
            }
        };
        SessionId::new(id)
    }

    /// Which hook template set this role runs with.
    pub fn hook_profile(&self) -> HookProfile {
        match self {
            Self::Mayor | Self::Crew { .. } => HookProfile::Interactive,
            Self::Deacon
            | Self::DeaconBoot
            | Self::Witness { .. }
            | Self::Refinery { .. }
            | Self::Polecat { .. } => HookProfile::Autonomous,
        }
    }
}

impl fmt::Display for AgentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.actor())
    }
}

/// Whether an agent runs unattended or with a human in the loop.
///
/// Drives which hook templates and slash commands are provisioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookProfile {
    Autonomous,
    Interactive,
}

crate::simple_display! {
    HookProfile {
        Autonomous => "autonomous",
        Interactive => "interactive",
    }
}

/// Hosted agent family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentProvider {
    #[default]
    Claude,
    OpenCode,
}

impl AgentProvider {
    /// Resolve a provider override alias. Unknown aliases are `None`.
    pub fn from_alias(alias: &str) -> Option<Self> {
        match alias.trim().to_ascii_lowercase().as_str() {
            "claude" | "claude-code" => Some(Self::Claude),
            "opencode" => Some(Self::OpenCode),
            _ => None,
        }
    }

    /// Binary invoked inside the session.
    pub fn binary(&self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::OpenCode => "opencode",
        }
    }

    /// Directory holding slash-command templates, relative to the work dir.
    pub fn commands_dir(&self, work_dir: &Path) -> PathBuf {
        match self {
            Self::Claude => work_dir.join(".claude").join("commands"),
            Self::OpenCode => work_dir.join(".opencode").join("command"),
        }
    }

    /// Directory holding the materialized settings file.
    pub fn settings_dir(&self, work_dir: &Path) -> PathBuf {
        match self {
            Self::Claude => work_dir.join(".claude"),
            Self::OpenCode => work_dir.join(".opencode"),
        }
    }

    /// Post-readiness pause before the first injected text is safe to send.
    pub fn ready_delay(&self) -> Duration {
        match self {
            Self::Claude => Duration::from_secs(3),
            Self::OpenCode => Duration::from_secs(5),
        }
    }

    /// Process names that count as "the hosted agent is alive".
    pub fn process_names(&self) -> &'static [&'static str] {
        match self {
            Self::Claude => &["claude", "node"],
            Self::OpenCode => &["opencode", "bun", "node"],
        }
    }
}

crate::simple_display! {
    AgentProvider {
        Claude => "claude",
        OpenCode => "opencode",
    }
}

#[cfg(test)]
#[path = "address_tests.rs"]
mod tests;
