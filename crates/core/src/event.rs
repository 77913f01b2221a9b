// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Decision-lifecycle events carried on the in-process bus.

use serde::{Deserialize, Serialize};

/// Lifecycle transitions of decision items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DecisionEvent {
    #[serde(rename = "decision_created")]
    Created { issue_id: String },
    #[serde(rename = "decision_resolved")]
    Resolved { issue_id: String },
    #[serde(rename = "decision_canceled")]
    Canceled { issue_id: String },
}

impl DecisionEvent {
    pub fn issue_id(&self) -> &str {
        match self {
            Self::Created { issue_id }
            | Self::Resolved { issue_id }
            | Self::Canceled { issue_id } => issue_id,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
