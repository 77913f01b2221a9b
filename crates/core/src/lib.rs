// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gt-core: shared types and path algebra for the Gas Town orchestration core
//!
//! Everything in this crate is pure: town/rig directory layout, agent
//! addressing, the issue model, agent beads, branch naming, and the clock
//! abstraction. Nothing here touches the network or spawns processes.

pub mod macros;

pub mod address;
pub mod bead;
pub mod branch;
pub mod clock;
pub mod event;
pub mod issue;
pub mod rig;
pub mod session;
pub mod town;

pub use address::{AgentAddress, AgentProvider, HookProfile};
pub use bead::{AgentBead, BeadState, CleanupStatus};
pub use branch::{base36, BranchTemplate, BranchTemplateError};
pub use clock::{Clock, FakeClock, SystemClock};
pub use event::DecisionEvent;
pub use issue::{Dep, DepKind, Issue, IssueStatus, IssueType};
pub use rig::Rig;
pub use session::{SessionBackend, SessionId, SessionInfo};
pub use town::{normalize_id, Route, RouteTable, Town};
