// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gt-engine: the Gas Town agent orchestration core.
//!
//! Composes the leaf crates into the four coupled subsystems: session
//! lifecycle, the polecat worker pool, reactive convoy dispatch, and the
//! inter-agent message plane (injection queue, nudge queue, decision bus).
//! A [`governance`] gate sits beside them as an optional choke point for
//! promotion actions.

pub mod bus;
pub mod commands;
pub mod convoy;
pub mod governance;
pub mod namepool;
pub mod poller;
pub mod queue;
pub mod session;
pub mod settings;
pub mod worker;

pub use bus::{DecisionBus, Subscription};
pub use convoy::{ConvoyCtx, ConvoyError};
pub use governance::{GovernanceError, GovernanceGate, SystemMode};
pub use namepool::{NamePool, PoolError};
pub use poller::DecisionPoller;
pub use queue::{EntryKind, JsonlQueue, QueueEntry, QueueError};
pub use session::{SessionError, SessionManager, SessionSpec, WaitPolicy};
pub use settings::{materialize_settings, write_settings, SettingsError};
pub use worker::{PolecatManager, PolecatOptions, WorkerError, WorkerState};
