// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gt-mux: execution substrates for hosted agent sessions.
//!
//! Two capability surfaces with the same shape: [`MuxDriver`] over a local
//! terminal multiplexer (tmux), and [`SandboxBackend`] over a remote sandbox
//! provider. Session lifecycle composes over both through polymorphism; no
//! caller outside this crate shells out to tmux or the sandbox CLI directly.

mod daytona;
mod driver;
mod error;
pub mod process;
mod remote_state;
mod sandbox;
pub mod subprocess;
mod tmux;

pub use daytona::DaytonaBackend;
pub use driver::{debounce_delay, MuxDriver};
pub use error::MuxError;
pub use remote_state::{RemoteSessionState, RemoteStateDir};
pub use sandbox::{PtyId, SandboxBackend, SandboxId};
pub use tmux::TmuxDriver;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeMuxDriver, FakeSandbox, MuxCall, SandboxCall};
