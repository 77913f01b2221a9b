// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Multiplexer and sandbox driver errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MuxError {
    #[error("session already exists: {0}")]
    SessionExists(String),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("{label} failed: {detail}")]
    CommandFailed { label: String, detail: String },
    #[error("{label} timed out")]
    Timeout { label: String },
    #[error("operation canceled")]
    Canceled,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl MuxError {
    pub(crate) fn command(label: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::CommandFailed { label: label.into(), detail: detail.into() }
    }
}
