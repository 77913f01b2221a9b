// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Decision poller: bridges the issue store onto the decision bus.
//!
//! Reads decision-typed items on a fixed interval. The first tick seeds the
//! seen-set without publishing so pre-existing decisions do not replay into
//! subscribers on startup. Decisions created in-process publish directly and
//! call [`DecisionPoller::mark_seen`] to avoid a double publish on the next
//! tick.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use gt_core::{DecisionEvent, IssueType};
use gt_store::IssueStore;

use crate::bus::DecisionBus;

/// Default poll interval.
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Polls the store for new decisions and publishes `Created` events.
pub struct DecisionPoller {
    store: Arc<dyn IssueStore>,
    bus: DecisionBus,
    interval: Duration,
    seen: Arc<Mutex<HashSet<String>>>,
}

impl DecisionPoller {
    pub fn new(store: Arc<dyn IssueStore>, bus: DecisionBus) -> Self {
        Self { store, bus, interval: POLL_INTERVAL, seen: Arc::new(Mutex::new(HashSet::new())) }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Suppress a future `Created` publish for a decision that was already
    /// announced directly.
    pub fn mark_seen(&self, issue_id: &str) {
        self.seen.lock().insert(issue_id.to_string());
    }

    /// Run until the token fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        let mut seeded = false;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.tick(&cancel, &mut seeded).await;
        }
    }

    /// One poll cycle. Exposed for deterministic tests.
    pub async fn tick(&self, cancel: &CancellationToken, seeded: &mut bool) {
        let decisions = match self
            .store
            .list_open_issues_by_type(IssueType::Decision, cancel)
            .await
        {
            Ok(decisions) => decisions,
            Err(e) => {
                tracing::debug!(error = %e, "decision poll failed");
                return;
            }
        };

        if !*seeded {
            // First observation: absorb what already exists.
            let mut seen = self.seen.lock();
            for decision in &decisions {
                seen.insert(decision.id.clone());
            }
            *seeded = true;
            return;
        }

        for decision in decisions {
            let fresh = self.seen.lock().insert(decision.id.clone());
            if fresh {
                tracing::info!(issue = %decision.id, "new decision observed");
                self.bus.publish(&DecisionEvent::Created { issue_id: decision.id });
            }
        }
    }
}

#[cfg(test)]
#[path = "poller_tests.rs"]
mod tests;
