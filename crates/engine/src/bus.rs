// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process broadcast bus for decision-lifecycle events.
//!
//! Publishing never blocks the publisher: a subscriber whose buffer is full
//! drops the event for that subscriber only. Registry mutations are rare and
//! reads dominate, so the subscriber map sits behind a read-write lock.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use gt_core::DecisionEvent;

/// Per-subscriber channel capacity.
const SUBSCRIBER_BUFFER: usize = 100;

#[derive(Default)]
struct BusInner {
    subscribers: HashMap<u64, mpsc::Sender<DecisionEvent>>,
    next_id: u64,
    closed: bool,
}

/// Single-producer-many-consumer decision event bus.
#[derive(Clone, Default)]
pub struct DecisionBus {
    inner: Arc<RwLock<BusInner>>,
}

impl DecisionBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. Returns the bounded event channel and an
    /// unsubscribe handle.
    pub fn subscribe(&self) -> (mpsc::Receiver<DecisionEvent>, Subscription) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let id = {
            let mut inner = self.inner.write();
            let id = inner.next_id;
            inner.next_id += 1;
            if !inner.closed {
                inner.subscribers.insert(id, tx);
            }
            // A closed bus hands back an already-closed channel: tx drops here.
            id
        };
        (rx, Subscription { id, bus: Arc::clone(&self.inner) })
    }

    /// Deliver an event to every subscriber without blocking.
    ///
    /// All subscribers are offered the event before the next publish begins
    /// (the subscriber map is iterated under one read lock).
    pub fn publish(&self, event: &DecisionEvent) {
        let inner = self.inner.read();
        for (id, tx) in &inner.subscribers {
            if let Err(mpsc::error::TrySendError::Full(_)) = tx.try_send(event.clone()) {
                tracing::debug!(subscriber = id, "decision bus subscriber full, dropping event");
            }
        }
    }

    /// Close the bus: all subscriber channels close, later subscribes get a
    /// dead channel.
    pub fn close(&self) {
        let mut inner = self.inner.write();
        inner.closed = true;
        inner.subscribers.clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.read().subscribers.len()
    }
}

/// Unsubscribe handle; dropping it also unsubscribes.
pub struct Subscription {
    id: u64,
    bus: Arc<RwLock<BusInner>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bus.write().subscribers.remove(&self.id);
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
