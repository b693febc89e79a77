// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Arrival dispatcher.
//!
//! Decides what happens to a completed message:
//!
//! ```text
//!             +-- midlet listener registered ----------------+
//! complete ---+                                              +--> EXPECTED
//!             +-- push listener registered and filter ok ----+
//!             +-- otherwise ---------------------------------------> UNEXPECTED (dropped)
//!
//! EXPECTED --> pool.add --> midlet.on_message() == true --> DELIVERED_TO_MIDLET
//!                       --> push.on_message()   == true --> DELIVERED_TO_PUSH
//!                       --> nobody unblocked           --> POOLED
//! ```
//!
//! The registry read locks are held from classification until the last
//! callback returns, so a registration cannot disappear halfway through.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::message::{bare_sender, Message};
use crate::pool::MessagePool;
use crate::registry::Listeners;

/// Where a completed message ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Pooled and a blocked midlet consumer was woken.
    DeliveredToMidlet,
    /// Pooled and a push waiter was woken.
    DeliveredToPush,
    /// Pooled; no consumer was blocked.
    Pooled,
    /// No interested listener; dropped.
    Discarded,
}

impl Disposition {
    /// True if the message was kept.
    pub fn is_expected(self) -> bool {
        !matches!(self, Disposition::Discarded)
    }
}

/// Dispatcher statistics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchStats {
    /// Messages that woke a midlet consumer.
    pub delivered_to_midlet: u64,
    /// Messages that woke a push waiter.
    pub delivered_to_push: u64,
    /// Messages pooled without waking anybody.
    pub pooled: u64,
    /// Unexpected messages dropped.
    pub discarded: u64,
}

/// Routes completed messages to the pool and listeners.
#[derive(Debug)]
pub struct Dispatcher {
    listeners: Arc<Listeners>,
    pool: Arc<Mutex<MessagePool>>,
    delivered_to_midlet: AtomicU64,
    delivered_to_push: AtomicU64,
    pooled: AtomicU64,
    discarded: AtomicU64,
}

impl Dispatcher {
    /// Create a dispatcher over shared registries and pool.
    pub fn new(listeners: Arc<Listeners>, pool: Arc<Mutex<MessagePool>>) -> Self {
        Self {
            listeners,
            pool,
            delivered_to_midlet: AtomicU64::new(0),
            delivered_to_push: AtomicU64::new(0),
            pooled: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    /// Dispatch one completed message.
    pub fn dispatch(&self, message: Message) -> Disposition {
        let guard = self.listeners.read();

        let midlet = guard.midlet.get(&message.app_id);
        let push = guard
            .push
            .get(&message.app_id)
            .filter(|reg| reg.accepts(&message.from_address));

        if midlet.is_none() && push.is_none() {
            log::debug!(
                "[Dispatch] unexpected message app_id={} from={} len={} dropped",
                message.app_id,
                bare_sender(&message.from_address),
                message.body.len()
            );
            self.discarded.fetch_add(1, Ordering::Relaxed);
            return Disposition::Discarded;
        }

        let info = message.info();
        self.pool.lock().add(message);

        let disposition = if midlet.is_some_and(|reg| reg.listener.on_message(&info)) {
            self.delivered_to_midlet.fetch_add(1, Ordering::Relaxed);
            Disposition::DeliveredToMidlet
        } else if push.is_some_and(|reg| reg.listener.on_message(&info)) {
            self.delivered_to_push.fetch_add(1, Ordering::Relaxed);
            Disposition::DeliveredToPush
        } else {
            self.pooled.fetch_add(1, Ordering::Relaxed);
            Disposition::Pooled
        };

        log::debug!(
            "[Dispatch] app_id={} len={} -> {:?}",
            info.app_id,
            info.len,
            disposition
        );
        disposition
    }

    /// Statistics snapshot.
    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            delivered_to_midlet: self.delivered_to_midlet.load(Ordering::Relaxed),
            delivered_to_push: self.delivered_to_push.load(Ordering::Relaxed),
            pooled: self.pooled.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}
