// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounded pool of completed messages.
//!
//! Messages are retrieved per application id in arrival order, but eviction
//! is global: when the pool is full the single oldest message of *any*
//! application is dropped to make room. A chatty application can therefore
//! push out another application's unread message.
//!
//! # Layout
//!
//! ```text
//! by_seq:    BTreeMap<seq, Message>          global arrival order
//! by_app_id: HashMap<app_id, VecDeque<seq>>  per-application FIFO index
//! ```
//!
//! Every sequence number in `by_app_id` is present in `by_seq` and vice versa.

use std::collections::{BTreeMap, HashMap, VecDeque};

use thiserror::Error;

use crate::message::Message;

/// Pool failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    /// `add_opt` called without a message.
    #[error("no message to add")]
    MissingMessage,
}

/// Pool statistics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PoolStats {
    /// Messages inserted.
    pub added: u64,
    /// Messages dropped to make room.
    pub evicted: u64,
    /// Messages handed out through `take_first`.
    pub taken: u64,
    /// Messages removed through `remove_all`.
    pub purged: u64,
    /// Current number of pooled messages.
    pub pooled: usize,
}

/// Bounded, application-keyed message pool.
#[derive(Debug)]
pub struct MessagePool {
    capacity: usize,
    next_seq: u64,
    by_seq: BTreeMap<u64, Message>,
    by_app_id: HashMap<String, VecDeque<u64>>,
    stats: PoolStats,
}

impl MessagePool {
    /// Create an empty pool holding at most `capacity` messages.
    ///
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            next_seq: 0,
            by_seq: BTreeMap::new(),
            by_app_id: HashMap::new(),
            stats: PoolStats::default(),
        }
    }

    /// Maximum number of pooled messages.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of pooled messages across all applications.
    pub fn count(&self) -> usize {
        self.by_seq.len()
    }

    /// Number of pooled messages for `app_id`.
    pub fn count_for(&self, app_id: &str) -> usize {
        self.by_app_id.get(app_id).map_or(0, VecDeque::len)
    }

    /// True if no message is pooled.
    pub fn is_empty(&self) -> bool {
        self.by_seq.is_empty()
    }

    /// Insert a message, evicting the globally oldest one if the pool is full.
    pub fn add(&mut self, message: Message) {
        while self.by_seq.len() >= self.capacity {
            if self.evict_oldest().is_none() {
                break;
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        self.by_app_id
            .entry(message.app_id.clone())
            .or_default()
            .push_back(seq);
        self.by_seq.insert(seq, message);
        self.stats.added += 1;
    }

    /// Insert a possibly absent message.
    pub fn add_opt(&mut self, message: Option<Message>) -> Result<(), PoolError> {
        let message = message.ok_or(PoolError::MissingMessage)?;
        self.add(message);
        Ok(())
    }

    /// Oldest message for `app_id`, left in place.
    pub fn peek_first(&self, app_id: &str) -> Option<&Message> {
        let seq = self.by_app_id.get(app_id)?.front()?;
        self.by_seq.get(seq)
    }

    /// Remove and return the oldest message for `app_id`.
    pub fn take_first(&mut self, app_id: &str) -> Option<Message> {
        let queue = self.by_app_id.get_mut(app_id)?;
        let seq = queue.pop_front()?;
        if queue.is_empty() {
            self.by_app_id.remove(app_id);
        }
        let message = self.by_seq.remove(&seq);
        if message.is_some() {
            self.stats.taken += 1;
        }
        message
    }

    /// Drop every message for `app_id`. Returns how many were removed.
    pub fn remove_all(&mut self, app_id: &str) -> usize {
        let Some(queue) = self.by_app_id.remove(app_id) else {
            return 0;
        };
        let mut removed = 0;
        for seq in queue {
            if self.by_seq.remove(&seq).is_some() {
                removed += 1;
            }
        }
        self.stats.purged += removed as u64;
        if removed > 0 {
            log::debug!("[Pool] purged app_id={} count={}", app_id, removed);
        }
        removed
    }

    /// Statistics snapshot.
    pub fn stats(&self) -> PoolStats {
        let mut stats = self.stats.clone();
        stats.pooled = self.by_seq.len();
        stats
    }

    fn evict_oldest(&mut self) -> Option<Message> {
        let (seq, message) = self.by_seq.pop_first()?;

        if let Some(queue) = self.by_app_id.get_mut(&message.app_id) {
            // The globally oldest entry is also the oldest of its application.
            if queue.front() == Some(&seq) {
                queue.pop_front();
            } else {
                queue.retain(|&s| s != seq);
            }
            if queue.is_empty() {
                self.by_app_id.remove(&message.app_id);
            }
        }

        self.stats.evicted += 1;
        log::debug!(
            "[Pool] evicted oldest message app_id={} from={} len={}",
            message.app_id,
            message.from_address,
            message.body.len()
        );
        Some(message)
    }
}

impl Default for MessagePool {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_POOL_CAPACITY)
    }
}
