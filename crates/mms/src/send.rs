// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Send completion tracking.
//!
//! A sending connection registers its handle with [`SendTracker::begin`] and
//! parks in [`SendTracker::wait`]. The transport reports the outcome through
//! [`SendTracker::complete`], which releases exactly the waiter for that
//! handle:
//!
//! ```text
//! SENDING --complete(Sent)-->   SENT
//!         --complete(Failed)--> FAILED
//!         --interrupt-->        (waiter gets WaitError::Interrupted)
//! ```
//!
//! Completions for handles that are not sending are ignored.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::{Condvar, Mutex};

use crate::sync::WaitError;

/// Identifier of one open connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionHandle(pub u32);

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Final outcome of a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// Every fragment was delivered (and acknowledged where required).
    Sent,
    /// The transport gave up.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SendState {
    Sending,
    Done(SendStatus),
    Interrupted,
}

/// Per-handle send state and the waiters parked on it.
#[derive(Debug)]
pub struct SendTracker {
    next_handle: AtomicU32,
    slots: Mutex<HashMap<ConnectionHandle, SendState>>,
    condvar: Condvar,
}

impl SendTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self {
            next_handle: AtomicU32::new(1),
            slots: Mutex::new(HashMap::new()),
            condvar: Condvar::new(),
        }
    }

    /// Allocate a fresh connection handle.
    pub fn allocate_handle(&self) -> ConnectionHandle {
        ConnectionHandle(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    /// Mark `handle` as sending.
    ///
    /// Returns `false` if a send is already in progress for it.
    pub fn begin(&self, handle: ConnectionHandle) -> bool {
        let mut slots = self.slots.lock();
        if slots.get(&handle) == Some(&SendState::Sending) {
            return false;
        }
        slots.insert(handle, SendState::Sending);
        true
    }

    /// Block until the send for `handle` completes or is interrupted.
    pub fn wait(&self, handle: ConnectionHandle) -> Result<SendStatus, WaitError> {
        let mut slots = self.slots.lock();
        loop {
            match slots.get(&handle).copied() {
                Some(SendState::Done(status)) => {
                    slots.remove(&handle);
                    return Ok(status);
                }
                Some(SendState::Sending) => self.condvar.wait(&mut slots),
                Some(SendState::Interrupted) | None => {
                    slots.remove(&handle);
                    return Err(WaitError::Interrupted);
                }
            }
        }
    }

    /// Report the outcome of the send for `handle`.
    ///
    /// Returns `false` (and does nothing) if no send is in progress.
    pub fn complete(&self, handle: ConnectionHandle, status: SendStatus) -> bool {
        let mut slots = self.slots.lock();
        match slots.get_mut(&handle) {
            Some(state @ SendState::Sending) => {
                *state = SendState::Done(status);
                self.condvar.notify_all();
                true
            }
            _ => {
                log::debug!(
                    "[Outbound] ignoring completion {:?} for {} with no send in progress",
                    status,
                    handle
                );
                false
            }
        }
    }

    /// Release a waiter on `handle` with [`WaitError::Interrupted`].
    pub fn interrupt(&self, handle: ConnectionHandle) {
        let mut slots = self.slots.lock();
        if let Some(state @ SendState::Sending) = slots.get_mut(&handle) {
            *state = SendState::Interrupted;
            self.condvar.notify_all();
        }
    }

    /// True while a send is in progress for `handle`.
    pub fn is_sending(&self, handle: ConnectionHandle) -> bool {
        self.slots.lock().get(&handle) == Some(&SendState::Sending)
    }
}

impl Default for SendTracker {
    fn default() -> Self {
        Self::new()
    }
}
