// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message listener trait.
//!
//! # Usage
//!
//! ```ignore
//! use mms::{ClosureListener, ListenerClass, MessageInfo};
//! use std::sync::Arc;
//!
//! let listener = ClosureListener::new(|info: &MessageInfo| {
//!     println!("{} bytes for {}", info.len, info.app_id);
//!     false // nothing unblocked, message stays pooled
//! });
//! stack.register_listener("com.example.App", suite, ListenerClass::Midlet,
//!     Arc::new(listener), None)?;
//! ```
//!
//! # Thread Safety
//!
//! Listeners run on the inbound service thread while the registry read
//! locks are held. They must be `Send + Sync`, must not block, and must not
//! call back into registration APIs.

use std::fmt;
use std::sync::Arc;

use crate::message::MessageInfo;
use crate::sync::WaitQueue;

/// Which registry a listener lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerClass {
    /// An open application connection.
    Midlet,
    /// A push registration waiting to launch an application.
    Push,
}

impl ListenerClass {
    /// The other registry.
    pub fn other(self) -> Self {
        match self {
            ListenerClass::Midlet => ListenerClass::Push,
            ListenerClass::Push => ListenerClass::Midlet,
        }
    }
}

impl fmt::Display for ListenerClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerClass::Midlet => write!(f, "midlet"),
            ListenerClass::Push => write!(f, "push"),
        }
    }
}

/// Receiver of arrival notifications for one application id.
pub trait MessageListener: Send + Sync {
    /// A message for this listener's application id has been pooled.
    ///
    /// Return `true` if a consumer thread was unblocked (the message is
    /// claimed), `false` to leave it for later polling.
    fn on_message(&self, info: &MessageInfo) -> bool;

    /// The registration was removed. Blocked consumers should be released.
    fn on_unregistered(&self) {}
}

/// Listener backed by a closure.
pub struct ClosureListener<F>
where
    F: Fn(&MessageInfo) -> bool + Send + Sync,
{
    callback: F,
}

impl<F> ClosureListener<F>
where
    F: Fn(&MessageInfo) -> bool + Send + Sync,
{
    /// Wrap `callback`.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> MessageListener for ClosureListener<F>
where
    F: Fn(&MessageInfo) -> bool + Send + Sync,
{
    fn on_message(&self, info: &MessageInfo) -> bool {
        (self.callback)(info)
    }
}

impl<F> fmt::Debug for ClosureListener<F>
where
    F: Fn(&MessageInfo) -> bool + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosureListener").finish_non_exhaustive()
    }
}

/// Listener that wakes one thread parked on a [`WaitQueue`].
///
/// Used by connections and push registrations: arrival wakes one consumer,
/// unregistration interrupts all of them.
#[derive(Debug, Clone)]
pub struct WakeListener {
    queue: Arc<WaitQueue>,
}

impl WakeListener {
    /// Wake consumers parked on `queue`.
    pub fn new(queue: Arc<WaitQueue>) -> Self {
        Self { queue }
    }
}

impl MessageListener for WakeListener {
    fn on_message(&self, _info: &MessageInfo) -> bool {
        self.queue.wake_one()
    }

    fn on_unregistered(&self) {
        self.queue.interrupt();
    }
}
