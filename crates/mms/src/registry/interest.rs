// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Native interest notification.
//!
//! The platform is told which application ids have at least one listener so
//! that it can route incoming MMS traffic to this stack.

use parking_lot::Mutex;

/// Platform hook asserting or withdrawing interest in an application id.
pub trait InterestNotifier: Send + Sync {
    /// Start routing messages for `app_id` to this stack.
    fn add_listening_app_id(&self, app_id: &str);
    /// Stop routing messages for `app_id`.
    fn remove_listening_app_id(&self, app_id: &str);
}

/// Notifier for stacks that receive every datagram directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInterest;

impl InterestNotifier for NoopInterest {
    fn add_listening_app_id(&self, _app_id: &str) {}
    fn remove_listening_app_id(&self, _app_id: &str) {}
}

/// One recorded notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterestEvent {
    /// `add_listening_app_id` was called.
    Added(String),
    /// `remove_listening_app_id` was called.
    Removed(String),
}

/// Notifier that records every call, for diagnostics and tests.
#[derive(Debug, Default)]
pub struct RecordingInterest {
    events: Mutex<Vec<InterestEvent>>,
}

impl RecordingInterest {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All notifications so far, oldest first.
    pub fn events(&self) -> Vec<InterestEvent> {
        self.events.lock().clone()
    }

    /// Drop recorded notifications.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl InterestNotifier for RecordingInterest {
    fn add_listening_app_id(&self, app_id: &str) {
        self.events.lock().push(InterestEvent::Added(app_id.to_string()));
    }

    fn remove_listening_app_id(&self, app_id: &str) {
        self.events.lock().push(InterestEvent::Removed(app_id.to_string()));
    }
}
