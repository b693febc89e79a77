// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Completed MMS messages and MMS address helpers.
//!
//! A [`Message`] only exists once every fragment of a transfer has arrived;
//! partially reassembled bodies live inside the decoder and are never visible
//! here.
//!
//! # Addresses
//!
//! ```text
//! mms://:com.example.App           -> destination application id
//! mms://+15551234                  -> sender, no reply-to
//! mms://+15551234:com.example.App  -> sender + reply-to application id
//! ```

use std::fmt;

/// URI scheme prefix of every MMS address.
pub const MMS_SCHEME: &str = "mms://";

/// Identifier of an installed application suite.
///
/// Suites own registrations and are the unit of bulk cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SuiteId(pub u32);

impl fmt::Display for SuiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "suite#{}", self.0)
    }
}

/// One fully reassembled MMS message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Sender address (`mms://+15551234`).
    pub from_address: String,
    /// Target application identifier (routing key).
    pub app_id: String,
    /// Application identifier a reply should target (may be empty).
    pub reply_to_app_id: String,
    /// `Date` header in milliseconds since the Unix epoch (0 when absent).
    pub timestamp: u64,
    /// Unformatted payload.
    pub body: Vec<u8>,
}

impl Message {
    /// Create a message.
    pub fn new(
        from_address: impl Into<String>,
        app_id: impl Into<String>,
        reply_to_app_id: impl Into<String>,
        body: Vec<u8>,
    ) -> Self {
        Self {
            from_address: from_address.into(),
            app_id: app_id.into(),
            reply_to_app_id: reply_to_app_id.into(),
            timestamp: 0,
            body,
        }
    }

    /// Set the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Body length in bytes.
    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// True if the body is empty.
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Owned metadata snapshot handed to listeners.
    pub fn info(&self) -> MessageInfo {
        MessageInfo {
            from_address: self.from_address.clone(),
            app_id: self.app_id.clone(),
            reply_to_app_id: self.reply_to_app_id.clone(),
            timestamp: self.timestamp,
            len: self.body.len(),
        }
    }
}

/// Message metadata without the body.
///
/// The dispatcher moves the message into the pool before listeners run, so
/// listeners see this snapshot and consumers retrieve the body from the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageInfo {
    /// Sender address.
    pub from_address: String,
    /// Target application identifier.
    pub app_id: String,
    /// Reply-to application identifier.
    pub reply_to_app_id: String,
    /// Date header (ms since epoch).
    pub timestamp: u64,
    /// Body length in bytes.
    pub len: usize,
}

/// Split a `SenderAddress` value into `(from_address, reply_to_app_id)`.
///
/// With two colons present (scheme + one more) the text after the last colon
/// is the reply-to application id.
pub fn split_sender_address(value: &str) -> (String, String) {
    if value.matches(':').count() >= 2 {
        if let Some(idx) = value.rfind(':') {
            return (value[..idx].to_string(), value[idx + 1..].to_string());
        }
    }
    (value.to_string(), String::new())
}

/// Extract the application id from an `Address` value (`mms://[phone]:appID`).
///
/// Returns `None` when no application id follows the scheme.
pub fn app_id_from_address(value: &str) -> Option<&str> {
    let rest = value.strip_prefix(MMS_SCHEME).unwrap_or(value);
    let idx = rest.rfind(':')?;
    let app_id = &rest[idx + 1..];
    if app_id.is_empty() {
        None
    } else {
        Some(app_id)
    }
}

/// Sender address with scheme and reply-to suffix removed (`+15551234`).
///
/// This is the text push filters are matched against.
pub fn bare_sender(from_address: &str) -> &str {
    let rest = from_address.strip_prefix(MMS_SCHEME).unwrap_or(from_address);
    match rest.find(':') {
        Some(idx) => &rest[..idx],
        None => rest,
    }
}
