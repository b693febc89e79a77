// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Application connections (midlet side).
//!
//! Opening a connection registers a midlet listener for the application id.
//! [`Connection::receive`] blocks until a message for that id is pooled;
//! [`Connection::send`] blocks until the outbound transfer reports its
//! outcome. [`Connection::close`] (or drop) unregisters and releases every
//! blocked caller with [`WaitError::Interrupted`].

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::message::{Message, SuiteId};
use crate::registry::{ListenerClass, RegistrationToken, RegistryError, WakeListener};
use crate::send::{ConnectionHandle, SendStatus};
use crate::stack::MmsStack;
use crate::sync::{WaitError, WaitQueue};
use crate::transport::{send_message, OutboundParams, TransportError, UdpTransport};

/// Open connection for one application id.
pub struct Connection {
    stack: Arc<MmsStack>,
    app_id: String,
    suite_id: SuiteId,
    handle: ConnectionHandle,
    token: RegistrationToken,
    queue: Arc<WaitQueue>,
    send_lock: Mutex<()>,
    closed: AtomicBool,
}

impl Connection {
    pub(crate) fn open(stack: Arc<MmsStack>, app_id: &str, suite_id: SuiteId) -> Result<Self> {
        let queue = Arc::new(WaitQueue::new());
        let token = stack.register_listener(
            app_id,
            suite_id,
            ListenerClass::Midlet,
            Arc::new(WakeListener::new(Arc::clone(&queue))),
            None,
        )?;

        let handle = stack.sends().allocate_handle();
        log::debug!("[MMS] open {} app_id={} suite={}", handle, app_id, suite_id);

        Ok(Self {
            stack,
            app_id: app_id.to_string(),
            suite_id,
            handle,
            token,
            queue,
            send_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
        })
    }

    /// Application id served by this connection.
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Owning suite.
    pub fn suite_id(&self) -> SuiteId {
        self.suite_id
    }

    /// Send-tracking handle.
    pub fn handle(&self) -> ConnectionHandle {
        self.handle
    }

    /// True once closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of pooled messages waiting for this connection.
    pub fn pending(&self) -> usize {
        self.stack.pending(&self.app_id)
    }

    /// Block until a message arrives for this application id.
    pub fn receive(&self) -> Result<Message> {
        self.ensure_open()?;
        let pool = self.stack.pool();
        let message = self
            .queue
            .wait_until(|| pool.lock().take_first(&self.app_id))?;
        Ok(message)
    }

    /// Like [`receive`](Self::receive), returning `Ok(None)` after `timeout`.
    pub fn receive_timeout(&self, timeout: Duration) -> Result<Option<Message>> {
        self.ensure_open()?;
        let pool = self.stack.pool();
        let message = self
            .queue
            .wait_until_timeout(timeout, || pool.lock().take_first(&self.app_id))?;
        Ok(message)
    }

    /// Take a pooled message without blocking.
    pub fn try_receive(&self) -> Result<Option<Message>> {
        self.ensure_open()?;
        Ok(self.stack.take_message(&self.app_id))
    }

    /// Send `payload` to `dest_app_id` at `dest`, blocking until the transfer
    /// completes.
    ///
    /// A transport failure is reported as `Ok(SendStatus::Failed)`; closing
    /// the connection meanwhile yields [`WaitError::Interrupted`].
    pub fn send(&self, dest: SocketAddr, dest_app_id: &str, payload: &[u8]) -> Result<SendStatus> {
        self.ensure_open()?;
        let _serialized = self.send_lock.lock();

        let sends = self.stack.sends();
        if !sends.begin(self.handle) {
            return Err(Error::Closed);
        }

        let stack = Arc::clone(&self.stack);
        let handle = self.handle;
        let source_app_id = self.app_id.clone();
        let dest_app_id = dest_app_id.to_string();
        let payload = payload.to_vec();

        let spawned = std::thread::Builder::new()
            .name("mms-outbound".to_string())
            .spawn(move || {
                let status = match transfer(&stack, dest, &dest_app_id, &source_app_id, &payload) {
                    Ok(fragments) => {
                        log::debug!("[Outbound] {} sent fragments={}", handle, fragments);
                        SendStatus::Sent
                    }
                    Err(e) => {
                        log::warn!("[Outbound] {} send to {} failed: {}", handle, dest, e);
                        SendStatus::Failed
                    }
                };
                stack.notify_send_completed(handle, status);
            });

        if spawned.is_err() {
            sends.complete(self.handle, SendStatus::Failed);
            let _ = sends.wait(self.handle);
            return Err(TransportError::Spawn("mms-outbound").into());
        }

        let status = sends.wait(self.handle)?;
        Ok(status)
    }

    /// Unregister and interrupt blocked callers. Idempotent.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.stack.sends().interrupt(self.handle);
        let result = match self
            .stack
            .unregister_owned(&self.app_id, ListenerClass::Midlet, self.token)
        {
            // Suite teardown already removed the registration, and the id
            // may belong to someone else now.
            Err(Error::Registry(RegistryError::NotRegistered { .. })) => Ok(()),
            other => other,
        };
        self.queue.interrupt();

        log::debug!("[MMS] close {} app_id={}", self.handle, self.app_id);
        result
    }

    #[cfg(test)]
    pub(crate) fn waiters(&self) -> usize {
        self.queue.waiters()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(Error::Closed)
        } else if self.queue.is_interrupted() {
            Err(WaitError::Interrupted.into())
        } else {
            Ok(())
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("app_id", &self.app_id)
            .field("suite_id", &self.suite_id)
            .field("handle", &self.handle)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Run one outbound transfer on a fresh ephemeral socket.
fn transfer(
    stack: &MmsStack,
    dest: SocketAddr,
    dest_app_id: &str,
    source_app_id: &str,
    payload: &[u8],
) -> std::result::Result<usize, TransportError> {
    let config = stack.config();
    let local = SocketAddr::new(config.bind_address, 0);
    let transport = UdpTransport::bind(local, Some(config.read_timeout().min(config.ack_timeout())))?;

    let params = OutboundParams {
        dest,
        dest_app_id,
        source_app_id,
        payload,
        ack_timeout: config.ack_timeout(),
        ack_retries: config.ack_retries,
    };
    send_message(&transport, stack.encoder(), &params)
}
