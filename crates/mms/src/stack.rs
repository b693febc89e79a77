// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MMS stack: one per context.
//!
//! Owns the pool, both listener registries, the dispatcher, the inbound
//! assembler and the send tracker. Construct it with [`MmsStack::new`] and
//! share it through the returned `Arc`.
//!
//! # Entry points
//!
//! | Caller | Method |
//! |--------|--------|
//! | transport (inbound) | [`MmsStack::notify_incoming_fragment`] |
//! | transport (outbound) | [`MmsStack::notify_send_completed`] |
//! | application | [`MmsStack::open`], [`MmsStack::register_push`] |
//! | platform | [`MmsStack::register_listener`], [`MmsStack::unregister_listener`], [`MmsStack::remove_suite`] |

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::MmsConfig;
use crate::connection::Connection;
use crate::dispatch::{DispatchStats, Disposition, Dispatcher};
use crate::error::Result;
use crate::message::{Message, SuiteId};
use crate::pool::{MessagePool, PoolStats};
use crate::push::PushRegistration;
use crate::reassembly::{AssemblerConfig, AssemblerStats, InboundAssembler};
use crate::registry::{
    InterestNotifier, ListenerClass, Listeners, MessageListener, NoopInterest, Registration,
    RegistrationToken, SenderFilter,
};
use crate::send::{ConnectionHandle, SendStatus, SendTracker};
use crate::wire::{AckRequest, DecodeError, FragmentEncoder, Progress};

/// Outcome of one inbound datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// More fragments expected; send `ACK:{cookie}` to the sender.
    NeedMore(AckRequest),
    /// The transfer completed and the message was dispatched.
    Dispatched(Disposition),
    /// The transfer was abandoned.
    Aborted(DecodeError),
}

/// Per-context MMS stack.
pub struct MmsStack {
    config: MmsConfig,
    encoder: FragmentEncoder,
    pool: Arc<Mutex<MessagePool>>,
    listeners: Arc<Listeners>,
    dispatcher: Dispatcher,
    assembler: Mutex<InboundAssembler>,
    sends: SendTracker,
}

impl MmsStack {
    /// Create a stack that receives every datagram directly.
    pub fn new(config: MmsConfig) -> Result<Arc<Self>> {
        Self::with_interest(config, Arc::new(NoopInterest))
    }

    /// Create a stack reporting application-id interest to the platform.
    pub fn with_interest(
        config: MmsConfig,
        interest: Arc<dyn InterestNotifier>,
    ) -> Result<Arc<Self>> {
        config.validate()?;

        let pool = Arc::new(Mutex::new(MessagePool::new(config.pool_capacity)));
        let listeners = Arc::new(Listeners::new(interest));
        let dispatcher = Dispatcher::new(Arc::clone(&listeners), Arc::clone(&pool));

        log::debug!(
            "[MMS] stack created phone={} fragment_size={} pool_capacity={}",
            config.phone_number,
            config.fragment_size,
            config.pool_capacity
        );

        Ok(Arc::new(Self {
            encoder: FragmentEncoder::from_config(&config),
            assembler: Mutex::new(InboundAssembler::new(AssemblerConfig::from(&config))),
            pool,
            listeners,
            dispatcher,
            sends: SendTracker::new(),
            config,
        }))
    }

    /// Active configuration.
    pub fn config(&self) -> &MmsConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Register `listener` for `app_id` in the `class` registry.
    ///
    /// `filter` only applies to push registrations. The returned token
    /// identifies this registration for [`unregister_owned`](Self::unregister_owned).
    pub fn register_listener(
        &self,
        app_id: &str,
        suite_id: SuiteId,
        class: ListenerClass,
        listener: Arc<dyn MessageListener>,
        filter: Option<SenderFilter>,
    ) -> Result<RegistrationToken> {
        let registration = Registration::new(app_id, suite_id, listener).with_filter(filter);
        let token = self.listeners.register(class, registration)?;
        Ok(token)
    }

    /// Remove the `class` registration for `app_id`.
    pub fn unregister_listener(&self, app_id: &str, class: ListenerClass) -> Result<()> {
        self.listeners.unregister(app_id, class)?;
        Ok(())
    }

    /// Remove the `class` registration for `app_id` if it is still the one
    /// `token` was issued for.
    pub fn unregister_owned(
        &self,
        app_id: &str,
        class: ListenerClass,
        token: RegistrationToken,
    ) -> Result<()> {
        self.listeners.unregister_if(app_id, class, token)?;
        Ok(())
    }

    /// True if `app_id` has a `class` listener.
    pub fn is_registered(&self, app_id: &str, class: ListenerClass) -> bool {
        self.listeners.is_registered(app_id, class)
    }

    /// True if `app_id` has a `class` listener owned by `suite_id`.
    pub fn is_registered_for_suite(
        &self,
        app_id: &str,
        suite_id: SuiteId,
        class: ListenerClass,
    ) -> bool {
        self.listeners.is_registered_for_suite(app_id, suite_id, class)
    }

    /// Tear down every registration of `suite_id` and purge its pooled
    /// messages. Returns the number of registrations removed.
    pub fn remove_suite(&self, suite_id: SuiteId) -> usize {
        let removed = self.listeners.remove_all_for_suite(suite_id, &self.pool);
        log::debug!("[MMS] suite {} removed registrations={}", suite_id, removed.len());
        removed.len()
    }

    /// Open a connection for `app_id`.
    pub fn open(self: &Arc<Self>, app_id: &str, suite_id: SuiteId) -> Result<Connection> {
        Connection::open(Arc::clone(self), app_id, suite_id)
    }

    /// Register a push listener for `app_id`.
    pub fn register_push(
        self: &Arc<Self>,
        app_id: &str,
        suite_id: SuiteId,
        filter: Option<&str>,
    ) -> Result<PushRegistration> {
        PushRegistration::register(Arc::clone(self), app_id, suite_id, filter)
    }

    // ------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------

    /// Feed one datagram received from `source`.
    pub fn notify_incoming_fragment(&self, source: SocketAddr, buffer: &[u8]) -> Incoming {
        let progress = self.assembler.lock().on_fragment(source, buffer);
        match progress {
            Ok(Progress::More(request)) => Incoming::NeedMore(request),
            Ok(Progress::Complete(message)) => Incoming::Dispatched(self.dispatch(message)),
            Err(e) => Incoming::Aborted(e),
        }
    }

    /// Dispatch an already reassembled message.
    pub fn dispatch(&self, message: Message) -> Disposition {
        self.dispatcher.dispatch(message)
    }

    /// Abandon the transfer in progress from `source`.
    pub fn abandon_transfer(&self, source: SocketAddr) -> bool {
        self.assembler.lock().abandon(source)
    }

    /// Expire idle inbound transfers. Returns how many were dropped.
    pub fn tick(&self) -> usize {
        self.assembler.lock().tick()
    }

    // ------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------

    /// Report the outcome of the send in progress on `handle`.
    ///
    /// Completions with no matching send are ignored; returns `false` then.
    pub fn notify_send_completed(&self, handle: ConnectionHandle, status: SendStatus) -> bool {
        self.sends.complete(handle, status)
    }

    /// True while a send is in progress on `handle`.
    pub fn is_sending(&self, handle: ConnectionHandle) -> bool {
        self.sends.is_sending(handle)
    }

    pub(crate) fn sends(&self) -> &SendTracker {
        &self.sends
    }

    pub(crate) fn encoder(&self) -> &FragmentEncoder {
        &self.encoder
    }

    // ------------------------------------------------------------------
    // Pool access
    // ------------------------------------------------------------------

    pub(crate) fn pool(&self) -> &Mutex<MessagePool> {
        &self.pool
    }

    /// Number of pooled messages for `app_id`.
    pub fn pending(&self, app_id: &str) -> usize {
        self.pool.lock().count_for(app_id)
    }

    /// Remove and return the oldest pooled message for `app_id`.
    pub fn take_message(&self, app_id: &str) -> Option<Message> {
        self.pool.lock().take_first(app_id)
    }

    // ------------------------------------------------------------------
    // Statistics
    // ------------------------------------------------------------------

    /// Pool statistics.
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.lock().stats()
    }

    /// Dispatcher statistics.
    pub fn dispatch_stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    /// Inbound assembler statistics.
    pub fn assembler_stats(&self) -> AssemblerStats {
        self.assembler.lock().stats()
    }
}

impl std::fmt::Debug for MmsStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MmsStack")
            .field("config", &self.config)
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}
