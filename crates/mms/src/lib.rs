// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # MMS - Multimedia message transport over datagrams
//!
//! Receives and sends MMS messages as sequences of text-headed datagram
//! fragments, reassembles them, and routes each completed message to the
//! application that registered for its destination application id.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mms::{InboundService, MmsConfig, MmsStack, SuiteId, Result};
//!
//! fn main() -> Result<()> {
//!     let stack = MmsStack::new(MmsConfig::default().with_phone_number("+15551234"))?;
//!     let _service = InboundService::bind(stack.clone(), "0.0.0.0:2948".parse().unwrap())?;
//!
//!     let conn = stack.open("com.example.Chat", SuiteId(1))?;
//!     let message = conn.receive()?;
//!     println!("{} bytes from {}", message.len(), message.from_address);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                        Application Layer                            |
//! |   Connection (receive/send) | PushRegistration (wait_for_activity)  |
//! +---------------------------------------------------------------------+
//! |                          Routing Layer                              |
//! |   Listeners (midlet + push registries) | Dispatcher | MessagePool   |
//! +---------------------------------------------------------------------+
//! |                           Wire Layer                                |
//! |   FragmentDecoder | FragmentEncoder | ACK cookies                   |
//! +---------------------------------------------------------------------+
//! |                        Transport Layer                              |
//! |   InboundService (UDP thread) | send_message (ACK-paced resend)     |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`MmsStack`] | Per-context owner of pool, registries and assembler |
//! | [`Connection`] | Open application endpoint for one application id |
//! | [`PushRegistration`] | Keeps an application id routable while closed |
//! | [`Message`] | Reassembled message |
//! | [`MmsConfig`] | Wire defaults and runtime tuning |
//!
//! ## Locking
//!
//! Locks are always taken in the order midlet registry, push registry,
//! wait queue, pool. The pool lock is never held while a listener runs.

pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod message;
pub mod pool;
pub mod push;
pub mod reassembly;
pub mod registry;
pub mod send;
pub mod stack;
pub mod sync;
pub mod transport;
pub mod wire;

pub use config::MmsConfig;
pub use connection::Connection;
pub use dispatch::{DispatchStats, Disposition, Dispatcher};
pub use error::{ConfigError, Error, Result};
pub use message::{Message, MessageInfo, SuiteId, MMS_SCHEME};
pub use pool::{MessagePool, PoolStats};
pub use push::PushRegistration;
pub use reassembly::{AssemblerConfig, AssemblerStats, InboundAssembler};
pub use registry::{
    ClosureListener, InterestEvent, InterestNotifier, ListenerClass, MessageListener,
    NoopInterest, RecordingInterest, RegistrationToken, RegistryError, SenderFilter,
};
pub use send::{ConnectionHandle, SendStatus};
pub use stack::{Incoming, MmsStack};
pub use sync::WaitError;
pub use transport::{Datagram, InboundService, TransportError, UdpTransport};
pub use wire::{DecodeError, EncodeError, FragmentDecoder, FragmentEncoder};
