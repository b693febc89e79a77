// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Datagram transport for MMS fragments.
//!
//! - [`Datagram`]: the socket primitive the stack consumes
//! - [`UdpTransport`]: `socket2`-backed UDP implementation
//! - [`InboundService`]: receive thread feeding [`crate::MmsStack`]
//! - [`send_message`]: fragment, send, and wait for each `ACK:{cookie}`

mod inbound;
mod outbound;
mod udp;

pub use inbound::InboundService;
pub use outbound::{generate_cookie, send_message, OutboundParams};
pub use udp::UdpTransport;

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use crate::wire::EncodeError;

/// Transport failure.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket could not be created or bound.
    #[error("bind {addr} failed: {source}")]
    Bind {
        /// Requested local address.
        addr: SocketAddr,
        /// OS error.
        source: io::Error,
    },
    /// Hard I/O failure on an open socket.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The receiver never acknowledged a fragment.
    #[error("no acknowledgement for fragment {fragment} after {attempts} attempts")]
    AckTimeout {
        /// Fragment index.
        fragment: usize,
        /// Sends attempted.
        attempts: u32,
    },
    /// The payload could not be fragmented.
    #[error("encode failed: {0}")]
    Encode(#[from] EncodeError),
    /// Service thread could not be started.
    #[error("failed to spawn {0} thread")]
    Spawn(&'static str),
}

/// Result of one transport call on a socket with a read timeout.
#[derive(Debug)]
pub enum IoOutcome<T> {
    /// Call completed.
    Success(T),
    /// Nothing available yet (or the read timeout expired); retry later.
    WouldBlock,
    /// Hard failure.
    Fail(io::Error),
}

impl<T> IoOutcome<T> {
    /// Classify an I/O result.
    pub fn classify(result: io::Result<T>) -> Self {
        match result {
            Ok(value) => IoOutcome::Success(value),
            Err(e) if is_would_block(&e) => IoOutcome::WouldBlock,
            Err(e) => IoOutcome::Fail(e),
        }
    }
}

/// True for errors that mean "try again" rather than failure.
pub fn is_would_block(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}

/// Datagram socket abstraction.
pub trait Datagram: Send + Sync {
    /// Send one datagram to `target`.
    fn send_to(&self, data: &[u8], target: SocketAddr) -> io::Result<usize>;

    /// Receive one datagram. Times out with a would-block error when the
    /// socket has a read timeout.
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;

    /// Bound local address.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}
