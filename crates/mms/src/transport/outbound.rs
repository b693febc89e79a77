// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Outbound transfer loop.
//!
//! ```text
//! for i in 0..n:
//!     send fragment i
//!     if i < n-1: wait for ACK:{cookie} from the receiver host
//!                 (resend on ack timeout, up to ack_retries times)
//! ```
//!
//! The receiver acknowledges every fragment but the last, so the final
//! fragment is fire-and-forget.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use super::{Datagram, IoOutcome, TransportError};
use crate::wire::{parse_ack, AckEndpoint, FragmentEncoder, OutgoingMessage};

static COOKIE_COUNTER: AtomicU32 = AtomicU32::new(0);

/// One outgoing transfer.
#[derive(Debug, Clone)]
pub struct OutboundParams<'a> {
    /// Receiver's inbound socket.
    pub dest: SocketAddr,
    /// Destination application id.
    pub dest_app_id: &'a str,
    /// Sending application id (reply-to).
    pub source_app_id: &'a str,
    /// Body.
    pub payload: &'a [u8],
    /// Wait per acknowledgement.
    pub ack_timeout: Duration,
    /// Resends per fragment before giving up.
    pub ack_retries: u32,
}

/// Fresh transfer cookie (`{millis:x}-{counter:x}`).
pub fn generate_cookie() -> String {
    let counter = COOKIE_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{:x}-{:x}", now_millis(), counter)
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Send one message over `transport`. Returns the number of fragments sent.
///
/// `transport` must have a finite read timeout; acknowledgements are
/// received on the same socket, whose port is advertised as `Ack-Port`.
pub fn send_message<D: Datagram + ?Sized>(
    transport: &D,
    encoder: &FragmentEncoder,
    params: &OutboundParams<'_>,
) -> Result<usize, TransportError> {
    let segments = encoder.segment_count(params.payload.len());
    let ack = if segments > 1 {
        Some(AckEndpoint::new(
            transport.local_addr()?.port(),
            generate_cookie(),
        ))
    } else {
        None
    };
    let cookie = ack.as_ref().map(|a| a.cookie.clone()).unwrap_or_default();

    let outgoing = OutgoingMessage {
        payload: params.payload,
        dest_app_id: params.dest_app_id,
        source_app_id: params.source_app_id,
        timestamp: now_millis(),
        ack,
    };

    log::debug!(
        "[Outbound] transfer start dest={} app_id={} len={} segments={} cookie={}",
        params.dest,
        params.dest_app_id,
        params.payload.len(),
        segments,
        cookie
    );

    let mut buf = [0u8; 512];
    for index in 0..segments {
        let wire = encoder.encode(&outgoing, index, segments)?;
        let needs_ack = index + 1 < segments;

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            send_datagram(transport, &wire, params.dest, params.ack_timeout)?;
            if !needs_ack {
                break;
            }
            if wait_for_ack(transport, params.dest, &cookie, params.ack_timeout, &mut buf)? {
                break;
            }
            if attempts > params.ack_retries {
                log::warn!(
                    "[Outbound] no ACK for fragment {}/{} to {} after {} attempts",
                    index,
                    segments,
                    params.dest,
                    attempts
                );
                return Err(TransportError::AckTimeout {
                    fragment: index,
                    attempts,
                });
            }
            log::debug!("[Outbound] resending fragment {} attempt={}", index, attempts + 1);
        }
    }

    log::debug!("[Outbound] transfer complete dest={} segments={}", params.dest, segments);
    Ok(segments)
}

/// Send, retrying while the socket reports would-block.
fn send_datagram<D: Datagram + ?Sized>(
    transport: &D,
    data: &[u8],
    target: SocketAddr,
    budget: Duration,
) -> Result<(), TransportError> {
    let deadline = Instant::now() + budget;
    loop {
        match IoOutcome::classify(transport.send_to(data, target)) {
            IoOutcome::Success(_) => return Ok(()),
            IoOutcome::WouldBlock if Instant::now() < deadline => {
                std::thread::sleep(Duration::from_millis(1));
            }
            IoOutcome::WouldBlock => {
                return Err(TransportError::Io(io::Error::from(io::ErrorKind::TimedOut)));
            }
            IoOutcome::Fail(e) => return Err(TransportError::Io(e)),
        }
    }
}

/// Wait for `ACK:{cookie}` from the receiver host. `Ok(false)` on timeout.
fn wait_for_ack<D: Datagram + ?Sized>(
    transport: &D,
    dest: SocketAddr,
    cookie: &str,
    timeout: Duration,
    buf: &mut [u8],
) -> Result<bool, TransportError> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        match IoOutcome::classify(transport.recv_from(buf)) {
            IoOutcome::Success((n, from)) => {
                if from.ip() != dest.ip() {
                    continue;
                }
                match parse_ack(&buf[..n]) {
                    Some(acked) if acked == cookie => return Ok(true),
                    Some(other) => {
                        log::debug!("[Outbound] ignoring stale ACK cookie={}", other);
                    }
                    None => {}
                }
            }
            IoOutcome::WouldBlock => {}
            IoOutcome::Fail(e) => return Err(TransportError::Io(e)),
        }
    }
    Ok(false)
}
