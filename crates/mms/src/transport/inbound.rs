// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Inbound service thread.
//!
//! Receives datagrams, hands each to [`MmsStack::notify_incoming_fragment`],
//! and returns `ACK:{cookie}` to the sender's `Ack-Port` when more fragments
//! are expected. A failed acknowledgement abandons that sender's transfer.
//!
//! The socket read timeout doubles as the shutdown poll interval and the
//! reassembly expiry tick.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::{Datagram, IoOutcome, TransportError, UdpTransport};
use crate::stack::{Incoming, MmsStack};
use crate::wire::encode_ack;

/// How often stale inbound transfers are expired.
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Running receive thread.
pub struct InboundService {
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl InboundService {
    /// Bind a UDP socket at `addr` and start receiving for `stack`.
    pub fn bind(stack: Arc<MmsStack>, addr: SocketAddr) -> Result<Self, TransportError> {
        let read_timeout = stack.config().read_timeout();
        let transport = UdpTransport::bind(addr, Some(read_timeout))?;
        Self::spawn(stack, transport)
    }

    /// Start receiving on an already bound transport.
    ///
    /// The transport should have a finite read timeout, otherwise
    /// [`stop`](Self::stop) waits for the next datagram.
    pub fn spawn<D>(stack: Arc<MmsStack>, transport: D) -> Result<Self, TransportError>
    where
        D: Datagram + 'static,
    {
        let local_addr = transport.local_addr()?;
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = Arc::clone(&running);

        let handle = std::thread::Builder::new()
            .name("mms-inbound".to_string())
            .spawn(move || run_loop(&transport, &stack, &running_clone))
            .map_err(|_| TransportError::Spawn("mms-inbound"))?;

        log::debug!("[Inbound] service started addr={}", local_addr);
        Ok(Self {
            local_addr,
            running,
            handle: Some(handle),
        })
    }

    /// Address senders should target.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// True while the thread runs.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Stop the thread and wait for it to exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            log::debug!("[Inbound] service stopped addr={}", self.local_addr);
        }
    }
}

impl Drop for InboundService {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop<D: Datagram + ?Sized>(transport: &D, stack: &MmsStack, running: &AtomicBool) {
    let mut buf = vec![0u8; stack.config().max_datagram_size];
    let mut last_tick = Instant::now();

    while running.load(Ordering::Relaxed) {
        if last_tick.elapsed() >= TICK_INTERVAL {
            stack.tick();
            last_tick = Instant::now();
        }

        let (len, source) = match IoOutcome::classify(transport.recv_from(&mut buf)) {
            IoOutcome::Success(received) => received,
            IoOutcome::WouldBlock => continue,
            IoOutcome::Fail(e) => {
                log::warn!("[Inbound] recv_from failed: {}", e);
                std::thread::sleep(Duration::from_millis(10));
                continue;
            }
        };

        match stack.notify_incoming_fragment(source, &buf[..len]) {
            Incoming::NeedMore(request) => {
                let ack_to = SocketAddr::new(source.ip(), request.port);
                if let Err(e) = transport.send_to(&encode_ack(&request.cookie), ack_to) {
                    log::warn!(
                        "[Inbound] ACK to {} failed, abandoning transfer: {}",
                        ack_to,
                        e
                    );
                    stack.abandon_transfer(source);
                }
            }
            Incoming::Dispatched(_) | Incoming::Aborted(_) => {}
        }
    }
}
