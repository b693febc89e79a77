// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Inbound transfer bookkeeping.
//!
//! One [`FragmentDecoder`] per remote sender, so that a malformed or
//! abandoned transfer from one peer never disturbs another peer's transfer.
//!
//! - **Memory bounds**: at most `max_pending` transfers; the least recently
//!   active one is evicted to admit a new sender
//! - **Timeout**: [`InboundAssembler::tick`] drops transfers idle for longer
//!   than the reassembly timeout
//!
//! Single-fragment messages never occupy a slot.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::config::MmsConfig;
use crate::wire::{DecodeError, FragmentDecoder, Progress};

/// Assembler configuration.
#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    /// Maximum concurrent transfers.
    pub max_pending: usize,
    /// Idle timeout per transfer.
    pub timeout: Duration,
    /// Largest accepted `Content-Length`.
    pub max_message_size: usize,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self::from(&MmsConfig::default())
    }
}

impl From<&MmsConfig> for AssemblerConfig {
    fn from(config: &MmsConfig) -> Self {
        Self {
            max_pending: config.max_pending_transfers,
            timeout: config.reassembly_timeout(),
            max_message_size: config.max_message_size,
        }
    }
}

/// Assembler statistics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AssemblerStats {
    /// Fragments received.
    pub fragments_received: u64,
    /// Messages completed.
    pub messages_completed: u64,
    /// Transfers abandoned on a decode error.
    pub transfers_aborted: u64,
    /// Transfers dropped by `tick`.
    pub transfers_timed_out: u64,
    /// Transfers evicted to admit a new sender.
    pub transfers_evicted: u64,
    /// Current pending transfers.
    pub pending_transfers: usize,
}

#[derive(Debug)]
struct PendingTransfer {
    decoder: FragmentDecoder,
    last_activity: Instant,
}

/// Per-sender fragment reassembly.
#[derive(Debug)]
pub struct InboundAssembler {
    config: AssemblerConfig,
    pending: HashMap<SocketAddr, PendingTransfer>,
    stats: AssemblerStats,
}

impl InboundAssembler {
    /// Create an assembler.
    pub fn new(config: AssemblerConfig) -> Self {
        Self {
            config,
            pending: HashMap::new(),
            stats: AssemblerStats::default(),
        }
    }

    /// Feed one datagram from `source`.
    ///
    /// On error the transfer from `source` is abandoned; other senders are
    /// unaffected.
    pub fn on_fragment(
        &mut self,
        source: SocketAddr,
        buffer: &[u8],
    ) -> Result<Progress, DecodeError> {
        self.stats.fragments_received += 1;
        let now = Instant::now();

        let result = match self.pending.get_mut(&source) {
            Some(transfer) => {
                transfer.last_activity = now;
                let result = transfer.decoder.decode(buffer);
                if !matches!(result, Ok(Progress::More(_))) {
                    self.pending.remove(&source);
                }
                result
            }
            None => {
                let mut decoder = FragmentDecoder::new(self.config.max_message_size);
                let result = decoder.decode(buffer);
                if matches!(result, Ok(Progress::More(_))) {
                    self.make_room();
                    self.pending.insert(
                        source,
                        PendingTransfer {
                            decoder,
                            last_activity: now,
                        },
                    );
                }
                result
            }
        };

        match &result {
            Ok(Progress::Complete(msg)) => {
                self.stats.messages_completed += 1;
                log::debug!(
                    "[Decoder] transfer from {} complete app_id={} len={}",
                    source,
                    msg.app_id,
                    msg.body.len()
                );
            }
            Ok(Progress::More(_)) => {}
            Err(e) => {
                self.stats.transfers_aborted += 1;
                log::warn!("[Decoder] transfer from {} aborted: {}", source, e);
            }
        }
        result
    }

    /// Abandon the transfer from `source` (e.g. its acknowledgement could not
    /// be sent). Returns `true` if one was pending.
    pub fn abandon(&mut self, source: SocketAddr) -> bool {
        let removed = self.pending.remove(&source).is_some();
        if removed {
            self.stats.transfers_aborted += 1;
            log::debug!("[Decoder] transfer from {} abandoned", source);
        }
        removed
    }

    /// Drop transfers idle for longer than the timeout. Returns how many.
    pub fn tick(&mut self) -> usize {
        self.expire(Instant::now())
    }

    fn expire(&mut self, now: Instant) -> usize {
        let timeout = self.config.timeout;
        let before = self.pending.len();
        self.pending.retain(|source, transfer| {
            let stale = now.saturating_duration_since(transfer.last_activity) > timeout;
            if stale {
                log::debug!(
                    "[Decoder] transfer from {} timed out at fragment {:?}",
                    source,
                    transfer.decoder.received_fragment_index()
                );
            }
            !stale
        });
        let expired = before - self.pending.len();
        self.stats.transfers_timed_out += expired as u64;
        expired
    }

    /// Number of transfers in progress.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Statistics snapshot.
    pub fn stats(&self) -> AssemblerStats {
        let mut stats = self.stats.clone();
        stats.pending_transfers = self.pending.len();
        stats
    }

    fn make_room(&mut self) {
        while self.pending.len() >= self.config.max_pending.max(1) {
            let oldest = self
                .pending
                .iter()
                .min_by_key(|(_, transfer)| transfer.last_activity)
                .map(|(source, _)| *source);
            let Some(source) = oldest else {
                break;
            };
            self.pending.remove(&source);
            self.stats.transfers_evicted += 1;
            log::debug!("[Decoder] evicted stalled transfer from {}", source);
        }
    }
}

impl Default for InboundAssembler {
    fn default() -> Self {
        Self::new(AssemblerConfig::default())
    }
}
