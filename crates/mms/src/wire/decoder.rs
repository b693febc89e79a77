// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fragment decoder and per-transfer reassembly state.
//!
//! One [`FragmentDecoder`] tracks one transfer from one sender. Fragment 0
//! allocates the body at `Content-Length`; each later fragment writes
//! `Fragment-Size` bytes at `Fragment-Offset`. Every write is bounds-checked
//! against the declared length and the bytes actually present, and must
//! start where the previous one ended, so a completed body is fully covered.
//!
//! Any error discards the accumulated body. The decoder never performs I/O:
//! when more fragments are expected it returns an [`AckRequest`] and the
//! caller sends `ACK:{cookie}` itself.

use super::header::{parse_header, FragmentHeader};
use super::{DecodeError, KEY_ACK_PORT, KEY_ADDRESS, KEY_CONTENT_LENGTH, KEY_FRAGMENT_SIZE};
use crate::message::Message;

/// Flow-control request: send `ACK:{cookie}\n` to `port` on the sender's host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckRequest {
    /// Cookie to echo.
    pub cookie: String,
    /// Sender's acknowledgement port.
    pub port: u16,
}

/// Outcome of feeding one fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// More fragments are expected; acknowledge to release the next one.
    More(AckRequest),
    /// The transfer is complete.
    Complete(Message),
}

impl Progress {
    /// True while the transfer still expects fragments.
    pub fn is_more_expected(&self) -> bool {
        matches!(self, Progress::More(_))
    }
}

/// In-flight transfer.
#[derive(Debug)]
struct ReassemblyState {
    expected_total_segments: usize,
    received_fragment_index: usize,
    accumulated_body: Vec<u8>,
    filled: usize,
    ack_cookie: Option<String>,
    ack_port: Option<u16>,
    from_address: String,
    app_id: String,
    reply_to_app_id: String,
    timestamp: u64,
}

impl ReassemblyState {
    fn content_length(&self) -> usize {
        self.accumulated_body.len()
    }

    /// Copy `size` bytes of `body` to `offset`, which must equal `filled`.
    fn write(&mut self, offset: usize, size: usize, body: &[u8]) -> Result<(), DecodeError> {
        let content_length = self.content_length();
        let end = offset
            .checked_add(size)
            .filter(|&end| end <= content_length)
            .ok_or(DecodeError::OutOfBounds {
                offset,
                size,
                content_length,
            })?;
        if offset != self.filled {
            return Err(DecodeError::UnexpectedOffset {
                expected: self.filled,
                got: offset,
            });
        }
        if body.len() < size {
            return Err(DecodeError::Truncated {
                expected: size,
                available: body.len(),
            });
        }

        self.accumulated_body[offset..end].copy_from_slice(&body[..size]);
        self.filled += size;
        Ok(())
    }

    fn ack_request(&self) -> Result<AckRequest, DecodeError> {
        let cookie = self
            .ack_cookie
            .clone()
            .ok_or(DecodeError::MissingCookie {
                fragment: self.received_fragment_index,
            })?;
        let port = self.ack_port.ok_or(DecodeError::MissingHeader(KEY_ACK_PORT))?;
        Ok(AckRequest { cookie, port })
    }

    /// Same fragment index and cookie as the last accepted fragment.
    fn is_duplicate(&self, header: &FragmentHeader) -> bool {
        header.fragment == self.received_fragment_index
            && header.segments == self.expected_total_segments
            && header.ack_cookie == self.ack_cookie
    }

    fn into_message(self) -> Result<Message, DecodeError> {
        let content_length = self.content_length();
        if self.filled != content_length {
            return Err(DecodeError::Incomplete {
                received: self.filled,
                content_length,
            });
        }
        Ok(Message {
            from_address: self.from_address,
            app_id: self.app_id,
            reply_to_app_id: self.reply_to_app_id,
            timestamp: self.timestamp,
            body: self.accumulated_body,
        })
    }
}

/// Decoder for the fragments of one sender.
#[derive(Debug)]
pub struct FragmentDecoder {
    max_message_size: usize,
    state: Option<ReassemblyState>,
}

impl FragmentDecoder {
    /// Create a decoder that rejects declared lengths above `max_message_size`.
    pub fn new(max_message_size: usize) -> Self {
        Self {
            max_message_size,
            state: None,
        }
    }

    /// True while a multi-fragment transfer is in progress.
    pub fn in_progress(&self) -> bool {
        self.state.is_some()
    }

    /// Index of the last accepted fragment, if a transfer is in progress.
    pub fn received_fragment_index(&self) -> Option<usize> {
        self.state.as_ref().map(|s| s.received_fragment_index)
    }

    /// Drop any partial transfer.
    pub fn abandon(&mut self) {
        self.state = None;
    }

    /// Feed one datagram.
    ///
    /// On error the transfer is abandoned and its partial body discarded.
    pub fn decode(&mut self, buffer: &[u8]) -> Result<Progress, DecodeError> {
        let result = self.decode_inner(buffer);
        if result.is_err() {
            self.state = None;
        }
        result
    }

    fn decode_inner(&mut self, buffer: &[u8]) -> Result<Progress, DecodeError> {
        let (header, body) = parse_header(buffer)?;

        if header.segments == 0 || header.fragment >= header.segments {
            return Err(DecodeError::FragmentOutOfRange {
                fragment: header.fragment,
                segments: header.segments,
            });
        }
        if header.segments > 1 && header.ack_cookie.is_none() {
            return Err(DecodeError::MissingCookie {
                fragment: header.fragment,
            });
        }

        if header.fragment == 0 {
            if let Some(state) = &self.state {
                if state.is_duplicate(&header) {
                    log::debug!("[Decoder] duplicate fragment 0, re-acknowledging");
                    return state.ack_request().map(Progress::More);
                }
                log::debug!(
                    "[Decoder] new transfer replaces one stalled at fragment {}",
                    state.received_fragment_index
                );
            }
            self.state = Some(self.start(&header, body)?);
        } else {
            let state = self.state.as_mut().ok_or(DecodeError::NoTransfer {
                fragment: header.fragment,
            })?;
            if state.is_duplicate(&header) {
                log::debug!(
                    "[Decoder] duplicate fragment {}, re-acknowledging",
                    header.fragment
                );
                return state.ack_request().map(Progress::More);
            }
            continue_transfer(state, &header, body)?;
        }

        if header.is_more_expected() {
            match &self.state {
                Some(state) => state.ack_request().map(Progress::More),
                None => Err(DecodeError::NoTransfer {
                    fragment: header.fragment,
                }),
            }
        } else {
            match self.state.take() {
                Some(state) => state.into_message().map(Progress::Complete),
                None => Err(DecodeError::NoTransfer {
                    fragment: header.fragment,
                }),
            }
        }
    }

    fn start(&self, header: &FragmentHeader, body: &[u8]) -> Result<ReassemblyState, DecodeError> {
        let content_length = header
            .content_length
            .ok_or(DecodeError::MissingHeader(KEY_CONTENT_LENGTH))?;
        if content_length > self.max_message_size {
            return Err(DecodeError::TooLarge {
                content_length,
                max: self.max_message_size,
            });
        }
        let app_id = header
            .app_id
            .clone()
            .ok_or(DecodeError::MissingHeader(KEY_ADDRESS))?;
        if header.is_more_expected() && header.ack_port.is_none() {
            return Err(DecodeError::MissingHeader(KEY_ACK_PORT));
        }

        let mut state = ReassemblyState {
            expected_total_segments: header.segments,
            received_fragment_index: 0,
            accumulated_body: vec![0u8; content_length],
            filled: 0,
            ack_cookie: header.ack_cookie.clone(),
            ack_port: header.ack_port,
            from_address: header.from_address.clone().unwrap_or_default(),
            app_id,
            reply_to_app_id: header.reply_to_app_id.clone(),
            timestamp: header.date.unwrap_or(0),
        };

        let size = header.fragment_size.unwrap_or(content_length);
        state.write(header.fragment_offset, size, body)?;
        Ok(state)
    }
}

fn continue_transfer(
    state: &mut ReassemblyState,
    header: &FragmentHeader,
    body: &[u8],
) -> Result<(), DecodeError> {
    if header.segments != state.expected_total_segments {
        return Err(DecodeError::Inconsistent("Segments"));
    }
    if let Some(content_length) = header.content_length {
        if content_length != state.content_length() {
            return Err(DecodeError::Inconsistent("Content-Length"));
        }
    }
    let expected = state.received_fragment_index + 1;
    if header.fragment != expected {
        return Err(DecodeError::OutOfOrder {
            expected,
            got: header.fragment,
        });
    }

    let size = header
        .fragment_size
        .ok_or(DecodeError::MissingHeader(KEY_FRAGMENT_SIZE))?;
    state.write(header.fragment_offset, size, body)?;

    state.received_fragment_index = header.fragment;
    state.ack_cookie = header.ack_cookie.clone();
    if header.ack_port.is_some() {
        state.ack_port = header.ack_port;
    }
    if header.is_more_expected() && state.ack_port.is_none() {
        return Err(DecodeError::MissingHeader(KEY_ACK_PORT));
    }
    Ok(())
}
