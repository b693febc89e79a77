// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fragment encoder.
//!
//! Splits an outgoing payload into `Segments` datagrams of at most
//! `fragment_size` body bytes. Fragment `i` covers
//! `[i * fragment_size, min((i + 1) * fragment_size, len))`; a single-segment
//! message always carries the whole payload.

use std::fmt::Write as _;

use thiserror::Error;

use super::{
    BUFFER_MARKER, CONTENT_TYPE_MULTIPART, KEY_ACK_COOKIE, KEY_ACK_PORT, KEY_ADDRESS,
    KEY_CONTENT_LENGTH, KEY_CONTENT_TYPE, KEY_DATE, KEY_FRAGMENT, KEY_FRAGMENT_OFFSET,
    KEY_FRAGMENT_SIZE, KEY_SEGMENTS, KEY_SENDER_ADDRESS,
};
use crate::config::MmsConfig;
use crate::message::MMS_SCHEME;

/// Encoder failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// Fragment size of zero.
    #[error("fragment size must be non-zero")]
    ZeroFragmentSize,
    /// Requested fragment index is not below the segment count.
    #[error("fragment {fragment} out of range for {segments} segments")]
    FragmentOutOfRange {
        /// Requested index.
        fragment: usize,
        /// Segment count.
        segments: usize,
    },
    /// Fragment would start past the end of the payload.
    #[error("fragment {fragment} starts at {offset}, past payload length {len}")]
    EmptyFragment {
        /// Requested index.
        fragment: usize,
        /// Computed offset.
        offset: usize,
        /// Payload length.
        len: usize,
    },
    /// Multi-fragment transfer without an acknowledgement endpoint.
    #[error("multi-fragment transfer requires an Ack-Port and Ack-Cookie")]
    MissingAckEndpoint,
    /// Application id contains a line break or is empty.
    #[error("invalid application id {0:?}")]
    InvalidAppId(String),
    /// Encoded datagram exceeds the configured maximum.
    #[error("datagram of {size} bytes exceeds maximum {max}")]
    DatagramTooLarge {
        /// Encoded size.
        size: usize,
        /// Configured limit.
        max: usize,
    },
}

/// Where the receiver sends `ACK:{cookie}` for a multi-fragment transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckEndpoint {
    /// Local UDP port the sender listens on for acknowledgements.
    pub port: u16,
    /// Transfer cookie.
    pub cookie: String,
}

impl AckEndpoint {
    /// Create an endpoint.
    pub fn new(port: u16, cookie: impl Into<String>) -> Self {
        Self {
            port,
            cookie: cookie.into(),
        }
    }
}

/// One message to encode.
#[derive(Debug, Clone)]
pub struct OutgoingMessage<'a> {
    /// Body bytes.
    pub payload: &'a [u8],
    /// Destination application id.
    pub dest_app_id: &'a str,
    /// Sending application id, appended to `SenderAddress` as the reply-to
    /// when non-empty.
    pub source_app_id: &'a str,
    /// `Date` header value (ms since epoch).
    pub timestamp: u64,
    /// Required when the message spans more than one segment.
    pub ack: Option<AckEndpoint>,
}

/// Stateless fragment encoder for one local phone number.
#[derive(Debug, Clone)]
pub struct FragmentEncoder {
    fragment_size: usize,
    phone_number: String,
    max_datagram_size: Option<usize>,
}

impl FragmentEncoder {
    /// Create an encoder with no datagram size limit.
    pub fn new(fragment_size: usize, phone_number: impl Into<String>) -> Self {
        Self {
            fragment_size,
            phone_number: phone_number.into(),
            max_datagram_size: None,
        }
    }

    /// Create an encoder from the stack configuration.
    pub fn from_config(config: &MmsConfig) -> Self {
        Self {
            fragment_size: config.fragment_size,
            phone_number: config.phone_number.clone(),
            max_datagram_size: Some(config.max_datagram_size),
        }
    }

    /// Body bytes per fragment.
    pub fn fragment_size(&self) -> usize {
        self.fragment_size
    }

    /// Number of segments needed for a payload of `len` bytes (at least 1).
    pub fn segment_count(&self, len: usize) -> usize {
        if self.fragment_size == 0 || len <= self.fragment_size {
            1
        } else {
            (len + self.fragment_size - 1) / self.fragment_size
        }
    }

    /// Encode fragment `index` of `segments`.
    pub fn encode(
        &self,
        msg: &OutgoingMessage<'_>,
        index: usize,
        segments: usize,
    ) -> Result<Vec<u8>, EncodeError> {
        if self.fragment_size == 0 {
            return Err(EncodeError::ZeroFragmentSize);
        }
        if index >= segments {
            return Err(EncodeError::FragmentOutOfRange {
                fragment: index,
                segments,
            });
        }
        if msg.dest_app_id.is_empty() || msg.dest_app_id.contains(|c: char| c == '\n' || c == '\r') {
            return Err(EncodeError::InvalidAppId(msg.dest_app_id.to_string()));
        }
        if msg.source_app_id.contains(|c: char| matches!(c, '\n' | '\r' | ':')) {
            return Err(EncodeError::InvalidAppId(msg.source_app_id.to_string()));
        }

        let len = msg.payload.len();
        let (offset, size) = if segments == 1 {
            (0, len)
        } else {
            let offset = index * self.fragment_size;
            if offset >= len {
                return Err(EncodeError::EmptyFragment {
                    fragment: index,
                    offset,
                    len,
                });
            }
            let size = if index + 1 == segments {
                len - offset
            } else {
                self.fragment_size.min(len - offset)
            };
            (offset, size)
        };

        let mut header = String::with_capacity(256);
        // Writing to a String cannot fail.
        let _ = writeln!(header, "{}: {}", KEY_DATE, msg.timestamp);
        let _ = writeln!(header, "{}: {}:{}", KEY_ADDRESS, MMS_SCHEME, msg.dest_app_id);
        if msg.source_app_id.is_empty() {
            let _ = writeln!(header, "{}: {}{}", KEY_SENDER_ADDRESS, MMS_SCHEME, self.phone_number);
        } else {
            let _ = writeln!(
                header,
                "{}: {}{}:{}",
                KEY_SENDER_ADDRESS, MMS_SCHEME, self.phone_number, msg.source_app_id
            );
        }
        let _ = writeln!(header, "{}: {}", KEY_CONTENT_TYPE, CONTENT_TYPE_MULTIPART);
        let _ = writeln!(header, "{}: {}", KEY_CONTENT_LENGTH, len);
        let _ = writeln!(header, "{}: {}", KEY_SEGMENTS, segments);

        if segments > 1 {
            let ack = msg.ack.as_ref().ok_or(EncodeError::MissingAckEndpoint)?;
            let _ = writeln!(header, "{}: {}", KEY_FRAGMENT, index);
            let _ = writeln!(header, "{}: {}", KEY_FRAGMENT_SIZE, size);
            let _ = writeln!(header, "{}: {}", KEY_FRAGMENT_OFFSET, offset);
            let _ = writeln!(header, "{}: {}", KEY_ACK_PORT, ack.port);
            let _ = writeln!(header, "{}: {}", KEY_ACK_COOKIE, ack.cookie);
        }

        let mut wire = Vec::with_capacity(header.len() + BUFFER_MARKER.len() + size);
        wire.extend_from_slice(header.as_bytes());
        wire.extend_from_slice(BUFFER_MARKER);
        wire.extend_from_slice(&msg.payload[offset..offset + size]);

        if let Some(max) = self.max_datagram_size {
            if wire.len() > max {
                return Err(EncodeError::DatagramTooLarge {
                    size: wire.len(),
                    max,
                });
            }
        }
        Ok(wire)
    }

    /// Encode every segment of `msg`.
    pub fn encode_all(&self, msg: &OutgoingMessage<'_>) -> Result<Vec<Vec<u8>>, EncodeError> {
        let segments = self.segment_count(msg.payload.len());
        (0..segments)
            .map(|index| self.encode(msg, index, segments))
            .collect()
    }
}
