// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Textual MMS fragment wire format.
//!
//! Every datagram carries newline-delimited `Key: Value` header lines,
//! a literal `Buffer:` marker, and the raw body bytes immediately after it:
//!
//! ```text
//! Date: 1718000000000
//! Address: mms://:com.example.App
//! SenderAddress: mms://+15551234:com.example.Reply
//! Content-Type: multipart
//! Content-Length: 2600
//! Segments: 3
//! Fragment: 1
//! Fragment-Size: 1150
//! Fragment-Offset: 1150
//! Ack-Port: 40123
//! Ack-Cookie: 18c2f0a41b2-7
//! Buffer:<1150 raw bytes>
//! ```
//!
//! Keys are case-sensitive and unknown keys are ignored. Numbers are decimal
//! ASCII. Multi-fragment transfers are flow controlled: after each fragment
//! the receiver returns `ACK:{cookie}\n` to `Ack-Port` on the sender's host,
//! which releases the next fragment.

mod ack;
mod decoder;
mod encoder;
mod header;

pub use ack::{encode_ack, parse_ack, ACK_PREFIX};
pub use decoder::{AckRequest, FragmentDecoder, Progress};
pub use encoder::{AckEndpoint, EncodeError, FragmentEncoder, OutgoingMessage};
pub use header::{parse_header, FragmentHeader};

use thiserror::Error;

/// `Date` header key.
pub const KEY_DATE: &str = "Date";
/// `Address` header key.
pub const KEY_ADDRESS: &str = "Address";
/// `SenderAddress` header key.
pub const KEY_SENDER_ADDRESS: &str = "SenderAddress";
/// `Content-Type` header key.
pub const KEY_CONTENT_TYPE: &str = "Content-Type";
/// `Content-Length` header key.
pub const KEY_CONTENT_LENGTH: &str = "Content-Length";
/// `Segments` header key.
pub const KEY_SEGMENTS: &str = "Segments";
/// `Fragment` header key.
pub const KEY_FRAGMENT: &str = "Fragment";
/// `Fragment-Size` header key.
pub const KEY_FRAGMENT_SIZE: &str = "Fragment-Size";
/// `Fragment-Offset` header key.
pub const KEY_FRAGMENT_OFFSET: &str = "Fragment-Offset";
/// `Ack-Port` header key.
pub const KEY_ACK_PORT: &str = "Ack-Port";
/// `Ack-Cookie` header key.
pub const KEY_ACK_COOKIE: &str = "Ack-Cookie";

/// Marker separating the header from the body.
pub const BUFFER_MARKER: &[u8] = b"Buffer:";

/// Content type emitted by the encoder.
pub const CONTENT_TYPE_MULTIPART: &str = "multipart";

/// Reassembly failure. Fatal for the transfer it occurred in and only that one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// No `Buffer:` marker before the end of the datagram.
    #[error("missing Buffer: marker")]
    MissingBufferMarker,
    /// A header line is not valid UTF-8.
    #[error("header line is not valid UTF-8")]
    InvalidHeaderLine,
    /// A required header is absent.
    #[error("missing required header {0}")]
    MissingHeader(&'static str),
    /// A numeric header does not parse.
    #[error("invalid value {value:?} for header {key}")]
    InvalidNumber {
        /// Header key.
        key: &'static str,
        /// Offending value.
        value: String,
    },
    /// A fragment of a multi-fragment transfer carries no `Ack-Cookie`.
    #[error("fragment {fragment} of a multi-fragment transfer has no Ack-Cookie")]
    MissingCookie {
        /// Fragment index.
        fragment: usize,
    },
    /// `Segments` is zero or `Fragment` is not below it.
    #[error("fragment {fragment} out of range for {segments} segments")]
    FragmentOutOfRange {
        /// Fragment index.
        fragment: usize,
        /// Declared segment count.
        segments: usize,
    },
    /// Declared message exceeds the configured maximum.
    #[error("content length {content_length} exceeds maximum {max}")]
    TooLarge {
        /// Declared `Content-Length`.
        content_length: usize,
        /// Configured limit.
        max: usize,
    },
    /// `Fragment-Offset` + `Fragment-Size` falls outside `Content-Length`.
    #[error("fragment range {offset}+{size} outside content length {content_length}")]
    OutOfBounds {
        /// Declared offset.
        offset: usize,
        /// Declared size.
        size: usize,
        /// Declared total length.
        content_length: usize,
    },
    /// `Fragment-Offset` does not continue where the previous fragment ended.
    #[error("fragment starts at offset {got}, expected {expected}")]
    UnexpectedOffset {
        /// First byte not yet written.
        expected: usize,
        /// Declared offset.
        got: usize,
    },
    /// Fewer body bytes follow `Buffer:` than `Fragment-Size` declares.
    #[error("fragment declares {expected} bytes but carries {available}")]
    Truncated {
        /// Declared size.
        expected: usize,
        /// Bytes present after the marker.
        available: usize,
    },
    /// Continuation fragment without a transfer in progress.
    #[error("fragment {fragment} arrived with no transfer in progress")]
    NoTransfer {
        /// Fragment index.
        fragment: usize,
    },
    /// Fragment index skipped ahead or went backwards.
    #[error("expected fragment {expected}, got {got}")]
    OutOfOrder {
        /// Next expected index.
        expected: usize,
        /// Received index.
        got: usize,
    },
    /// Continuation disagrees with the first fragment.
    #[error("continuation disagrees with first fragment on {0}")]
    Inconsistent(&'static str),
    /// Final fragment arrived but the body is not fully covered.
    #[error("transfer ended with {received} of {content_length} bytes")]
    Incomplete {
        /// Bytes written.
        received: usize,
        /// Declared total.
        content_length: usize,
    },
}
