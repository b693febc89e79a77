// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Header line parser.

use super::{
    DecodeError, BUFFER_MARKER, KEY_ACK_COOKIE, KEY_ACK_PORT, KEY_ADDRESS, KEY_CONTENT_LENGTH,
    KEY_DATE, KEY_FRAGMENT, KEY_FRAGMENT_OFFSET, KEY_FRAGMENT_SIZE, KEY_SEGMENTS,
    KEY_SENDER_ADDRESS,
};
use crate::message::{app_id_from_address, split_sender_address};

/// Header fields consumed from one fragment.
///
/// Absent optional keys take their protocol defaults: `Segments` 1,
/// `Fragment` 0, `Fragment-Offset` 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentHeader {
    /// `Date` (ms since epoch).
    pub date: Option<u64>,
    /// Application id taken from `Address`.
    pub app_id: Option<String>,
    /// Sender part of `SenderAddress`.
    pub from_address: Option<String>,
    /// Reply-to part of `SenderAddress` (empty when absent).
    pub reply_to_app_id: String,
    /// `Content-Length`.
    pub content_length: Option<usize>,
    /// `Segments`.
    pub segments: usize,
    /// `Fragment` (zero-based).
    pub fragment: usize,
    /// `Fragment-Size`.
    pub fragment_size: Option<usize>,
    /// `Fragment-Offset`.
    pub fragment_offset: usize,
    /// `Ack-Port`.
    pub ack_port: Option<u16>,
    /// `Ack-Cookie`.
    pub ack_cookie: Option<String>,
}

impl FragmentHeader {
    /// True if a later fragment must follow this one.
    pub fn is_more_expected(&self) -> bool {
        self.fragment + 1 < self.segments
    }
}

/// Parse the header of `buffer`.
///
/// Returns the consumed fields and the body slice starting right after
/// `Buffer:`.
pub fn parse_header(buffer: &[u8]) -> Result<(FragmentHeader, &[u8]), DecodeError> {
    let mut header = FragmentHeader {
        segments: 1,
        ..FragmentHeader::default()
    };
    let mut cursor = 0usize;

    loop {
        let rest = &buffer[cursor..];
        if rest.starts_with(BUFFER_MARKER) {
            return Ok((header, &rest[BUFFER_MARKER.len()..]));
        }

        let end = rest
            .iter()
            .position(|&b| b == b'\n')
            .ok_or(DecodeError::MissingBufferMarker)?;
        let line =
            std::str::from_utf8(&rest[..end]).map_err(|_| DecodeError::InvalidHeaderLine)?;
        cursor += end + 1;

        let line = line.strip_suffix('\r').unwrap_or(line);
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        apply_field(&mut header, key, value.trim())?;
    }
}

fn apply_field(header: &mut FragmentHeader, key: &str, value: &str) -> Result<(), DecodeError> {
    match key {
        KEY_DATE => header.date = Some(parse_number(KEY_DATE, value)?),
        KEY_CONTENT_LENGTH => {
            header.content_length = Some(parse_number(KEY_CONTENT_LENGTH, value)?);
        }
        KEY_SEGMENTS => header.segments = parse_number(KEY_SEGMENTS, value)?,
        KEY_FRAGMENT => header.fragment = parse_number(KEY_FRAGMENT, value)?,
        KEY_FRAGMENT_SIZE => header.fragment_size = Some(parse_number(KEY_FRAGMENT_SIZE, value)?),
        KEY_FRAGMENT_OFFSET => header.fragment_offset = parse_number(KEY_FRAGMENT_OFFSET, value)?,
        KEY_ACK_PORT => header.ack_port = Some(parse_number(KEY_ACK_PORT, value)?),
        KEY_ACK_COOKIE => {
            if !value.is_empty() {
                header.ack_cookie = Some(value.to_string());
            }
        }
        KEY_SENDER_ADDRESS => {
            let (from, reply_to) = split_sender_address(value);
            header.from_address = Some(from);
            header.reply_to_app_id = reply_to;
        }
        KEY_ADDRESS => header.app_id = app_id_from_address(value).map(str::to_string),
        _ => {}
    }
    Ok(())
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, DecodeError> {
    value.parse().map_err(|_| DecodeError::InvalidNumber {
        key,
        value: value.to_string(),
    })
}
