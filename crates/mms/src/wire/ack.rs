// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `ACK:{cookie}` flow-control datagrams.

/// Prefix of every acknowledgement datagram.
pub const ACK_PREFIX: &[u8] = b"ACK:";

/// Build the acknowledgement for `cookie`.
pub fn encode_ack(cookie: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(ACK_PREFIX.len() + cookie.len() + 1);
    buf.extend_from_slice(ACK_PREFIX);
    buf.extend_from_slice(cookie.as_bytes());
    buf.push(b'\n');
    buf
}

/// Extract the cookie from an acknowledgement datagram.
///
/// Trailing `\r`/`\n` are stripped. Returns `None` for anything that is not
/// a well-formed acknowledgement.
pub fn parse_ack(datagram: &[u8]) -> Option<&str> {
    let rest = datagram.strip_prefix(ACK_PREFIX)?;
    let text = std::str::from_utf8(rest).ok()?;
    let cookie = text.trim_end_matches(|c: char| c == '\r' || c == '\n');
    if cookie.is_empty() || cookie.contains('\n') {
        None
    } else {
        Some(cookie)
    }
}
