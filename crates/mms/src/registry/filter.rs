// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Push sender filter.
//!
//! Glob over the bare sender (`+15551234`, no scheme, no reply-to):
//!
//! | Pattern | Matches |
//! |---------|---------|
//! | `*` | any sender |
//! | `+1555*` | senders starting with `+1555` |
//! | `+1555?234` | exactly one character at `?` |

use crate::message::bare_sender;

/// Compiled push filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderFilter {
    pattern: Vec<char>,
    source: String,
}

impl SenderFilter {
    /// Build a filter from a glob pattern.
    pub fn new(pattern: impl Into<String>) -> Self {
        let source = pattern.into();
        Self {
            pattern: source.chars().collect(),
            source,
        }
    }

    /// The pattern as given.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Match against a sender address, with or without `mms://` and reply-to.
    pub fn matches(&self, from_address: &str) -> bool {
        let sender: Vec<char> = bare_sender(from_address).chars().collect();
        glob_match(&self.pattern, &sender)
    }
}

/// Iterative `*`/`?` matcher with single-star backtracking.
fn glob_match(pattern: &[char], text: &[char]) -> bool {
    let (mut p, mut t) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                star = Some((p, t));
                p += 1;
            }
            Some('?') => {
                p += 1;
                t += 1;
            }
            Some(&c) if c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match star {
                Some((sp, st)) => {
                    p = sp + 1;
                    t = st + 1;
                    star = Some((sp, st + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}
