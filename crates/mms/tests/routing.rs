// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test/bench code readability over pedantic
#![allow(clippy::cast_possible_truncation)] // Test parameters
#![allow(clippy::missing_panics_doc)] // Tests/examples panic on failure
#![allow(clippy::too_many_lines)] // Example/test code

//! Routing integration tests
//!
//! Drives [`MmsStack`] directly (no sockets): dispatch precedence between
//! midlet and push listeners, suite teardown, native interest reporting,
//! per-sender transfer isolation and pool eviction.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mms::wire::{AckEndpoint, OutgoingMessage};
use mms::{
    ClosureListener, DecodeError, Disposition, FragmentEncoder, Incoming, InterestEvent,
    ListenerClass, Message, MessageInfo, MessageListener, MmsConfig, MmsStack,
    RecordingInterest, SenderFilter, SuiteId,
};

fn counting_listener(claim: bool) -> (Arc<AtomicUsize>, Arc<dyn MessageListener>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let listener = ClosureListener::new(move |_info: &MessageInfo| {
        counter.fetch_add(1, Ordering::SeqCst);
        claim
    });
    (calls, Arc::new(listener))
}

fn message(from: &str, app_id: &str, body: &[u8]) -> Message {
    Message::new(from, app_id, "", body.to_vec())
}

fn source(port: u16) -> SocketAddr {
    SocketAddr::from(([10, 0, 0, 1], port))
}

fn fragments(payload: &[u8], app_id: &str, cookie: &str) -> Vec<Vec<u8>> {
    FragmentEncoder::new(8, "+15559999")
        .encode_all(&OutgoingMessage {
            payload,
            dest_app_id: app_id,
            source_app_id: "",
            timestamp: 42,
            ack: Some(AckEndpoint::new(4000, cookie)),
        })
        .unwrap()
}

/// Remove the `Ack-Cookie` line from an encoded fragment.
fn strip_cookie(wire: &[u8]) -> Vec<u8> {
    let marker = wire
        .windows(b"Buffer:".len())
        .position(|w| w == b"Buffer:")
        .unwrap();
    let header = std::str::from_utf8(&wire[..marker]).unwrap();
    let mut out: Vec<u8> = header
        .lines()
        .filter(|line| !line.starts_with("Ack-Cookie:"))
        .flat_map(|line| format!("{}\n", line).into_bytes())
        .collect();
    out.extend_from_slice(&wire[marker..]);
    out
}

// ============================================================================
// Dispatch precedence
// ============================================================================

#[test]
fn test_midlet_listener_takes_precedence() {
    let stack = MmsStack::new(MmsConfig::default()).unwrap();
    let (midlet_calls, midlet) = counting_listener(true);
    let (push_calls, push) = counting_listener(true);

    stack
        .register_listener("app", SuiteId(1), ListenerClass::Midlet, midlet, None)
        .unwrap();
    stack
        .register_listener("app", SuiteId(1), ListenerClass::Push, push, None)
        .unwrap();

    assert_eq!(
        stack.dispatch(message("mms://+1", "app", b"x")),
        Disposition::DeliveredToMidlet
    );
    assert_eq!(midlet_calls.load(Ordering::SeqCst), 1);
    assert_eq!(push_calls.load(Ordering::SeqCst), 0);
    assert_eq!(stack.pending("app"), 1);
}

#[test]
fn test_push_tried_when_midlet_declines() {
    let stack = MmsStack::new(MmsConfig::default()).unwrap();
    let (midlet_calls, midlet) = counting_listener(false);
    let (push_calls, push) = counting_listener(true);

    stack
        .register_listener("app", SuiteId(1), ListenerClass::Midlet, midlet, None)
        .unwrap();
    stack
        .register_listener(
            "app",
            SuiteId(1),
            ListenerClass::Push,
            push,
            Some(SenderFilter::new("+1*")),
        )
        .unwrap();

    assert_eq!(
        stack.dispatch(message("mms://+15551234:reply.App", "app", b"x")),
        Disposition::DeliveredToPush
    );
    // Filtered out: midlet declines, push never asked.
    assert_eq!(
        stack.dispatch(message("mms://+4420", "app", b"y")),
        Disposition::Pooled
    );
    assert_eq!(midlet_calls.load(Ordering::SeqCst), 2);
    assert_eq!(push_calls.load(Ordering::SeqCst), 1);
    assert_eq!(stack.pending("app"), 2);

    let stats = stack.dispatch_stats();
    assert_eq!(stats.delivered_to_push, 1);
    assert_eq!(stats.pooled, 1);
}

#[test]
fn test_filtered_push_only_discards() {
    let stack = MmsStack::new(MmsConfig::default()).unwrap();
    let (_calls, push) = counting_listener(true);
    stack
        .register_listener(
            "app",
            SuiteId(1),
            ListenerClass::Push,
            push,
            Some(SenderFilter::new("+1555????")),
        )
        .unwrap();

    assert_eq!(
        stack.dispatch(message("mms://+15551", "app", b"x")),
        Disposition::Discarded
    );
    assert_eq!(
        stack.dispatch(message("mms://+15551234", "app", b"x")),
        Disposition::DeliveredToPush
    );
    assert_eq!(stack.pending("app"), 1);
}

// ============================================================================
// Suite teardown and interest
// ============================================================================

#[test]
fn test_remove_suite_purges_registrations_and_pool() {
    let interest = Arc::new(RecordingInterest::new());
    let stack = MmsStack::with_interest(MmsConfig::default(), interest.clone()).unwrap();

    let conn = stack.open("a.App", SuiteId(1)).unwrap();
    let _push = stack.register_push("b.App", SuiteId(1), None).unwrap();
    let _other = stack.open("c.App", SuiteId(2)).unwrap();

    stack.dispatch(message("mms://+1", "a.App", b"1"));
    stack.dispatch(message("mms://+1", "b.App", b"2"));
    stack.dispatch(message("mms://+1", "c.App", b"3"));
    interest.clear();

    assert_eq!(stack.remove_suite(SuiteId(1)), 2);

    assert!(!stack.is_registered("a.App", ListenerClass::Midlet));
    assert!(!stack.is_registered("b.App", ListenerClass::Push));
    assert!(stack.is_registered_for_suite("c.App", SuiteId(2), ListenerClass::Midlet));
    assert_eq!(stack.pending("a.App"), 0);
    assert_eq!(stack.pending("b.App"), 0);
    assert_eq!(stack.pending("c.App"), 1);

    let mut events = interest.events();
    events.sort_by_key(|e| format!("{:?}", e));
    assert_eq!(
        events,
        vec![
            InterestEvent::Removed("a.App".into()),
            InterestEvent::Removed("b.App".into()),
        ]
    );

    // Connection handles survive teardown and close cleanly.
    assert!(conn.receive().is_err());
    assert!(conn.close().is_ok());
}

#[test]
fn test_shared_app_id_keeps_interest() {
    let interest = Arc::new(RecordingInterest::new());
    let stack = MmsStack::with_interest(MmsConfig::default(), interest.clone()).unwrap();

    let push = stack.register_push("app", SuiteId(1), None).unwrap();
    let conn = stack.open("app", SuiteId(1)).unwrap();
    // Second registration of the same suite does not re-assert.
    assert_eq!(interest.events(), vec![InterestEvent::Added("app".into())]);

    conn.close().unwrap();
    // Push still holds the id.
    assert_eq!(interest.events().len(), 1);

    push.unregister().unwrap();
    assert_eq!(
        interest.events(),
        vec![
            InterestEvent::Added("app".into()),
            InterestEvent::Removed("app".into())
        ]
    );
}

// ============================================================================
// Inbound transfers
// ============================================================================

#[test]
fn test_interleaved_senders_reassemble_independently() {
    let stack = MmsStack::new(MmsConfig::default()).unwrap();
    let _conn = stack.open("app", SuiteId(1)).unwrap();

    let a = fragments(b"first sender payload", "app", "ca");
    let b = fragments(b"second sender, longer payload", "app", "cb");

    let mut dispositions = Vec::new();
    for i in 0..a.len().max(b.len()) {
        for (wire, port) in [(a.get(i), 1), (b.get(i), 2)] {
            if let Some(wire) = wire {
                if let Incoming::Dispatched(d) = stack.notify_incoming_fragment(source(port), wire) {
                    dispositions.push(d);
                }
            }
        }
    }

    assert_eq!(dispositions, vec![Disposition::Pooled, Disposition::Pooled]);
    assert_eq!(stack.take_message("app").unwrap().body, b"first sender payload");
    assert_eq!(
        stack.take_message("app").unwrap().body,
        b"second sender, longer payload"
    );
}

#[test]
fn test_cookie_mismatch_aborts_only_that_sender() {
    let stack = MmsStack::new(MmsConfig::default()).unwrap();
    let _conn = stack.open("app", SuiteId(1)).unwrap();

    let good = fragments(b"survives the other abort", "app", "good");
    let bad = fragments(b"aborted halfway through", "app", "bad");
    let cookieless = strip_cookie(&bad[1]);

    stack.notify_incoming_fragment(source(1), &good[0]);
    stack.notify_incoming_fragment(source(2), &bad[0]);
    assert!(matches!(
        stack.notify_incoming_fragment(source(2), &cookieless),
        Incoming::Aborted(DecodeError::MissingCookie { fragment: 1 })
    ));
    // The rest of the aborted transfer has nothing to attach to.
    assert!(matches!(
        stack.notify_incoming_fragment(source(2), &bad[2]),
        Incoming::Aborted(DecodeError::NoTransfer { fragment: 2 })
    ));

    for wire in &good[1..] {
        stack.notify_incoming_fragment(source(1), wire);
    }
    assert_eq!(
        stack.take_message("app").unwrap().body,
        b"survives the other abort"
    );
    assert!(stack.take_message("app").is_none());
    assert_eq!(stack.assembler_stats().transfers_aborted, 2);
}

#[test]
fn test_duplicate_fragment_reacknowledged() {
    let stack = MmsStack::new(MmsConfig::default()).unwrap();
    let _conn = stack.open("app", SuiteId(1)).unwrap();
    let wires = fragments(b"retransmitted fragments", "app", "dup");

    let first = stack.notify_incoming_fragment(source(1), &wires[0]);
    let again = stack.notify_incoming_fragment(source(1), &wires[0]);
    assert_eq!(first, again);
    assert!(matches!(first, Incoming::NeedMore(_)));

    for wire in &wires[1..] {
        stack.notify_incoming_fragment(source(1), wire);
    }
    assert_eq!(stack.pending("app"), 1);
}

#[test]
fn test_overlapping_fragment_never_completes() {
    let stack = MmsStack::new(MmsConfig::default()).unwrap();
    let _conn = stack.open("app", SuiteId(1)).unwrap();

    let wire = |index: usize, body: &[u8]| -> Vec<u8> {
        let mut bytes = format!(
            "Address: mms://:app\nContent-Length: 10\nSegments: 2\nFragment: {}\n\
             Fragment-Size: 5\nFragment-Offset: 0\nAck-Port: 4000\nAck-Cookie: c\nBuffer:",
            index
        )
        .into_bytes();
        bytes.extend_from_slice(body);
        bytes
    };

    assert!(matches!(
        stack.notify_incoming_fragment(source(1), &wire(0, b"AAAAA")),
        Incoming::NeedMore(_)
    ));
    assert!(matches!(
        stack.notify_incoming_fragment(source(1), &wire(1, b"BBBBB")),
        Incoming::Aborted(DecodeError::UnexpectedOffset { expected: 5, got: 0 })
    ));
    assert_eq!(stack.pending("app"), 0);
    assert_eq!(stack.dispatch_stats().pooled, 0);
}

// ============================================================================
// Pool
// ============================================================================

#[test]
fn test_pool_evicts_oldest_across_app_ids() {
    let stack = MmsStack::new(MmsConfig::default().with_pool_capacity(3)).unwrap();
    let _a = stack.open("a", SuiteId(1)).unwrap();
    let _b = stack.open("b", SuiteId(1)).unwrap();

    stack.dispatch(message("mms://+1", "a", b"a1"));
    stack.dispatch(message("mms://+1", "b", b"b1"));
    stack.dispatch(message("mms://+1", "a", b"a2"));
    stack.dispatch(message("mms://+1", "b", b"b2"));

    assert_eq!(stack.pending("a"), 1);
    assert_eq!(stack.pending("b"), 2);
    assert_eq!(stack.take_message("a").unwrap().body, b"a2");
    assert_eq!(stack.pool_stats().evicted, 1);
}
