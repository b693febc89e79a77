// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test/bench code readability over pedantic
#![allow(clippy::cast_possible_truncation)] // Test parameters
#![allow(clippy::missing_panics_doc)] // Tests/examples panic on failure
#![allow(clippy::too_many_lines)] // Example/test code
#![allow(clippy::redundant_closure_for_method_calls)] // Test code clarity

//! End-to-end UDP loopback tests
//!
//! Two stacks on 127.0.0.1: one runs an [`InboundService`], the other sends
//! through a [`Connection`]. Covers single-fragment and multi-fragment
//! transfers, push wakeups and sender failure when nobody acknowledges.

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use mms::{
    Datagram, Disposition, Error, InboundService, ListenerClass, MmsConfig, MmsStack, SendStatus,
    SuiteId, UdpTransport, WaitError,
};

const TIMEOUT: Duration = Duration::from_secs(5);

fn loopback() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 0))
}

fn receiver_config() -> MmsConfig {
    let mut config = MmsConfig::default().with_phone_number("+15550001");
    config.read_timeout_ms = 20;
    config
}

fn sender_config(fragment_size: usize) -> MmsConfig {
    MmsConfig::default()
        .with_phone_number("+15550002")
        .with_fragment_size(fragment_size)
        .with_ack_timeout(Duration::from_millis(500))
        .with_bind_address("127.0.0.1".parse().unwrap())
}

fn start_receiver() -> (Arc<MmsStack>, InboundService) {
    let stack = MmsStack::new(receiver_config()).unwrap();
    let service = InboundService::bind(Arc::clone(&stack), loopback()).unwrap();
    (stack, service)
}

#[test]
fn test_single_fragment_message_delivered() {
    let (receiver, service) = start_receiver();
    let inbox = receiver.open("com.example.Inbox", SuiteId(1)).unwrap();

    let sender = MmsStack::new(sender_config(1150)).unwrap();
    let outbox = sender.open("com.example.Outbox", SuiteId(2)).unwrap();

    let status = outbox
        .send(service.local_addr(), "com.example.Inbox", b"hello")
        .unwrap();
    assert_eq!(status, SendStatus::Sent);

    let message = inbox.receive_timeout(TIMEOUT).unwrap().expect("message");
    assert_eq!(message.body, b"hello");
    assert_eq!(message.app_id, "com.example.Inbox");
    assert_eq!(message.from_address, "mms://+15550002");
    assert_eq!(message.reply_to_app_id, "com.example.Outbox");
    assert!(message.timestamp > 0);
}

#[test]
fn test_multi_fragment_message_reassembled() {
    let (receiver, service) = start_receiver();
    let inbox = Arc::new(receiver.open("com.example.Inbox", SuiteId(1)).unwrap());

    let reader = {
        let inbox = Arc::clone(&inbox);
        thread::spawn(move || inbox.receive())
    };

    let sender = MmsStack::new(sender_config(64)).unwrap();
    let outbox = sender.open("com.example.Outbox", SuiteId(2)).unwrap();

    let payload: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
    let status = outbox
        .send(service.local_addr(), "com.example.Inbox", &payload)
        .unwrap();
    assert_eq!(status, SendStatus::Sent);

    let message = reader.join().unwrap().unwrap();
    assert_eq!(message.body, payload);

    let stats = receiver.assembler_stats();
    assert_eq!(stats.messages_completed, 1);
    assert!(stats.fragments_received >= 16);
    assert_eq!(stats.pending_transfers, 0);
}

#[test]
fn test_push_registration_woken_over_udp() {
    let (receiver, service) = start_receiver();
    let push = Arc::new(
        receiver
            .register_push("com.example.Push", SuiteId(3), Some("+1555*"))
            .unwrap(),
    );

    let waiter = {
        let push = Arc::clone(&push);
        thread::spawn(move || push.wait_for_activity_timeout(TIMEOUT))
    };

    let sender = MmsStack::new(sender_config(1150)).unwrap();
    let outbox = sender.open("com.example.Outbox", SuiteId(2)).unwrap();
    outbox
        .send(service.local_addr(), "com.example.Push", b"wake up")
        .unwrap();

    assert_eq!(waiter.join().unwrap().unwrap(), Some(1));

    // Launched application picks the message up.
    push.unregister().unwrap();
    let conn = receiver.open("com.example.Push", SuiteId(3)).unwrap();
    assert_eq!(conn.try_receive().unwrap().unwrap().body, b"wake up");
}

#[test]
fn test_unknown_app_id_discarded() {
    let (receiver, service) = start_receiver();

    let sender = MmsStack::new(sender_config(1150)).unwrap();
    let outbox = sender.open("com.example.Outbox", SuiteId(2)).unwrap();
    outbox
        .send(service.local_addr(), "com.example.Nobody", b"lost")
        .unwrap();

    let deadline = Instant::now() + TIMEOUT;
    while receiver.dispatch_stats().discarded == 0 {
        assert!(Instant::now() < deadline, "message never dispatched");
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(receiver.pending("com.example.Nobody"), 0);
}

#[test]
fn test_send_fails_without_acknowledgement() {
    // Bound but silent: first fragment is never acknowledged.
    let silent = UdpTransport::bind(loopback(), None).unwrap();
    let dest = silent.local_addr().unwrap();

    let mut config = sender_config(32).with_ack_timeout(Duration::from_millis(30));
    config.ack_retries = 1;
    let sender = MmsStack::new(config).unwrap();
    let outbox = sender.open("com.example.Outbox", SuiteId(2)).unwrap();

    let status = outbox.send(dest, "com.example.Inbox", &[0u8; 200]).unwrap();
    assert_eq!(status, SendStatus::Failed);
}

#[test]
fn test_close_interrupts_pending_send() {
    let silent = UdpTransport::bind(loopback(), None).unwrap();
    let dest = silent.local_addr().unwrap();

    let mut config = sender_config(32).with_ack_timeout(Duration::from_millis(200));
    config.ack_retries = 10;
    let sender = MmsStack::new(config).unwrap();
    let outbox = Arc::new(sender.open("com.example.Outbox", SuiteId(2)).unwrap());

    let pending = {
        let outbox = Arc::clone(&outbox);
        thread::spawn(move || outbox.send(dest, "com.example.Inbox", &[1u8; 200]))
    };

    let deadline = Instant::now() + TIMEOUT;
    while !sender.is_sending(outbox.handle()) {
        assert!(Instant::now() < deadline, "send never started");
        thread::sleep(Duration::from_millis(1));
    }

    outbox.close().unwrap();
    assert!(matches!(
        pending.join().unwrap(),
        Err(Error::Wait(WaitError::Interrupted))
    ));
    assert!(!sender.is_registered("com.example.Outbox", ListenerClass::Midlet));
}

#[test]
fn test_service_stop_joins_thread() {
    let (receiver, mut service) = start_receiver();
    assert!(service.is_running());
    service.stop();
    assert!(!service.is_running());

    // Stack stays usable for direct dispatch.
    let _conn = receiver.open("app", SuiteId(1)).unwrap();
    let disposition = receiver.dispatch(mms::Message::new("mms://+1", "app", "", vec![1]));
    assert_eq!(disposition, Disposition::Pooled);
}
