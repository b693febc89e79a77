// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Push registrations.
//!
//! A push registration keeps an application id routable while no connection
//! is open. Arrivals that pass the sender filter are pooled and wake the
//! registration's waiter, which typically launches the application; the
//! application then opens a [`crate::Connection`] and drains the pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::message::SuiteId;
use crate::registry::{
    ListenerClass, RegistrationToken, RegistryError, SenderFilter, WakeListener,
};
use crate::stack::MmsStack;
use crate::sync::WaitQueue;

/// Active push registration.
pub struct PushRegistration {
    stack: Arc<MmsStack>,
    app_id: String,
    suite_id: SuiteId,
    filter: Option<SenderFilter>,
    token: RegistrationToken,
    queue: Arc<WaitQueue>,
    active: AtomicBool,
}

impl PushRegistration {
    pub(crate) fn register(
        stack: Arc<MmsStack>,
        app_id: &str,
        suite_id: SuiteId,
        filter: Option<&str>,
    ) -> Result<Self> {
        let filter = filter.map(SenderFilter::new);
        let queue = Arc::new(WaitQueue::new());
        let token = stack.register_listener(
            app_id,
            suite_id,
            ListenerClass::Push,
            Arc::new(WakeListener::new(Arc::clone(&queue))),
            filter.clone(),
        )?;

        Ok(Self {
            stack,
            app_id: app_id.to_string(),
            suite_id,
            filter,
            token,
            queue,
            active: AtomicBool::new(true),
        })
    }

    /// Registered application id.
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Owning suite.
    pub fn suite_id(&self) -> SuiteId {
        self.suite_id
    }

    /// Sender filter, if any.
    pub fn filter(&self) -> Option<&str> {
        self.filter.as_ref().map(SenderFilter::as_str)
    }

    /// Number of pooled messages for the application id.
    pub fn pending(&self) -> usize {
        self.stack.pending(&self.app_id)
    }

    /// Block until at least one message for the application id is pooled.
    ///
    /// Returns the number pooled. The messages stay in the pool.
    pub fn wait_for_activity(&self) -> Result<usize> {
        let pool = self.stack.pool();
        let count = self.queue.wait_until(|| {
            let count = pool.lock().count_for(&self.app_id);
            (count > 0).then_some(count)
        })?;
        Ok(count)
    }

    /// Like [`wait_for_activity`](Self::wait_for_activity), returning
    /// `Ok(None)` after `timeout`.
    pub fn wait_for_activity_timeout(&self, timeout: Duration) -> Result<Option<usize>> {
        let pool = self.stack.pool();
        let count = self.queue.wait_until_timeout(timeout, || {
            let count = pool.lock().count_for(&self.app_id);
            (count > 0).then_some(count)
        })?;
        Ok(count)
    }

    /// Remove the registration and interrupt waiters. Idempotent.
    pub fn unregister(&self) -> Result<()> {
        if !self.active.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        let result = match self
            .stack
            .unregister_owned(&self.app_id, ListenerClass::Push, self.token)
        {
            Err(Error::Registry(RegistryError::NotRegistered { .. })) => Ok(()),
            other => other,
        };
        self.queue.interrupt();
        result
    }
}

impl Drop for PushRegistration {
    fn drop(&mut self) {
        let _ = self.unregister();
    }
}

impl std::fmt::Debug for PushRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushRegistration")
            .field("app_id", &self.app_id)
            .field("suite_id", &self.suite_id)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MmsConfig;
    use crate::dispatch::Disposition;
    use crate::message::Message;
    use crate::sync::WaitError;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_wait_for_activity_woken_by_arrival() {
        let stack = MmsStack::new(MmsConfig::default()).unwrap();
        let push = Arc::new(stack.register_push("app", SuiteId(1), Some("+1555*")).unwrap());

        let waiter = {
            let push = Arc::clone(&push);
            thread::spawn(move || push.wait_for_activity())
        };
        let deadline = Instant::now() + Duration::from_secs(5);
        while push.queue.waiters() == 0 {
            assert!(Instant::now() < deadline);
            thread::sleep(Duration::from_millis(1));
        }

        let rejected = stack.dispatch(Message::new("mms://+4420", "app", "", vec![1]));
        assert_eq!(rejected, Disposition::Discarded);

        let accepted = stack.dispatch(Message::new("mms://+15550001", "app", "", vec![2]));
        assert_eq!(accepted, Disposition::DeliveredToPush);
        assert_eq!(waiter.join().unwrap().unwrap(), 1);

        // The launched application drains the pool through a connection.
        let conn = stack.open("app", SuiteId(1)).unwrap();
        assert_eq!(conn.try_receive().unwrap().unwrap().body, vec![2]);
    }

    #[test]
    fn test_unregister_interrupts_waiter() {
        let stack = MmsStack::new(MmsConfig::default()).unwrap();
        let push = Arc::new(stack.register_push("app", SuiteId(1), None).unwrap());

        let waiter = {
            let push = Arc::clone(&push);
            thread::spawn(move || push.wait_for_activity())
        };
        let deadline = Instant::now() + Duration::from_secs(5);
        while push.queue.waiters() == 0 {
            assert!(Instant::now() < deadline);
            thread::sleep(Duration::from_millis(1));
        }

        push.unregister().unwrap();
        assert!(matches!(
            waiter.join().unwrap(),
            Err(Error::Wait(WaitError::Interrupted))
        ));
        assert!(!stack.is_registered("app", ListenerClass::Push));
        assert!(push.unregister().is_ok());
    }

    fn wait_for_waiters(waiters: impl Fn() -> usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while waiters() == 0 {
            assert!(Instant::now() < deadline, "consumer never blocked");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_blocked_connection_served_before_blocked_push() {
        let stack = MmsStack::new(MmsConfig::default()).unwrap();
        let push = Arc::new(stack.register_push("app", SuiteId(1), None).unwrap());
        let conn = Arc::new(stack.open("app", SuiteId(1)).unwrap());

        let push_waiter = {
            let push = Arc::clone(&push);
            thread::spawn(move || push.wait_for_activity())
        };
        let receiver = {
            let conn = Arc::clone(&conn);
            thread::spawn(move || conn.receive())
        };
        wait_for_waiters(|| push.queue.waiters());
        wait_for_waiters(|| conn.waiters());

        let disposition = stack.dispatch(Message::new("mms://+1", "app", "", vec![9]));
        assert_eq!(disposition, Disposition::DeliveredToMidlet);
        assert_eq!(receiver.join().unwrap().unwrap().body, vec![9]);

        // The push waiter was never woken and the message is gone.
        assert_eq!(push.queue.waiters(), 1);
        assert!(!push_waiter.is_finished());
        assert_eq!(push.pending(), 0);
        assert_eq!(stack.dispatch_stats().delivered_to_push, 0);

        push.unregister().unwrap();
        assert!(matches!(
            push_waiter.join().unwrap(),
            Err(Error::Wait(WaitError::Interrupted))
        ));
    }

    #[test]
    fn test_stale_unregister_keeps_new_owner() {
        let stack = MmsStack::new(MmsConfig::default()).unwrap();
        let stale = stack.register_push("app", SuiteId(1), None).unwrap();
        stack.remove_suite(SuiteId(1));

        let fresh = Arc::new(stack.register_push("app", SuiteId(2), None).unwrap());
        let waiter = {
            let fresh = Arc::clone(&fresh);
            thread::spawn(move || fresh.wait_for_activity())
        };
        wait_for_waiters(|| fresh.queue.waiters());

        drop(stale);
        assert!(stack.is_registered_for_suite("app", SuiteId(2), ListenerClass::Push));

        let disposition = stack.dispatch(Message::new("mms://+1", "app", "", vec![3]));
        assert_eq!(disposition, Disposition::DeliveredToPush);
        assert_eq!(waiter.join().unwrap().unwrap(), 1);
    }

    #[test]
    fn test_filter_exposed() {
        let stack = MmsStack::new(MmsConfig::default()).unwrap();
        let push = stack.register_push("app", SuiteId(1), Some("+44*")).unwrap();
        assert_eq!(push.filter(), Some("+44*"));
        assert_eq!(push.pending(), 0);
    }
}
