// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Blocking primitive for message consumers.
//!
//! A [`WaitQueue`] parks consumer threads until the dispatcher wakes exactly
//! one of them, or until the owner interrupts all of them on close.
//!
//! The availability check passed to [`WaitQueue::wait_until`] runs with the
//! queue lock held. A producer makes data visible *before* calling
//! [`WaitQueue::wake_one`], which takes the same lock, so a wake can never
//! fall between a failed check and the thread going to sleep.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

/// Wait failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WaitError {
    /// The queue was interrupted (connection closed or listener unregistered).
    #[error("wait interrupted")]
    Interrupted,
}

#[derive(Debug, Default)]
struct WaitState {
    /// Threads currently parked.
    waiting: usize,
    /// Wakes issued but not yet consumed by a parked thread.
    pending_wakes: usize,
    interrupted: bool,
}

/// Wake-one / interrupt-all wait queue.
#[derive(Debug, Default)]
pub struct WaitQueue {
    state: Mutex<WaitState>,
    condvar: Condvar,
}

impl WaitQueue {
    /// Create a queue with no waiters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `check` yields a value or the queue is interrupted.
    ///
    /// `check` runs under the queue lock, before the first park and after
    /// every wake.
    pub fn wait_until<T>(&self, mut check: impl FnMut() -> Option<T>) -> Result<T, WaitError> {
        let mut state = self.state.lock();
        loop {
            if state.interrupted {
                return Err(WaitError::Interrupted);
            }
            if let Some(value) = check() {
                return Ok(value);
            }

            state.waiting += 1;
            self.condvar.wait(&mut state);
            state.waiting -= 1;
            state.pending_wakes = state.pending_wakes.saturating_sub(1);
        }
    }

    /// Like [`wait_until`](Self::wait_until), giving up after `timeout`.
    ///
    /// Returns `Ok(None)` on timeout.
    pub fn wait_until_timeout<T>(
        &self,
        timeout: Duration,
        mut check: impl FnMut() -> Option<T>,
    ) -> Result<Option<T>, WaitError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if state.interrupted {
                return Err(WaitError::Interrupted);
            }
            if let Some(value) = check() {
                return Ok(Some(value));
            }

            state.waiting += 1;
            let result = self.condvar.wait_until(&mut state, deadline);
            state.waiting -= 1;
            state.pending_wakes = state.pending_wakes.saturating_sub(1);

            if result.timed_out() {
                if state.interrupted {
                    return Err(WaitError::Interrupted);
                }
                return Ok(check());
            }
        }
    }

    /// Wake one parked thread.
    ///
    /// Returns `true` if a thread was parked and not already being woken,
    /// i.e. this call unblocked somebody.
    pub fn wake_one(&self) -> bool {
        let mut state = self.state.lock();
        if state.interrupted || state.waiting <= state.pending_wakes {
            return false;
        }
        state.pending_wakes += 1;
        self.condvar.notify_one();
        true
    }

    /// Interrupt every current and future waiter.
    pub fn interrupt(&self) {
        let mut state = self.state.lock();
        if !state.interrupted {
            state.interrupted = true;
            self.condvar.notify_all();
        }
    }

    /// True once [`interrupt`](Self::interrupt) has been called.
    pub fn is_interrupted(&self) -> bool {
        self.state.lock().interrupted
    }

    /// Number of threads currently parked.
    pub fn waiters(&self) -> usize {
        self.state.lock().waiting
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    fn wait_for_waiters(queue: &WaitQueue, n: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while queue.waiters() < n {
            assert!(Instant::now() < deadline, "waiters never parked");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_ready_value_returns_immediately() {
        let queue = WaitQueue::new();
        assert_eq!(queue.wait_until(|| Some(5)), Ok(5));
    }

    #[test]
    fn test_wake_without_waiter_is_not_claimed() {
        let queue = WaitQueue::new();
        assert!(!queue.wake_one());
    }

    #[test]
    fn test_wake_one_unblocks_waiter() {
        let queue = Arc::new(WaitQueue::new());
        let ready = Arc::new(AtomicUsize::new(0));

        let handle = {
            let queue = Arc::clone(&queue);
            let ready = Arc::clone(&ready);
            thread::spawn(move || {
                queue.wait_until(|| match ready.load(Ordering::SeqCst) {
                    0 => None,
                    v => Some(v),
                })
            })
        };

        wait_for_waiters(&queue, 1);
        ready.store(7, Ordering::SeqCst);
        assert!(queue.wake_one());
        assert_eq!(handle.join().unwrap(), Ok(7));
    }

    #[test]
    fn test_wake_in_flight_not_counted_twice() {
        let queue = WaitQueue::new();
        queue.state.lock().waiting = 1;

        assert!(queue.wake_one());
        // The only parked thread already has a wake in flight.
        assert!(!queue.wake_one());
    }

    #[test]
    fn test_interrupt_releases_all() {
        let queue = Arc::new(WaitQueue::new());
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || queue.wait_until::<()>(|| None))
            })
            .collect();

        wait_for_waiters(&queue, 3);
        queue.interrupt();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), Err(WaitError::Interrupted));
        }
        assert!(queue.is_interrupted());
        assert_eq!(queue.wait_until(|| Some(1)), Err(WaitError::Interrupted));
    }

    #[test]
    fn test_wait_timeout_expires() {
        let queue = WaitQueue::new();
        let result = queue.wait_until_timeout::<()>(Duration::from_millis(20), || None);
        assert_eq!(result, Ok(None));
    }
}
