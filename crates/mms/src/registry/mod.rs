// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Listener registries.
//!
//! Two independent registries, one per [`ListenerClass`]. Each maps an
//! application id to at most one [`Registration`]; the same id may appear
//! in both (an open connection plus a push registration).
//!
//! # Native interest
//!
//! ```text
//! register(class, id, suite)   -> assert   unless other registry holds (id, suite)
//! unregister(class, id)        -> deassert unless other registry holds id
//! unregister_if(class, id, t)  -> as unregister, only while t still owns id
//! remove_all_for_suite(suite)  -> deassert every id neither registry holds
//! ```
//!
//! # Lock order
//!
//! midlet registry, then push registry, then (inside) the pool. Listener
//! callbacks for removals run after both registry locks are released.

mod filter;
mod interest;
mod listener;

pub use filter::SenderFilter;
pub use interest::{InterestEvent, InterestNotifier, NoopInterest, RecordingInterest};
pub use listener::{ClosureListener, ListenerClass, MessageListener, WakeListener};

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use thiserror::Error;

use crate::message::SuiteId;
use crate::pool::MessagePool;

/// Registration failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The application id already has a listener in this registry.
    #[error("{class} listener already registered for {app_id}")]
    AlreadyRegistered {
        /// Application id.
        app_id: String,
        /// Registry.
        class: ListenerClass,
    },
    /// No listener for the application id in this registry.
    #[error("no {class} listener registered for {app_id}")]
    NotRegistered {
        /// Application id.
        app_id: String,
        /// Registry.
        class: ListenerClass,
    },
    /// Empty application id.
    #[error("application id must not be empty")]
    EmptyAppId,
}

/// Identifies one successful registration.
///
/// A handle keeps the token it was given so that releasing it cannot remove
/// a later registration of the same application id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationToken(u64);

/// One registry entry.
#[derive(Clone)]
pub struct Registration {
    /// Application id (registry key).
    pub app_id: String,
    /// Owning suite.
    pub suite_id: SuiteId,
    /// Listener notified on arrival.
    pub listener: Arc<dyn MessageListener>,
    /// Sender filter (push registrations only; `None` accepts everyone).
    pub filter: Option<SenderFilter>,
    token: RegistrationToken,
}

impl Registration {
    /// Create a registration without a filter.
    pub fn new(
        app_id: impl Into<String>,
        suite_id: SuiteId,
        listener: Arc<dyn MessageListener>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            suite_id,
            listener,
            filter: None,
            token: RegistrationToken(0),
        }
    }

    /// Token assigned when the registration was accepted.
    pub fn token(&self) -> RegistrationToken {
        self.token
    }

    /// Attach a sender filter.
    #[must_use]
    pub fn with_filter(mut self, filter: Option<SenderFilter>) -> Self {
        self.filter = filter;
        self
    }

    /// True if the filter (if any) accepts `from_address`.
    pub fn accepts(&self, from_address: &str) -> bool {
        self.filter
            .as_ref()
            .map_or(true, |filter| filter.matches(from_address))
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("app_id", &self.app_id)
            .field("suite_id", &self.suite_id)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Single registry
// ============================================================================

/// Application-id keyed set of registrations for one listener class.
#[derive(Debug)]
pub struct ListenerRegistry {
    class: ListenerClass,
    entries: HashMap<String, Registration>,
}

impl ListenerRegistry {
    /// Create an empty registry.
    pub fn new(class: ListenerClass) -> Self {
        Self {
            class,
            entries: HashMap::new(),
        }
    }

    /// Class of listeners held.
    pub fn class(&self) -> ListenerClass {
        self.class
    }

    /// True if `app_id` has a listener.
    pub fn is_registered(&self, app_id: &str) -> bool {
        self.entries.contains_key(app_id)
    }

    /// True if `app_id` has a listener owned by `suite_id`.
    pub fn is_registered_for_suite(&self, app_id: &str, suite_id: SuiteId) -> bool {
        self.entries
            .get(app_id)
            .is_some_and(|reg| reg.suite_id == suite_id)
    }

    /// Registration for `app_id`.
    pub fn get(&self, app_id: &str) -> Option<&Registration> {
        self.entries.get(app_id)
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, registration: Registration) -> Result<(), RegistryError> {
        if registration.app_id.is_empty() {
            return Err(RegistryError::EmptyAppId);
        }
        if self.entries.contains_key(&registration.app_id) {
            return Err(RegistryError::AlreadyRegistered {
                app_id: registration.app_id,
                class: self.class,
            });
        }
        self.entries
            .insert(registration.app_id.clone(), registration);
        Ok(())
    }

    /// Remove `app_id`, only if its token is `owner` when one is given.
    fn remove(
        &mut self,
        app_id: &str,
        owner: Option<RegistrationToken>,
    ) -> Result<Registration, RegistryError> {
        let owned = self
            .entries
            .get(app_id)
            .is_some_and(|reg| owner.map_or(true, |token| reg.token == token));
        if !owned {
            return Err(RegistryError::NotRegistered {
                app_id: app_id.to_string(),
                class: self.class,
            });
        }
        self.entries
            .remove(app_id)
            .ok_or_else(|| RegistryError::NotRegistered {
                app_id: app_id.to_string(),
                class: self.class,
            })
    }

    fn drain_suite(&mut self, suite_id: SuiteId) -> Vec<Registration> {
        let app_ids: Vec<String> = self
            .entries
            .values()
            .filter(|reg| reg.suite_id == suite_id)
            .map(|reg| reg.app_id.clone())
            .collect();
        app_ids
            .iter()
            .filter_map(|app_id| self.entries.remove(app_id))
            .collect()
    }
}

// ============================================================================
// Both registries
// ============================================================================

/// Read access to both registries, taken in lock order.
pub struct ListenersGuard<'a> {
    /// Midlet registry.
    pub midlet: RwLockReadGuard<'a, ListenerRegistry>,
    /// Push registry.
    pub push: RwLockReadGuard<'a, ListenerRegistry>,
}

/// Midlet and push registries plus the native interest hook.
pub struct Listeners {
    midlet: RwLock<ListenerRegistry>,
    push: RwLock<ListenerRegistry>,
    interest: Arc<dyn InterestNotifier>,
    next_token: AtomicU64,
}

fn select<'a>(
    class: ListenerClass,
    midlet: &'a ListenerRegistry,
    push: &'a ListenerRegistry,
) -> &'a ListenerRegistry {
    match class {
        ListenerClass::Midlet => midlet,
        ListenerClass::Push => push,
    }
}

fn select_mut<'a>(
    class: ListenerClass,
    midlet: &'a mut ListenerRegistry,
    push: &'a mut ListenerRegistry,
) -> &'a mut ListenerRegistry {
    match class {
        ListenerClass::Midlet => midlet,
        ListenerClass::Push => push,
    }
}

impl Listeners {
    /// Create empty registries reporting interest to `interest`.
    pub fn new(interest: Arc<dyn InterestNotifier>) -> Self {
        Self {
            midlet: RwLock::new(ListenerRegistry::new(ListenerClass::Midlet)),
            push: RwLock::new(ListenerRegistry::new(ListenerClass::Push)),
            interest,
            next_token: AtomicU64::new(1),
        }
    }

    /// Lock both registries for reading.
    pub fn read(&self) -> ListenersGuard<'_> {
        let midlet = self.midlet.read();
        let push = self.push.read();
        ListenersGuard { midlet, push }
    }

    /// True if `app_id` has a listener of `class`.
    pub fn is_registered(&self, app_id: &str, class: ListenerClass) -> bool {
        let guard = self.read();
        select(class, &guard.midlet, &guard.push).is_registered(app_id)
    }

    /// True if `app_id` has a listener of `class` owned by `suite_id`.
    pub fn is_registered_for_suite(
        &self,
        app_id: &str,
        suite_id: SuiteId,
        class: ListenerClass,
    ) -> bool {
        let guard = self.read();
        select(class, &guard.midlet, &guard.push).is_registered_for_suite(app_id, suite_id)
    }

    /// Add a registration of `class`. Returns the token identifying it.
    pub fn register(
        &self,
        class: ListenerClass,
        mut registration: Registration,
    ) -> Result<RegistrationToken, RegistryError> {
        let app_id = registration.app_id.clone();
        let suite_id = registration.suite_id;
        let token = RegistrationToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        registration.token = token;

        let mut midlet = self.midlet.write();
        let mut push = self.push.write();

        select_mut(class, &mut midlet, &mut push).insert(registration)?;
        let shared =
            select(class.other(), &midlet, &push).is_registered_for_suite(&app_id, suite_id);
        if !shared {
            self.interest.add_listening_app_id(&app_id);
        }

        log::debug!(
            "[Registry] registered {} listener app_id={} suite={} interest_asserted={}",
            class,
            app_id,
            suite_id,
            !shared
        );
        Ok(token)
    }

    /// Remove the registration of `class` for `app_id`.
    ///
    /// The removed listener is told through
    /// [`MessageListener::on_unregistered`] once the locks are released.
    pub fn unregister(
        &self,
        app_id: &str,
        class: ListenerClass,
    ) -> Result<Registration, RegistryError> {
        self.remove(app_id, class, None)
    }

    /// Like [`unregister`](Self::unregister), but only if the current
    /// registration is the one `token` was issued for.
    ///
    /// Fails with [`RegistryError::NotRegistered`] when the id was released
    /// (for example by suite teardown) or claimed again since.
    pub fn unregister_if(
        &self,
        app_id: &str,
        class: ListenerClass,
        token: RegistrationToken,
    ) -> Result<Registration, RegistryError> {
        self.remove(app_id, class, Some(token))
    }

    fn remove(
        &self,
        app_id: &str,
        class: ListenerClass,
        owner: Option<RegistrationToken>,
    ) -> Result<Registration, RegistryError> {
        let removed = {
            let mut midlet = self.midlet.write();
            let mut push = self.push.write();

            let removed = select_mut(class, &mut midlet, &mut push).remove(app_id, owner)?;
            let shared = select(class.other(), &midlet, &push).is_registered(app_id);
            if !shared {
                self.interest.remove_listening_app_id(app_id);
            }
            log::debug!(
                "[Registry] unregistered {} listener app_id={} suite={} interest_withdrawn={}",
                class,
                app_id,
                removed.suite_id,
                !shared
            );
            removed
        };

        removed.listener.on_unregistered();
        Ok(removed)
    }

    /// Remove every registration owned by `suite_id` from both registries.
    ///
    /// Pooled messages for each removed application id are purged. Returns
    /// the removed registrations (midlet first).
    pub fn remove_all_for_suite(
        &self,
        suite_id: SuiteId,
        pool: &Mutex<MessagePool>,
    ) -> Vec<Registration> {
        let removed = {
            let mut midlet = self.midlet.write();
            let mut push = self.push.write();

            let mut removed = midlet.drain_suite(suite_id);
            removed.extend(push.drain_suite(suite_id));

            let mut app_ids: Vec<&str> = removed.iter().map(|reg| reg.app_id.as_str()).collect();
            app_ids.sort_unstable();
            app_ids.dedup();

            for app_id in app_ids {
                if !midlet.is_registered(app_id) && !push.is_registered(app_id) {
                    self.interest.remove_listening_app_id(app_id);
                }
                let purged = pool.lock().remove_all(app_id);
                log::debug!(
                    "[Registry] suite {} teardown app_id={} purged={}",
                    suite_id,
                    app_id,
                    purged
                );
            }
            removed
        };

        for registration in &removed {
            registration.listener.on_unregistered();
        }
        removed
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("midlet", &self.midlet.read().len())
            .field("push", &self.push.read().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Message, MessageInfo};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingListener {
        unregistered: AtomicUsize,
    }

    impl MessageListener for CountingListener {
        fn on_message(&self, _info: &MessageInfo) -> bool {
            false
        }

        fn on_unregistered(&self) {
            self.unregistered.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn setup() -> (Listeners, Arc<RecordingInterest>) {
        let interest = Arc::new(RecordingInterest::new());
        (Listeners::new(interest.clone()), interest)
    }

    fn reg(app_id: &str, suite: u32) -> Registration {
        Registration::new(app_id, SuiteId(suite), Arc::new(CountingListener::default()))
    }

    #[test]
    fn test_one_registration_per_registry() {
        let (listeners, _) = setup();
        listeners.register(ListenerClass::Midlet, reg("a", 1)).unwrap();

        let err = listeners
            .register(ListenerClass::Midlet, reg("a", 1))
            .unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyRegistered { .. }));

        // The other registry accepts the same id.
        listeners.register(ListenerClass::Push, reg("a", 1)).unwrap();
        assert!(listeners.is_registered("a", ListenerClass::Midlet));
        assert!(listeners.is_registered("a", ListenerClass::Push));
    }

    #[test]
    fn test_interest_asserted_once_for_shared_suite() {
        let (listeners, interest) = setup();
        listeners.register(ListenerClass::Push, reg("a", 1)).unwrap();
        listeners.register(ListenerClass::Midlet, reg("a", 1)).unwrap();

        assert_eq!(interest.events(), vec![InterestEvent::Added("a".into())]);

        listeners.unregister("a", ListenerClass::Midlet).unwrap();
        assert_eq!(interest.events().len(), 1);

        listeners.unregister("a", ListenerClass::Push).unwrap();
        assert_eq!(
            interest.events(),
            vec![
                InterestEvent::Added("a".into()),
                InterestEvent::Removed("a".into())
            ]
        );
    }

    #[test]
    fn test_interest_asserted_for_other_suite() {
        let (listeners, interest) = setup();
        listeners.register(ListenerClass::Push, reg("a", 1)).unwrap();
        listeners.register(ListenerClass::Midlet, reg("a", 2)).unwrap();
        assert_eq!(interest.events().len(), 2);
    }

    #[test]
    fn test_unregister_missing_fails() {
        let (listeners, _) = setup();
        let err = listeners.unregister("a", ListenerClass::Push).unwrap_err();
        assert_eq!(
            err,
            RegistryError::NotRegistered {
                app_id: "a".into(),
                class: ListenerClass::Push
            }
        );
    }

    #[test]
    fn test_empty_app_id_rejected() {
        let (listeners, _) = setup();
        assert_eq!(
            listeners.register(ListenerClass::Midlet, reg("", 1)),
            Err(RegistryError::EmptyAppId)
        );
    }

    #[test]
    fn test_unregister_notifies_listener() {
        let (listeners, _) = setup();
        let listener = Arc::new(CountingListener::default());
        listeners
            .register(
                ListenerClass::Midlet,
                Registration::new("a", SuiteId(1), listener.clone()),
            )
            .unwrap();
        listeners.unregister("a", ListenerClass::Midlet).unwrap();
        assert_eq!(listener.unregistered.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_all_for_suite() {
        let (listeners, interest) = setup();
        let pool = Mutex::new(MessagePool::new(10));

        listeners.register(ListenerClass::Midlet, reg("a", 1)).unwrap();
        listeners.register(ListenerClass::Push, reg("a", 1)).unwrap();
        listeners.register(ListenerClass::Push, reg("b", 1)).unwrap();
        listeners.register(ListenerClass::Midlet, reg("c", 2)).unwrap();
        for app_id in ["a", "b", "c", "a"] {
            pool.lock().add(Message::new("mms://+1", app_id, "", vec![0]));
        }
        interest.clear();

        let removed = listeners.remove_all_for_suite(SuiteId(1), &pool);
        assert_eq!(removed.len(), 3);

        assert!(!listeners.is_registered("a", ListenerClass::Midlet));
        assert!(!listeners.is_registered("a", ListenerClass::Push));
        assert!(!listeners.is_registered("b", ListenerClass::Push));
        assert!(listeners.is_registered("c", ListenerClass::Midlet));

        let pool = pool.lock();
        assert_eq!(pool.count_for("a"), 0);
        assert_eq!(pool.count_for("b"), 0);
        assert_eq!(pool.count_for("c"), 1);

        let events = interest.events();
        assert_eq!(events.len(), 2);
        assert!(events.contains(&InterestEvent::Removed("a".into())));
        assert!(events.contains(&InterestEvent::Removed("b".into())));
    }

    #[test]
    fn test_unregister_if_requires_current_token() {
        let (listeners, interest) = setup();
        let pool = Mutex::new(MessagePool::new(10));

        let stale = listeners.register(ListenerClass::Midlet, reg("a", 1)).unwrap();
        listeners.remove_all_for_suite(SuiteId(1), &pool);
        let current = listeners.register(ListenerClass::Midlet, reg("a", 2)).unwrap();
        assert_ne!(stale, current);
        interest.clear();

        let err = listeners
            .unregister_if("a", ListenerClass::Midlet, stale)
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotRegistered { .. }));
        assert!(listeners.is_registered_for_suite("a", SuiteId(2), ListenerClass::Midlet));
        assert!(interest.events().is_empty());

        let removed = listeners
            .unregister_if("a", ListenerClass::Midlet, current)
            .unwrap();
        assert_eq!(removed.token(), current);
        assert!(!listeners.is_registered("a", ListenerClass::Midlet));
    }

    #[test]
    fn test_registration_filter() {
        let registration = reg("a", 1).with_filter(Some(SenderFilter::new("+1555*")));
        assert!(registration.accepts("mms://+15551234"));
        assert!(!registration.accepts("mms://+4420"));
        assert!(reg("a", 1).accepts("mms://anyone"));
    }
}
