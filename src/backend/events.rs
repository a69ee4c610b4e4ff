//! Push channel for session changes
//!
//! The backend publishes every session change on an [`AuthEventBus`]. Each
//! subscriber gets its own unbounded queue, so a slow consumer never drops
//! events, and publication holds the registry lock while fanning out so every
//! subscriber observes the same order.

use crate::models::AuthStateChange;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<u64, mpsc::UnboundedSender<AuthStateChange>>,
}

/// Listener registry delivering [`AuthStateChange`]s in publish order
#[derive(Clone, Default)]
pub struct AuthEventBus {
    registry: Arc<Mutex<Registry>>,
}

impl AuthEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
        registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new listener
    #[must_use]
    pub fn subscribe(&self) -> AuthSubscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut registry = Self::lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.insert(id, sender);
        log::debug!("Auth listener {id} subscribed");

        AuthSubscription {
            id,
            receiver,
            registry: Arc::downgrade(&self.registry),
            active: true,
        }
    }

    /// Deliver `change` to every live listener, returning how many received it
    pub fn publish(&self, change: &AuthStateChange) -> usize {
        let mut registry = Self::lock(&self.registry);
        registry
            .listeners
            .retain(|_, sender| sender.send(change.clone()).is_ok());
        log::debug!(
            "Published {} to {} listener(s)",
            change.event,
            registry.listeners.len()
        );
        registry.listeners.len()
    }

    /// Number of registered listeners
    #[must_use]
    pub fn listener_count(&self) -> usize {
        Self::lock(&self.registry).listeners.len()
    }
}

/// Handle to one registration on an [`AuthEventBus`]
///
/// Unsubscribing is idempotent and also happens on drop. Once unsubscribed,
/// [`AuthSubscription::recv`] yields `None` even if events were queued.
pub struct AuthSubscription {
    id: u64,
    receiver: mpsc::UnboundedReceiver<AuthStateChange>,
    registry: Weak<Mutex<Registry>>,
    active: bool,
}

impl AuthSubscription {
    /// Wait for the next change; `None` once unsubscribed or the bus is gone
    pub async fn recv(&mut self) -> Option<AuthStateChange> {
        if !self.active {
            return None;
        }
        self.receiver.recv().await
    }

    /// Release the registration, returning `true` only on the first call
    pub fn unsubscribe(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.receiver.close();
        if let Some(registry) = self.registry.upgrade() {
            AuthEventBus::lock(&registry).listeners.remove(&self.id);
        }
        log::debug!("Auth listener {} unsubscribed", self.id);
        true
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for AuthSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSubscription")
            .field("id", &self.id)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuthChangeEvent, Session, User};

    fn session() -> Session {
        Session::new("access", "refresh", 3600, User::new("u1", "a@b.co"))
    }

    #[tokio::test]
    async fn test_events_arrive_in_publish_order() {
        let bus = AuthEventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.publish(&AuthStateChange::signed_in(session()));
        bus.publish(&AuthStateChange::signed_out());

        for subscription in [&mut first, &mut second] {
            assert_eq!(
                subscription.recv().await.map(|c| c.event),
                Some(AuthChangeEvent::SignedIn)
            );
            assert_eq!(
                subscription.recv().await.map(|c| c.event),
                Some(AuthChangeEvent::SignedOut)
            );
        }
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let bus = AuthEventBus::new();
        let mut subscription = bus.subscribe();
        assert_eq!(bus.listener_count(), 1);

        assert!(subscription.unsubscribe());
        assert!(!subscription.unsubscribe());
        assert_eq!(bus.listener_count(), 0);

        assert_eq!(bus.publish(&AuthStateChange::signed_out()), 0);
        assert!(subscription.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_queued_events_dropped_after_unsubscribe() {
        let bus = AuthEventBus::new();
        let mut subscription = bus.subscribe();
        bus.publish(&AuthStateChange::signed_out());

        subscription.unsubscribe();
        assert!(subscription.recv().await.is_none());
    }

    #[test]
    fn test_drop_releases_listener() {
        let bus = AuthEventBus::new();
        {
            let _subscription = bus.subscribe();
            assert_eq!(bus.listener_count(), 1);
        }
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_subscription_outlives_bus() {
        let bus = AuthEventBus::new();
        let mut subscription = bus.subscribe();
        drop(bus);
        assert!(subscription.unsubscribe());
    }
}
