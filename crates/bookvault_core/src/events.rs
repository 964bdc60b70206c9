//! In-process publish/subscribe.
//!
//! Stores and the book status registry publish events after every state
//! change, enabling:
//! - Reactive UI updates
//! - Analytics
//! - Controllers that chain work off account changes
//!
//! # Usage
//!
//! ```rust
//! use bookvault_core::events::{BookStatusEvent, EventBus};
//! use bookvault_core::BookId;
//!
//! let bus = EventBus::new();
//! let subscription = bus.subscribe();
//!
//! bus.publish(BookStatusEvent::Changed(BookId::new("urn:book:1")));
//!
//! assert_eq!(
//!     subscription.try_recv(),
//!     Some(BookStatusEvent::Changed(BookId::new("urn:book:1")))
//! );
//! ```
//!
//! Events are delivered in publish order to every subscriber registered at
//! the time of publishing. There is no history: a late subscriber sees only
//! events published after it subscribed.

use crate::account::AccountLoginState;
use crate::id::{AccountId, BookId, ProfileId, ProviderUri};
use parking_lot::RwLock;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

/// A fan-out channel delivering each published event to every subscriber.
pub struct EventBus<E> {
    subscribers: RwLock<Vec<Sender<E>>>,
}

impl<E: Clone + Send> EventBus<E> {
    /// Creates a bus with no subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Subscribes to all future events.
    ///
    /// The subscription should be drained regularly; undelivered events are
    /// buffered without bound.
    pub fn subscribe(&self) -> Subscription<E> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        Subscription { receiver: rx }
    }

    /// Publishes an event to all subscribers.
    ///
    /// The subscriber list stays locked while sending, so two concurrent
    /// publishers never interleave their events differently for different
    /// subscribers. Dropped subscriptions are removed.
    pub fn publish(&self, event: E) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Returns the number of live subscribers.
    ///
    /// Dropped subscriptions are only noticed on the next publish.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl<E: Clone + Send> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.read().len())
            .finish()
    }
}

/// The receiving end of an [`EventBus`] subscription.
///
/// Dropping the subscription unsubscribes.
#[derive(Debug)]
pub struct Subscription<E> {
    receiver: Receiver<E>,
}

impl<E> Subscription<E> {
    /// Blocks until an event arrives. Returns `None` if the bus was dropped.
    pub fn recv(&self) -> Option<E> {
        self.receiver.recv().ok()
    }

    /// Returns the next event if one is already queued.
    pub fn try_recv(&self) -> Option<E> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Waits up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<E> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Returns every event queued so far, in order.
    pub fn drain(&self) -> Vec<E> {
        self.receiver.try_iter().collect()
    }
}

/// Changes to accounts.
#[derive(Debug, Clone, PartialEq)]
pub enum AccountEvent {
    /// An account was created.
    Created {
        /// The profile owning the account.
        profile: ProfileId,
        /// The new account.
        account: AccountId,
        /// Its provider.
        provider: ProviderUri,
    },
    /// An account's description was rewritten.
    Updated {
        /// The account.
        account: AccountId,
    },
    /// An account was deleted.
    Deleted {
        /// The profile that owned the account.
        profile: ProfileId,
        /// The deleted account.
        account: AccountId,
        /// Its provider.
        provider: ProviderUri,
    },
    /// An account's login state was set.
    LoginStateChanged {
        /// The account.
        account: AccountId,
        /// The new state.
        state: AccountLoginState,
    },
}

/// Changes to profiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileEvent {
    /// A profile was created.
    Created(ProfileId),
    /// A profile's description was rewritten.
    Updated(ProfileId),
    /// A profile was deleted.
    Deleted(ProfileId),
    /// A profile became the current profile.
    Selected(ProfileId),
}

/// Changes to the book status registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BookStatusEvent {
    /// The status of a book changed.
    Changed(BookId),
    /// A book was removed from the registry.
    Removed(BookId),
}

impl BookStatusEvent {
    /// Returns the book the event is about.
    #[must_use]
    pub fn book(&self) -> &BookId {
        match self {
            Self::Changed(id) | Self::Removed(id) => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn changed(id: &str) -> BookStatusEvent {
        BookStatusEvent::Changed(BookId::new(id))
    }

    #[test]
    fn publish_and_receive() {
        let bus = EventBus::new();
        let sub = bus.subscribe();

        bus.publish(changed("a"));

        assert_eq!(sub.recv_timeout(Duration::from_millis(100)), Some(changed("a")));
    }

    #[test]
    fn multiple_subscribers() {
        let bus = EventBus::new();
        let sub1 = bus.subscribe();
        let sub2 = bus.subscribe();

        bus.publish(changed("a"));

        assert_eq!(sub1.recv(), Some(changed("a")));
        assert_eq!(sub2.recv(), Some(changed("a")));
    }

    #[test]
    fn subscriber_cleanup() {
        let bus = EventBus::<BookStatusEvent>::new();
        assert_eq!(bus.subscriber_count(), 0);

        let sub = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        drop(sub);
        bus.publish(changed("a"));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn no_replay_for_late_subscribers() {
        let bus = EventBus::new();
        bus.publish(changed("early"));

        let sub = bus.subscribe();
        bus.publish(changed("late"));

        assert_eq!(sub.drain(), vec![changed("late")]);
    }

    #[test]
    fn delivered_in_publish_order() {
        let bus = EventBus::new();
        let sub = bus.subscribe();

        for i in 0..100 {
            bus.publish(changed(&i.to_string()));
        }

        let received: Vec<_> = sub.drain();
        let expected: Vec<_> = (0..100).map(|i| changed(&i.to_string())).collect();
        assert_eq!(received, expected);
    }

    #[test]
    fn concurrent_publishers_agree_on_order() {
        let bus = Arc::new(EventBus::new());
        let sub1 = bus.subscribe();
        let sub2 = bus.subscribe();

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let bus = Arc::clone(&bus);
                thread::spawn(move || {
                    for i in 0..50 {
                        bus.publish(changed(&format!("{t}-{i}")));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let seen1 = sub1.drain();
        let seen2 = sub2.drain();
        assert_eq!(seen1.len(), 200);
        assert_eq!(seen1, seen2);
    }

    #[test]
    fn threaded_subscribe() {
        let bus = Arc::new(EventBus::new());
        let sub = bus.subscribe();

        let publisher = Arc::clone(&bus);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            publisher.publish(ProfileEvent::Updated(ProfileId::random()));
        });

        assert!(matches!(
            sub.recv_timeout(Duration::from_millis(500)),
            Some(ProfileEvent::Updated(_))
        ));
        handle.join().unwrap();
    }

    #[test]
    fn event_book_accessor() {
        let id = BookId::new("x");
        assert_eq!(BookStatusEvent::Removed(id.clone()).book(), &id);
    }
}
