//! The book status registry.
//!
//! Holds the latest known [`BookWithStatus`] for every book the application
//! is tracking. Controllers push updates from many threads; the registry
//! resolves races between them by status priority and tells subscribers
//! which books changed.
//!
//! # Usage
//!
//! ```rust
//! use bookvault_core::book::{Availability, Book, BookStatus, BookWithStatus};
//! use bookvault_core::registry::BookStatusRegistry;
//! use bookvault_core::{AccountId, BookId};
//!
//! let registry = BookStatusRegistry::new();
//! let book = Book::new(BookId::new("urn:book:1"), AccountId::random(), "Title", Availability::Loanable);
//!
//! registry.update(BookWithStatus::new(book.clone(), BookStatus::RequestingLoan));
//!
//! // A slow answer saying the book is loanable does not undo the request.
//! let stale = BookWithStatus::derived(book);
//! assert!(!registry.update_if_status_is_more_important(stale));
//! assert_eq!(registry.book_status(&BookId::new("urn:book:1")), Some(BookStatus::RequestingLoan));
//! ```

use crate::book::{BookStatus, BookWithStatus};
use crate::events::{BookStatusEvent, EventBus, Subscription};
use crate::id::BookId;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Concurrent map from book id to the book and its status.
///
/// # Thread Safety
///
/// All operations may be called from any thread. The priority check in
/// [`update_if_status_is_more_important`](Self::update_if_status_is_more_important)
/// is atomic per book; nothing is guaranteed across different books.
pub struct BookStatusRegistry {
    entries: DashMap<BookId, BookWithStatus>,
    events: Arc<EventBus<BookStatusEvent>>,
}

impl BookStatusRegistry {
    /// Creates an empty registry with its own event bus.
    #[must_use]
    pub fn new() -> Self {
        Self::with_events(Arc::new(EventBus::new()))
    }

    /// Creates an empty registry publishing to `events`.
    #[must_use]
    pub fn with_events(events: Arc<EventBus<BookStatusEvent>>) -> Self {
        Self {
            entries: DashMap::new(),
            events,
        }
    }

    /// The bus the registry publishes to.
    #[must_use]
    pub fn events(&self) -> &Arc<EventBus<BookStatusEvent>> {
        &self.events
    }

    /// Subscribes to registry events.
    pub fn subscribe(&self) -> Subscription<BookStatusEvent> {
        self.events.subscribe()
    }

    /// Replaces the entry for the book, whatever its current status.
    pub fn update(&self, entry: BookWithStatus) {
        let id = entry.book.id.clone();
        trace!(book = %id, status = ?entry.status.kind(), "updating book status");
        self.entries.insert(id.clone(), entry);
        self.events.publish(BookStatusEvent::Changed(id));
    }

    /// Replaces the entry for the book only if the new status has at least
    /// the priority of the current one.
    ///
    /// Returns true if the entry was stored. Nothing is published when the
    /// update is discarded.
    pub fn update_if_status_is_more_important(&self, entry: BookWithStatus) -> bool {
        let id = entry.book.id.clone();
        let stored = match self.entries.entry(id.clone()) {
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
                true
            }
            Entry::Occupied(mut occupied) => {
                let current = occupied.get().priority();
                let incoming = entry.priority();
                if current <= incoming {
                    occupied.insert(entry);
                    true
                } else {
                    debug!(book = %id, current, incoming, "discarding less important status");
                    false
                }
            }
        };

        if stored {
            self.events.publish(BookStatusEvent::Changed(id));
        }
        stored
    }

    /// Removes every entry, publishing one removal per book.
    pub fn clear(&self) {
        let ids: Vec<BookId> = self.entries.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if self.entries.remove(&id).is_some() {
                self.events.publish(BookStatusEvent::Removed(id));
            }
        }
    }

    /// Removes the entry for `id`.
    ///
    /// The removal is published even if there was no entry.
    pub fn clear_for(&self, id: &BookId) {
        if self.entries.remove(id).is_none() {
            debug!(book = %id, "clearing a book that was not registered");
        }
        self.events.publish(BookStatusEvent::Removed(id.clone()));
    }

    /// Looks up the entry for `id`.
    #[must_use]
    pub fn book(&self, id: &BookId) -> Option<BookWithStatus> {
        self.entries.get(id).map(|e| e.value().clone())
    }

    /// Looks up the status of `id`.
    #[must_use]
    pub fn book_status(&self, id: &BookId) -> Option<BookStatus> {
        self.entries.get(id).map(|e| e.value().status.clone())
    }

    /// Returns the number of registered books.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no book is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A snapshot of all entries, in no particular order.
    #[must_use]
    pub fn books(&self) -> Vec<BookWithStatus> {
        self.entries.iter().map(|e| e.value().clone()).collect()
    }
}

impl Default for BookStatusRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BookStatusRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BookStatusRegistry")
            .field("books", &self.entries.len())
            .field("events", &self.events)
            .finish()
    }
}
