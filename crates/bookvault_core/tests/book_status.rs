//! Integration tests for status derivation and the status registry.

use bookvault_core::book::{Availability, Book, BookDrm, BookStatus, BookWithStatus};
use bookvault_core::events::BookStatusEvent;
use bookvault_core::{AccountId, BookId, BookStatusRegistry};
use bookvault_testkit::prelude::*;
use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use url::Url;

fn date(year: i32, month: u32, day: u32) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).single()
}

fn link() -> Option<Url> {
    Some(Url::parse("https://example.com/revoke/1").unwrap())
}

fn book_with(availability: Availability, downloaded: bool, drm_returnable: bool) -> Book {
    let book = Book::new(
        BookId::new("urn:book:1"),
        AccountId::random(),
        "Title",
        availability,
    )
    .with_drm(BookDrm::Adobe {
        returnable: drm_returnable,
    });
    if downloaded {
        book.with_local_file("/books/1.epub")
    } else {
        book
    }
}

#[test]
fn from_book_table() {
    let start = date(2030, 1, 1);
    let end = date(2030, 2, 1);

    let holdable = Availability::Holdable;
    let held = Availability::Held {
        position: Some(3),
        start,
        end,
        revoke: link(),
    };
    let held_ready = Availability::HeldReady { end, revoke: link() };
    let loanable = Availability::Loanable;
    let loaned = Availability::Loaned {
        start,
        end,
        revoke: link(),
    };
    let open_access = Availability::OpenAccess { revoke: link() };
    let revoked = Availability::Revoked { revoke: link() };

    let held_status = BookStatus::Held {
        queue_position: Some(3),
        start_date: start,
        end_date: end,
        revocable: true,
    };
    let held_ready_status = BookStatus::HeldReady {
        end_date: end,
        revocable: true,
    };
    let revoked_status = BookStatus::Revoked {
        revoke_link: link(),
    };

    // (availability, downloaded, drm returnable, expected)
    let table = [
        (&holdable, false, false, BookStatus::Holdable),
        (&holdable, false, true, BookStatus::Holdable),
        (&holdable, true, false, BookStatus::Holdable),
        (&holdable, true, true, BookStatus::Holdable),
        (&held, false, false, held_status.clone()),
        (&held, false, true, held_status.clone()),
        (&held, true, false, held_status.clone()),
        (&held, true, true, held_status),
        (&held_ready, false, false, held_ready_status.clone()),
        (&held_ready, false, true, held_ready_status.clone()),
        (&held_ready, true, false, held_ready_status.clone()),
        (&held_ready, true, true, held_ready_status),
        (&loanable, false, false, BookStatus::Loanable),
        (&loanable, false, true, BookStatus::Loanable),
        (&loanable, true, false, BookStatus::Loanable),
        (&loanable, true, true, BookStatus::Loanable),
        (&loaned, false, false, BookStatus::Loaned { end_date: end, returnable: false }),
        (&loaned, false, true, BookStatus::Loaned { end_date: end, returnable: true }),
        (&loaned, true, false, BookStatus::Downloaded { end_date: end, returnable: true }),
        (&loaned, true, true, BookStatus::Downloaded { end_date: end, returnable: true }),
        (&open_access, false, false, BookStatus::Loaned { end_date: None, returnable: true }),
        (&open_access, false, true, BookStatus::Loaned { end_date: None, returnable: true }),
        (&open_access, true, false, BookStatus::Downloaded { end_date: None, returnable: true }),
        (&open_access, true, true, BookStatus::Downloaded { end_date: None, returnable: true }),
        (&revoked, false, false, revoked_status.clone()),
        (&revoked, false, true, revoked_status.clone()),
        (&revoked, true, false, revoked_status.clone()),
        (&revoked, true, true, revoked_status),
    ];

    for (availability, downloaded, drm_returnable, expected) in table {
        let book = book_with(availability.clone(), downloaded, drm_returnable);
        assert_eq!(
            BookStatus::from_book(&book),
            expected,
            "{availability:?} downloaded={downloaded} drm_returnable={drm_returnable}"
        );
    }
}

#[test]
fn from_book_without_revoke_links() {
    let end = date(2030, 2, 1);
    let table = [
        (
            Availability::HeldReady { end, revoke: None },
            true,
            BookStatus::HeldReady {
                end_date: end,
                revocable: false,
            },
        ),
        (
            Availability::Loaned {
                start: None,
                end,
                revoke: None,
            },
            true,
            BookStatus::Downloaded {
                end_date: end,
                returnable: false,
            },
        ),
        (
            Availability::Loaned {
                start: None,
                end,
                revoke: None,
            },
            false,
            BookStatus::Loaned {
                end_date: end,
                returnable: false,
            },
        ),
        (
            Availability::OpenAccess { revoke: None },
            false,
            BookStatus::Loaned {
                end_date: None,
                returnable: false,
            },
        ),
        (
            Availability::Revoked { revoke: None },
            false,
            BookStatus::Revoked { revoke_link: None },
        ),
    ];

    for (availability, downloaded, expected) in table {
        let book = book_with(availability, downloaded, true);
        assert_eq!(BookStatus::from_book(&book), expected);
    }
}

fn entry(status: BookStatus) -> BookWithStatus {
    BookWithStatus::new(book_with(Availability::Loanable, false, false), status)
}

#[test]
fn priority_10_and_90_converge_in_either_order() {
    let held = BookStatus::Held {
        queue_position: None,
        start_date: None,
        end_date: None,
        revocable: false,
    };
    let failed = BookStatus::DownloadFailed {
        message: "timeout".into(),
    };
    assert_eq!(held.priority(), 10);
    assert_eq!(failed.priority(), 90);

    for order in [[&held, &failed], [&failed, &held]] {
        let registry = BookStatusRegistry::new();
        for status in order {
            registry.update_if_status_is_more_important(entry(status.clone()));
        }
        assert_eq!(
            registry.book_status(&BookId::new("urn:book:1")),
            Some(failed.clone())
        );
    }
}

#[test]
fn equal_priorities_converge_to_the_latest() {
    let s1 = BookStatus::RequestingLoan;
    let s2 = BookStatus::RequestingRevoke;
    assert_eq!(s1.priority(), s2.priority());

    let registry = BookStatusRegistry::new();
    let events = registry.subscribe();
    assert!(registry.update_if_status_is_more_important(entry(s1)));
    assert!(registry.update_if_status_is_more_important(entry(s2.clone())));

    assert_eq!(registry.book_status(&BookId::new("urn:book:1")), Some(s2));
    assert_eq!(
        events.drain(),
        vec![
            BookStatusEvent::Changed(BookId::new("urn:book:1")),
            BookStatusEvent::Changed(BookId::new("urn:book:1")),
        ]
    );
}

#[test]
fn revoked_is_not_overwritten_by_stale_reports() {
    let registry = BookStatusRegistry::new();
    registry.update(entry(BookStatus::Revoked { revoke_link: None }));

    let downloaded = BookStatus::Downloaded {
        end_date: None,
        returnable: true,
    };
    assert!(!registry.update_if_status_is_more_important(entry(downloaded.clone())));

    registry.update(entry(downloaded.clone()));
    assert_eq!(
        registry.book_status(&BookId::new("urn:book:1")),
        Some(downloaded)
    );
}

proptest! {
    #[test]
    fn registry_keeps_a_status_of_maximal_priority(updates in status_updates_strategy(1..16)) {
        let registry = BookStatusRegistry::new();
        for update in &updates {
            registry.update_if_status_is_more_important(update.clone());
        }

        let max = updates.iter().map(BookWithStatus::priority).max().unwrap();
        let last_max = updates.iter().rev().find(|u| u.priority() == max).unwrap();
        let stored = registry.book(&updates[0].book.id).unwrap();
        prop_assert_eq!(stored, last_max.clone());
    }

    #[test]
    fn strictly_increasing_priorities_are_order_independent(
        updates in status_updates_strategy(2..8),
        seed in any::<u64>(),
    ) {
        let mut by_priority = updates.clone();
        by_priority.sort_by_key(BookWithStatus::priority);
        by_priority.dedup_by_key(|u| u.priority());

        let mut shuffled = by_priority.clone();
        let len = shuffled.len();
        shuffled.rotate_left((seed as usize) % len);

        let registry = BookStatusRegistry::new();
        for update in &shuffled {
            registry.update_if_status_is_more_important(update.clone());
        }
        let stored = registry.book(&updates[0].book.id).unwrap();
        prop_assert_eq!(&stored, by_priority.last().unwrap());
    }
}
