//! Property-based test generators using proptest.
//!
//! Provides strategies for books, availabilities and statuses that respect
//! the shapes the status model expects.

use bookvault_core::book::{Availability, Book, BookDrm, BookStatus, BookWithStatus};
use bookvault_core::{AccountId, BookId};
use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use url::Url;

/// Strategy for book ids.
pub fn book_id_strategy() -> impl Strategy<Value = BookId> {
    prop::string::string_regex("urn:book:[a-z0-9]{1,12}")
        .expect("Invalid regex")
        .prop_map(BookId::new)
}

/// Strategy for directory names an older layout could have used.
pub fn legacy_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        any::<u16>().prop_map(|n| n.to_string()),
        prop::string::string_regex("[a-z][a-z0-9_-]{0,15}").expect("Invalid regex"),
    ]
}

/// Strategy for dates between 2000 and 2100.
pub fn date_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (946_684_800i64..4_102_444_800i64).prop_map(|secs| {
        Utc.timestamp_opt(secs, 0)
            .single()
            .expect("timestamp in range")
    })
}

/// Strategy for optional revoke links.
pub fn revoke_link_strategy() -> impl Strategy<Value = Option<Url>> {
    prop::option::of(
        (0u32..1000).prop_map(|n| {
            Url::parse(&format!("https://example.com/revoke/{n}")).expect("valid url")
        }),
    )
}

/// Strategy covering every availability variant.
pub fn availability_strategy() -> impl Strategy<Value = Availability> {
    let date = || prop::option::of(date_strategy());
    prop_oneof![
        Just(Availability::Holdable),
        (prop::option::of(0u32..500), date(), date(), revoke_link_strategy()).prop_map(
            |(position, start, end, revoke)| Availability::Held {
                position,
                start,
                end,
                revoke
            }
        ),
        (date(), revoke_link_strategy())
            .prop_map(|(end, revoke)| Availability::HeldReady { end, revoke }),
        Just(Availability::Loanable),
        (date(), date(), revoke_link_strategy())
            .prop_map(|(start, end, revoke)| Availability::Loaned { start, end, revoke }),
        revoke_link_strategy().prop_map(|revoke| Availability::OpenAccess { revoke }),
        revoke_link_strategy().prop_map(|revoke| Availability::Revoked { revoke }),
    ]
}

/// Strategy for DRM descriptors.
pub fn drm_strategy() -> impl Strategy<Value = BookDrm> {
    prop_oneof![
        Just(BookDrm::None),
        any::<bool>().prop_map(|returnable| BookDrm::Adobe { returnable }),
    ]
}

/// Strategy for books in one account.
pub fn book_strategy(account: AccountId) -> impl Strategy<Value = Book> {
    (
        book_id_strategy(),
        availability_strategy(),
        any::<bool>(),
        drm_strategy(),
    )
        .prop_map(move |(id, availability, downloaded, drm)| {
            let title = format!("Title of {id}");
            let book = Book::new(id, account, title, availability).with_drm(drm);
            if downloaded {
                book.with_local_file("/books/book.epub")
            } else {
                book
            }
        })
}

/// Strategy covering every status variant.
pub fn book_status_strategy() -> impl Strategy<Value = BookStatus> {
    let date = || prop::option::of(date_strategy());
    prop_oneof![
        Just(BookStatus::Holdable),
        Just(BookStatus::Loanable),
        (prop::option::of(0u32..500), date(), date(), any::<bool>()).prop_map(
            |(queue_position, start_date, end_date, revocable)| BookStatus::Held {
                queue_position,
                start_date,
                end_date,
                revocable
            }
        ),
        (date(), any::<bool>())
            .prop_map(|(end_date, revocable)| BookStatus::HeldReady { end_date, revocable }),
        Just(BookStatus::RequestingLoan),
        (date(), any::<bool>())
            .prop_map(|(end_date, returnable)| BookStatus::Loaned { end_date, returnable }),
        Just(BookStatus::RequestingRevoke),
        date().prop_map(|end_date| BookStatus::RequestingDownload { end_date }),
        (any::<u32>(), prop::option::of(any::<u32>()), date()).prop_map(
            |(so_far, expected, end_date)| BookStatus::DownloadInProgress {
                bytes_so_far: u64::from(so_far),
                bytes_expected: expected.map(u64::from),
                end_date
            }
        ),
        (date(), any::<bool>())
            .prop_map(|(end_date, returnable)| BookStatus::Downloaded { end_date, returnable }),
        "[a-z ]{0,20}".prop_map(|message| BookStatus::DownloadFailed { message }),
        "[a-z ]{0,20}".prop_map(|message| BookStatus::RevokeFailed { message }),
        revoke_link_strategy().prop_map(|revoke_link| BookStatus::Revoked { revoke_link }),
    ]
}

/// Strategy for a sequence of updates to one book.
///
/// Every entry shares the same book; only the status varies.
pub fn status_updates_strategy(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<BookWithStatus>> {
    (
        book_strategy(AccountId::random()),
        prop::collection::vec(book_status_strategy(), len),
    )
        .prop_map(|(book, statuses)| {
            statuses
                .into_iter()
                .map(|status| BookWithStatus::new(book.clone(), status))
                .collect()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookvault_core::book::BookStatusKind;

    proptest! {
        #[test]
        fn generated_updates_share_one_book(updates in status_updates_strategy(1..10)) {
            let id = &updates[0].book.id;
            prop_assert!(updates.iter().all(|u| &u.book.id == id));
        }

        #[test]
        fn only_revoked_availability_derives_revoked(book in book_strategy(AccountId::random())) {
            let status = BookStatus::from_book(&book);
            let revoked = matches!(book.availability, Availability::Revoked { .. });
            prop_assert_eq!(status.kind() == BookStatusKind::Revoked, revoked);
        }
    }
}
