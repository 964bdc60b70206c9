//! Book status and its priority ordering.

use super::{Availability, Book};
use chrono::{DateTime, Utc};
use url::Url;

/// The patron-facing state of a book.
///
/// Every variant has a fixed priority. When asynchronous reports about the
/// same book race, the registry keeps the one with the higher priority, so
/// a late "loanable" answer cannot hide a download that is in progress.
///
/// | status | priority |
/// |---|---|
/// | `Holdable`, `Loanable` | 0 |
/// | `Held` | 10 |
/// | `HeldReady` | 12 |
/// | `RequestingLoan`, `RequestingRevoke` | 20 |
/// | `Loaned` | 30 |
/// | `RequestingDownload` | 50 |
/// | `DownloadInProgress` | 60 |
/// | `DownloadFailed`, `RevokeFailed` | 90 |
/// | `Downloaded` | 100 |
/// | `Revoked` | `u32::MAX` |
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookStatus {
    /// Can be placed on hold.
    Holdable,
    /// Can be borrowed.
    Loanable,
    /// On hold.
    Held {
        /// Position in the hold queue.
        queue_position: Option<u32>,
        /// When the hold was placed.
        start_date: Option<DateTime<Utc>>,
        /// When the hold expires.
        end_date: Option<DateTime<Utc>>,
        /// Whether the hold can be cancelled.
        revocable: bool,
    },
    /// On hold and ready to borrow.
    HeldReady {
        /// When the reservation lapses.
        end_date: Option<DateTime<Utc>>,
        /// Whether the hold can be cancelled.
        revocable: bool,
    },
    /// A loan request is in flight.
    RequestingLoan,
    /// On loan, not downloaded.
    Loaned {
        /// When the loan expires; `None` for open access books.
        end_date: Option<DateTime<Utc>>,
        /// Whether the loan can be returned early.
        returnable: bool,
    },
    /// A return or hold cancellation is in flight.
    RequestingRevoke,
    /// A download is about to start.
    RequestingDownload {
        /// When the loan expires.
        end_date: Option<DateTime<Utc>>,
    },
    /// A download is running.
    DownloadInProgress {
        /// Bytes received so far.
        bytes_so_far: u64,
        /// Total size, if the server sent one.
        bytes_expected: Option<u64>,
        /// When the loan expires.
        end_date: Option<DateTime<Utc>>,
    },
    /// Downloaded and readable.
    Downloaded {
        /// When the loan expires; `None` for open access books.
        end_date: Option<DateTime<Utc>>,
        /// Whether the loan can be returned early.
        returnable: bool,
    },
    /// The last download failed.
    DownloadFailed {
        /// What went wrong.
        message: String,
    },
    /// The last return or cancellation failed.
    RevokeFailed {
        /// What went wrong.
        message: String,
    },
    /// The loan or hold was revoked.
    Revoked {
        /// The link that performed the revocation.
        revoke_link: Option<Url>,
    },
}

/// The variant of a [`BookStatus`] without its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum BookStatusKind {
    Holdable,
    Loanable,
    Held,
    HeldReady,
    RequestingLoan,
    Loaned,
    RequestingRevoke,
    RequestingDownload,
    DownloadInProgress,
    Downloaded,
    DownloadFailed,
    RevokeFailed,
    Revoked,
}

impl BookStatusKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 13] = [
        Self::Holdable,
        Self::Loanable,
        Self::Held,
        Self::HeldReady,
        Self::RequestingLoan,
        Self::Loaned,
        Self::RequestingRevoke,
        Self::RequestingDownload,
        Self::DownloadInProgress,
        Self::Downloaded,
        Self::DownloadFailed,
        Self::RevokeFailed,
        Self::Revoked,
    ];

    /// The priority shared by every status of this kind.
    #[must_use]
    pub const fn priority(self) -> u32 {
        match self {
            Self::Holdable | Self::Loanable => 0,
            Self::Held => 10,
            Self::HeldReady => 12,
            Self::RequestingLoan | Self::RequestingRevoke => 20,
            Self::Loaned => 30,
            Self::RequestingDownload => 50,
            Self::DownloadInProgress => 60,
            Self::DownloadFailed | Self::RevokeFailed => 90,
            Self::Downloaded => 100,
            Self::Revoked => u32::MAX,
        }
    }
}

impl BookStatus {
    /// Derives the status of `book` from its availability, local copy and
    /// DRM.
    #[must_use]
    pub fn from_book(book: &Book) -> Self {
        let downloaded = book.is_downloaded();
        let has_revoke = book.availability.has_revoke_link();
        let drm_returnable = book.drm.is_returnable();

        match &book.availability {
            Availability::HeldReady { end, .. } => Self::HeldReady {
                end_date: *end,
                revocable: has_revoke,
            },
            Availability::Held {
                position,
                start,
                end,
                ..
            } => Self::Held {
                queue_position: *position,
                start_date: *start,
                end_date: *end,
                revocable: has_revoke,
            },
            Availability::Holdable => Self::Holdable,
            Availability::Loanable => Self::Loanable,
            Availability::Loaned { end, .. } if downloaded => Self::Downloaded {
                end_date: *end,
                returnable: has_revoke && (drm_returnable || downloaded),
            },
            Availability::Loaned { end, .. } => Self::Loaned {
                end_date: *end,
                returnable: has_revoke && drm_returnable,
            },
            Availability::OpenAccess { .. } if downloaded => Self::Downloaded {
                end_date: None,
                returnable: has_revoke,
            },
            Availability::OpenAccess { .. } => Self::Loaned {
                end_date: None,
                returnable: has_revoke,
            },
            Availability::Revoked { revoke } => Self::Revoked {
                revoke_link: revoke.clone(),
            },
        }
    }

    /// The variant without its data.
    #[must_use]
    pub fn kind(&self) -> BookStatusKind {
        match self {
            Self::Holdable => BookStatusKind::Holdable,
            Self::Loanable => BookStatusKind::Loanable,
            Self::Held { .. } => BookStatusKind::Held,
            Self::HeldReady { .. } => BookStatusKind::HeldReady,
            Self::RequestingLoan => BookStatusKind::RequestingLoan,
            Self::Loaned { .. } => BookStatusKind::Loaned,
            Self::RequestingRevoke => BookStatusKind::RequestingRevoke,
            Self::RequestingDownload { .. } => BookStatusKind::RequestingDownload,
            Self::DownloadInProgress { .. } => BookStatusKind::DownloadInProgress,
            Self::Downloaded { .. } => BookStatusKind::Downloaded,
            Self::DownloadFailed { .. } => BookStatusKind::DownloadFailed,
            Self::RevokeFailed { .. } => BookStatusKind::RevokeFailed,
            Self::Revoked { .. } => BookStatusKind::Revoked,
        }
    }

    /// The status priority. Higher wins.
    #[must_use]
    pub fn priority(&self) -> u32 {
        self.kind().priority()
    }

    /// Returns true if this status strictly outranks `other`.
    #[must_use]
    pub fn is_more_important_than(&self, other: &Self) -> bool {
        self.priority() > other.priority()
    }
}

/// A book together with its current status.
///
/// Registry entries are replaced wholesale, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookWithStatus {
    /// The book.
    pub book: Book,
    /// Its status.
    pub status: BookStatus,
}

impl BookWithStatus {
    /// Pairs a book with a status.
    #[must_use]
    pub fn new(book: Book, status: BookStatus) -> Self {
        Self { book, status }
    }

    /// Pairs a book with the status derived from it.
    #[must_use]
    pub fn derived(book: Book) -> Self {
        let status = BookStatus::from_book(&book);
        Self { book, status }
    }

    /// The priority of the status.
    #[must_use]
    pub fn priority(&self) -> u32 {
        self.status.priority()
    }
}
