//! Books as seen by the status machinery.
//!
//! A [`Book`] is the pre-parsed description of a publication in one
//! account: what the provider says about its availability, whether a copy
//! has been downloaded, and what DRM the copy carries. [`BookStatus`] is the
//! patron-facing state derived from it.

mod status;

pub use status::{BookStatus, BookStatusKind, BookWithStatus};

use crate::id::{AccountId, BookId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// What the provider reports about a book's availability to the patron.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Availability {
    /// Can be placed on hold.
    Holdable,
    /// On hold, waiting in a queue.
    #[serde(rename_all = "camelCase")]
    Held {
        /// Position in the hold queue, if known.
        position: Option<u32>,
        /// When the hold was placed.
        start: Option<DateTime<Utc>>,
        /// When the hold expires.
        end: Option<DateTime<Utc>>,
        /// Link for cancelling the hold.
        revoke: Option<Url>,
    },
    /// On hold and ready to be borrowed.
    #[serde(rename_all = "camelCase")]
    HeldReady {
        /// When the reservation lapses.
        end: Option<DateTime<Utc>>,
        /// Link for cancelling the hold.
        revoke: Option<Url>,
    },
    /// Can be borrowed now.
    Loanable,
    /// On loan to the patron.
    #[serde(rename_all = "camelCase")]
    Loaned {
        /// When the loan started.
        start: Option<DateTime<Utc>>,
        /// When the loan expires.
        end: Option<DateTime<Utc>>,
        /// Link for returning the book early.
        revoke: Option<Url>,
    },
    /// Free to read, with no loan period.
    #[serde(rename_all = "camelCase")]
    OpenAccess {
        /// Link for removing the book from the patron's shelf.
        revoke: Option<Url>,
    },
    /// The loan or hold was revoked.
    #[serde(rename_all = "camelCase")]
    Revoked {
        /// The link that performed the revocation.
        revoke: Option<Url>,
    },
}

impl Availability {
    /// The revoke link, if the availability carries one.
    #[must_use]
    pub fn revoke_link(&self) -> Option<&Url> {
        match self {
            Self::Held { revoke, .. }
            | Self::HeldReady { revoke, .. }
            | Self::Loaned { revoke, .. }
            | Self::OpenAccess { revoke }
            | Self::Revoked { revoke } => revoke.as_ref(),
            Self::Holdable | Self::Loanable => None,
        }
    }

    /// Returns true if the availability carries a revoke link.
    #[must_use]
    pub fn has_revoke_link(&self) -> bool {
        self.revoke_link().is_some()
    }
}

/// DRM protecting a downloaded copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BookDrm {
    /// No DRM.
    #[default]
    None,
    /// Adobe DRM. The loan may or may not be returnable through it.
    Adobe {
        /// Whether the DRM loan can be returned early.
        returnable: bool,
    },
}

impl BookDrm {
    /// Returns true if the DRM marks the loan as returnable.
    #[must_use]
    pub fn is_returnable(&self) -> bool {
        match self {
            Self::None => false,
            Self::Adobe { returnable } => *returnable,
        }
    }
}

/// A book in one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// The book id.
    pub id: BookId,
    /// The account the book belongs to.
    pub account: AccountId,
    /// The title.
    pub title: String,
    /// What the provider reports.
    pub availability: Availability,
    /// The downloaded copy, if any.
    pub local_file: Option<PathBuf>,
    /// DRM on the downloaded copy.
    #[serde(default)]
    pub drm: BookDrm,
}

impl Book {
    /// Creates a book with no local copy and no DRM.
    #[must_use]
    pub fn new(id: BookId, account: AccountId, title: impl Into<String>, availability: Availability) -> Self {
        Self {
            id,
            account,
            title: title.into(),
            availability,
            local_file: None,
            drm: BookDrm::None,
        }
    }

    /// Sets the local file.
    #[must_use]
    pub fn with_local_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_file = Some(path.into());
        self
    }

    /// Sets the DRM.
    #[must_use]
    pub fn with_drm(mut self, drm: BookDrm) -> Self {
        self.drm = drm;
        self
    }

    /// Returns true if a copy has been downloaded.
    #[must_use]
    pub fn is_downloaded(&self) -> bool {
        self.local_file.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn availability_json_is_tagged() {
        let availability = Availability::OpenAccess {
            revoke: Some(Url::parse("https://example.com/revoke/1").unwrap()),
        };
        let json = serde_json::to_value(&availability).unwrap();
        assert_eq!(json["type"], "openAccess");
        assert_eq!(json["revoke"], "https://example.com/revoke/1");
    }

    #[test]
    fn revoke_link_presence() {
        assert!(!Availability::Loanable.has_revoke_link());
        assert!(!Availability::Loaned {
            start: None,
            end: None,
            revoke: None
        }
        .has_revoke_link());
        assert!(Availability::Revoked {
            revoke: Some(Url::parse("https://example.com/r").unwrap())
        }
        .has_revoke_link());
    }

    #[test]
    fn drm_returnability() {
        assert!(!BookDrm::None.is_returnable());
        assert!(!BookDrm::Adobe { returnable: false }.is_returnable());
        assert!(BookDrm::Adobe { returnable: true }.is_returnable());
    }
}
