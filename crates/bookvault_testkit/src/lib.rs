//! # bookvault testkit
//!
//! Test utilities for bookvault.
//!
//! This crate provides:
//! - Temporary store fixtures wired to in-memory collaborators
//! - Collaborators that fail on demand, for best-effort delete paths
//! - Property-based test generators using proptest
//! - Helpers that interrupt atomic writes to simulate crashes
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bookvault_testkit::prelude::*;
//!
//! #[test]
//! fn creates_an_account() {
//!     let env = TestEnvironment::new();
//!     let store = env.open_account_store();
//!     store.create_account(&provider_x()).unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod faults;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::faults::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use crash::*;
pub use faults::*;
pub use fixtures::*;
pub use generators::*;
