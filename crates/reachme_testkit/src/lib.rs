//! # ReachMe Testkit
//!
//! Test utilities for ReachMe sync.
//!
//! This crate provides:
//! - Backend response fixtures in wire shape
//! - Profile store helpers (in-memory and temp-dir backed)
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use reachme_testkit::prelude::*;
//!
//! #[test]
//! fn merges_a_page() {
//!     let store = signed_in_store();
//!     let body = fetch_messages_json(&[101, 102], None);
//!     // ... decode and merge
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
