//! Test support module.
//!
//! An in-memory renderer for driving components in tests.
//!
//! # Examples
//!
//! ```rust,no_run
//! # #[cfg(feature = "testkit")]
//! use kindle::testkit::{MemoryRenderer, inner_html};
//! ```

#[cfg(feature = "testkit")]
pub use kindle_testkit::*;
