//! Component runtime module.
//!
//! The batched scheduler, component lifecycle, watchers, async components
//! and the keep-alive cache.
//!
//! # Examples
//!
//! ```rust,no_run
//! # #[cfg(feature = "runtime")]
//! use kindle::runtime::{define_async_component, keep_alive, watch};
//! ```

#[cfg(feature = "runtime")]
pub use kindle_runtime::*;
