//! Reactivity module.
//!
//! Observable proxies, effects and effect scopes, refs, computed values and
//! the dependency tracker behind them.
//!
//! # Examples
//!
//! ```rust,no_run
//! # #[cfg(feature = "reactive")]
//! use kindle::reactive::{Effect, reactive};
//! ```

#[cfg(feature = "reactive")]
pub use kindle_reactive::*;
