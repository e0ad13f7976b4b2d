//! # Kindle
//!
//! The reactive core of a component-based UI framework.
//!
//! Kindle tracks reads of observable state, re-runs the effects that read
//! it, and batches the resulting component updates into one ordered flush.
//! On top of that sit watchers, async components that render placeholders
//! while they load, and a keep-alive cache that parks component instances
//! instead of destroying them.
//!
//! ## Feature Flags
//!
//! ### Presets
//!
//! - `minimal` - Reactivity only
//! - `standard` - Reactivity and the component runtime
//! - `full` (default) - Everything, including the in-memory test renderer
//!
//! ### Fine-grained Control
//!
//! - `reactive` - proxies, effects, scopes, refs and computed values
//! - `runtime` - scheduler, lifecycle, watchers, async components, keep-alive
//! - `testkit` - `MemoryRenderer` for tests
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use kindle::prelude::*;
//!
//! let state = reactive(Value::object([("count", Value::from(0))]));
//! let reader = state.clone();
//! let _handle = watch_effect(move || {
//!     tracing::info!(count = %reader.get("count"), "count changed");
//! });
//!
//! state.set("count", 1)?;
//! flush_jobs();
//! ```

#[cfg(feature = "reactive")]
pub mod reactive;
#[cfg(feature = "runtime")]
pub mod runtime;
#[cfg(feature = "testkit")]
pub mod testkit;

#[cfg(feature = "reactive")]
pub use kindle_reactive::{
	Computed, Effect, EffectOptions, EffectScope, ReactivityError, Ref, Signal, Value, reactive,
	readonly, shallow_reactive, shallow_readonly, to_raw,
};

#[cfg(feature = "runtime")]
pub use kindle_runtime::{
	AppContext, AsyncComponentOptions, ComponentDef, KeepAliveProps, LoadError, RuntimeError,
	RuntimeSettings, VNode, define_async_component, flush_jobs, keep_alive, next_tick, watch,
	watch_effect,
};

/// Common imports
///
/// ```rust,ignore
/// use kindle::prelude::*;
/// ```
pub mod prelude {
	#[cfg(feature = "reactive")]
	pub use crate::{
		Computed, Effect, EffectScope, Ref, Signal, Value, reactive, readonly, shallow_reactive,
		to_raw,
	};

	#[cfg(feature = "runtime")]
	pub use kindle_runtime::{
		ComponentDef, KeepAliveProps, Props, VNode, WatchOptions, define_async_component,
		flush_jobs, keep_alive, next_tick, on_activated, on_deactivated, on_mounted, on_unmounted,
		props, watch, watch_effect,
	};

	#[cfg(feature = "testkit")]
	pub use kindle_testkit::{MemoryRenderer, inner_html};
}
