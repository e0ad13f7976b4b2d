//! # Kindle Reactive
//!
//! The reactivity engine of Kindle: observable proxies over dynamic values,
//! a dependency tracker, effects, effect scopes, refs, typed signals and
//! computed values.
//!
//! ## Modules
//!
//! - **value**: the dynamic [`Value`] model proxies operate on
//! - **proxy** / **handlers**: `reactive`, `shallow_reactive`, `readonly`,
//!   `shallow_readonly` and their interception behaviour
//! - **runtime**: the thread-local dependency graph (`track` / `trigger`)
//! - **effect** / **scope**: re-runnable computations and their owners
//! - **reference** / **signal** / **computed**: single-value reactive cells
//! - **logging**: development warnings ([`dev_warn!`])
//!
//! ## Example
//!
//! ```ignore
//! use kindle_reactive::{Effect, Value, reactive};
//!
//! let state = reactive(Value::object([("age", Value::from(20))]));
//! let reader = state.clone();
//! let _effect = Effect::new(move || println!("age: {}", reader.get("age")));
//!
//! state.set("age", 21)?; // prints "age: 21"
//! ```

pub mod logging;

pub mod computed;
pub mod effect;
pub mod error;
pub mod handlers;
pub mod proxy;
pub mod reference;
pub mod runtime;
pub mod scope;
pub mod signal;
pub mod value;

pub use computed::Computed;
pub use effect::{Effect, EffectOptions, EffectScheduler, WeakEffect};
pub use error::ReactivityError;
pub use handlers::{BaseHandlers, CollectionHandlers, ProxyHandlers};
pub use proxy::{
	Proxy, ProxyKind, is_proxy, is_reactive, is_readonly, is_shallow, mark_raw, reactive,
	readonly, shallow_reactive, shallow_readonly, to_raw, to_reactive, to_readonly,
};
pub use reference::{Ref, is_ref, make_ref, shallow_ref, trigger_ref, unref};
pub use runtime::{
	DepKey, NodeId, Runtime, TargetShape, TrackOp, TriggerOp, enable_tracking, pause_tracking,
	reset_tracking, untracked, with_runtime,
};
pub use scope::{EffectScope, get_current_scope, on_scope_dispose};
pub use signal::Signal;
pub use value::{Opaque, PropKey, RawType, Target, TargetData, Value};
