//! Watchers
//!
//! Watchers are effects whose re-runs go through the scheduler:
//!
//! - [`FlushTiming::Pre`] (default): queued as a `pre` job keyed by the
//!   owning instance, so it runs before that instance re-renders
//! - [`FlushTiming::Post`]: runs after the flush, once the host tree is
//!   updated
//! - [`FlushTiming::Sync`]: runs on every change
//!
//! A watcher created during setup belongs to the instance scope and stops
//! when the instance unmounts. Elsewhere it lives as long as its
//! [`WatchHandle`] or the active effect scope.
//!
//! ## Example
//!
//! ```ignore
//! use kindle_runtime::watch::{WatchOptions, watch};
//!
//! let handle = watch(
//!     WatchSource::getter(move || state.get("age")),
//!     |new, old| println!("age: {old} -> {new}"),
//!     WatchOptions::default(),
//! );
//! ```

use core::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use kindle_reactive::{
	Effect, EffectOptions, NodeId, Ref, TargetData, Value, WeakEffect, is_reactive,
};

use crate::component::current_instance;
use crate::scheduler::{SchedulerJob, queue_job, queue_post_flush_cb};

type Getter = Rc<dyn Fn() -> Value>;
type Callback = Box<dyn FnMut(&Value, &Value)>;

/// When a triggered watcher runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushTiming {
	#[default]
	Pre,
	Post,
	Sync,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WatchOptions {
	pub flush: FlushTiming,
	/// Call the callback once on creation
	pub immediate: bool,
	/// Trigger on nested changes
	pub deep: bool,
}

/// What a watcher observes
#[derive(Clone)]
pub enum WatchSource {
	/// A reactive proxy, watched deeply
	Reactive(Value),
	Ref(Ref),
	Getter(Getter),
	Many(Vec<WatchSource>),
}

impl WatchSource {
	pub fn getter(f: impl Fn() -> Value + 'static) -> Self {
		Self::Getter(Rc::new(f))
	}
}

impl From<Ref> for WatchSource {
	fn from(reference: Ref) -> Self {
		Self::Ref(reference)
	}
}

impl From<Value> for WatchSource {
	fn from(value: Value) -> Self {
		match value {
			Value::Ref(reference) => Self::Ref(reference),
			other => Self::Reactive(other),
		}
	}
}

impl From<Vec<WatchSource>> for WatchSource {
	fn from(sources: Vec<WatchSource>) -> Self {
		Self::Many(sources)
	}
}

impl fmt::Debug for WatchSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Reactive(value) => f.debug_tuple("Reactive").field(value).finish(),
			Self::Ref(reference) => f.debug_tuple("Ref").field(&reference.id()).finish(),
			Self::Getter(_) => f.write_str("Getter"),
			Self::Many(sources) => f.debug_tuple("Many").field(sources).finish(),
		}
	}
}

/// Owns a watcher
#[must_use = "dropping the handle outside a scope stops the watcher"]
#[derive(Debug, Clone)]
pub struct WatchHandle {
	effect: Effect,
}

impl WatchHandle {
	pub fn stop(&self) {
		self.effect.stop();
	}

	pub fn is_active(&self) -> bool {
		self.effect.is_active()
	}
}

struct Compare {
	deep: bool,
	force: bool,
	many: bool,
}

struct CallbackState {
	callback: Option<Callback>,
	old: Option<Value>,
}

/// Run `f` now and again whenever what it read changes (pre-flush)
pub fn watch_effect(f: impl FnMut() + 'static) -> WatchHandle {
	watch_effect_with(f, FlushTiming::Pre)
}

/// [`watch_effect`] re-running after the flush
pub fn watch_post_effect(f: impl FnMut() + 'static) -> WatchHandle {
	watch_effect_with(f, FlushTiming::Post)
}

/// [`watch_effect`] re-running synchronously
pub fn watch_sync_effect(f: impl FnMut() + 'static) -> WatchHandle {
	watch_effect_with(f, FlushTiming::Sync)
}

fn watch_effect_with(mut f: impl FnMut() + 'static, flush: FlushTiming) -> WatchHandle {
	let getter = Box::new(move || {
		f();
		Value::Undefined
	});
	let options = WatchOptions {
		flush,
		..WatchOptions::default()
	};
	let compare = Compare {
		deep: false,
		force: false,
		many: false,
	};
	do_watch(getter, None, options, compare)
}

/// Call `callback(new, old)` whenever `source` changes
pub fn watch<F>(source: impl Into<WatchSource>, callback: F, options: WatchOptions) -> WatchHandle
where
	F: FnMut(&Value, &Value) + 'static,
{
	let source = source.into();
	let mut compare = Compare {
		deep: options.deep,
		force: false,
		many: false,
	};
	let getter: Getter = match source {
		WatchSource::Ref(reference) => {
			compare.force = reference.is_shallow();
			Rc::new(move || reference.get())
		}
		WatchSource::Reactive(value) => {
			compare.deep = true;
			Rc::new(move || value.clone())
		}
		WatchSource::Getter(getter) => getter,
		WatchSource::Many(sources) => {
			compare.many = true;
			compare.force = sources.iter().any(|source| match source {
				WatchSource::Reactive(value) => is_reactive(value),
				WatchSource::Ref(reference) => reference.is_shallow(),
				_ => false,
			});
			let getters: Vec<Getter> = sources.into_iter().map(source_getter).collect();
			Rc::new(move || Value::array(getters.iter().map(|getter| getter())))
		}
	};
	let deep = compare.deep;
	let getter = Box::new(move || {
		let value = getter();
		if deep {
			traverse(&value);
		}
		value
	});
	do_watch(getter, Some(Box::new(callback)), options, compare)
}

fn source_getter(source: WatchSource) -> Getter {
	match source {
		WatchSource::Ref(reference) => Rc::new(move || reference.get()),
		WatchSource::Reactive(value) => Rc::new(move || {
			traverse(&value);
			value.clone()
		}),
		WatchSource::Getter(getter) => getter,
		WatchSource::Many(sources) => {
			let getters: Vec<Getter> = sources.into_iter().map(source_getter).collect();
			Rc::new(move || Value::array(getters.iter().map(|getter| getter())))
		}
	}
}

fn do_watch(
	mut getter: Box<dyn FnMut() -> Value>,
	callback: Option<Callback>,
	options: WatchOptions,
	compare: Compare,
) -> WatchHandle {
	let owner_uid = current_instance().map(|instance| instance.uid());
	let has_callback = callback.is_some();
	let latest: Rc<RefCell<Value>> = Rc::default();
	let state = Rc::new(RefCell::new(CallbackState {
		callback,
		old: None,
	}));
	let slot: Rc<RefCell<WeakEffect>> = Rc::default();

	let body = {
		let (slot, latest, state) = (slot.clone(), latest.clone(), state.clone());
		move || {
			let effect = slot.borrow().upgrade();
			let Some(effect) = effect.filter(Effect::is_active) else {
				return;
			};
			effect.run();
			if has_callback {
				let new = latest.borrow().clone();
				run_callback(&state, new, &compare);
			}
		}
	};
	let job = match options.flush {
		FlushTiming::Pre => SchedulerJob::pre(owner_uid, body),
		FlushTiming::Post | FlushTiming::Sync => SchedulerJob::new(body),
	};
	job.set_allow_recurse(has_callback);

	let scheduled = job.clone();
	let scheduler: Rc<dyn Fn()> = match options.flush {
		FlushTiming::Sync => Rc::new(move || scheduled.run()),
		FlushTiming::Post => Rc::new(move || queue_post_flush_cb(scheduled.clone())),
		FlushTiming::Pre => Rc::new(move || queue_job(scheduled.clone())),
	};
	let sink = latest.clone();
	let effect = Effect::with_options(
		move || {
			let value = getter();
			*sink.borrow_mut() = value;
		},
		EffectOptions {
			lazy: true,
			scheduler: Some(scheduler),
			..EffectOptions::default()
		},
	);
	*slot.borrow_mut() = effect.downgrade();

	if has_callback {
		if options.immediate {
			job.run();
		} else {
			effect.run();
			state.borrow_mut().old = Some(latest.borrow().clone());
		}
	} else if options.flush == FlushTiming::Post {
		let weak = effect.downgrade();
		queue_post_flush_cb(SchedulerJob::new(move || {
			if let Some(effect) = weak.upgrade() {
				effect.run();
			}
		}));
	} else {
		effect.run();
	}

	WatchHandle { effect }
}

fn run_callback(state: &RefCell<CallbackState>, new: Value, compare: &Compare) {
	let (callback, old) = {
		let mut state = state.borrow_mut();
		let changed = match &state.old {
			None => true,
			Some(old) => compare.deep || compare.force || has_changed(&new, old, compare.many),
		};
		if !changed {
			return;
		}
		let old = state.old.replace(new.clone()).unwrap_or_default();
		(state.callback.take(), old)
	};
	// Taken while running: a re-entrant trigger does not call it twice.
	if let Some(mut callback) = callback {
		callback(&new, &old);
		let mut state = state.borrow_mut();
		if state.callback.is_none() {
			state.callback = Some(callback);
		}
	}
}

fn has_changed(new: &Value, old: &Value, many: bool) -> bool {
	if !many {
		return !Value::same_value(new, old);
	}
	let len = new.len();
	len != old.len() || (0..len).any(|i| !Value::same_value(&new.get(i), &old.get(i)))
}

/// Read every nested property of `value`, registering each as a dependency
pub fn traverse(value: &Value) {
	traverse_inner(value, &mut HashSet::new());
}

fn traverse_inner(value: &Value, seen: &mut HashSet<NodeId>) {
	let Some(id) = value.identity() else {
		return;
	};
	if !seen.insert(id) {
		return;
	}
	match value {
		Value::Ref(reference) => traverse_inner(&reference.get(), seen),
		Value::Proxy(proxy) => {
			if let Ok(entries) = proxy.entries() {
				for (key, item) in entries {
					traverse_inner(&key, seen);
					traverse_inner(&item, seen);
				}
			}
		}
		Value::Target(target) => {
			let nested: Vec<Value> = match &*target.data() {
				TargetData::Object(props) => props.values().cloned().collect(),
				TargetData::Array(items) => items.clone(),
				TargetData::Map(map) => map.iter().flat_map(|(k, v)| [k.clone(), v.clone()]).collect(),
				TargetData::Set(set) => set.iter().cloned().collect(),
				_ => Vec::new(),
			};
			for item in &nested {
				traverse_inner(item, seen);
			}
		}
		_ => {}
	}
}
