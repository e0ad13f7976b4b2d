//! Effect - Reactive Side Effects
//!
//! `Effect` represents a side effect that automatically re-runs when its dependencies change.
//! Dependencies are tracked automatically - any proxy property, ref or signal read inside the
//! effect closure becomes a dependency. Each run re-registers its dependencies from scratch.
//!
//! ## Key Features
//!
//! - **Automatic Dependency Tracking**: reads inside the effect are tracked
//! - **Schedulers**: an effect with a scheduler hands re-runs to it instead of running
//!   synchronously; this is how the job queue batches component updates
//! - **Scopes**: effects created inside an [`EffectScope`](crate::EffectScope) are owned by it
//! - **Memory Safe**: an effect stops and leaves the dependency graph when its last handle drops
//!
//! ## Example
//!
//! ```ignore
//! use kindle_reactive::{Effect, Signal};
//!
//! let count = Signal::new(0);
//! let reader = count.clone();
//!
//! // Create an effect that logs the count
//! let _effect = Effect::new(move || {
//!     println!("Count is: {}", reader.get());
//! });
//!
//! // This re-runs the effect
//! count.set(42); // Prints: "Count is: 42"
//! ```

use core::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::runtime::{NodeId, NodeType, Observer, try_with_runtime, with_runtime};

/// Type alias for effect functions
type EffectFn = Box<dyn FnMut() + 'static>;

/// Called instead of re-running the effect when a dependency changes
pub type EffectScheduler = Rc<dyn Fn()>;

// Registry of live effects, so the tracker can resolve subscriber ids.
thread_local! {
	static EFFECTS: RefCell<BTreeMap<NodeId, Weak<EffectInner>>> = const { RefCell::new(BTreeMap::new()) };
}

/// Options for [`Effect::with_options`]
#[derive(Default)]
pub struct EffectOptions {
	/// Do not run on creation
	pub lazy: bool,
	/// Receives re-run requests instead of running synchronously
	pub scheduler: Option<EffectScheduler>,
	/// Allow the effect to trigger itself while running
	pub allow_recurse: bool,
	/// Called once when the effect stops
	pub on_stop: Option<Box<dyn FnOnce()>>,
}

pub(crate) struct EffectInner {
	id: NodeId,
	node_type: NodeType,
	f: RefCell<EffectFn>,
	scheduler: Option<EffectScheduler>,
	active: Cell<bool>,
	running: Cell<bool>,
	allow_recurse: Cell<bool>,
	on_stop: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl EffectInner {
	fn stop(&self) {
		if !self.active.replace(false) {
			return;
		}
		if !self.running.get() {
			let id = self.id;
			try_with_runtime(|rt| rt.clear_dependencies(id));
		}
		let on_stop = self.on_stop.borrow_mut().take();
		if let Some(on_stop) = on_stop {
			on_stop();
		}
	}
}

impl Drop for EffectInner {
	fn drop(&mut self) {
		self.stop();
		let id = self.id;
		let _ = EFFECTS.try_with(|registry| {
			if let Ok(mut registry) = registry.try_borrow_mut() {
				registry.remove(&id);
			}
		});
	}
}

/// A reactive effect that re-runs when its dependencies change
///
/// Cloning an `Effect` clones the handle. The effect stays alive while any
/// handle exists, including the one held by an owning scope.
#[derive(Clone)]
pub struct Effect {
	inner: Rc<EffectInner>,
}

impl Effect {
	/// Create a new effect and run it immediately
	///
	/// Without a scheduler the effect re-runs synchronously whenever a
	/// dependency changes.
	///
	/// # Example
	///
	/// ```ignore
	/// let _effect = Effect::new(move || {
	///     println!("Count: {}", count.get());
	/// });
	/// ```
	pub fn new<F>(f: F) -> Self
	where
		F: FnMut() + 'static,
	{
		Self::with_options(f, EffectOptions::default())
	}

	/// Create a new effect with explicit options
	pub fn with_options<F>(f: F, options: EffectOptions) -> Self
	where
		F: FnMut() + 'static,
	{
		Self::create(f, options, NodeType::Effect)
	}

	pub(crate) fn new_computed<F>(f: F, scheduler: EffectScheduler) -> Self
	where
		F: FnMut() + 'static,
	{
		let options = EffectOptions {
			lazy: true,
			scheduler: Some(scheduler),
			..EffectOptions::default()
		};
		Self::create(f, options, NodeType::Computed)
	}

	fn create<F>(f: F, options: EffectOptions, node_type: NodeType) -> Self
	where
		F: FnMut() + 'static,
	{
		let inner = Rc::new(EffectInner {
			id: NodeId::new(),
			node_type,
			f: RefCell::new(Box::new(f)),
			scheduler: options.scheduler,
			active: Cell::new(true),
			running: Cell::new(false),
			allow_recurse: Cell::new(options.allow_recurse),
			on_stop: RefCell::new(options.on_stop),
		});
		EFFECTS.with(|registry| {
			registry
				.borrow_mut()
				.insert(inner.id, Rc::downgrade(&inner));
		});

		let effect = Self { inner };
		crate::scope::record_effect(&effect);
		if !options.lazy {
			effect.run();
		}
		effect
	}

	/// Run the effect now, re-collecting its dependencies
	///
	/// A stopped effect runs its function without tracking. A running
	/// effect is not re-entered.
	pub fn run(&self) {
		let inner = &self.inner;
		if !inner.active.get() {
			if let Ok(mut f) = inner.f.try_borrow_mut() {
				f();
			}
			return;
		}
		if inner.running.get() {
			return;
		}

		with_runtime(|rt| {
			rt.clear_dependencies(inner.id);
			rt.push_observer(Observer {
				id: inner.id,
				node_type: inner.node_type,
			});
			rt.enable_tracking();
		});
		inner.running.set(true);
		let _guard = RunGuard { inner };

		let mut f = inner.f.borrow_mut();
		f();
	}

	/// Stop the effect; it is never run by the tracker again
	pub fn stop(&self) {
		self.inner.stop();
	}

	/// Get the ID of this effect
	pub fn id(&self) -> NodeId {
		self.inner.id
	}

	pub fn is_active(&self) -> bool {
		self.inner.active.get()
	}

	pub fn is_running(&self) -> bool {
		self.inner.running.get()
	}

	pub fn allow_recurse(&self) -> bool {
		self.inner.allow_recurse.get()
	}

	pub fn set_allow_recurse(&self, allow: bool) {
		self.inner.allow_recurse.set(allow);
	}

	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.inner, &other.inner)
	}

	/// A handle that does not keep the effect alive
	pub fn downgrade(&self) -> WeakEffect {
		WeakEffect(Rc::downgrade(&self.inner))
	}

	/// Number of live effects on this thread (for testing)
	pub fn live_count() -> usize {
		EFFECTS.with(|registry| {
			registry
				.borrow()
				.values()
				.filter(|effect| effect.strong_count() > 0)
				.count()
		})
	}
}

impl fmt::Debug for Effect {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Effect")
			.field("id", &self.inner.id)
			.field("active", &self.inner.active.get())
			.field("running", &self.inner.running.get())
			.finish()
	}
}

/// Non-owning handle to an [`Effect`]
#[derive(Clone, Default)]
pub struct WeakEffect(Weak<EffectInner>);

impl WeakEffect {
	pub fn upgrade(&self) -> Option<Effect> {
		self.0.upgrade().map(|inner| Effect { inner })
	}
}

struct RunGuard<'a> {
	inner: &'a EffectInner,
}

impl Drop for RunGuard<'_> {
	fn drop(&mut self) {
		let inner = self.inner;
		inner.running.set(false);
		try_with_runtime(|rt| {
			rt.pop_observer();
			rt.reset_tracking();
			if !inner.active.get() {
				rt.clear_dependencies(inner.id);
			}
		});
	}
}

/// Notify the given subscribers; computed effects first.
pub(crate) fn trigger_effects(ids: Vec<NodeId>) {
	if ids.is_empty() {
		return;
	}
	let effects: Vec<Rc<EffectInner>> = EFFECTS
		.try_with(|registry| {
			let registry = registry.borrow();
			ids.iter()
				.filter_map(|id| registry.get(id).and_then(Weak::upgrade))
				.collect()
		})
		.unwrap_or_default();

	for effect in effects.iter().filter(|e| e.node_type == NodeType::Computed) {
		trigger_effect(effect);
	}
	for effect in effects.iter().filter(|e| e.node_type == NodeType::Effect) {
		trigger_effect(effect);
	}
}

fn trigger_effect(inner: &Rc<EffectInner>) {
	if !inner.active.get() {
		return;
	}
	if inner.running.get() && !inner.allow_recurse.get() {
		return;
	}
	match &inner.scheduler {
		Some(scheduler) => scheduler(),
		None => Effect {
			inner: inner.clone(),
		}
		.run(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{Signal, Value, reactive};
	use serial_test::serial;

	#[test]
	#[serial]
	fn test_effect_runs_immediately() {
		let runs = Rc::new(Cell::new(0));
		let counter = runs.clone();

		let _effect = Effect::new(move || counter.set(counter.get() + 1));

		assert_eq!(runs.get(), 1);
	}

	#[test]
	#[serial]
	fn test_lazy_effect_waits_for_run() {
		let runs = Rc::new(Cell::new(0));
		let counter = runs.clone();

		let effect = Effect::with_options(
			move || counter.set(counter.get() + 1),
			EffectOptions {
				lazy: true,
				..EffectOptions::default()
			},
		);
		assert_eq!(runs.get(), 0);

		effect.run();
		assert_eq!(runs.get(), 1);
	}

	#[test]
	#[serial]
	fn test_effect_reruns_on_proxy_write() {
		let state = reactive(Value::object([("age", Value::from(20))]));
		let seen = Rc::new(RefCell::new(Vec::new()));
		let (reader, log) = (state.clone(), seen.clone());

		let _effect = Effect::new(move || log.borrow_mut().push(reader.get("age")));
		state.set("age", 21).unwrap();
		state.set("age", 21).unwrap();

		assert_eq!(*seen.borrow(), vec![Value::from(20), Value::from(21)]);
	}

	#[test]
	#[serial]
	fn test_scheduler_receives_rerun() {
		let count = Signal::new(0);
		let runs = Rc::new(Cell::new(0));
		let scheduled = Rc::new(Cell::new(0));
		let (reader, counter, sched) = (count.clone(), runs.clone(), scheduled.clone());

		let _effect = Effect::with_options(
			move || {
				reader.get();
				counter.set(counter.get() + 1);
			},
			EffectOptions {
				scheduler: Some(Rc::new(move || sched.set(sched.get() + 1))),
				..EffectOptions::default()
			},
		);
		count.set(1);
		count.set(2);

		assert_eq!(runs.get(), 1);
		assert_eq!(scheduled.get(), 2);
	}

	#[test]
	#[serial]
	fn test_stop_prevents_reruns_and_calls_on_stop() {
		let count = Signal::new(0);
		let runs = Rc::new(Cell::new(0));
		let stopped = Rc::new(Cell::new(false));
		let (reader, counter, flag) = (count.clone(), runs.clone(), stopped.clone());

		let effect = Effect::with_options(
			move || {
				reader.get();
				counter.set(counter.get() + 1);
			},
			EffectOptions {
				on_stop: Some(Box::new(move || flag.set(true))),
				..EffectOptions::default()
			},
		);
		effect.stop();
		count.set(5);

		assert!(stopped.get());
		assert!(!effect.is_active());
		assert_eq!(runs.get(), 1);
		assert_eq!(with_runtime(|rt| rt.dependency_count(effect.id())), 0);
	}

	#[test]
	#[serial]
	fn test_effect_drop_cleans_up() {
		let count = Signal::new(0);
		let runs = Rc::new(Cell::new(0));
		let (reader, counter) = (count.clone(), runs.clone());

		let effect = Effect::new(move || {
			reader.get();
			counter.set(counter.get() + 1);
		});
		let id = effect.id();
		drop(effect);
		count.set(1);

		assert_eq!(runs.get(), 1);
		assert_eq!(with_runtime(|rt| rt.dependency_count(id)), 0);
	}

	#[test]
	#[serial]
	fn test_weak_handle_does_not_keep_effect_alive() {
		let effect = Effect::new(|| {});
		let weak = effect.downgrade();
		assert!(weak.upgrade().is_some_and(|e| e.ptr_eq(&effect)));

		drop(effect);
		assert!(weak.upgrade().is_none());
	}

	#[test]
	#[serial]
	fn test_effect_does_not_retrigger_itself() {
		let count = Signal::new(0);
		let writer = count.clone();

		let _effect = Effect::new(move || {
			let next = writer.get() + 1;
			writer.set(next);
		});

		assert_eq!(count.get_untracked(), 1);
	}
}
