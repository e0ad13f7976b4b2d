//! Reactive Runtime
//!
//! This module provides the dependency tracker: the observer stack, the
//! `target -> key -> subscribers` graph and the trigger fan-out rules.
//!
//! ## Architecture
//!
//! 1. **Observer Stack**: tracks the currently executing effect
//! 2. **Dependency Tracking**: every read through a proxy, ref or signal
//!    calls [`Runtime::track`] with the target id and the key read
//! 3. **Triggering**: every write calls [`Runtime::trigger`], which resolves
//!    the affected keys and hands the subscribers to the effect module
//! 4. **Pause Stack**: `pause_tracking` / `enable_tracking` /
//!    `reset_tracking` temporarily switch tracking off or on
//!
//! ## Example
//!
//! ```ignore
//! use kindle_reactive::{Effect, Value, reactive};
//!
//! let state = reactive(Value::object([("count", Value::from(0))]));
//! let reader = state.clone();
//! let _effect = Effect::new(move || {
//!     // This read registers `(state, "count")` as a dependency
//!     println!("count is {}", reader.get("count"));
//! });
//!
//! // Writing re-runs the effect
//! state.set("count", 1).unwrap();
//! ```

use core::cell::{Cell, RefCell};
use core::sync::atomic::{AtomicUsize, Ordering};
use std::collections::HashMap;

use crate::value::{PropKey, Value};

/// Unique identifier for reactive nodes (targets, proxies, refs, effects)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
	/// Create a new unique NodeId
	pub fn new() -> Self {
		static COUNTER: AtomicUsize = AtomicUsize::new(0);
		Self(COUNTER.fetch_add(1, Ordering::Relaxed))
	}
}

impl Default for NodeId {
	fn default() -> Self {
		Self::new()
	}
}

/// Type of observer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
	/// A plain effect (render effect, watcher, `Effect::new`)
	Effect,
	/// The effect behind a computed value
	Computed,
}

/// Observer represents a currently executing effect
#[derive(Debug, Clone)]
pub struct Observer {
	/// Unique identifier for this observer
	pub id: NodeId,
	/// Type of this observer
	pub node_type: NodeType,
}

/// Key under which a dependency is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DepKey {
	/// Object property or array index
	Prop(PropKey),
	/// Map or set entry
	Entry(Value),
	/// Array `length`
	Length,
	/// Any change to the set of keys or values
	Iterate,
	/// Any change to the set of map keys
	MapKeyIterate,
	/// The single value of a ref, signal or computed
	Value,
}

impl DepKey {
	/// Dependency key for a property of a plain object or array
	pub fn for_prop(prop: &PropKey, is_array: bool) -> Self {
		if is_array && prop.is_length() {
			Self::Length
		} else {
			Self::Prop(prop.clone())
		}
	}
}

/// Kind of read being tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOp {
	Get,
	Has,
	Iterate,
}

/// Kind of write being triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOp {
	Set,
	Add,
	Delete,
	Clear,
}

/// Shape of the target being triggered; selects the fan-out rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetShape {
	/// Plain object, ref, signal or computed
	Plain,
	Array,
	Map,
	/// Set-like collection
	Set,
}

/// Global reactive runtime
///
/// This struct manages the dependency graph. It uses thread-local storage
/// to maintain separate runtime state per thread.
pub struct Runtime {
	/// Observer stack for tracking currently executing effects
	observer_stack: RefCell<Vec<Observer>>,
	/// Dependency graph: target -> key -> subscribers
	pub(crate) target_map: RefCell<HashMap<NodeId, HashMap<DepKey, Vec<NodeId>>>>,
	/// Reverse edges: effect -> `(target, key)` it subscribed to
	pub(crate) effect_deps: RefCell<HashMap<NodeId, Vec<(NodeId, DepKey)>>>,
	should_track: Cell<bool>,
	track_stack: RefCell<Vec<bool>>,
}

impl Runtime {
	/// Create a new Runtime instance
	pub fn new() -> Self {
		Self {
			observer_stack: RefCell::new(Vec::new()),
			target_map: RefCell::new(HashMap::new()),
			effect_deps: RefCell::new(HashMap::new()),
			should_track: Cell::new(true),
			track_stack: RefCell::new(Vec::new()),
		}
	}

	/// Get the current observer (the currently executing effect)
	pub fn current_observer(&self) -> Option<NodeId> {
		self.observer_stack
			.borrow()
			.last()
			.map(|observer| observer.id)
	}

	/// Whether the given effect is anywhere on the observer stack
	pub fn is_observing(&self, id: NodeId) -> bool {
		self.observer_stack.borrow().iter().any(|o| o.id == id)
	}

	/// Push an observer onto the stack
	pub fn push_observer(&self, observer: Observer) {
		self.observer_stack.borrow_mut().push(observer);
	}

	/// Pop an observer from the stack
	pub fn pop_observer(&self) -> Option<Observer> {
		self.observer_stack.borrow_mut().pop()
	}

	/// Whether reads currently register dependencies
	pub fn is_tracking(&self) -> bool {
		self.should_track.get() && self.current_observer().is_some()
	}

	/// Stop recording dependencies until the matching `reset_tracking`
	pub fn pause_tracking(&self) {
		self.track_stack.borrow_mut().push(self.should_track.get());
		self.should_track.set(false);
	}

	/// Record dependencies until the matching `reset_tracking`
	pub fn enable_tracking(&self) {
		self.track_stack.borrow_mut().push(self.should_track.get());
		self.should_track.set(true);
	}

	/// Restore the tracking state saved by the last pause/enable
	pub fn reset_tracking(&self) {
		let last = self.track_stack.borrow_mut().pop();
		self.should_track.set(last.unwrap_or(true));
	}

	/// Register the current observer as a subscriber of `(target, key)`.
	pub fn track(&self, target: NodeId, op: TrackOp, key: DepKey) {
		if !self.should_track.get() {
			return;
		}
		let Some(observer) = self.current_observer() else {
			return;
		};

		let mut map = self.target_map.borrow_mut();
		let subscribers = map.entry(target).or_default().entry(key.clone()).or_default();
		if subscribers.contains(&observer) {
			return;
		}
		subscribers.push(observer);
		#[cfg(feature = "debug-hooks")]
		tracing::trace!(?target, ?op, ?key, ?observer, "track");
		let _ = op;
		self.effect_deps
			.borrow_mut()
			.entry(observer)
			.or_default()
			.push((target, key));
	}

	/// Notify the subscribers affected by a write to `(target, key)`.
	///
	/// `key` is `None` only for `Clear`. Subscribers are collected once per
	/// call, in registration order, and handed to the effect module after
	/// the graph borrow is released.
	pub fn trigger(&self, target: NodeId, shape: TargetShape, op: TriggerOp, key: Option<DepKey>) {
		let subscribers = {
			let map = self.target_map.borrow();
			let Some(deps) = map.get(&target) else {
				return;
			};

			let mut keys: Vec<DepKey> = Vec::new();
			if op == TriggerOp::Clear {
				keys.extend(deps.keys().cloned());
			} else {
				if let Some(key) = key.as_ref() {
					keys.push(key.clone());
				}
				let is_index = matches!(key, Some(DepKey::Prop(PropKey::Index(_))));
				match (op, shape) {
					(TriggerOp::Add, TargetShape::Array) => {
						if is_index {
							keys.push(DepKey::Length);
						}
					}
					(TriggerOp::Add | TriggerOp::Delete, TargetShape::Map) => {
						keys.push(DepKey::Iterate);
						keys.push(DepKey::MapKeyIterate);
					}
					(TriggerOp::Add | TriggerOp::Delete, TargetShape::Plain | TargetShape::Set) => {
						keys.push(DepKey::Iterate);
					}
					(TriggerOp::Set, TargetShape::Map) => keys.push(DepKey::Iterate),
					_ => {}
				}
			}

			collect_subscribers(deps, keys.iter())
		};

		#[cfg(feature = "debug-hooks")]
		tracing::trace!(?target, ?op, ?key, count = subscribers.len(), "trigger");
		crate::effect::trigger_effects(subscribers);
	}

	/// Notify the subscribers affected by an array `length` write:
	/// `length` itself and every index at or beyond the new length.
	pub fn trigger_length(&self, target: NodeId, new_length: usize) {
		let subscribers = {
			let map = self.target_map.borrow();
			let Some(deps) = map.get(&target) else {
				return;
			};
			let keys = deps.keys().filter(|key| match key {
				DepKey::Length => true,
				DepKey::Prop(PropKey::Index(i)) => *i >= new_length,
				_ => false,
			});
			collect_subscribers(deps, keys)
		};
		crate::effect::trigger_effects(subscribers);
	}

	/// Clear dependencies for an effect
	///
	/// This is called before re-executing an effect so that it re-registers
	/// its dependencies from scratch.
	pub fn clear_dependencies(&self, effect: NodeId) {
		let Some(deps) = self.effect_deps.borrow_mut().remove(&effect) else {
			return;
		};
		let mut map = self.target_map.borrow_mut();
		for (target, key) in deps {
			if let Some(keys) = map.get_mut(&target) {
				if let Some(subscribers) = keys.get_mut(&key) {
					subscribers.retain(|&id| id != effect);
					if subscribers.is_empty() {
						keys.remove(&key);
					}
				}
				if keys.is_empty() {
					map.remove(&target);
				}
			}
		}
	}

	/// Remove a target from the dependency graph
	///
	/// This is called when a target, ref or signal is dropped.
	pub fn remove_target(&self, target: NodeId) {
		let Ok(mut map) = self.target_map.try_borrow_mut() else {
			return;
		};
		if map.remove(&target).is_none() {
			return;
		}
		drop(map);
		if let Ok(mut effect_deps) = self.effect_deps.try_borrow_mut() {
			for deps in effect_deps.values_mut() {
				deps.retain(|(t, _)| *t != target);
			}
		}
	}

	/// Check if a target has any recorded dependencies (for testing)
	pub fn has_target(&self, target: NodeId) -> bool {
		self.target_map.borrow().contains_key(&target)
	}

	/// Get the number of subscribers of `(target, key)` (for testing)
	pub fn subscriber_count(&self, target: NodeId, key: &DepKey) -> usize {
		self.target_map
			.borrow()
			.get(&target)
			.and_then(|keys| keys.get(key))
			.map(Vec::len)
			.unwrap_or(0)
	}

	/// Get the number of dependencies an effect holds (for testing)
	pub fn dependency_count(&self, effect: NodeId) -> usize {
		self.effect_deps
			.borrow()
			.get(&effect)
			.map(Vec::len)
			.unwrap_or(0)
	}
}

fn collect_subscribers<'a>(
	deps: &HashMap<DepKey, Vec<NodeId>>,
	keys: impl IntoIterator<Item = &'a DepKey>,
) -> Vec<NodeId> {
	let mut subscribers = Vec::new();
	for key in keys {
		if let Some(ids) = deps.get(key) {
			for id in ids {
				if !subscribers.contains(id) {
					subscribers.push(*id);
				}
			}
		}
	}
	subscribers
}

impl Default for Runtime {
	fn default() -> Self {
		Self::new()
	}
}

// Thread-local runtime instance
//
// The UI runs on one thread, so this effectively provides a global runtime.
thread_local! {
	static RUNTIME: Runtime = Runtime::new();
}

/// Get a reference to the thread's runtime
pub fn with_runtime<F, R>(f: F) -> R
where
	F: FnOnce(&Runtime) -> R,
{
	RUNTIME.with(f)
}

/// Try to access the thread's runtime (safe version for Drop implementations)
///
/// Returns None if the thread-local storage has been destroyed.
pub fn try_with_runtime<F, R>(f: F) -> Option<R>
where
	F: FnOnce(&Runtime) -> R,
{
	RUNTIME.try_with(f).ok()
}

/// Stop recording dependencies until the matching [`reset_tracking`]
pub fn pause_tracking() {
	with_runtime(Runtime::pause_tracking);
}

/// Record dependencies until the matching [`reset_tracking`]
pub fn enable_tracking() {
	with_runtime(Runtime::enable_tracking);
}

/// Restore the tracking state saved by the last pause/enable
pub fn reset_tracking() {
	with_runtime(Runtime::reset_tracking);
}

/// Run `f` with tracking paused
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
	struct Reset;
	impl Drop for Reset {
		fn drop(&mut self) {
			try_with_runtime(Runtime::reset_tracking);
		}
	}

	pause_tracking();
	let _reset = Reset;
	f()
}
