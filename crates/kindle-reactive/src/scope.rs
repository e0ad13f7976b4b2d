//! Effect scopes
//!
//! An [`EffectScope`] owns the effects created while it is active, the
//! scopes nested inside it and any callbacks registered with
//! [`on_scope_dispose`]. Stopping a scope disposes all of them depth-first.
//! Component instances own one scope each; their render effect and
//! watchers live in it.
//!
//! ## Example
//!
//! ```ignore
//! use kindle_reactive::{EffectScope, Effect};
//!
//! let scope = EffectScope::new();
//! scope.run(|| {
//!     // Owned by `scope`; the local handle may be dropped
//!     let _ = Effect::new(move || println!("{}", state.get("age")));
//! });
//!
//! scope.stop(); // the effect never runs again
//! ```

use core::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::dev_warn;
use crate::effect::Effect;
use crate::runtime::NodeId;

type Cleanup = Box<dyn FnOnce()>;

thread_local! {
	static ACTIVE_SCOPE: RefCell<Option<EffectScope>> = const { RefCell::new(None) };
}

struct ScopeInner {
	id: NodeId,
	active: Cell<bool>,
	detached: bool,
	effects: RefCell<Vec<Effect>>,
	cleanups: RefCell<Vec<Cleanup>>,
	scopes: RefCell<Vec<EffectScope>>,
	parent: RefCell<Option<Weak<ScopeInner>>>,
}

/// Ownership group for effects
#[derive(Clone)]
pub struct EffectScope {
	inner: Rc<ScopeInner>,
}

impl EffectScope {
	/// Create a scope collected by the currently active scope, if any
	pub fn new() -> Self {
		Self::create(false)
	}

	/// Create a scope that its parent does not collect
	pub fn detached() -> Self {
		Self::create(true)
	}

	fn create(detached: bool) -> Self {
		let scope = Self {
			inner: Rc::new(ScopeInner {
				id: NodeId::new(),
				active: Cell::new(true),
				detached,
				effects: RefCell::new(Vec::new()),
				cleanups: RefCell::new(Vec::new()),
				scopes: RefCell::new(Vec::new()),
				parent: RefCell::new(None),
			}),
		};
		if !detached && let Some(parent) = get_current_scope() {
			*scope.inner.parent.borrow_mut() = Some(Rc::downgrade(&parent.inner));
			parent.inner.scopes.borrow_mut().push(scope.clone());
		}
		scope
	}

	pub fn id(&self) -> NodeId {
		self.inner.id
	}

	pub fn is_active(&self) -> bool {
		self.inner.active.get()
	}

	pub fn is_detached(&self) -> bool {
		self.inner.detached
	}

	/// Run `f` with this scope collecting new effects, scopes and
	/// dispose callbacks.
	///
	/// Returns `None` with a dev warning when the scope is stopped.
	pub fn run<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
		if !self.is_active() {
			dev_warn!("cannot run an inactive effect scope.");
			return None;
		}
		let previous = ACTIVE_SCOPE.with(|slot| slot.replace(Some(self.clone())));
		let _restore = RestoreScope(previous);
		Some(f())
	}

	/// Stop every owned effect, nested scope and dispose callback, then
	/// detach from the parent scope.
	pub fn stop(&self) {
		self.stop_inner(false);
	}

	fn stop_inner(&self, from_parent: bool) {
		if !self.inner.active.replace(false) {
			return;
		}

		let effects = core::mem::take(&mut *self.inner.effects.borrow_mut());
		for effect in &effects {
			effect.stop();
		}
		let cleanups = core::mem::take(&mut *self.inner.cleanups.borrow_mut());
		for cleanup in cleanups {
			cleanup();
		}
		let scopes = core::mem::take(&mut *self.inner.scopes.borrow_mut());
		for scope in &scopes {
			scope.stop_inner(true);
		}

		if !from_parent {
			let parent = self.inner.parent.borrow_mut().take();
			if let Some(parent) = parent.and_then(|p| p.upgrade()) {
				parent
					.scopes
					.borrow_mut()
					.retain(|scope| !Rc::ptr_eq(&scope.inner, &self.inner));
			}
		}
	}

	/// Number of effects owned (for testing)
	pub fn effect_count(&self) -> usize {
		self.inner.effects.borrow().len()
	}

	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.inner, &other.inner)
	}
}

impl Default for EffectScope {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for EffectScope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EffectScope")
			.field("id", &self.inner.id)
			.field("active", &self.inner.active.get())
			.field("effects", &self.inner.effects.borrow().len())
			.finish()
	}
}

struct RestoreScope(Option<EffectScope>);

impl Drop for RestoreScope {
	fn drop(&mut self) {
		let previous = self.0.take();
		let _ = ACTIVE_SCOPE.try_with(|slot| *slot.borrow_mut() = previous);
	}
}

/// The scope currently collecting effects
pub fn get_current_scope() -> Option<EffectScope> {
	ACTIVE_SCOPE.try_with(|slot| slot.borrow().clone()).ok().flatten()
}

/// Register a callback run when the current scope stops
pub fn on_scope_dispose(f: impl FnOnce() + 'static) {
	match get_current_scope() {
		Some(scope) if scope.is_active() => scope.inner.cleanups.borrow_mut().push(Box::new(f)),
		_ => dev_warn!(
			"on_scope_dispose() is called when there is no active effect scope to be associated with."
		),
	}
}

pub(crate) fn record_effect(effect: &Effect) {
	if let Some(scope) = get_current_scope()
		&& scope.is_active()
	{
		scope.inner.effects.borrow_mut().push(effect.clone());
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{Signal, Value, reactive};
	use rstest::rstest;
	use serial_test::serial;

	#[test]
	#[serial]
	fn test_scope_keeps_effect_alive_until_stop() {
		let state = reactive(Value::object([("age", Value::from(20))]));
		let ages = Rc::new(RefCell::new(Vec::new()));
		let scope = EffectScope::new();
		let (reader, log) = (state.clone(), ages.clone());

		scope.run(|| {
			let _ = Effect::new(move || log.borrow_mut().push(reader.get("age")));
		});
		assert_eq!(scope.effect_count(), 1);

		scope.stop();
		for age in 21..24 {
			state.set("age", age).unwrap();
		}

		assert_eq!(*ages.borrow(), vec![Value::from(20)]);
	}

	#[test]
	#[serial]
	fn test_nested_scopes_stop_depth_first() {
		let order = Rc::new(RefCell::new(Vec::new()));
		let outer = EffectScope::new();
		let (o1, o2) = (order.clone(), order.clone());

		let inner = outer
			.run(|| {
				on_scope_dispose(move || o1.borrow_mut().push("outer"));
				let inner = EffectScope::new();
				inner.run(|| on_scope_dispose(move || o2.borrow_mut().push("inner")));
				inner
			})
			.unwrap();

		outer.stop();

		assert!(!inner.is_active());
		assert_eq!(*order.borrow(), vec!["outer", "inner"]);
	}

	#[rstest]
	#[case(false, false)]
	#[case(true, true)]
	#[serial]
	fn test_detached_scope_survives_parent(#[case] detached: bool, #[case] survives: bool) {
		let parent = EffectScope::new();
		let child = parent
			.run(|| {
				if detached {
					EffectScope::detached()
				} else {
					EffectScope::new()
				}
			})
			.unwrap();

		parent.stop();

		assert_eq!(child.is_active(), survives);
	}

	#[test]
	#[serial]
	fn test_stopped_scope_refuses_run() {
		let scope = EffectScope::new();
		scope.stop();

		assert_eq!(scope.run(|| 1), None);
		assert!(get_current_scope().is_none());
	}

	#[test]
	#[serial]
	fn test_child_stop_detaches_from_parent() {
		let count = Signal::new(0);
		let parent = EffectScope::new();
		let child = parent.run(EffectScope::new).unwrap();
		let reader = count.clone();
		child.run(|| {
			let _ = Effect::new(move || {
				reader.get();
			});
		});

		child.stop();
		assert!(parent.is_active());
		assert_eq!(child.effect_count(), 0);
	}
}
