//! Computed - Cached Derived Values
//!
//! `Computed<T>` caches the result of a getter and recomputes it lazily: a
//! dependency change only marks it dirty and notifies its own readers; the
//! getter runs again on the next read.
//!
//! ## Example
//!
//! ```ignore
//! use kindle_reactive::{Computed, Signal};
//!
//! let count = Signal::new(2);
//! let reader = count.clone();
//! let doubled = Computed::new(move || reader.get() * 2);
//!
//! assert_eq!(doubled.get(), 4);
//! count.set(5);
//! assert_eq!(doubled.get(), 10);
//! ```

use core::cell::{Cell, RefCell};
use core::fmt;
use std::rc::Rc;

use crate::effect::Effect;
use crate::runtime::{DepKey, NodeId, TargetShape, TrackOp, TriggerOp, try_with_runtime, with_runtime};

type Getter<T> = Box<dyn FnMut() -> T>;

struct ComputedInner<T: 'static> {
	id: NodeId,
	getter: RefCell<Getter<T>>,
	value: RefCell<Option<T>>,
	dirty: Cell<bool>,
	effect: RefCell<Option<Effect>>,
}

impl<T: 'static> Drop for ComputedInner<T> {
	fn drop(&mut self) {
		let id = self.id;
		try_with_runtime(|rt| rt.remove_target(id));
	}
}

/// A lazily recomputed, cached derived value
pub struct Computed<T: 'static>(Rc<ComputedInner<T>>);

impl<T: 'static> Clone for Computed<T> {
	fn clone(&self) -> Self {
		Self(self.0.clone())
	}
}

impl<T: Clone + 'static> Computed<T> {
	/// Create a computed value from a getter
	pub fn new(getter: impl FnMut() -> T + 'static) -> Self {
		let inner = Rc::new(ComputedInner {
			id: NodeId::new(),
			getter: RefCell::new(Box::new(getter)),
			value: RefCell::new(None),
			dirty: Cell::new(true),
			effect: RefCell::new(None),
		});

		let compute = Rc::downgrade(&inner);
		let invalidate = Rc::downgrade(&inner);
		let effect = Effect::new_computed(
			move || {
				let Some(inner) = compute.upgrade() else {
					return;
				};
				let value = (inner.getter.borrow_mut())();
				*inner.value.borrow_mut() = Some(value);
			},
			Rc::new(move || {
				let Some(inner) = invalidate.upgrade() else {
					return;
				};
				if !inner.dirty.replace(true) {
					with_runtime(|rt| {
						rt.trigger(inner.id, TargetShape::Plain, TriggerOp::Set, Some(DepKey::Value))
					});
				}
			}),
		);
		*inner.effect.borrow_mut() = Some(effect);
		Self(inner)
	}

	/// Read the value, recomputing it first when dirty
	pub fn get(&self) -> T {
		with_runtime(|rt| rt.track(self.0.id, TrackOp::Get, DepKey::Value));
		self.get_untracked()
	}

	/// Read the value without tracking
	pub fn get_untracked(&self) -> T {
		if self.0.dirty.replace(false) {
			let effect = self.0.effect.borrow().clone();
			if let Some(effect) = effect {
				effect.run();
			}
		}
		match &*self.0.value.borrow() {
			Some(value) => value.clone(),
			None => (self.0.getter.borrow_mut())(),
		}
	}

	/// Whether the next read recomputes
	pub fn is_dirty(&self) -> bool {
		self.0.dirty.get()
	}

	/// Stop tracking; the cached value is kept
	pub fn stop(&self) {
		if let Some(effect) = self.0.effect.borrow().as_ref() {
			effect.stop();
		}
	}

	pub fn id(&self) -> NodeId {
		self.0.id
	}
}

impl<T: fmt::Debug + Clone + 'static> fmt::Debug for Computed<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Computed")
			.field("id", &self.0.id)
			.field("dirty", &self.0.dirty.get())
			.field("value", &self.0.value.borrow())
			.finish()
	}
}
