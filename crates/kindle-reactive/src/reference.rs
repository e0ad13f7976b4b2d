//! Refs
//!
//! A [`Ref`] is a reactive cell holding one dynamic [`Value`] with its own
//! dependency. Deep refs convert structured values to reactive proxies when
//! they are written; shallow refs store what they are given.
//!
//! Reactive objects unwrap refs stored in their properties on read and
//! write through them on assignment, so `state.get("count")` yields the
//! ref's value rather than the ref.

use core::cell::RefCell;
use core::fmt;
use std::rc::Rc;

use crate::proxy::{is_readonly, is_shallow, to_raw, to_reactive};
use crate::runtime::{DepKey, NodeId, TargetShape, TrackOp, TriggerOp, try_with_runtime, with_runtime};
use crate::value::Value;

struct RefInner {
	id: NodeId,
	shallow: bool,
	raw: RefCell<Value>,
	value: RefCell<Value>,
}

impl Drop for RefInner {
	fn drop(&mut self) {
		let id = self.id;
		try_with_runtime(|rt| rt.remove_target(id));
	}
}

/// A reactive reference to one value
#[derive(Clone)]
pub struct Ref(Rc<RefInner>);

impl Ref {
	/// Deep ref: structured values are stored as reactive proxies
	pub fn new(value: impl Into<Value>) -> Self {
		let value = value.into();
		let raw = to_raw(&value);
		let value = to_reactive(value);
		Self::build(raw, value, false)
	}

	/// Shallow ref: the value is stored as given
	pub fn shallow(value: impl Into<Value>) -> Self {
		let value = value.into();
		Self::build(value.clone(), value, true)
	}

	fn build(raw: Value, value: Value, shallow: bool) -> Self {
		Self(Rc::new(RefInner {
			id: NodeId::new(),
			shallow,
			raw: RefCell::new(raw),
			value: RefCell::new(value),
		}))
	}

	/// Read the value, tracking the ref
	pub fn get(&self) -> Value {
		with_runtime(|rt| rt.track(self.0.id, TrackOp::Get, DepKey::Value));
		self.get_untracked()
	}

	pub fn get_untracked(&self) -> Value {
		self.0.value.borrow().clone()
	}

	/// Write the value; dependents are notified only when the raw value
	/// changed (`Object.is`).
	pub fn set(&self, value: impl Into<Value>) {
		let value = value.into();
		let direct = self.0.shallow || is_shallow(&value) || is_readonly(&value);
		let raw = if direct { value.clone() } else { to_raw(&value) };
		if Value::same_value(&raw, &self.0.raw.borrow()) {
			return;
		}
		*self.0.raw.borrow_mut() = raw;
		*self.0.value.borrow_mut() = if direct { value } else { to_reactive(value) };
		self.trigger();
	}

	/// Notify dependents without changing the value
	pub fn trigger(&self) {
		with_runtime(|rt| {
			rt.trigger(
				self.0.id,
				TargetShape::Plain,
				TriggerOp::Set,
				Some(DepKey::Value),
			)
		});
	}

	pub fn id(&self) -> NodeId {
		self.0.id
	}

	pub fn is_shallow(&self) -> bool {
		self.0.shallow
	}

	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

impl fmt::Debug for Ref {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Ref")
			.field("id", &self.0.id)
			.field("shallow", &self.0.shallow)
			.field("value", &self.0.value.borrow())
			.finish()
	}
}

/// Wrap a value in a deep ref; a ref is returned unchanged
pub fn make_ref(value: impl Into<Value>) -> Value {
	match value.into() {
		Value::Ref(r) => Value::Ref(r),
		other => Value::Ref(Ref::new(other)),
	}
}

/// Wrap a value in a shallow ref; a ref is returned unchanged
pub fn shallow_ref(value: impl Into<Value>) -> Value {
	match value.into() {
		Value::Ref(r) => Value::Ref(r),
		other => Value::Ref(Ref::shallow(other)),
	}
}

pub fn is_ref(value: &Value) -> bool {
	matches!(value, Value::Ref(_))
}

/// The ref's value (tracked), or the value itself
pub fn unref(value: &Value) -> Value {
	match value {
		Value::Ref(r) => r.get(),
		other => other.clone(),
	}
}

/// Notify the dependents of a ref, typically a shallow one whose inner
/// value was mutated in place
pub fn trigger_ref(value: &Value) {
	if let Value::Ref(r) = value {
		r.trigger();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{Effect, is_reactive, reactive};
	use core::cell::Cell;
	use serial_test::serial;

	#[test]
	#[serial]
	fn test_deep_ref_wraps_objects() {
		let r = Ref::new(Value::object([("a", Value::from(1))]));

		assert!(is_reactive(&r.get_untracked()));
	}

	#[test]
	#[serial]
	fn test_shallow_ref_stores_as_is() {
		let r = Ref::shallow(Value::object([("a", Value::from(1))]));

		assert!(!is_reactive(&r.get_untracked()));
		assert!(r.is_shallow());
	}

	#[test]
	#[serial]
	fn test_set_same_value_does_not_trigger() {
		let r = Ref::new(1);
		let runs = Rc::new(Cell::new(0));
		let (reader, counter) = (r.clone(), runs.clone());
		let _effect = Effect::new(move || {
			reader.get();
			counter.set(counter.get() + 1);
		});

		r.set(1);
		assert_eq!(runs.get(), 1);
		r.set(2);
		assert_eq!(runs.get(), 2);
	}

	#[test]
	#[serial]
	fn test_setting_proxy_of_same_raw_is_no_change() {
		let raw = Value::object([("a", Value::from(1))]);
		let r = Ref::new(raw.clone());
		let runs = Rc::new(Cell::new(0));
		let (reader, counter) = (r.clone(), runs.clone());
		let _effect = Effect::new(move || {
			reader.get();
			counter.set(counter.get() + 1);
		});

		r.set(reactive(raw));

		assert_eq!(runs.get(), 1);
	}

	#[test]
	#[serial]
	fn test_unref_and_make_ref() {
		let r = make_ref(5);
		assert!(is_ref(&r));
		assert_eq!(unref(&r), Value::from(5));
		assert_eq!(unref(&Value::from("x")), Value::from("x"));
		assert_eq!(make_ref(r.clone()), r);
	}
}
