//! Handlers for plain objects and arrays

use super::{ProxyHandlers, invalid_key, readonly_violation};
use crate::error::ReactivityError;
use crate::proxy::{Proxy, is_readonly, is_shallow, reactive, readonly, to_raw};
use crate::reference::is_ref;
use crate::runtime::{DepKey, TargetShape, TrackOp, TriggerOp, untracked, with_runtime};
use crate::value::{PropKey, Target, TargetData, Value, array_length};

/// Interception for plain objects and arrays.
///
/// Readonly sets never track and reject writes. Shallow sets return
/// property values as stored; deep sets unwrap refs (except array indices)
/// and wrap structured values lazily on read.
#[derive(Debug)]
pub struct BaseHandlers {
	readonly: bool,
	shallow: bool,
}

pub(super) static MUTABLE: BaseHandlers = BaseHandlers {
	readonly: false,
	shallow: false,
};
pub(super) static SHALLOW_REACTIVE: BaseHandlers = BaseHandlers {
	readonly: false,
	shallow: true,
};
pub(super) static READONLY: BaseHandlers = BaseHandlers {
	readonly: true,
	shallow: false,
};
pub(super) static SHALLOW_READONLY: BaseHandlers = BaseHandlers {
	readonly: true,
	shallow: true,
};

impl BaseHandlers {
	fn track(&self, target: &Target, op: TrackOp, key: DepKey) {
		if !self.readonly {
			with_runtime(|rt| rt.track(target.id(), op, key));
		}
	}

	fn shape(target: &Target) -> TargetShape {
		if target.is_array() {
			TargetShape::Array
		} else {
			TargetShape::Plain
		}
	}

	fn set_length(target: &Target, value: &Value) -> Result<(), ReactivityError> {
		let len = array_length(value)?;
		let old = target.set_array_len(len)?;
		if old != len {
			with_runtime(|rt| rt.trigger_length(target.id(), len));
		}
		Ok(())
	}

	fn search(&self, proxy: &Proxy, needle: &Value, strict: bool) -> Option<usize> {
		if let Value::Proxy(inner) = proxy.raw() {
			return if strict {
				inner.index_of(needle)
			} else {
				inner.includes(needle).then_some(0)
			};
		}
		let target = proxy.target();
		if !target.is_array() {
			return None;
		}
		if !self.readonly {
			with_runtime(|rt| {
				for i in 0..target.len() {
					rt.track(target.id(), TrackOp::Get, DepKey::Prop(PropKey::Index(i)));
				}
				rt.track(target.id(), TrackOp::Get, DepKey::Length);
			});
		}

		let find = |needle: &Value| -> Option<usize> {
			if strict && matches!(needle, Value::Float(f) if f.is_nan()) {
				return None;
			}
			match &*target.data() {
				TargetData::Array(items) => items.iter().position(|item| item == needle),
				_ => None,
			}
		};
		// Elements are stored raw; retry with the raw needle on a miss
		find(needle).or_else(|| find(&to_raw(needle)))
	}
}

impl ProxyHandlers for BaseHandlers {
	fn get(&self, proxy: &Proxy, key: &Value) -> Value {
		let target = proxy.target();
		let is_array = target.is_array();
		let Some(prop) = PropKey::normalize(key, is_array) else {
			return Value::Undefined;
		};

		let result = match proxy.raw() {
			Value::Proxy(inner) => inner.get(key),
			_ => {
				self.track(target, TrackOp::Get, DepKey::for_prop(&prop, is_array));
				target.get_prop(&prop)
			}
		};

		if self.shallow {
			return result;
		}
		if let Value::Ref(r) = &result {
			// Refs inside arrays are not unwrapped
			if is_array && matches!(prop, PropKey::Index(_)) {
				return result;
			}
			return r.get();
		}
		if result.is_object() {
			return if self.readonly {
				readonly(result)
			} else {
				reactive(result)
			};
		}
		result
	}

	fn set(&self, proxy: &Proxy, key: &Value, value: Value) -> Result<(), ReactivityError> {
		if self.readonly {
			return Err(readonly_violation("set", Some(key)));
		}
		let target = proxy.target();
		let is_array = target.is_array();
		let prop = PropKey::normalize(key, is_array).ok_or_else(|| invalid_key(key, proxy))?;
		if is_array && prop.is_length() {
			return Self::set_length(target, &value);
		}

		let mut old = target.get_prop(&prop);
		let mut value = value;
		if !self.shallow {
			if !is_shallow(&value) && !is_readonly(&value) {
				old = to_raw(&old);
				value = to_raw(&value);
			}
			if !is_array
				&& let Value::Ref(old_ref) = &old
				&& !is_ref(&value)
			{
				old_ref.set(value);
				return Ok(());
			}
		}

		let had_key = target.has_prop(&prop);
		target.set_prop(prop.clone(), value.clone())?;
		let dep = DepKey::for_prop(&prop, is_array);
		let shape = Self::shape(target);
		if !had_key {
			with_runtime(|rt| rt.trigger(target.id(), shape, TriggerOp::Add, Some(dep)));
		} else if !Value::same_value(&value, &old) {
			with_runtime(|rt| rt.trigger(target.id(), shape, TriggerOp::Set, Some(dep)));
		}
		Ok(())
	}

	fn has(&self, proxy: &Proxy, key: &Value) -> bool {
		let target = proxy.target();
		let is_array = target.is_array();
		let Some(prop) = PropKey::normalize(key, is_array) else {
			return false;
		};
		match proxy.raw() {
			Value::Proxy(inner) => inner.has(key),
			_ => {
				self.track(target, TrackOp::Has, DepKey::for_prop(&prop, is_array));
				target.has_prop(&prop)
			}
		}
	}

	fn delete(&self, proxy: &Proxy, key: &Value) -> Result<bool, ReactivityError> {
		if self.readonly {
			return Err(readonly_violation("delete", Some(key)));
		}
		let target = proxy.target();
		let is_array = target.is_array();
		let prop = PropKey::normalize(key, is_array).ok_or_else(|| invalid_key(key, proxy))?;

		let had_key = target.has_prop(&prop);
		let removed = target.delete_prop(&prop);
		if had_key && removed {
			let dep = DepKey::for_prop(&prop, is_array);
			with_runtime(|rt| {
				rt.trigger(target.id(), Self::shape(target), TriggerOp::Delete, Some(dep))
			});
		}
		Ok(removed)
	}

	fn own_keys(&self, proxy: &Proxy) -> Vec<Value> {
		if let Value::Proxy(inner) = proxy.raw() {
			return inner.own_keys();
		}
		let target = proxy.target();
		let key = if target.is_array() {
			DepKey::Length
		} else {
			DepKey::Iterate
		};
		self.track(target, TrackOp::Iterate, key);
		target.prop_keys()
	}

	fn len(&self, proxy: &Proxy) -> Result<usize, ReactivityError> {
		if proxy.target().is_array() {
			let len = self.get(proxy, &Value::from("length"));
			return Ok(len.as_int().unwrap_or(0) as usize);
		}
		Ok(self.own_keys(proxy).len())
	}

	fn entries(&self, proxy: &Proxy) -> Result<Vec<(Value, Value)>, ReactivityError> {
		Ok(self
			.own_keys(proxy)
			.into_iter()
			.map(|key| {
				let value = self.get(proxy, &key);
				(key, value)
			})
			.collect())
	}

	fn push(&self, proxy: &Proxy, value: Value) -> Result<usize, ReactivityError> {
		if self.readonly {
			return Err(readonly_violation("push", None));
		}
		let target = proxy.target();
		if !target.is_array() {
			return Err(super::unsupported("push", proxy));
		}
		untracked(|| {
			let len = target.len();
			self.set(proxy, &Value::from(len), value)?;
			Ok(target.len())
		})
	}

	fn pop(&self, proxy: &Proxy) -> Result<Value, ReactivityError> {
		if self.readonly {
			return Err(readonly_violation("pop", None));
		}
		let target = proxy.target();
		if !target.is_array() {
			return Err(super::unsupported("pop", proxy));
		}
		untracked(|| {
			let len = target.len();
			if len == 0 {
				return Ok(Value::Undefined);
			}
			let last = self.get(proxy, &Value::from(len - 1));
			Self::set_length(target, &Value::from(len - 1))?;
			Ok(last)
		})
	}

	fn index_of(&self, proxy: &Proxy, value: &Value) -> Option<usize> {
		self.search(proxy, value, true)
	}

	fn includes(&self, proxy: &Proxy, value: &Value) -> bool {
		self.search(proxy, value, false).is_some()
	}
}

#[cfg(test)]
mod tests {
	use crate::error::ReactivityError;
	use crate::runtime::{DepKey, with_runtime};
	use crate::value::PropKey;
	use crate::{Effect, Ref, Value, is_reactive, is_readonly, reactive, readonly, shallow_reactive};
	use core::cell::{Cell, RefCell};
	use rstest::rstest;
	use serial_test::serial;
	use std::rc::Rc;

	fn counting_effect(f: impl Fn() + 'static) -> (Effect, Rc<Cell<usize>>) {
		let runs = Rc::new(Cell::new(0));
		let counter = runs.clone();
		let effect = Effect::new(move || {
			f();
			counter.set(counter.get() + 1);
		});
		(effect, runs)
	}

	#[test]
	#[serial]
	fn test_nested_objects_are_wrapped_lazily() {
		let state = reactive(Value::object([(
			"user",
			Value::object([("name", Value::from("ann"))]),
		)]));

		let user = state.get("user");

		assert!(is_reactive(&user));
		assert_eq!(user, state.get("user"));
	}

	#[test]
	#[serial]
	fn test_shallow_reactive_returns_raw_nested() {
		let state = shallow_reactive(Value::object([("inner", Value::object::<&str, _>([]))]));

		assert!(!is_reactive(&state.get("inner")));
	}

	#[test]
	#[serial]
	fn test_ref_unwrapped_on_read_and_reboxed_on_write() {
		let count = Ref::new(1);
		let state = reactive(Value::object([("count", Value::Ref(count.clone()))]));

		assert_eq!(state.get("count"), Value::from(1));
		state.set("count", 5).unwrap();

		assert_eq!(count.get_untracked(), Value::from(5));
	}

	#[test]
	#[serial]
	fn test_refs_inside_arrays_are_not_unwrapped() {
		let list = reactive(Value::array([Value::Ref(Ref::new(1))]));

		assert!(matches!(list.get(0), Value::Ref(_)));
	}

	#[test]
	#[serial]
	fn test_readonly_rejects_writes() {
		let raw = Value::object([("a", Value::from(1))]);
		let ro = readonly(raw.clone());

		assert!(ro.set("a", 2).is_err());
		assert!(ro.as_proxy().unwrap().delete(&Value::from("a")).is_err());
		assert_eq!(raw.get("a"), Value::from(1));
		assert!(!is_readonly(&ro.get("missing")));
	}

	#[test]
	#[serial]
	fn test_readonly_nested_is_readonly() {
		let ro = readonly(Value::object([("inner", Value::object::<&str, _>([]))]));

		assert!(is_readonly(&ro.get("inner")));
	}

	#[test]
	#[serial]
	fn test_adding_key_triggers_iteration() {
		let state = reactive(Value::object::<&str, _>([]));
		let reader = state.clone();
		let (_effect, runs) = counting_effect(move || {
			reader.as_proxy().unwrap().own_keys();
		});

		state.set("a", 1).unwrap();
		state.set("a", 2).unwrap();

		// the key set only changed once
		assert_eq!(runs.get(), 2);
	}

	#[rstest]
	#[case(Value::from(1), false)]
	#[case(Value::from(2), true)]
	#[case(Value::from(1.0), false)]
	#[serial]
	fn test_set_triggers_only_on_change(#[case] next: Value, #[case] reran: bool) {
		let state = reactive(Value::object([("a", Value::from(1))]));
		let reader = state.clone();
		let (_effect, runs) = counting_effect(move || {
			reader.get("a");
		});

		state.set("a", next).unwrap();

		assert_eq!(runs.get(), if reran { 2 } else { 1 });
	}

	#[test]
	#[serial]
	fn test_array_length_truncation_triggers_removed_indices() {
		let list = reactive(Value::array([Value::from(1), Value::from(2), Value::from(3)]));
		let seen = Rc::new(RefCell::new(Vec::new()));
		let (reader, log) = (list.clone(), seen.clone());
		let _effect = Effect::new(move || log.borrow_mut().push(reader.get(2)));

		list.set("length", 1).unwrap();

		assert_eq!(*seen.borrow(), vec![Value::from(3), Value::Undefined]);
	}

	#[rstest]
	#[case::huge_index(Value::from(i64::MAX), Value::from(1))]
	#[case::huge_length(Value::from("length"), Value::from(4_000_000_000_000_i64))]
	#[serial]
	fn test_oversized_array_write_is_rejected_without_trigger(#[case] key: Value, #[case] value: Value) {
		let list = reactive(Value::array([Value::from(1)]));
		let reader = list.clone();
		let (_effect, runs) = counting_effect(move || {
			reader.len();
		});

		let result = list.set(key, value);

		assert!(matches!(result, Err(ReactivityError::InvalidKey { .. })));
		assert_eq!(list.len(), 1);
		assert_eq!(runs.get(), 1);
	}

	#[test]
	#[serial]
	fn test_push_does_not_track_length() {
		let list = reactive(Value::array([]));
		let writer = list.clone();
		let (effect, runs) = counting_effect(move || {
			writer.as_proxy().unwrap().push(Value::from(1)).unwrap();
		});

		let target = list.as_proxy().unwrap().target().id();
		assert_eq!(
			with_runtime(|rt| rt.subscriber_count(target, &DepKey::Length)),
			0
		);
		assert_eq!(runs.get(), 1);
		drop(effect);
	}

	#[test]
	#[serial]
	fn test_index_write_past_end_notifies_length_readers() {
		let list = reactive(Value::array([]));
		let reader = list.clone();
		let (_effect, runs) = counting_effect(move || {
			reader.len();
		});

		list.set(3, "x").unwrap();

		assert_eq!(runs.get(), 2);
		assert_eq!(list.len(), 4);
	}

	#[test]
	#[serial]
	fn test_includes_finds_raw_elements_through_proxy_argument() {
		let item = Value::object::<&str, _>([]);
		let list = reactive(Value::array([item.clone()]));
		let proxy = list.as_proxy().unwrap();

		let wrapped = list.get(0);
		assert!(proxy.includes(&wrapped));
		assert_eq!(proxy.index_of(&item), Some(0));
		assert_eq!(proxy.index_of(&Value::Float(f64::NAN)), None);
	}

	#[test]
	#[serial]
	fn test_pop_returns_last_and_shrinks() {
		let list = reactive(Value::array([Value::from(1), Value::from(2)]));
		let proxy = list.as_proxy().unwrap();

		assert_eq!(proxy.pop().unwrap(), Value::from(2));
		assert_eq!(list.len(), 1);
		assert_eq!(
			with_runtime(|rt| rt.subscriber_count(proxy.target().id(), &DepKey::Prop(PropKey::Index(0)))),
			0
		);
	}
}
