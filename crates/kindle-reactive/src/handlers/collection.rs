//! Handlers for keyed collections (maps, sets and their weak variants)

use super::{ProxyHandlers, readonly_violation, unsupported};
use crate::error::ReactivityError;
use crate::proxy::{Proxy, to_raw, to_reactive, to_readonly};
use crate::runtime::{DepKey, TargetShape, TrackOp, TriggerOp, with_runtime};
use crate::value::{RawType, Target, Value};

/// Interception for maps, sets, weak maps and weak sets.
///
/// Keys and stored values are always raw; results are wrapped on the way
/// out according to the proxy kind.
#[derive(Debug)]
pub struct CollectionHandlers {
	readonly: bool,
	shallow: bool,
}

pub(super) static MUTABLE: CollectionHandlers = CollectionHandlers {
	readonly: false,
	shallow: false,
};
pub(super) static SHALLOW_REACTIVE: CollectionHandlers = CollectionHandlers {
	readonly: false,
	shallow: true,
};
pub(super) static READONLY: CollectionHandlers = CollectionHandlers {
	readonly: true,
	shallow: false,
};
pub(super) static SHALLOW_READONLY: CollectionHandlers = CollectionHandlers {
	readonly: true,
	shallow: true,
};

impl CollectionHandlers {
	fn wrap(&self, value: Value) -> Value {
		if self.shallow {
			value
		} else if self.readonly {
			to_readonly(value)
		} else {
			to_reactive(value)
		}
	}

	fn track(&self, target: &Target, op: TrackOp, key: DepKey) {
		if !self.readonly {
			with_runtime(|rt| rt.track(target.id(), op, key));
		}
	}

	/// Track both the given key and its raw form
	fn track_key(&self, target: &Target, op: TrackOp, key: &Value, raw_key: &Value) {
		if key != raw_key {
			self.track(target, op, DepKey::Entry(key.clone()));
		}
		self.track(target, op, DepKey::Entry(raw_key.clone()));
	}

	fn shape(target: &Target) -> TargetShape {
		match target.raw_type() {
			RawType::Map | RawType::WeakMap => TargetShape::Map,
			_ => TargetShape::Set,
		}
	}

	fn is_map(target: &Target) -> bool {
		Self::shape(target) == TargetShape::Map
	}

	fn trigger(target: &Target, op: TriggerOp, key: Option<DepKey>) {
		with_runtime(|rt| rt.trigger(target.id(), Self::shape(target), op, key));
	}

	/// The key under which `key` is stored: as given, else raw
	fn stored_key(target: &Target, key: &Value) -> (Value, bool) {
		if target.entry_has(key) {
			return (key.clone(), true);
		}
		let raw_key = to_raw(key);
		let had = target.entry_has(&raw_key);
		(raw_key, had)
	}

	fn iterate(&self, proxy: &Proxy, key: DepKey) -> Result<Vec<(Value, Value)>, ReactivityError> {
		let target = proxy.target();
		if target.raw_type().is_weak() {
			return Err(unsupported("iterate", proxy));
		}
		let entries = match proxy.raw() {
			Value::Proxy(inner) => inner.entries()?,
			_ => {
				self.track(target, TrackOp::Iterate, key);
				target.entries()
			}
		};
		Ok(entries
			.into_iter()
			.map(|(k, v)| (self.wrap(k), self.wrap(v)))
			.collect())
	}
}

impl ProxyHandlers for CollectionHandlers {
	fn get(&self, proxy: &Proxy, key: &Value) -> Value {
		let target = proxy.target();
		if !Self::is_map(target) {
			return Value::Undefined;
		}
		if let Value::Proxy(inner) = proxy.raw() {
			return self.wrap(inner.get(key));
		}

		let raw_key = to_raw(key);
		self.track_key(target, TrackOp::Get, key, &raw_key);
		if target.entry_has(key) {
			self.wrap(target.entry_get(key))
		} else if target.entry_has(&raw_key) {
			self.wrap(target.entry_get(&raw_key))
		} else {
			Value::Undefined
		}
	}

	fn set(&self, proxy: &Proxy, key: &Value, value: Value) -> Result<(), ReactivityError> {
		if self.readonly {
			return Err(readonly_violation("set", Some(key)));
		}
		let target = proxy.target();
		if !Self::is_map(target) {
			return Err(unsupported("set", proxy));
		}

		let value = to_raw(&value);
		let (key, had) = Self::stored_key(target, key);
		let old = target.entry_get(&key);
		target.entry_insert(key.clone(), value.clone());
		if !had {
			Self::trigger(target, TriggerOp::Add, Some(DepKey::Entry(key)));
		} else if !Value::same_value(&value, &old) {
			Self::trigger(target, TriggerOp::Set, Some(DepKey::Entry(key)));
		}
		Ok(())
	}

	fn has(&self, proxy: &Proxy, key: &Value) -> bool {
		if let Value::Proxy(inner) = proxy.raw() {
			return inner.has(key);
		}
		let target = proxy.target();
		let raw_key = to_raw(key);
		self.track_key(target, TrackOp::Has, key, &raw_key);
		target.entry_has(key) || target.entry_has(&raw_key)
	}

	fn delete(&self, proxy: &Proxy, key: &Value) -> Result<bool, ReactivityError> {
		if self.readonly {
			return Err(readonly_violation("delete", Some(key)));
		}
		let target = proxy.target();
		let (key, had) = Self::stored_key(target, key);
		let removed = target.entry_delete(&key);
		if had {
			Self::trigger(target, TriggerOp::Delete, Some(DepKey::Entry(key)));
		}
		Ok(removed)
	}

	fn own_keys(&self, proxy: &Proxy) -> Vec<Value> {
		self.keys(proxy).unwrap_or_default()
	}

	fn len(&self, proxy: &Proxy) -> Result<usize, ReactivityError> {
		let target = proxy.target();
		if target.raw_type().is_weak() {
			return Err(unsupported("size", proxy));
		}
		if let Value::Proxy(inner) = proxy.raw() {
			return inner.len();
		}
		self.track(target, TrackOp::Iterate, DepKey::Iterate);
		Ok(target.len())
	}

	fn entries(&self, proxy: &Proxy) -> Result<Vec<(Value, Value)>, ReactivityError> {
		self.iterate(proxy, DepKey::Iterate)
	}

	fn keys(&self, proxy: &Proxy) -> Result<Vec<Value>, ReactivityError> {
		let key = if Self::is_map(proxy.target()) {
			DepKey::MapKeyIterate
		} else {
			DepKey::Iterate
		};
		Ok(self
			.iterate(proxy, key)?
			.into_iter()
			.map(|(k, _)| k)
			.collect())
	}

	fn add(&self, proxy: &Proxy, value: Value) -> Result<(), ReactivityError> {
		if self.readonly {
			return Err(readonly_violation("add", Some(&value)));
		}
		let target = proxy.target();
		if Self::is_map(target) {
			return Err(unsupported("add", proxy));
		}
		let value = to_raw(&value);
		if target.entry_add(value.clone()) {
			Self::trigger(target, TriggerOp::Add, Some(DepKey::Entry(value)));
		}
		Ok(())
	}

	fn clear(&self, proxy: &Proxy) -> Result<(), ReactivityError> {
		if self.readonly {
			return Err(readonly_violation("clear", None));
		}
		let target = proxy.target();
		if target.raw_type().is_weak() {
			return Err(unsupported("clear", proxy));
		}
		let had_entries = !target.is_empty();
		target.entry_clear();
		if had_entries {
			Self::trigger(target, TriggerOp::Clear, None);
		}
		Ok(())
	}
}
