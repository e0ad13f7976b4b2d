//! Proxy handler sets
//!
//! Every proxy dispatches its reads and writes to one [`ProxyHandlers`]
//! implementation selected when the proxy is built:
//!
//! | Target | Handler set |
//! |--------|-------------|
//! | plain object, array | [`BaseHandlers`] |
//! | map, set, weak map, weak set | [`CollectionHandlers`] |
//!
//! Each set exists once per proxy kind as a `static`.

mod base;
mod collection;

pub use base::BaseHandlers;
pub use collection::CollectionHandlers;

use crate::dev_warn;
use crate::error::ReactivityError;
use crate::proxy::{Proxy, ProxyKind};
use crate::value::Value;

/// Interception behaviour of a proxy.
///
/// Operations that make no sense for a target type keep the default
/// implementation, which reports [`ReactivityError::UnsupportedOperation`].
pub trait ProxyHandlers {
	/// Read a property or entry
	fn get(&self, proxy: &Proxy, key: &Value) -> Value;

	/// Write a property or map entry
	fn set(&self, proxy: &Proxy, key: &Value, value: Value) -> Result<(), ReactivityError>;

	/// Whether a property or entry exists
	fn has(&self, proxy: &Proxy, key: &Value) -> bool;

	/// Remove a property or entry; `Ok(true)` when something was removed
	fn delete(&self, proxy: &Proxy, key: &Value) -> Result<bool, ReactivityError>;

	/// Own property keys, or collection keys
	fn own_keys(&self, proxy: &Proxy) -> Vec<Value>;

	/// Array length, property count or collection size
	fn len(&self, proxy: &Proxy) -> Result<usize, ReactivityError>;

	/// Key/value pairs; sets yield `(value, value)`
	fn entries(&self, proxy: &Proxy) -> Result<Vec<(Value, Value)>, ReactivityError>;

	fn keys(&self, proxy: &Proxy) -> Result<Vec<Value>, ReactivityError> {
		Ok(self.entries(proxy)?.into_iter().map(|(k, _)| k).collect())
	}

	fn values(&self, proxy: &Proxy) -> Result<Vec<Value>, ReactivityError> {
		Ok(self.entries(proxy)?.into_iter().map(|(_, v)| v).collect())
	}

	/// Insert into a set
	fn add(&self, proxy: &Proxy, value: Value) -> Result<(), ReactivityError> {
		let _ = value;
		Err(unsupported("add", proxy))
	}

	/// Remove every entry of a collection
	fn clear(&self, proxy: &Proxy) -> Result<(), ReactivityError> {
		Err(unsupported("clear", proxy))
	}

	/// Append to an array, returning the new length
	fn push(&self, proxy: &Proxy, value: Value) -> Result<usize, ReactivityError> {
		let _ = value;
		Err(unsupported("push", proxy))
	}

	/// Remove and return the last array element
	fn pop(&self, proxy: &Proxy) -> Result<Value, ReactivityError> {
		Err(unsupported("pop", proxy))
	}

	/// Position of `value` in an array (strict equality)
	fn index_of(&self, proxy: &Proxy, value: &Value) -> Option<usize> {
		let _ = (proxy, value);
		None
	}

	/// Whether an array contains `value` (SameValueZero)
	fn includes(&self, proxy: &Proxy, value: &Value) -> bool {
		let _ = (proxy, value);
		false
	}
}

/// Handler set for a kind of proxy over a common (object/array) target
pub(crate) fn base_handlers(kind: ProxyKind) -> &'static dyn ProxyHandlers {
	match kind {
		ProxyKind::Reactive => &base::MUTABLE,
		ProxyKind::ShallowReactive => &base::SHALLOW_REACTIVE,
		ProxyKind::Readonly => &base::READONLY,
		ProxyKind::ShallowReadonly => &base::SHALLOW_READONLY,
	}
}

/// Handler set for a kind of proxy over a collection target
pub(crate) fn collection_handlers(kind: ProxyKind) -> &'static dyn ProxyHandlers {
	match kind {
		ProxyKind::Reactive => &collection::MUTABLE,
		ProxyKind::ShallowReactive => &collection::SHALLOW_REACTIVE,
		ProxyKind::Readonly => &collection::READONLY,
		ProxyKind::ShallowReadonly => &collection::SHALLOW_READONLY,
	}
}

fn unsupported(operation: &'static str, proxy: &Proxy) -> ReactivityError {
	ReactivityError::UnsupportedOperation {
		operation,
		target_type: proxy.target().raw_type().as_str(),
	}
}

/// Warn about and describe a write through a readonly proxy
fn readonly_violation(operation: &'static str, key: Option<&Value>) -> ReactivityError {
	let key = key.map(ToString::to_string).unwrap_or_default();
	let mut label = operation.to_string();
	if let Some(first) = label.get_mut(0..1) {
		first.make_ascii_uppercase();
	}
	if key.is_empty() {
		dev_warn!("{} operation failed: target is readonly.", label);
	} else {
		dev_warn!(
			"{} operation on key \"{}\" failed: target is readonly.",
			label,
			key
		);
	}
	ReactivityError::ReadonlyMutation { operation, key }
}

fn invalid_key(key: &Value, proxy: &Proxy) -> ReactivityError {
	ReactivityError::InvalidKey {
		key: format!("{key:?}"),
		target_type: proxy.target().raw_type().as_str(),
	}
}
