//! Proxy layer
//!
//! Converts raw targets into interception proxies of four kinds:
//!
//! | Kind | Tracks reads | Accepts writes | Wraps nested values |
//! |------|--------------|----------------|---------------------|
//! | `reactive` | yes | yes | yes, as `reactive` |
//! | `shallow_reactive` | yes | yes | no |
//! | `readonly` | no | no | yes, as `readonly` |
//! | `shallow_readonly` | no | no | no |
//!
//! Each kind keeps a per-thread identity map from the wrapped value to its
//! live proxy, so wrapping the same target twice yields the same proxy for
//! as long as a handle to it exists.
//!
//! ## Example
//!
//! ```ignore
//! use kindle_reactive::{Value, reactive, readonly, is_readonly, to_raw};
//!
//! let raw = Value::object([("count", Value::from(0))]);
//! let state = reactive(raw.clone());
//!
//! assert_eq!(state, reactive(raw.clone()));
//! assert_eq!(to_raw(&state), raw);
//! assert!(is_readonly(&readonly(state.clone())));
//! ```

use core::cell::RefCell;
use core::fmt;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::dev_warn;
use crate::error::ReactivityError;
use crate::handlers::{ProxyHandlers, base_handlers, collection_handlers};
use crate::runtime::NodeId;
use crate::value::{RawType, Target, Value};

/// The four proxy kinds: depth × mutability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyKind {
	Reactive,
	ShallowReactive,
	Readonly,
	ShallowReadonly,
}

impl ProxyKind {
	pub fn is_readonly(&self) -> bool {
		matches!(self, Self::Readonly | Self::ShallowReadonly)
	}

	pub fn is_shallow(&self) -> bool {
		matches!(self, Self::ShallowReactive | Self::ShallowReadonly)
	}

	/// Name used in warnings
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Reactive => "reactive",
			Self::ShallowReactive => "shallow reactive",
			Self::Readonly => "readonly",
			Self::ShallowReadonly => "shallow readonly",
		}
	}

	fn index(&self) -> usize {
		match self {
			Self::Reactive => 0,
			Self::ShallowReactive => 1,
			Self::Readonly => 2,
			Self::ShallowReadonly => 3,
		}
	}
}

/// How a raw value may be wrapped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetType {
	Invalid,
	Common,
	Collection,
}

fn target_type(target: &Target) -> TargetType {
	if target.is_skipped() || !target.is_extensible() {
		return TargetType::Invalid;
	}
	match target.raw_type() {
		RawType::Object | RawType::Array => TargetType::Common,
		RawType::Map | RawType::Set | RawType::WeakMap | RawType::WeakSet => TargetType::Collection,
		RawType::Opaque => TargetType::Invalid,
	}
}

pub(crate) struct ProxyInner {
	id: NodeId,
	/// The wrapped value: a target, or a reactive proxy for readonly views
	raw: Value,
	/// The innermost raw target
	target: Target,
	kind: ProxyKind,
	handlers: &'static dyn ProxyHandlers,
}

impl Drop for ProxyInner {
	fn drop(&mut self) {
		if let Some(raw_id) = self.raw.identity() {
			registry::forget_dead(self.kind, raw_id);
		}
	}
}

/// An interception proxy over a target.
///
/// All reads and writes go through the accessor methods, which dispatch
/// to the handler set chosen when the proxy was built.
#[derive(Clone)]
pub struct Proxy(Rc<ProxyInner>);

impl Proxy {
	pub fn id(&self) -> NodeId {
		self.0.id
	}

	pub fn kind(&self) -> ProxyKind {
		self.0.kind
	}

	/// The value directly wrapped by this proxy
	pub fn raw(&self) -> &Value {
		&self.0.raw
	}

	/// The innermost raw target
	pub fn target(&self) -> &Target {
		&self.0.target
	}

	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}

	pub fn get(&self, key: &Value) -> Value {
		self.0.handlers.get(self, key)
	}

	pub fn set(&self, key: &Value, value: Value) -> Result<(), ReactivityError> {
		self.0.handlers.set(self, key, value)
	}

	pub fn has(&self, key: &Value) -> bool {
		self.0.handlers.has(self, key)
	}

	pub fn delete(&self, key: &Value) -> Result<bool, ReactivityError> {
		self.0.handlers.delete(self, key)
	}

	pub fn own_keys(&self) -> Vec<Value> {
		self.0.handlers.own_keys(self)
	}

	pub fn len(&self) -> Result<usize, ReactivityError> {
		self.0.handlers.len(self)
	}

	pub fn is_empty(&self) -> bool {
		self.len().map(|len| len == 0).unwrap_or(true)
	}

	pub fn entries(&self) -> Result<Vec<(Value, Value)>, ReactivityError> {
		self.0.handlers.entries(self)
	}

	pub fn keys(&self) -> Result<Vec<Value>, ReactivityError> {
		self.0.handlers.keys(self)
	}

	pub fn values(&self) -> Result<Vec<Value>, ReactivityError> {
		self.0.handlers.values(self)
	}

	pub fn add(&self, value: Value) -> Result<(), ReactivityError> {
		self.0.handlers.add(self, value)
	}

	pub fn clear(&self) -> Result<(), ReactivityError> {
		self.0.handlers.clear(self)
	}

	pub fn push(&self, value: Value) -> Result<usize, ReactivityError> {
		self.0.handlers.push(self, value)
	}

	pub fn pop(&self) -> Result<Value, ReactivityError> {
		self.0.handlers.pop(self)
	}

	pub fn index_of(&self, value: &Value) -> Option<usize> {
		self.0.handlers.index_of(self, value)
	}

	pub fn includes(&self, value: &Value) -> bool {
		self.0.handlers.includes(self, value)
	}
}

impl fmt::Debug for Proxy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Proxy")
			.field("kind", &self.0.kind)
			.field("target", &self.0.target)
			.finish()
	}
}

mod registry {
	use super::*;

	type IdentityMap = RefCell<HashMap<NodeId, Weak<ProxyInner>>>;

	thread_local! {
		static MAPS: [IdentityMap; 4] = Default::default();
	}

	/// Prune dead entries every this many inserts
	const PRUNE_INTERVAL: usize = 64;

	pub(super) fn lookup(kind: ProxyKind, id: NodeId) -> Option<Proxy> {
		MAPS.with(|maps| {
			maps[kind.index()]
				.borrow()
				.get(&id)
				.and_then(Weak::upgrade)
				.map(Proxy)
		})
	}

	pub(super) fn register(kind: ProxyKind, id: NodeId, proxy: &Proxy) {
		MAPS.with(|maps| {
			let mut map = maps[kind.index()].borrow_mut();
			if map.len() % PRUNE_INTERVAL == PRUNE_INTERVAL - 1 {
				map.retain(|_, proxy| proxy.strong_count() > 0);
			}
			map.insert(id, Rc::downgrade(&proxy.0));
		});
	}

	pub(super) fn forget_dead(kind: ProxyKind, id: NodeId) {
		let _ = MAPS.try_with(|maps| {
			if let Ok(mut map) = maps[kind.index()].try_borrow_mut()
				&& map.get(&id).is_some_and(|proxy| proxy.strong_count() == 0)
			{
				map.remove(&id);
			}
		});
	}

	pub(super) fn forget(id: NodeId) {
		let _ = MAPS.try_with(|maps| {
			for map in maps {
				if let Ok(mut map) = map.try_borrow_mut() {
					map.remove(&id);
				}
			}
		});
	}

	pub(super) fn live_count(kind: ProxyKind) -> usize {
		MAPS.with(|maps| {
			maps[kind.index()]
				.borrow()
				.values()
				.filter(|proxy| proxy.strong_count() > 0)
				.count()
		})
	}
}

pub(crate) fn forget_target(id: NodeId) {
	registry::forget(id);
}

/// Number of live proxies of a kind on this thread (for testing)
pub fn live_proxy_count(kind: ProxyKind) -> usize {
	registry::live_count(kind)
}

fn create_reactive_object(value: Value, kind: ProxyKind) -> Value {
	let target = match &value {
		Value::Target(target) => target.clone(),
		Value::Proxy(existing) => {
			// a mutable proxy over a readonly one is never built
			if !kind.is_readonly() && existing.kind().is_readonly() {
				return value;
			}
			// the only legal re-wrap: a readonly view of a reactive proxy
			if !(kind.is_readonly() && !existing.kind().is_readonly()) {
				return value;
			}
			existing.target().clone()
		}
		other => {
			dev_warn!("value cannot be made {}: {}", kind.as_str(), other);
			return value;
		}
	};

	let Some(wrapped_id) = value.identity() else {
		return value;
	};
	if let Some(existing) = registry::lookup(kind, wrapped_id) {
		return Value::Proxy(existing);
	}

	let handlers = match target_type(&target) {
		TargetType::Invalid => return value,
		TargetType::Common => base_handlers(kind),
		TargetType::Collection => collection_handlers(kind),
	};

	let proxy = Proxy(Rc::new(ProxyInner {
		id: NodeId::new(),
		raw: value,
		target,
		kind,
		handlers,
	}));
	registry::register(kind, wrapped_id, &proxy);
	Value::Proxy(proxy)
}

/// Deep, mutable, tracking proxy
///
/// Wrapping the same target twice returns the same proxy while a handle
/// to it is alive. The identity maps only hold weak references, so once
/// every handle is dropped the next wrap (including a nested read such as
/// `state.get("user")`) creates a proxy with a new [`Proxy::id`]. Compare
/// [`to_raw`] results to test whether two reads address the same data.
pub fn reactive(value: impl Into<Value>) -> Value {
	let value = value.into();
	if is_readonly(&value) {
		return value;
	}
	create_reactive_object(value, ProxyKind::Reactive)
}

/// Mutable, tracking proxy whose nested values are returned as stored
pub fn shallow_reactive(value: impl Into<Value>) -> Value {
	create_reactive_object(value.into(), ProxyKind::ShallowReactive)
}

/// Deep, non-tracking proxy that rejects writes
pub fn readonly(value: impl Into<Value>) -> Value {
	create_reactive_object(value.into(), ProxyKind::Readonly)
}

/// Non-tracking proxy that rejects writes to its own properties only
pub fn shallow_readonly(value: impl Into<Value>) -> Value {
	create_reactive_object(value.into(), ProxyKind::ShallowReadonly)
}

/// Whether the value is a mutable proxy, or a readonly view of one
pub fn is_reactive(value: &Value) -> bool {
	match value {
		Value::Proxy(proxy) if proxy.kind().is_readonly() => is_reactive(proxy.raw()),
		Value::Proxy(_) => true,
		_ => false,
	}
}

pub fn is_readonly(value: &Value) -> bool {
	matches!(value, Value::Proxy(proxy) if proxy.kind().is_readonly())
}

/// Whether the value is a shallow proxy or a shallow ref
pub fn is_shallow(value: &Value) -> bool {
	match value {
		Value::Proxy(proxy) => proxy.kind().is_shallow(),
		Value::Ref(r) => r.is_shallow(),
		_ => false,
	}
}

pub fn is_proxy(value: &Value) -> bool {
	is_reactive(value) || is_readonly(value)
}

/// Strip every proxy layer
pub fn to_raw(value: &Value) -> Value {
	let mut current = value.clone();
	while let Value::Proxy(proxy) = &current {
		let inner = proxy.raw().clone();
		current = inner;
	}
	current
}

/// Exclude the underlying target from wrapping, permanently.
///
/// Returns the value itself.
pub fn mark_raw(value: impl Into<Value>) -> Value {
	let value = value.into();
	if let Value::Target(target) = to_raw(&value) {
		target.mark_skip();
	}
	value
}

/// `reactive` for structured values; anything else passes through
pub fn to_reactive(value: Value) -> Value {
	if value.is_object() {
		reactive(value)
	} else {
		value
	}
}

/// `readonly` for structured values; anything else passes through
pub fn to_readonly(value: Value) -> Value {
	if value.is_object() {
		readonly(value)
	} else {
		value
	}
}
