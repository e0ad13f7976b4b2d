//! Value model
//!
//! Rust has no object interception, so the reactive layer works on a small
//! dynamic value model instead. A [`Value`] is either a primitive, a raw
//! structured [`Target`], a [`Proxy`] wrapping one, or a [`Ref`].
//!
//! Structured values compare by identity (SameValueZero), which lets them key
//! maps and sets the same way objects do in a dynamic language.
//!
//! ## Example
//!
//! ```ignore
//! use kindle_reactive::{Value, reactive};
//!
//! let state = reactive(Value::object([("age", Value::from(20))]));
//! assert_eq!(state.get("age"), Value::from(20));
//! ```

use core::cell::{Cell, Ref as CellRef, RefCell, RefMut};
use core::fmt;
use core::hash::{Hash, Hasher};
use std::any::Any;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use crate::error::ReactivityError;
use crate::proxy::Proxy;
use crate::reference::Ref;
use crate::runtime::{NodeId, try_with_runtime};

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
	/// Absent value
	#[default]
	Undefined,
	/// Explicit null
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	Str(Rc<str>),
	/// A raw, unwrapped structured value
	Target(Target),
	/// An interception proxy
	Proxy(Proxy),
	/// A reactive reference cell
	Ref(Ref),
}

/// Built-in shape of a [`Target`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawType {
	Object,
	Array,
	Map,
	Set,
	WeakMap,
	WeakSet,
	/// Dates, regular expressions, functions, class instances
	Opaque,
}

impl RawType {
	/// Name used in warnings and errors
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Object => "Object",
			Self::Array => "Array",
			Self::Map => "Map",
			Self::Set => "Set",
			Self::WeakMap => "WeakMap",
			Self::WeakSet => "WeakSet",
			Self::Opaque => "Opaque",
		}
	}

	/// Whether this is one of the keyed collection types
	pub fn is_collection(&self) -> bool {
		matches!(
			self,
			Self::Map | Self::Set | Self::WeakMap | Self::WeakSet
		)
	}

	/// Whether this is a weak keyed collection
	pub fn is_weak(&self) -> bool {
		matches!(self, Self::WeakMap | Self::WeakSet)
	}
}

/// Payload of an opaque target.
#[derive(Clone)]
pub struct Opaque {
	/// Class name, e.g. `"Date"` or `"RegExp"`
	pub class: Rc<str>,
	/// Arbitrary Rust payload
	pub payload: Option<Rc<dyn Any>>,
}

/// Contents of a [`Target`].
///
/// Weak collections hold their keys strongly; the weakness only shows in
/// their restricted API (no size, no iteration, no clear).
pub enum TargetData {
	Object(IndexMap<Rc<str>, Value>),
	Array(Vec<Value>),
	Map(IndexMap<Value, Value>),
	Set(IndexSet<Value>),
	WeakMap(IndexMap<Value, Value>),
	WeakSet(IndexSet<Value>),
	Opaque(Opaque),
}

impl TargetData {
	pub fn raw_type(&self) -> RawType {
		match self {
			Self::Object(_) => RawType::Object,
			Self::Array(_) => RawType::Array,
			Self::Map(_) => RawType::Map,
			Self::Set(_) => RawType::Set,
			Self::WeakMap(_) => RawType::WeakMap,
			Self::WeakSet(_) => RawType::WeakSet,
			Self::Opaque(_) => RawType::Opaque,
		}
	}
}

/// Property key of an object or array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropKey {
	/// Named property (`"length"` on arrays)
	Name(Rc<str>),
	/// Array index
	Index(usize),
}

impl PropKey {
	/// Normalize a value used as a property key.
	///
	/// Integer-like strings become indices on arrays and indices become
	/// names on plain objects. Structured values are not valid keys.
	pub fn normalize(key: &Value, is_array: bool) -> Option<Self> {
		match key {
			Value::Str(s) => {
				if is_array && let Some(index) = parse_index(s) {
					return Some(Self::Index(index));
				}
				Some(Self::Name(s.clone()))
			}
			Value::Int(i) if *i >= 0 => {
				if is_array && (*i as u64) < MAX_ARRAY_LENGTH as u64 {
					Some(Self::Index(*i as usize))
				} else {
					Some(Self::Name(i.to_string().into()))
				}
			}
			Value::Int(i) => Some(Self::Name(i.to_string().into())),
			Value::Float(f) if f.fract() == 0.0 && *f >= 0.0 && f.is_finite() => {
				Self::normalize(&Value::Int(*f as i64), is_array)
			}
			Value::Float(f) => Some(Self::Name(f.to_string().into())),
			Value::Bool(b) => Some(Self::Name(b.to_string().into())),
			Value::Null => Some(Self::Name("null".into())),
			Value::Undefined => Some(Self::Name("undefined".into())),
			Value::Target(_) | Value::Proxy(_) | Value::Ref(_) => None,
		}
	}

	/// Whether this key is the `length` property
	pub fn is_length(&self) -> bool {
		matches!(self, Self::Name(name) if &**name == "length")
	}

	/// Key as a value, for iteration results
	pub fn to_value(&self) -> Value {
		match self {
			Self::Name(name) => Value::Str(name.clone()),
			Self::Index(i) => Value::Int(*i as i64),
		}
	}

	fn name(&self) -> Rc<str> {
		match self {
			Self::Name(name) => name.clone(),
			Self::Index(i) => i.to_string().into(),
		}
	}
}

impl fmt::Display for PropKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Name(name) => f.write_str(name),
			Self::Index(i) => write!(f, "{i}"),
		}
	}
}

fn parse_index(s: &str) -> Option<usize> {
	if s.is_empty() || (s.len() > 1 && s.starts_with('0')) {
		return None;
	}
	if !s.bytes().all(|b| b.is_ascii_digit()) {
		return None;
	}
	s.parse().ok().filter(|&i| i < MAX_ARRAY_LENGTH)
}

/// Largest array length; the largest index is one less. Larger integer
/// keys are plain names, which arrays cannot store.
pub const MAX_ARRAY_LENGTH: usize = u32::MAX as usize;

fn grow(items: &mut Vec<Value>, len: usize) -> Result<(), ReactivityError> {
	if len > items.len() {
		items.try_reserve(len - items.len()).map_err(|_| ReactivityError::InvalidKey {
			key: format!("length = {len}"),
			target_type: "Array",
		})?;
	}
	items.resize(len, Value::Undefined);
	Ok(())
}

pub(crate) struct TargetInner {
	id: NodeId,
	data: RefCell<TargetData>,
	extensible: Cell<bool>,
	skip: Cell<bool>,
}

impl Drop for TargetInner {
	fn drop(&mut self) {
		let id = self.id;
		try_with_runtime(|rt| rt.remove_target(id));
		crate::proxy::forget_target(id);
	}
}

/// A shared, interior-mutable structured value.
///
/// Cloning a `Target` clones the handle, not the contents.
#[derive(Clone)]
pub struct Target(Rc<TargetInner>);

impl Target {
	/// Create a target from its contents
	pub fn new(data: TargetData) -> Self {
		Self(Rc::new(TargetInner {
			id: NodeId::new(),
			data: RefCell::new(data),
			extensible: Cell::new(true),
			skip: Cell::new(false),
		}))
	}

	pub fn id(&self) -> NodeId {
		self.0.id
	}

	pub fn raw_type(&self) -> RawType {
		self.0.data.borrow().raw_type()
	}

	pub fn is_array(&self) -> bool {
		self.raw_type() == RawType::Array
	}

	/// Borrow the contents without tracking
	pub fn data(&self) -> CellRef<'_, TargetData> {
		self.0.data.borrow()
	}

	/// Mutably borrow the contents without triggering
	pub fn data_mut(&self) -> RefMut<'_, TargetData> {
		self.0.data.borrow_mut()
	}

	pub fn is_extensible(&self) -> bool {
		self.0.extensible.get()
	}

	/// Forbid adding new properties; such targets are never wrapped
	pub fn prevent_extensions(&self) {
		self.0.extensible.set(false);
	}

	/// Whether the target was excluded from wrapping with `mark_raw`
	pub fn is_skipped(&self) -> bool {
		self.0.skip.get()
	}

	pub(crate) fn mark_skip(&self) {
		self.0.skip.set(true);
	}

	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}

	/// Class name of an opaque target
	pub fn class_name(&self) -> Option<Rc<str>> {
		match &*self.data() {
			TargetData::Opaque(opaque) => Some(opaque.class.clone()),
			_ => None,
		}
	}

	/// Downcast the payload of an opaque target
	pub fn payload<T: 'static>(&self) -> Option<Rc<T>> {
		match &*self.data() {
			TargetData::Opaque(Opaque {
				payload: Some(payload),
				..
			}) => payload.clone().downcast::<T>().ok(),
			_ => None,
		}
	}

	pub(crate) fn get_prop(&self, key: &PropKey) -> Value {
		match (&*self.data(), key) {
			(TargetData::Object(props), key) => {
				props.get(&*key.name()).cloned().unwrap_or_default()
			}
			(TargetData::Array(items), PropKey::Index(i)) => {
				items.get(*i).cloned().unwrap_or_default()
			}
			(TargetData::Array(items), key) if key.is_length() => Value::Int(items.len() as i64),
			_ => Value::Undefined,
		}
	}

	pub(crate) fn has_prop(&self, key: &PropKey) -> bool {
		match (&*self.data(), key) {
			(TargetData::Object(props), key) => props.contains_key(&*key.name()),
			(TargetData::Array(items), PropKey::Index(i)) => *i < items.len(),
			(TargetData::Array(_), key) => key.is_length(),
			_ => false,
		}
	}

	/// Store a property. Array writes past the end extend the array.
	pub(crate) fn set_prop(&self, key: PropKey, value: Value) -> Result<(), ReactivityError> {
		let raw_type = self.raw_type();
		match (&mut *self.data_mut(), key) {
			(TargetData::Object(props), key) => {
				props.insert(key.name(), value);
				Ok(())
			}
			(TargetData::Array(items), PropKey::Index(i)) => {
				if i >= items.len() {
					grow(items, i + 1)?;
				}
				items[i] = value;
				Ok(())
			}
			(_, key) => Err(ReactivityError::InvalidKey {
				key: key.to_string(),
				target_type: raw_type.as_str(),
			}),
		}
	}

	/// Remove a property. Deleting an array slot leaves `Undefined` behind.
	pub(crate) fn delete_prop(&self, key: &PropKey) -> bool {
		match (&mut *self.data_mut(), key) {
			(TargetData::Object(props), key) => props.shift_remove(&*key.name()).is_some(),
			(TargetData::Array(items), PropKey::Index(i)) if *i < items.len() => {
				items[*i] = Value::Undefined;
				true
			}
			_ => false,
		}
	}

	pub(crate) fn prop_keys(&self) -> Vec<Value> {
		match &*self.data() {
			TargetData::Object(props) => props.keys().map(|k| Value::Str(k.clone())).collect(),
			TargetData::Array(items) => (0..items.len()).map(|i| Value::Int(i as i64)).collect(),
			_ => Vec::new(),
		}
	}

	/// Number of properties, elements or entries
	pub fn len(&self) -> usize {
		match &*self.data() {
			TargetData::Object(props) => props.len(),
			TargetData::Array(items) => items.len(),
			TargetData::Map(map) | TargetData::WeakMap(map) => map.len(),
			TargetData::Set(set) | TargetData::WeakSet(set) => set.len(),
			TargetData::Opaque(_) => 0,
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Resize an array, returning its previous length
	pub(crate) fn set_array_len(&self, len: usize) -> Result<usize, ReactivityError> {
		match &mut *self.data_mut() {
			TargetData::Array(items) => {
				let old = items.len();
				grow(items, len)?;
				Ok(old)
			}
			_ => Ok(0),
		}
	}

	pub(crate) fn entry_has(&self, key: &Value) -> bool {
		match &*self.data() {
			TargetData::Map(map) | TargetData::WeakMap(map) => map.contains_key(key),
			TargetData::Set(set) | TargetData::WeakSet(set) => set.contains(key),
			_ => false,
		}
	}

	pub(crate) fn entry_get(&self, key: &Value) -> Value {
		match &*self.data() {
			TargetData::Map(map) | TargetData::WeakMap(map) => {
				map.get(key).cloned().unwrap_or_default()
			}
			_ => Value::Undefined,
		}
	}

	pub(crate) fn entry_insert(&self, key: Value, value: Value) -> bool {
		match &mut *self.data_mut() {
			TargetData::Map(map) | TargetData::WeakMap(map) => {
				map.insert(key, value);
				true
			}
			_ => false,
		}
	}

	pub(crate) fn entry_add(&self, value: Value) -> bool {
		match &mut *self.data_mut() {
			TargetData::Set(set) | TargetData::WeakSet(set) => set.insert(value),
			_ => false,
		}
	}

	pub(crate) fn entry_delete(&self, key: &Value) -> bool {
		match &mut *self.data_mut() {
			TargetData::Map(map) | TargetData::WeakMap(map) => map.shift_remove(key).is_some(),
			TargetData::Set(set) | TargetData::WeakSet(set) => set.shift_remove(key),
			_ => false,
		}
	}

	pub(crate) fn entry_clear(&self) {
		match &mut *self.data_mut() {
			TargetData::Map(map) => map.clear(),
			TargetData::Set(set) => set.clear(),
			_ => {}
		}
	}

	/// Entries of a map, or `(value, value)` pairs of a set
	pub(crate) fn entries(&self) -> Vec<(Value, Value)> {
		match &*self.data() {
			TargetData::Map(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
			TargetData::Set(set) => set.iter().map(|v| (v.clone(), v.clone())).collect(),
			TargetData::Object(props) => props
				.iter()
				.map(|(k, v)| (Value::Str(k.clone()), v.clone()))
				.collect(),
			TargetData::Array(items) => items
				.iter()
				.enumerate()
				.map(|(i, v)| (Value::Int(i as i64), v.clone()))
				.collect(),
			_ => Vec::new(),
		}
	}
}

impl fmt::Debug for Target {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.class_name() {
			Some(class) => write!(f, "{class}#{:?}", self.id()),
			None => write!(f, "{}#{:?}", self.raw_type().as_str(), self.id()),
		}
	}
}

impl Value {
	/// Plain object from ordered key/value pairs
	pub fn object<K, I>(entries: I) -> Self
	where
		K: Into<Rc<str>>,
		I: IntoIterator<Item = (K, Value)>,
	{
		let props = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
		Self::Target(Target::new(TargetData::Object(props)))
	}

	pub fn array<I: IntoIterator<Item = Value>>(items: I) -> Self {
		Self::Target(Target::new(TargetData::Array(items.into_iter().collect())))
	}

	pub fn map<I: IntoIterator<Item = (Value, Value)>>(entries: I) -> Self {
		Self::Target(Target::new(TargetData::Map(entries.into_iter().collect())))
	}

	pub fn set_of<I: IntoIterator<Item = Value>>(values: I) -> Self {
		Self::Target(Target::new(TargetData::Set(values.into_iter().collect())))
	}

	pub fn weak_map() -> Self {
		Self::Target(Target::new(TargetData::WeakMap(IndexMap::new())))
	}

	pub fn weak_set() -> Self {
		Self::Target(Target::new(TargetData::WeakSet(IndexSet::new())))
	}

	/// Opaque object of the given class carrying a Rust payload
	pub fn opaque<T: Any>(class: &str, payload: T) -> Self {
		Self::Target(Target::new(TargetData::Opaque(Opaque {
			class: class.into(),
			payload: Some(Rc::new(payload)),
		})))
	}

	/// Whether the value is structured (a target or a proxy)
	pub fn is_object(&self) -> bool {
		matches!(self, Self::Target(_) | Self::Proxy(_))
	}

	pub fn is_undefined(&self) -> bool {
		matches!(self, Self::Undefined)
	}

	/// Whether the value is `Undefined` or `Null`
	pub fn is_nullish(&self) -> bool {
		matches!(self, Self::Undefined | Self::Null)
	}

	pub fn as_target(&self) -> Option<&Target> {
		match self {
			Self::Target(target) => Some(target),
			_ => None,
		}
	}

	pub fn as_proxy(&self) -> Option<&Proxy> {
		match self {
			Self::Proxy(proxy) => Some(proxy),
			_ => None,
		}
	}

	pub fn as_reference(&self) -> Option<&Ref> {
		match self {
			Self::Ref(r) => Some(r),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::Str(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_int(&self) -> Option<i64> {
		match self {
			Self::Int(i) => Some(*i),
			Self::Float(f) if f.fract() == 0.0 => Some(*f as i64),
			_ => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Self::Bool(b) => Some(*b),
			_ => None,
		}
	}

	pub fn as_float(&self) -> Option<f64> {
		match self {
			Self::Float(f) => Some(*f),
			Self::Int(i) => Some(*i as f64),
			_ => None,
		}
	}

	/// Identity of a structured value
	pub fn identity(&self) -> Option<NodeId> {
		match self {
			Self::Target(target) => Some(target.id()),
			Self::Proxy(proxy) => Some(proxy.id()),
			Self::Ref(r) => Some(r.id()),
			_ => None,
		}
	}

	/// Short type name used in warnings
	pub fn type_name(&self) -> &'static str {
		match self {
			Self::Undefined => "undefined",
			Self::Null => "null",
			Self::Bool(_) => "boolean",
			Self::Int(_) | Self::Float(_) => "number",
			Self::Str(_) => "string",
			Self::Target(target) => target.raw_type().as_str(),
			Self::Proxy(_) => "Proxy",
			Self::Ref(_) => "Ref",
		}
	}

	/// `Object.is` comparison: like `==`, but `NaN` equals itself and
	/// `+0.0` differs from `-0.0`.
	pub fn same_value(a: &Value, b: &Value) -> bool {
		match (a, b) {
			(Self::Float(x), Self::Float(y)) => {
				x.to_bits() == y.to_bits() || (x.is_nan() && y.is_nan())
			}
			(Self::Int(_), Self::Float(f)) | (Self::Float(f), Self::Int(_)) if *f == 0.0 => {
				f.is_sign_positive() && a == b
			}
			_ => a == b,
		}
	}

	/// Read a property or entry. Reads through a proxy are tracked.
	pub fn get(&self, key: impl Into<Value>) -> Value {
		let key = key.into();
		match self {
			Self::Proxy(proxy) => proxy.get(&key),
			Self::Target(target) if target.raw_type().is_collection() => target.entry_get(&key),
			Self::Target(target) => PropKey::normalize(&key, target.is_array())
				.map(|prop| target.get_prop(&prop))
				.unwrap_or_default(),
			Self::Ref(r) => r.get().get(key),
			_ => Value::Undefined,
		}
	}

	/// Write a property or map entry. Writes through a proxy trigger.
	pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) -> Result<(), ReactivityError> {
		let key = key.into();
		let value = value.into();
		match self {
			Self::Proxy(proxy) => proxy.set(&key, value),
			Self::Target(target) if target.raw_type().is_collection() => {
				if target.entry_insert(key, value) {
					Ok(())
				} else {
					Err(ReactivityError::UnsupportedOperation {
						operation: "set",
						target_type: target.raw_type().as_str(),
					})
				}
			}
			Self::Target(target) => {
				let is_array = target.is_array();
				let prop = PropKey::normalize(&key, is_array).ok_or_else(|| ReactivityError::InvalidKey {
					key: key.to_string(),
					target_type: target.raw_type().as_str(),
				})?;
				if is_array && prop.is_length() {
					let len = array_length(&value)?;
					target.set_array_len(len)?;
					return Ok(());
				}
				target.set_prop(prop, value)
			}
			other => Err(ReactivityError::UnsupportedOperation {
				operation: "set",
				target_type: other.type_name(),
			}),
		}
	}

	/// Whether a property or entry exists
	pub fn has(&self, key: impl Into<Value>) -> bool {
		let key = key.into();
		match self {
			Self::Proxy(proxy) => proxy.has(&key),
			Self::Target(target) if target.raw_type().is_collection() => target.entry_has(&key),
			Self::Target(target) => PropKey::normalize(&key, target.is_array())
				.is_some_and(|prop| target.has_prop(&prop)),
			_ => false,
		}
	}

	/// Number of elements; tracked through a proxy
	pub fn len(&self) -> usize {
		match self {
			Self::Proxy(proxy) => proxy.len().unwrap_or(0),
			Self::Target(target) => target.len(),
			Self::Str(s) => s.chars().count(),
			_ => 0,
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

pub(crate) fn array_length(value: &Value) -> Result<usize, ReactivityError> {
	match value.as_int() {
		Some(len) if (0..=MAX_ARRAY_LENGTH as i64).contains(&len) => Ok(len as usize),
		_ => Err(ReactivityError::InvalidKey {
			key: format!("length = {value}"),
			target_type: "Array",
		}),
	}
}

impl PartialEq for Value {
	/// SameValueZero: `NaN` equals itself, `+0.0 == -0.0`, structured
	/// values compare by identity.
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
			(Self::Bool(a), Self::Bool(b)) => a == b,
			(Self::Int(a), Self::Int(b)) => a == b,
			(Self::Float(a), Self::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
			(Self::Int(i), Self::Float(f)) | (Self::Float(f), Self::Int(i)) => exact_int(*f) == Some(*i),
			(Self::Str(a), Self::Str(b)) => a == b,
			(Self::Target(a), Self::Target(b)) => a.ptr_eq(b),
			(Self::Proxy(a), Self::Proxy(b)) => a.ptr_eq(b),
			(Self::Ref(a), Self::Ref(b)) => a.ptr_eq(b),
			_ => false,
		}
	}
}

impl Eq for Value {}

/// The integer a float holds exactly, if any
fn exact_int(f: f64) -> Option<i64> {
	// 2^63 is exact as f64; every integral float below it fits in i64
	const LIMIT: f64 = 9_223_372_036_854_775_808.0;
	(f.fract() == 0.0 && (-LIMIT..LIMIT).contains(&f)).then_some(f as i64)
}

impl Hash for Value {
	fn hash<H: Hasher>(&self, state: &mut H) {
		// Integral floats hash like the equal Int
		if let Self::Float(f) = self
			&& let Some(i) = exact_int(*f)
		{
			return Self::Int(i).hash(state);
		}
		core::mem::discriminant(self).hash(state);
		match self {
			Self::Undefined | Self::Null => {}
			Self::Bool(b) => b.hash(state),
			Self::Int(i) => i.hash(state),
			Self::Float(f) => {
				let canonical = if f.is_nan() {
					f64::NAN.to_bits()
				} else if *f == 0.0 {
					0.0f64.to_bits()
				} else {
					f.to_bits()
				};
				canonical.hash(state);
			}
			Self::Str(s) => s.hash(state),
			Self::Target(_) | Self::Proxy(_) | Self::Ref(_) => self.identity().hash(state),
		}
	}
}

impl fmt::Debug for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Undefined => f.write_str("Undefined"),
			Self::Null => f.write_str("Null"),
			Self::Bool(b) => write!(f, "Bool({b})"),
			Self::Int(i) => write!(f, "Int({i})"),
			Self::Float(x) => write!(f, "Float({x})"),
			Self::Str(s) => write!(f, "Str({s:?})"),
			Self::Target(target) => write!(f, "Target({target:?})"),
			Self::Proxy(proxy) => write!(f, "{proxy:?}"),
			Self::Ref(r) => write!(f, "{r:?}"),
		}
	}
}

impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Undefined => f.write_str("undefined"),
			Self::Null => f.write_str("null"),
			Self::Bool(b) => write!(f, "{b}"),
			Self::Int(i) => write!(f, "{i}"),
			Self::Float(x) => write!(f, "{x}"),
			Self::Str(s) => f.write_str(s),
			Self::Target(target) => write!(f, "[object {}]", target.raw_type().as_str()),
			Self::Proxy(proxy) => write!(f, "{}", proxy.raw()),
			Self::Ref(_) => f.write_str("[object Ref]"),
		}
	}
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

impl From<i32> for Value {
	fn from(value: i32) -> Self {
		Self::Int(value.into())
	}
}

impl From<i64> for Value {
	fn from(value: i64) -> Self {
		Self::Int(value)
	}
}

impl From<u32> for Value {
	fn from(value: u32) -> Self {
		Self::Int(value.into())
	}
}

impl From<usize> for Value {
	fn from(value: usize) -> Self {
		Self::Int(value as i64)
	}
}

impl From<f64> for Value {
	fn from(value: f64) -> Self {
		Self::Float(value)
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Self::Str(value.into())
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Self::Str(value.into())
	}
}

impl From<Rc<str>> for Value {
	fn from(value: Rc<str>) -> Self {
		Self::Str(value)
	}
}

impl From<Target> for Value {
	fn from(value: Target) -> Self {
		Self::Target(value)
	}
}

impl From<Proxy> for Value {
	fn from(value: Proxy) -> Self {
		Self::Proxy(value)
	}
}

impl From<Ref> for Value {
	fn from(value: Ref) -> Self {
		Self::Ref(value)
	}
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(value: Option<T>) -> Self {
		value.map_or(Self::Undefined, Into::into)
	}
}

impl From<&Value> for Value {
	fn from(value: &Value) -> Self {
		value.clone()
	}
}
