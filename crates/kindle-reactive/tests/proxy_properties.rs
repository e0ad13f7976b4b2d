//! Property-based tests for the proxy layer
//!
//! Uses proptest to verify:
//! 1. Wrapping is idempotent for every kind
//! 2. `to_raw` undoes every wrap
//! 3. Writes through a reactive proxy land on the raw target
//! 4. An effect observes the last written value exactly once per write

use std::cell::RefCell;
use std::rc::Rc;

use kindle_reactive::{
	Effect, ProxyKind, Value, is_readonly, reactive, readonly, shallow_reactive, shallow_readonly,
	to_raw,
};
use proptest::prelude::*;
use serial_test::serial;

fn kind_strategy() -> impl Strategy<Value = ProxyKind> {
	prop_oneof![
		Just(ProxyKind::Reactive),
		Just(ProxyKind::ShallowReactive),
		Just(ProxyKind::Readonly),
		Just(ProxyKind::ShallowReadonly),
	]
}

fn wrap(value: Value, kind: ProxyKind) -> Value {
	match kind {
		ProxyKind::Reactive => reactive(value),
		ProxyKind::ShallowReactive => shallow_reactive(value),
		ProxyKind::Readonly => readonly(value),
		ProxyKind::ShallowReadonly => shallow_readonly(value),
	}
}

fn object_from(entries: &[(String, i64)]) -> Value {
	Value::object(
		entries
			.iter()
			.map(|(k, v)| (k.as_str(), Value::from(*v))),
	)
}

// ============================================================================
// Identity
// ============================================================================

proptest! {
	#![proptest_config(ProptestConfig::with_cases(50))]

	/// Property: wrapping twice with the same kind yields the same proxy
	#[test]
	#[serial(reactive)]
	fn test_wrap_idempotent(kind in kind_strategy(), entries in prop::collection::vec(("[a-z]{1,6}", any::<i64>()), 0..8)) {
		let raw = object_from(&entries);

		let first = wrap(raw.clone(), kind);
		let second = wrap(raw.clone(), kind);

		prop_assert_eq!(&first, &second);
		prop_assert_eq!(to_raw(&first), raw);
	}

	/// Property: a readonly view of any proxy stays readonly under `reactive`
	#[test]
	#[serial(reactive)]
	fn test_reactive_never_unlocks_readonly(kind in kind_strategy()) {
		let raw = Value::array([Value::from(1)]);
		let view = readonly(wrap(raw.clone(), kind));

		let again = reactive(view.clone());

		prop_assert!(is_readonly(&again));
		prop_assert_eq!(again, view);
		prop_assert_eq!(to_raw(&raw), raw);
	}
}

// ============================================================================
// Writes
// ============================================================================

proptest! {
	#![proptest_config(ProptestConfig::with_cases(50))]

	/// Property: every value written through a proxy is readable raw
	#[test]
	#[serial(reactive)]
	fn test_writes_reach_raw_target(entries in prop::collection::vec(("[a-z]{1,6}", any::<i64>()), 1..8)) {
		let raw = Value::object::<&str, _>([]);
		let state = reactive(raw.clone());

		for (key, value) in &entries {
			state.set(key.as_str(), *value).unwrap();
		}

		for (key, _) in &entries {
			prop_assert_eq!(raw.get(key.as_str()), state.get(key.as_str()));
		}
	}

	/// Property: a synchronous effect sees each distinct write once
	#[test]
	#[serial(reactive)]
	fn test_effect_sees_each_change(values in prop::collection::vec(any::<i64>(), 1..16)) {
		let state = reactive(Value::object([("n", Value::Null)]));
		let seen = Rc::new(RefCell::new(Vec::new()));
		let (reader, log) = (state.clone(), seen.clone());
		let _effect = Effect::new(move || log.borrow_mut().push(reader.get("n")));

		let mut expected = vec![Value::Null];
		for value in &values {
			state.set("n", *value).unwrap();
			if expected.last() != Some(&Value::from(*value)) {
				expected.push(Value::from(*value));
			}
		}

		prop_assert_eq!(&*seen.borrow(), &expected);
	}
}
