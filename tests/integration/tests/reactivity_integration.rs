//! Reactivity integration tests
//!
//! Proxies, effect scopes and watchers working together with the batched
//! scheduler.

use core::cell::RefCell;
use std::rc::Rc;

use kindle_integration_tests::init_tracing;
use kindle_reactive::{EffectScope, Value, reactive, readonly, to_raw};
use kindle_runtime::scheduler::{clear_flush_scheduler, flush_jobs};
use kindle_runtime::watch::watch_effect;
use serial_test::serial;

fn person() -> Value {
	reactive(Value::object([("name", Value::from("ada")), ("age", Value::from(20))]))
}

fn bump_age(state: &Value) {
	let age = state.get("age").as_int().unwrap_or_default();
	state.set("age", age + 1).expect("mutable proxy");
}

#[test]
#[serial]
fn test_writes_coalesce_into_one_rerun_per_flush() {
	init_tracing();
	clear_flush_scheduler();

	// Arrange
	let state = person();
	let seen = Rc::new(RefCell::new(Vec::new()));
	let (reader, sink) = (state.clone(), seen.clone());
	let _handle = watch_effect(move || sink.borrow_mut().push(reader.get("age").to_string()));

	// Act
	bump_age(&state);
	bump_age(&state);
	bump_age(&state);
	flush_jobs();

	// Assert
	assert_eq!(*seen.borrow(), vec!["20", "23"]);
}

#[test]
#[serial]
fn test_stopped_scope_ignores_later_writes() {
	init_tracing();
	clear_flush_scheduler();

	// Arrange
	let state = person();
	let seen = Rc::new(RefCell::new(Vec::new()));
	let scope = EffectScope::new();
	let (reader, sink) = (state.clone(), seen.clone());
	let handle = scope.run(move || watch_effect(move || sink.borrow_mut().push(reader.get("age").to_string())));

	// Act
	scope.stop();
	for _ in 0..3 {
		bump_age(&state);
	}
	flush_jobs();

	// Assert
	assert_eq!(*seen.borrow(), vec!["20"]);
	assert!(handle.is_some_and(|handle| !handle.is_active()));
	assert_eq!(state.get("age").as_int(), Some(23));
}

#[test]
#[serial]
fn test_readonly_view_tracks_the_reactive_source() {
	init_tracing();
	clear_flush_scheduler();

	// Arrange
	let state = person();
	let view = readonly(state.clone());
	let seen = Rc::new(RefCell::new(Vec::new()));
	let (reader, sink) = (view.clone(), seen.clone());
	let _handle = watch_effect(move || sink.borrow_mut().push(reader.get("name").to_string()));

	// Act
	state.set("name", "grace").expect("mutable proxy");
	flush_jobs();

	// Assert
	assert_eq!(*seen.borrow(), vec!["ada", "grace"]);
	assert!(view.set("name", "linus").is_err());
	assert_eq!(to_raw(&view), to_raw(&state));
}
