//! Scheduler integration tests
//!
//! Component updates, watchers and lifecycle hooks flowing through one
//! batched job queue.

use core::cell::{Cell, RefCell};
use std::rc::Rc;

use kindle_integration_tests::{EventLog, init_tracing};
use kindle_reactive::logging::{clear_warn_handler, set_dev_warnings, set_warn_handler};
use kindle_reactive::{Ref, Signal, Value};
use kindle_runtime::component::ComponentDef;
use kindle_runtime::error::RuntimeError;
use kindle_runtime::lifecycle::{HookType, inject_hook, on_error_captured};
use kindle_runtime::scheduler::{clear_flush_scheduler, flush_jobs, has_pending_jobs, next_tick, use_tokio_scheduler};
use kindle_runtime::vnode::{Props, VNode, props};
use kindle_runtime::watch::{FlushTiming, WatchOptions, watch};
use kindle_testkit::{MemoryRenderer, inner_html};
use rstest::rstest;
use serial_test::serial;

fn setup() {
	init_tracing();
	set_dev_warnings(true);
	clear_flush_scheduler();
}

fn view(def: &ComponentDef) -> VNode {
	VNode::component(def, Props::new(), Vec::new())
}

#[test]
#[serial]
fn test_many_writes_render_once_per_flush() {
	setup();

	// Arrange
	let count = Signal::new(0);
	let renders = Rc::new(Cell::new(0));
	let (reader, counter) = (count.clone(), renders.clone());
	let def = ComponentDef::from_render("Counter", move |_| {
		counter.set(counter.get() + 1);
		VNode::element("p", Props::new(), vec![VNode::text(reader.get().to_string())])
	});
	let renderer = MemoryRenderer::new();
	let root = renderer.root();
	renderer.render(Some(&view(&def)), &root);

	// Act
	for n in 1..=5 {
		count.set(n);
	}
	assert!(has_pending_jobs());
	flush_jobs();

	// Assert
	assert_eq!(renders.get(), 2);
	assert_eq!(inner_html(&root), "<p>5</p>");
	assert!(!has_pending_jobs());
}

#[test]
#[serial]
fn test_parent_renders_before_child() {
	setup();

	// Arrange
	let log = EventLog::new();
	let count = Signal::new(0);
	let child_log = log.clone();
	let child = ComponentDef::from_render("Child", move |instance| {
		child_log.push("child");
		VNode::text(instance.props().get("n").to_string())
	});
	let (parent_log, reader) = (log.clone(), count.clone());
	let parent = ComponentDef::from_render("Parent", move |_| {
		parent_log.push("parent");
		let n = reader.get();
		VNode::element(
			"div",
			Props::new(),
			vec![VNode::component(&child, props([("n", Value::from(n))]), Vec::new())],
		)
	});
	let renderer = MemoryRenderer::new();
	let root = renderer.root();
	renderer.render(Some(&view(&parent)), &root);
	log.clear();

	// Act
	count.set(7);
	flush_jobs();

	// Assert
	assert_eq!(log.events(), vec!["parent", "child"]);
	assert_eq!(inner_html(&root), "<div>7</div>");
}

#[rstest]
#[case::pre(FlushTiming::Pre, vec!["watch", "render"])]
#[case::post(FlushTiming::Post, vec!["render", "watch"])]
#[serial]
fn test_watcher_flush_timing_relative_to_render(#[case] flush: FlushTiming, #[case] expected: Vec<&str>) {
	setup();

	// Arrange
	let log = EventLog::new();
	let source = Ref::new(0);
	let (sink, state) = (log.clone(), source.clone());
	let def = ComponentDef::new("Watching", move |_| {
		let watch_log = sink.clone();
		let _ = watch(
			state.clone(),
			move |_, _| watch_log.push("watch"),
			WatchOptions { flush, ..Default::default() },
		);
		let (render_log, state) = (sink.clone(), state.clone());
		Box::new(move |_| {
			render_log.push("render");
			VNode::text(state.get().to_string())
		})
	});
	let renderer = MemoryRenderer::new();
	let root = renderer.root();
	renderer.render(Some(&view(&def)), &root);
	log.clear();

	// Act
	source.set(1);
	flush_jobs();

	// Assert
	assert_eq!(log.events(), expected);
}

#[test]
#[serial]
fn test_unmount_stops_component_watchers() {
	setup();

	// Arrange
	let calls = Rc::new(Cell::new(0));
	let source = Ref::new(0);
	let (counter, state) = (calls.clone(), source.clone());
	let def = ComponentDef::new("Watching", move |_| {
		let counter = counter.clone();
		let _ = watch(
			state.clone(),
			move |_, _| counter.set(counter.get() + 1),
			WatchOptions::default(),
		);
		Box::new(|_| VNode::text("watching"))
	});
	let renderer = MemoryRenderer::new();
	let root = renderer.root();
	renderer.render(Some(&view(&def)), &root);
	source.set(1);
	flush_jobs();
	assert_eq!(calls.get(), 1);

	// Act
	renderer.render(None, &root);
	source.set(2);
	flush_jobs();

	// Assert
	assert_eq!(calls.get(), 1);
}

#[test]
#[serial]
fn test_error_captured_stops_propagation() {
	setup();

	// Arrange
	let captured = Rc::new(RefCell::new(Vec::new()));
	let sink = captured.clone();
	let child = ComponentDef::new("Child", |instance| {
		let _ = inject_hook(
			HookType::Mounted,
			Rc::new(|| Err(RuntimeError::hook("mounted", "boom"))),
			Some(instance),
			false,
		);
		Box::new(|_| VNode::text("child"))
	});
	let parent = ComponentDef::new("Parent", move |_| {
		let sink = sink.clone();
		on_error_captured(move |err, _, info| {
			sink.borrow_mut().push((err.to_string(), info.to_string()));
			false
		});
		let child = child.clone();
		Box::new(move |_| view(&child))
	});
	let renderer = MemoryRenderer::new();
	let root = renderer.root();

	// Act
	renderer.render(Some(&view(&parent)), &root);

	// Assert
	assert_eq!(
		*captured.borrow(),
		vec![("mounted hook failed: boom".to_string(), "mounted hook".to_string())]
	);
	assert!(kindle_runtime::take_unhandled_errors().is_empty());
}

#[test]
#[serial]
fn test_self_triggering_watcher_hits_recursion_limit() {
	setup();

	// Arrange
	let warnings = Rc::new(RefCell::new(Vec::<String>::new()));
	let sink = warnings.clone();
	set_warn_handler(move |message| sink.borrow_mut().push(message.to_string()));
	let calls = Rc::new(Cell::new(0));
	let source = Ref::new(0);
	let (counter, state) = (calls.clone(), source.clone());
	let _handle = watch(
		source.clone(),
		move |value, _| {
			counter.set(counter.get() + 1);
			state.set(value.as_int().unwrap_or_default() + 1);
		},
		WatchOptions::default(),
	);

	// Act
	source.set(1);
	flush_jobs();
	clear_warn_handler();

	// Assert
	assert_eq!(calls.get(), 100);
	assert!(
		warnings
			.borrow()
			.iter()
			.any(|w| w.starts_with("Maximum recursive updates exceeded"))
	);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
#[serial]
async fn test_tokio_scheduler_flushes_on_next_tick() {
	setup();
	tokio::task::LocalSet::new()
		.run_until(async {
			// Arrange
			use_tokio_scheduler();
			let count = Signal::new(0);
			let reader = count.clone();
			let def = ComponentDef::from_render("Counter", move |_| VNode::text(reader.get().to_string()));
			let renderer = MemoryRenderer::new();
			let root = renderer.root();
			renderer.render(Some(&view(&def)), &root);

			// Act
			count.set(3);
			let before = inner_html(&root);
			next_tick().await;

			// Assert
			assert_eq!(before, "0");
			assert_eq!(inner_html(&root), "3");
			clear_flush_scheduler();
		})
		.await;
}
