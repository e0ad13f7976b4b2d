//! Keep-alive integration tests
//!
//! Drives the keep-alive component through the in-memory renderer:
//! cache hits and misses, LRU eviction, include / exclude filtering and
//! activation hooks of nested components.

use std::rc::Rc;

use kindle_integration_tests::{EventLog, init_tracing, keep_alive_view, recording};
use kindle_reactive::Value;
use kindle_reactive::logging::{clear_warn_handler, set_dev_warnings, set_warn_handler};
use kindle_runtime::component::ComponentDef;
use kindle_runtime::keep_alive::{KeepAliveProps, keep_alive, on_activated, regex_pattern};
use kindle_runtime::vnode::{Props, VNode};
use kindle_testkit::{MemoryRenderer, inner_html};
use regex::Regex;
use rstest::{fixture, rstest};
use serial_test::serial;

#[fixture]
fn renderer() -> Rc<MemoryRenderer> {
	init_tracing();
	set_dev_warnings(true);
	MemoryRenderer::new()
}

#[rstest]
#[serial]
fn test_max_two_evicts_least_recently_used(renderer: Rc<MemoryRenderer>) {
	// Arrange
	let log = EventLog::new();
	let (a, b, c) = (recording("A", &log), recording("B", &log), recording("C", &log));
	let root = renderer.root();
	let view = |child: &ComponentDef| keep_alive_view(KeepAliveProps::new().max(2), child);

	// Act
	renderer.render(Some(&view(&a)), &root);
	renderer.render(Some(&view(&b)), &root);
	renderer.render(Some(&view(&c)), &root);

	// Assert: A was evicted for C
	assert_eq!(log.count("A:unmounted"), 1);
	assert_eq!(log.count("B:deactivated"), 1);
	assert_eq!(inner_html(&root), "<C>C</C>");

	// Act: B is still cached
	renderer.render(Some(&view(&b)), &root);

	// Assert
	assert_eq!(log.count("B:setup"), 1);
	assert_eq!(log.count("B:activated"), 2);
	assert_eq!(renderer.created("B"), 1);
	assert_eq!(inner_html(&root), "<B>B</B>");

	// Act: A has to mount again
	renderer.render(Some(&view(&a)), &root);

	// Assert: A remounted, C (least recently used) evicted
	assert_eq!(log.count("A:setup"), 2);
	assert_eq!(renderer.created("A"), 2);
	assert_eq!(log.count("C:unmounted"), 1);
	assert_eq!(log.count("B:unmounted"), 0);
	assert_eq!(inner_html(&root), "<A>A</A>");
}

#[rstest]
#[serial]
fn test_include_skips_non_matching_children(renderer: Rc<MemoryRenderer>) {
	// Arrange
	let log = EventLog::new();
	let (foo, bar) = (recording("Foo", &log), recording("Bar", &log));
	let root = renderer.root();
	let view = |child: &ComponentDef| keep_alive_view(KeepAliveProps::new().include("Foo"), child);

	// Act
	renderer.render(Some(&view(&bar)), &root);
	renderer.render(Some(&view(&foo)), &root);
	renderer.render(Some(&view(&bar)), &root);
	renderer.render(Some(&view(&foo)), &root);

	// Assert
	assert_eq!(log.count("Bar:setup"), 2);
	assert_eq!(log.count("Bar:unmounted"), 2);
	assert_eq!(log.count("Bar:deactivated"), 0);
	assert_eq!(log.count("Foo:setup"), 1);
	assert_eq!(log.count("Foo:activated"), 2);
}

#[rstest]
#[case::list(Value::array([Value::from("Bar")]))]
#[case::regex(regex_pattern(Regex::new("^B").unwrap()))]
#[serial]
fn test_exclude_patterns(renderer: Rc<MemoryRenderer>, #[case] exclude: Value) {
	// Arrange
	let log = EventLog::new();
	let (foo, bar) = (recording("Foo", &log), recording("Bar", &log));
	let root = renderer.root();
	let props = KeepAliveProps::new().exclude(exclude);

	// Act
	for child in [&bar, &foo, &bar] {
		renderer.render(Some(&keep_alive_view(props.clone(), child)), &root);
	}

	// Assert
	assert_eq!(log.count("Bar:setup"), 2);
	assert_eq!(log.count("Foo:deactivated"), 1);
}

#[rstest]
#[serial]
fn test_include_change_prunes_cache(renderer: Rc<MemoryRenderer>) {
	// Arrange
	let log = EventLog::new();
	let (foo, bar) = (recording("Foo", &log), recording("Bar", &log));
	let root = renderer.root();
	let both = KeepAliveProps::new().include("Foo,Bar");
	renderer.render(Some(&keep_alive_view(both.clone(), &foo)), &root);
	renderer.render(Some(&keep_alive_view(both, &bar)), &root);
	assert_eq!(log.count("Foo:unmounted"), 0);

	// Act
	renderer.render(Some(&keep_alive_view(KeepAliveProps::new().include("Bar"), &bar)), &root);

	// Assert
	assert_eq!(log.count("Foo:unmounted"), 1);
	assert_eq!(log.count("Bar:unmounted"), 0);
}

#[rstest]
#[serial]
fn test_unmounting_keep_alive_releases_every_entry(renderer: Rc<MemoryRenderer>) {
	// Arrange
	let log = EventLog::new();
	let (a, b) = (recording("A", &log), recording("B", &log));
	let root = renderer.root();
	renderer.render(Some(&keep_alive_view(KeepAliveProps::new(), &a)), &root);
	renderer.render(Some(&keep_alive_view(KeepAliveProps::new(), &b)), &root);

	// Act
	renderer.render(None, &root);

	// Assert
	assert_eq!(log.count("A:unmounted"), 1);
	assert_eq!(log.count("B:unmounted"), 1);
	assert_eq!(log.count("B:deactivated"), 1);
	assert_eq!(inner_html(&root), "");
}

#[rstest]
#[serial]
fn test_multiple_children_render_unmanaged(renderer: Rc<MemoryRenderer>) {
	// Arrange
	let warnings = Rc::new(core::cell::RefCell::new(Vec::<String>::new()));
	let sink = warnings.clone();
	set_warn_handler(move |message| sink.borrow_mut().push(message.to_string()));
	let log = EventLog::new();
	let (a, b) = (recording("A", &log), recording("B", &log));
	let view = VNode::component(
		&keep_alive(),
		Props::new(),
		vec![
			VNode::component(&a, Props::new(), Vec::new()),
			VNode::component(&b, Props::new(), Vec::new()),
		],
	);
	let root = renderer.root();

	// Act
	renderer.render(Some(&view), &root);
	clear_warn_handler();

	// Assert
	assert_eq!(inner_html(&root), "<A>A</A><B>B</B>");
	assert!(
		warnings
			.borrow()
			.iter()
			.any(|w| w.contains("KeepAlive should contain exactly one component child"))
	);
	assert_eq!(log.count("A:activated"), 0);
}

#[rstest]
#[serial]
fn test_nested_components_receive_activation_hooks(renderer: Rc<MemoryRenderer>) {
	// Arrange
	let log = EventLog::new();
	let sink = log.clone();
	let leaf = ComponentDef::new("Leaf", move |_| {
		let sink = sink.clone();
		on_activated(move || sink.push("Leaf:activated"));
		Box::new(|_| VNode::text("leaf"))
	});
	let page = ComponentDef::from_render("Page", move |_| {
		VNode::component(&leaf, Props::new(), Vec::new())
	});
	let other = recording("Other", &log);
	let root = renderer.root();

	// Act
	renderer.render(Some(&keep_alive_view(KeepAliveProps::new(), &page)), &root);
	renderer.render(Some(&keep_alive_view(KeepAliveProps::new(), &other)), &root);
	renderer.render(Some(&keep_alive_view(KeepAliveProps::new(), &page)), &root);

	// Assert
	assert_eq!(log.count("Leaf:activated"), 2);
	assert_eq!(inner_html(&root), "leaf");
}
