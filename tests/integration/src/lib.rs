//! Integration test utilities for Kindle
//!
//! Shared fixtures for the end-to-end tests under `tests/`: recording
//! components that record their lifecycle, keep-alive views and a tracing
//! subscriber for debugging failing runs.

use core::cell::RefCell;
use std::rc::Rc;

use kindle_runtime::component::ComponentDef;
use kindle_runtime::keep_alive::{KeepAliveProps, keep_alive, on_activated, on_deactivated};
use kindle_runtime::lifecycle::{on_mounted, on_unmounted};
use kindle_runtime::vnode::{Props, VNode};

/// Lifecycle events recorded by [`recording`] components
#[derive(Debug, Default)]
pub struct EventLog {
	events: RefCell<Vec<String>>,
}

impl EventLog {
	pub fn new() -> Rc<Self> {
		Rc::new(Self::default())
	}

	pub fn push(&self, event: impl Into<String>) {
		self.events.borrow_mut().push(event.into());
	}

	pub fn events(&self) -> Vec<String> {
		self.events.borrow().clone()
	}

	/// How often `event` was recorded
	pub fn count(&self, event: &str) -> usize {
		self.events.borrow().iter().filter(|e| *e == event).count()
	}

	pub fn clear(&self) {
		self.events.borrow_mut().clear();
	}
}

/// A component rendering `<name>name</name>` that records
/// `"{name}:{event}"` for setup, mount, unmount and (de)activation
pub fn recording(name: &str, log: &Rc<EventLog>) -> ComponentDef {
	let (tag, log) = (Rc::<str>::from(name), log.clone());
	ComponentDef::new(name, move |_| {
		log.push(format!("{tag}:setup"));
		let hook = |event: &str| {
			let (log, label) = (log.clone(), format!("{tag}:{event}"));
			move || log.push(label.clone())
		};
		on_mounted(hook("mounted"));
		on_unmounted(hook("unmounted"));
		on_activated(hook("activated"));
		on_deactivated(hook("deactivated"));
		let tag = tag.clone();
		Box::new(move |_| VNode::element(tag.clone(), Props::new(), vec![VNode::text(tag.clone())]))
	})
}

/// A keep-alive vnode around `child`
pub fn keep_alive_view(props: KeepAliveProps, child: &ComponentDef) -> VNode {
	VNode::component(
		&keep_alive(),
		props.into_props(),
		vec![VNode::component(child, Props::new(), Vec::new())],
	)
}

/// Install a test-writer tracing subscriber honouring `RUST_LOG`
pub fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}
