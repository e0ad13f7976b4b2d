//! Async component integration tests
//!
//! Mounts async wrappers through the in-memory renderer on a paused tokio
//! clock, so delays, timeouts and loader latency are deterministic.

use core::cell::{Cell, RefCell};
use core::time::Duration;
use std::rc::Rc;

use futures::FutureExt;
use futures::channel::oneshot;
use futures::executor::{LocalPool, LocalSpawner};
use futures::future::{LocalBoxFuture, pending};
use futures::task::LocalSpawnExt;
use kindle_integration_tests::{EventLog, init_tracing, keep_alive_view, recording};
use kindle_reactive::Value;
use kindle_reactive::logging::set_dev_warnings;
use kindle_runtime::async_component::{
	AsyncComponentOptions, LoadState, define_async_component, define_async_loader, error_prop,
};
use kindle_runtime::component::{AppContext, ComponentDef};
use kindle_runtime::error::{LoadError, RuntimeError};
use kindle_runtime::error_handling::take_unhandled_errors;
use kindle_runtime::keep_alive::KeepAliveProps;
use kindle_runtime::scheduler::{clear_flush_scheduler, flush_jobs};
use kindle_runtime::task::{Executor, TokioExecutor, set_executor};
use kindle_runtime::vnode::{Props, VNode, props};
use kindle_testkit::{MemoryRenderer, inner_html};
use serial_test::serial;
use tokio::task::LocalSet;

fn setup() {
	init_tracing();
	set_dev_warnings(true);
	clear_flush_scheduler();
	let _ = take_unhandled_errors();
}

/// Let the clock run for `ms`, then flush whatever the timers queued
async fn advance(ms: u64) {
	tokio::time::sleep(Duration::from_millis(ms)).await;
	flush_jobs();
}

/// Renders `<inner>{msg}</inner>` from its `msg` prop
fn inner() -> ComponentDef {
	ComponentDef::from_render("Inner", |instance| {
		let msg = instance.props().get("msg").to_string();
		VNode::element("inner", Props::new(), vec![VNode::text(msg)])
	})
}

fn spinner() -> ComponentDef {
	ComponentDef::from_render("Spinner", |_| VNode::element("spinner", Props::new(), Vec::new()))
}

/// Renders the message of its `error` prop
fn error_view() -> ComponentDef {
	ComponentDef::from_render("ErrorView", |instance| {
		let message = error_prop(instance.props()).map(|err| err.to_string()).unwrap_or_default();
		VNode::element("error", Props::new(), vec![VNode::text(message)])
	})
}

/// A loader resolving to `def` after `ms`, counting its calls
fn slow_loader(def: &ComponentDef, ms: u64) -> (Rc<Cell<u32>>, AsyncComponentOptions) {
	let calls = Rc::new(Cell::new(0));
	let (counter, def) = (calls.clone(), def.clone());
	let options = AsyncComponentOptions::new(move || {
		counter.set(counter.get() + 1);
		let def = def.clone();
		async move {
			tokio::time::sleep(Duration::from_millis(ms)).await;
			Ok(def)
		}
	});
	(calls, options)
}

/// Runs async work on a `futures` local pool, with timers that fire at once
struct PoolExecutor(LocalSpawner);

impl Executor for PoolExecutor {
	fn spawn_local(&self, future: LocalBoxFuture<'static, ()>) {
		if let Err(err) = self.0.spawn_local(future) {
			panic!("local pool shut down: {err}");
		}
	}

	fn sleep(&self, _duration: Duration) -> LocalBoxFuture<'static, ()> {
		futures::future::ready(()).boxed_local()
	}
}

fn mount(def: &ComponentDef) -> VNode {
	VNode::component(def, props([("msg", Value::from("hi"))]), Vec::new())
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
#[serial]
async fn test_fast_load_never_shows_loading() {
	setup();
	LocalSet::new()
		.run_until(async {
			// Arrange
			let (_, options) = slow_loader(&inner(), 50);
			let lazy = define_async_component(
				options
					.loading_component(spinner())
					.delay(Duration::from_millis(200)),
			);
			let renderer = MemoryRenderer::new();
			let root = renderer.root();

			// Act
			renderer.render(Some(&mount(&lazy)), &root);
			let before = inner_html(&root);
			advance(100).await;

			// Assert
			assert_eq!(before, "<!---->");
			assert_eq!(inner_html(&root), "<inner>hi</inner>");
			assert_eq!(renderer.created("spinner"), 0);
		})
		.await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
#[serial]
async fn test_slow_load_shows_loading_then_component() {
	setup();
	LocalSet::new()
		.run_until(async {
			// Arrange
			let (_, options) = slow_loader(&inner(), 300);
			let lazy = define_async_component(
				options
					.loading_component(spinner())
					.delay(Duration::from_millis(50)),
			);
			let renderer = MemoryRenderer::new();
			let root = renderer.root();
			renderer.render(Some(&mount(&lazy)), &root);

			// Act
			advance(100).await;
			let loading = inner_html(&root);
			advance(250).await;

			// Assert
			assert_eq!(loading, "<spinner></spinner>");
			assert_eq!(inner_html(&root), "<inner>hi</inner>");
		})
		.await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
#[serial]
async fn test_zero_delay_shows_loading_immediately() {
	setup();
	LocalSet::new()
		.run_until(async {
			// Arrange
			let lazy = define_async_component(
				AsyncComponentOptions::new(pending::<Result<ComponentDef, LoadError>>)
					.loading_component(spinner())
					.delay(Duration::ZERO),
			);
			let renderer = MemoryRenderer::new();
			let root = renderer.root();

			// Act
			renderer.render(Some(&mount(&lazy)), &root);

			// Assert
			assert_eq!(inner_html(&root), "<spinner></spinner>");
		})
		.await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
#[serial]
async fn test_timeout_renders_error_component_once() {
	setup();
	LocalSet::new()
		.run_until(async {
			// Arrange
			let reports = Rc::new(RefCell::new(Vec::new()));
			let sink = reports.clone();
			let app = AppContext::new();
			app.set_error_handler(move |err, _, info| {
				sink.borrow_mut().push((err.clone(), info.to_string()));
			});
			let lazy = define_async_component(
				AsyncComponentOptions::new(pending::<Result<ComponentDef, LoadError>>)
					.error_component(error_view())
					.timeout(Duration::from_millis(100)),
			);
			let renderer = MemoryRenderer::with_app(app);
			let root = renderer.root();

			// Act
			renderer.render(Some(&mount(&lazy)), &root);
			advance(150).await;
			advance(1_000).await;

			// Assert
			assert_eq!(inner_html(&root), "<error>Async component timed out after 100ms.</error>");
			assert_eq!(
				*reports.borrow(),
				vec![(
					RuntimeError::Timeout { timeout_ms: 100 },
					"async component loader".to_string()
				)]
			);
			assert!(take_unhandled_errors().is_empty());
		})
		.await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
#[serial]
async fn test_resolution_after_timeout_is_honoured() {
	setup();
	LocalSet::new()
		.run_until(async {
			// Arrange
			let (sender, receiver) = oneshot::channel::<ComponentDef>();
			let receiver = Rc::new(RefCell::new(Some(receiver)));
			let lazy = define_async_component(
				AsyncComponentOptions::new(move || {
					let receiver = receiver.borrow_mut().take();
					async move {
						match receiver {
							Some(receiver) => receiver.await.map_err(|_| LoadError::new("dropped")),
							None => Err(LoadError::new("already loading")),
						}
					}
				})
				.error_component(error_view())
				.timeout(Duration::from_millis(100)),
			);
			let renderer = MemoryRenderer::new();
			let root = renderer.root();
			renderer.render(Some(&mount(&lazy)), &root);
			advance(150).await;
			assert_eq!(inner_html(&root), "<error>Async component timed out after 100ms.</error>");

			// Act
			let _ = sender.send(inner());
			advance(10).await;

			// Assert
			assert_eq!(inner_html(&root), "<inner>hi</inner>");
			assert_eq!(lazy.as_async().map(|loader| loader.load_state()), Some(LoadState::Resolved));
		})
		.await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
#[serial]
async fn test_retry_after_timeout_reports_timeout_only_once() {
	setup();
	LocalSet::new()
		.run_until(async {
			// Arrange
			let reports = Rc::new(RefCell::new(Vec::new()));
			let sink = reports.clone();
			let app = AppContext::new();
			app.set_error_handler(move |err, _, info| {
				sink.borrow_mut().push((err.clone(), info.to_string()));
			});
			let calls = Rc::new(Cell::new(0));
			let attempts = Rc::new(RefCell::new(Vec::new()));
			let (counter, seen) = (calls.clone(), attempts.clone());
			let lazy = define_async_component(
				AsyncComponentOptions::new(move || {
					counter.set(counter.get() + 1);
					let first = counter.get() == 1;
					async move {
						if first {
							tokio::time::sleep(Duration::from_millis(150)).await;
							Err(LoadError::new("flaky network"))
						} else {
							pending().await
						}
					}
				})
				.error_component(error_view())
				.timeout(Duration::from_millis(100))
				.on_error(move |err, retry, _fail, attempt| {
					seen.borrow_mut().push((err.to_string(), attempt));
					retry.retry();
				}),
			);
			let renderer = MemoryRenderer::with_app(app);
			let root = renderer.root();

			// Act
			renderer.render(Some(&mount(&lazy)), &root);
			advance(120).await;
			advance(100).await;
			advance(1_000).await;

			// Assert
			assert_eq!(calls.get(), 2);
			assert_eq!(*attempts.borrow(), vec![("flaky network".to_string(), 1)]);
			assert_eq!(
				*reports.borrow(),
				vec![(
					RuntimeError::Timeout { timeout_ms: 100 },
					"async component loader".to_string()
				)]
			);
			assert_eq!(inner_html(&root), "<error>Async component timed out after 100ms.</error>");
			assert!(take_unhandled_errors().is_empty());
		})
		.await;
}

#[test]
#[serial]
fn test_installed_executor_loads_without_local_set() {
	setup();

	// Arrange
	let mut pool = LocalPool::new();
	set_executor(PoolExecutor(pool.spawner()));
	let def = inner();
	let lazy = define_async_loader(move || futures::future::ready(Ok(def.clone())));
	let renderer = MemoryRenderer::new();
	let root = renderer.root();

	// Act
	renderer.render(Some(&mount(&lazy)), &root);
	pool.run_until_stalled();
	flush_jobs();
	set_executor(TokioExecutor);

	// Assert
	assert_eq!(inner_html(&root), "<inner>hi</inner>");
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
#[serial]
async fn test_on_error_retry_recovers() {
	setup();
	LocalSet::new()
		.run_until(async {
			// Arrange
			let calls = Rc::new(Cell::new(0));
			let attempts = Rc::new(RefCell::new(Vec::new()));
			let (counter, seen, def) = (calls.clone(), attempts.clone(), inner());
			let lazy = define_async_component(
				AsyncComponentOptions::new(move || {
					counter.set(counter.get() + 1);
					let result = if counter.get() == 1 {
						Err(LoadError::new("flaky network"))
					} else {
						Ok(def.clone())
					};
					futures::future::ready(result)
				})
				.error_component(error_view())
				.on_error(move |err, retry, _fail, attempt| {
					seen.borrow_mut().push((err.to_string(), attempt));
					retry.retry();
				}),
			);
			let renderer = MemoryRenderer::new();
			let root = renderer.root();

			// Act
			renderer.render(Some(&mount(&lazy)), &root);
			advance(10).await;

			// Assert
			assert_eq!(calls.get(), 2);
			assert_eq!(*attempts.borrow(), vec![("flaky network".to_string(), 1)]);
			assert_eq!(inner_html(&root), "<inner>hi</inner>");
		})
		.await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
#[serial]
async fn test_failure_without_error_component_is_rethrown_in_dev() {
	setup();
	LocalSet::new()
		.run_until(async {
			// Arrange
			let lazy = define_async_component(AsyncComponentOptions::new(|| {
				futures::future::ready(Err::<ComponentDef, _>(LoadError::new("offline")))
			}));
			let renderer = MemoryRenderer::new();
			let root = renderer.root();

			// Act
			renderer.render(Some(&mount(&lazy)), &root);
			advance(10).await;

			// Assert
			assert_eq!(take_unhandled_errors(), vec![RuntimeError::Load(LoadError::new("offline"))]);
			assert_eq!(inner_html(&root), "<!---->");
		})
		.await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
#[serial]
async fn test_instances_share_one_load() {
	setup();
	LocalSet::new()
		.run_until(async {
			// Arrange
			let (calls, options) = slow_loader(&inner(), 50);
			let lazy = define_async_component(options);
			let renderer = MemoryRenderer::new();
			let root = renderer.root();

			// Act
			renderer.render(Some(&VNode::fragment(vec![mount(&lazy), mount(&lazy)])), &root);
			advance(100).await;

			// Assert
			assert_eq!(calls.get(), 1);
			assert_eq!(inner_html(&root), "<inner>hi</inner><inner>hi</inner>");

			// Act: a later instance renders the resolved component right away
			let late = MemoryRenderer::new();
			let late_root = late.root();
			late.render(Some(&mount(&lazy)), &late_root);

			// Assert
			assert_eq!(calls.get(), 1);
			assert_eq!(inner_html(&late_root), "<inner>hi</inner>");
		})
		.await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
#[serial]
async fn test_async_child_is_cached_by_keep_alive() {
	setup();
	LocalSet::new()
		.run_until(async {
			// Arrange
			let log = EventLog::new();
			let (_, options) = slow_loader(&recording("Inner", &log), 50);
			let lazy = define_async_component(options);
			let other = recording("Other", &log);
			let renderer = MemoryRenderer::new();
			let root = renderer.root();
			let view = |child: &ComponentDef| keep_alive_view(KeepAliveProps::new().include("Inner,Other"), child);
			renderer.render(Some(&view(&lazy)), &root);
			advance(100).await;
			assert_eq!(inner_html(&root), "<Inner>Inner</Inner>");

			// Act
			renderer.render(Some(&view(&other)), &root);
			renderer.render(Some(&view(&lazy)), &root);

			// Assert
			assert_eq!(inner_html(&root), "<Inner>Inner</Inner>");
			assert_eq!(log.count("Inner:setup"), 1);
			assert_eq!(log.count("Inner:deactivated"), 1);
			assert_eq!(log.count("Inner:activated"), 2);
			assert_eq!(log.count("Inner:unmounted"), 0);
		})
		.await;
}
