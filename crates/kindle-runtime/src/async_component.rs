//! Async components
//!
//! [`define_async_component`] wraps a loader future in a component that
//! renders placeholders until the real component resolves:
//!
//! | State | Renders |
//! |-------|---------|
//! | resolved | the loaded component, with the wrapper's props and slots |
//! | failed or timed out | the error component, with an `error` prop |
//! | loading, after `delay` | the loading component |
//! | otherwise | an empty comment |
//!
//! Every instance of one definition shares a single in-flight request, and
//! once the component resolves new instances render it directly.
//!
//! ## Example
//!
//! ```ignore
//! use kindle_runtime::async_component::{AsyncComponentOptions, define_async_component};
//!
//! let lazy = define_async_component(
//!     AsyncComponentOptions::new(|| async { fetch_component().await })
//!         .loading_component(spinner)
//!         .timeout(Duration::from_secs(3)),
//! );
//! ```

use core::cell::{Cell, RefCell};
use core::fmt;
use core::future::Future;
use core::time::Duration;
use std::rc::Rc;

use futures::channel::oneshot;
use futures::future::{LocalBoxFuture, Shared};
use futures::FutureExt;
use kindle_reactive::{Signal, Value};

use crate::component::{ComponentDef, ComponentInstance, ComponentMarker, RenderFn, SetupFn};
use crate::error::{LoadError, RuntimeError};
use crate::error_handling::{ErrorCode, report_error};
use crate::scheduler::queue_job;
use crate::settings;
use crate::task;
use crate::vnode::{Props, VNode, props};

/// Future returned by a loader
pub type LoaderFuture = LocalBoxFuture<'static, Result<ComponentDef, LoadError>>;

/// Starts one load attempt
pub type Loader = Rc<dyn Fn() -> LoaderFuture>;

/// Error hook: `(error, retry, fail, attempt)`; `attempt` starts at 1
pub type OnErrorFn = Rc<dyn Fn(RuntimeError, RetryHandle, FailHandle, u32)>;

type LoadResult = Result<ComponentDef, RuntimeError>;
type SharedLoad = Shared<LocalBoxFuture<'static, LoadResult>>;

/// Name of every async wrapper definition
pub const ASYNC_WRAPPER_NAME: &str = "AsyncComponentWrapper";

enum Decision {
	Retry,
	Fail,
}

type DecisionSender = Rc<RefCell<Option<oneshot::Sender<Decision>>>>;

/// Restarts a failed load; handed to the `on_error` hook
pub struct RetryHandle(DecisionSender);

impl RetryHandle {
	pub fn retry(self) {
		send_decision(&self.0, Decision::Retry);
	}
}

/// Gives up on a failed load; handed to the `on_error` hook
///
/// Dropping both handles without deciding also fails the load.
pub struct FailHandle(DecisionSender);

impl FailHandle {
	pub fn fail(self) {
		send_decision(&self.0, Decision::Fail);
	}
}

fn send_decision(sender: &DecisionSender, decision: Decision) {
	if let Some(sender) = sender.borrow_mut().take() {
		let _ = sender.send(decision);
	}
}

/// Where a loader is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
	Idle,
	Loading,
	Resolved,
}

/// Options for [`define_async_component`]
pub struct AsyncComponentOptions {
	loader: Loader,
	loading_component: Option<ComponentDef>,
	error_component: Option<ComponentDef>,
	delay: Option<Duration>,
	timeout: Option<Duration>,
	suspensible: bool,
	on_error: Option<OnErrorFn>,
}

impl AsyncComponentOptions {
	pub fn new<F, Fut>(loader: F) -> Self
	where
		F: Fn() -> Fut + 'static,
		Fut: Future<Output = Result<ComponentDef, LoadError>> + 'static,
	{
		Self {
			loader: Rc::new(move || loader().boxed_local()),
			loading_component: None,
			error_component: None,
			delay: None,
			timeout: None,
			suspensible: true,
			on_error: None,
		}
	}

	/// Rendered while loading, once `delay` has passed
	pub fn loading_component(mut self, def: ComponentDef) -> Self {
		self.loading_component = Some(def);
		self
	}

	/// Rendered after a failure or timeout
	pub fn error_component(mut self, def: ComponentDef) -> Self {
		self.error_component = Some(def);
		self
	}

	/// Delay before the loading component shows; defaults to
	/// `async_component.default_delay_ms`
	pub fn delay(mut self, delay: Duration) -> Self {
		self.delay = Some(delay);
		self
	}

	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);
		self
	}

	pub fn suspensible(mut self, suspensible: bool) -> Self {
		self.suspensible = suspensible;
		self
	}

	pub fn on_error<F>(mut self, on_error: F) -> Self
	where
		F: Fn(RuntimeError, RetryHandle, FailHandle, u32) + 'static,
	{
		self.on_error = Some(Rc::new(on_error));
		self
	}
}

struct LoaderState {
	loader: Loader,
	on_error: Option<OnErrorFn>,
	suspensible: bool,
	retries: Cell<u32>,
	next_request: Cell<u64>,
	pending: RefCell<Option<(u64, SharedLoad)>>,
	resolved: RefCell<Option<ComponentDef>>,
}

/// The shared load state of one async definition
#[derive(Clone)]
pub struct AsyncLoader(Rc<LoaderState>);

impl AsyncLoader {
	fn new(loader: Loader, on_error: Option<OnErrorFn>, suspensible: bool) -> Self {
		Self(Rc::new(LoaderState {
			loader,
			on_error,
			suspensible,
			retries: Cell::new(0),
			next_request: Cell::new(0),
			pending: RefCell::new(None),
			resolved: RefCell::new(None),
		}))
	}

	/// Start loading, or join the request already in flight
	pub fn load(&self) -> LocalBoxFuture<'static, LoadResult> {
		if let Some((_, pending)) = &*self.0.pending.borrow() {
			return pending.clone().boxed_local();
		}

		let request = self.0.next_request.get();
		self.0.next_request.set(request + 1);
		let this = self.clone();
		let shared = async move {
			let result = match (this.0.loader)().await {
				Ok(def) => Ok(def),
				Err(err) => this.recover(err.into()).await,
			};
			let def = result?;
			let current = this.0.pending.borrow().clone();
			if let Some((id, newer)) = current
				&& id != request
			{
				return newer.await;
			}
			*this.0.resolved.borrow_mut() = Some(def.clone());
			Ok(def)
		}
		.boxed_local()
		.shared();

		*self.0.pending.borrow_mut() = Some((request, shared.clone()));
		shared.boxed_local()
	}

	async fn recover(&self, err: RuntimeError) -> LoadResult {
		let Some(on_error) = self.0.on_error.clone() else {
			return Err(err);
		};
		let (sender, receiver) = oneshot::channel();
		let sender: DecisionSender = Rc::new(RefCell::new(Some(sender)));
		let attempt = self.0.retries.get() + 1;
		on_error(err.clone(), RetryHandle(sender.clone()), FailHandle(sender), attempt);

		match receiver.await {
			Ok(Decision::Retry) => {
				tracing::debug!(target: "kindle", attempt, "retrying async component load");
				self.0.retries.set(attempt);
				self.clear_pending();
				self.load().await
			}
			Ok(Decision::Fail) | Err(oneshot::Canceled) => Err(err),
		}
	}

	/// The loaded component, once resolved
	pub fn resolved(&self) -> Option<ComponentDef> {
		self.0.resolved.borrow().clone()
	}

	pub fn load_state(&self) -> LoadState {
		if self.0.resolved.borrow().is_some() {
			LoadState::Resolved
		} else if self.0.pending.borrow().is_some() {
			LoadState::Loading
		} else {
			LoadState::Idle
		}
	}

	/// Retries granted so far
	pub fn retries(&self) -> u32 {
		self.0.retries.get()
	}

	pub fn is_suspensible(&self) -> bool {
		self.0.suspensible
	}

	fn clear_pending(&self) {
		self.0.pending.borrow_mut().take();
	}
}

impl fmt::Debug for AsyncLoader {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AsyncLoader")
			.field("state", &self.load_state())
			.field("retries", &self.retries())
			.finish()
	}
}

struct Placeholders {
	loading_component: Option<ComponentDef>,
	error_component: Option<ComponentDef>,
	delay: Option<Duration>,
	timeout: Option<Duration>,
}

/// Define a component that renders the result of an async loader
///
/// Mounting an instance spawns the load and its timers on the thread's
/// [`Executor`](crate::task::Executor). The default executor needs a
/// running `tokio::task::LocalSet` and panics without one; install a
/// different executor with [`set_executor`](crate::task::set_executor)
/// when the host drives futures some other way.
pub fn define_async_component(options: AsyncComponentOptions) -> ComponentDef {
	let AsyncComponentOptions {
		loader,
		loading_component,
		error_component,
		delay,
		timeout,
		suspensible,
		on_error,
	} = options;
	let loader = AsyncLoader::new(loader, on_error, suspensible);
	let placeholders = Rc::new(Placeholders {
		loading_component,
		error_component,
		delay,
		timeout,
	});
	let setup_loader = loader.clone();
	let setup: SetupFn = Rc::new(move |instance| setup_wrapper(instance, &setup_loader, &placeholders));
	ComponentDef::with_marker(
		Some(ASYNC_WRAPPER_NAME.into()),
		setup,
		ComponentMarker::AsyncWrapper(loader),
	)
}

/// [`define_async_component`] with only a loader
pub fn define_async_loader<F, Fut>(loader: F) -> ComponentDef
where
	F: Fn() -> Fut + 'static,
	Fut: Future<Output = Result<ComponentDef, LoadError>> + 'static,
{
	define_async_component(AsyncComponentOptions::new(loader))
}

/// The error an error component received in its `error` prop
pub fn error_prop(props: &Value) -> Option<RuntimeError> {
	let error = props.get("error");
	let payload = error.as_target()?.payload::<RuntimeError>()?;
	Some((*payload).clone())
}

fn inner_vnode(resolved: &ComponentDef, wrapper: &ComponentInstance) -> VNode {
	VNode::component(resolved, wrapper.vnode().props().clone(), wrapper.slots())
}

fn report_load_error(
	loader: &AsyncLoader,
	err: RuntimeError,
	instance: Option<&ComponentInstance>,
	has_error_component: bool,
) {
	loader.clear_pending();
	report_error(err, instance, ErrorCode::AsyncComponentLoader, !has_error_component);
}

fn setup_wrapper(instance: &ComponentInstance, loader: &AsyncLoader, placeholders: &Rc<Placeholders>) -> RenderFn {
	if let Some(resolved) = loader.resolved() {
		return Box::new(move |instance| inner_vnode(&resolved, instance));
	}

	let delay = placeholders.delay.unwrap_or_else(|| {
		Duration::from_millis(settings::with_current(|s| s.async_component.default_delay_ms))
	});
	let has_error_component = placeholders.error_component.is_some();
	let loaded = Signal::new(false);
	let error: Signal<Option<RuntimeError>> = Signal::new(None);
	let delayed = Signal::new(!delay.is_zero());

	if !delay.is_zero() {
		let delayed = delayed.clone();
		task::spawn_local(async move {
			task::sleep(delay).await;
			delayed.set(false);
		});
	}

	if let Some(timeout) = placeholders.timeout {
		let (loaded, error, loader) = (loaded.clone(), error.clone(), loader.clone());
		let owner = instance.downgrade();
		task::spawn_local(async move {
			task::sleep(timeout).await;
			if loaded.get_untracked() || error.with(Option::is_some) {
				return;
			}
			let err = RuntimeError::Timeout {
				timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
			};
			report_load_error(&loader, err.clone(), owner.upgrade().as_ref(), has_error_component);
			error.set(Some(err));
		});
	}

	{
		let (loaded, error, loader) = (loaded.clone(), error.clone(), loader.clone());
		let owner = instance.downgrade();
		let request = loader.load();
		task::spawn_local(async move {
			match request.await {
				Ok(_) => {
					loaded.set(true);
					let parent = owner.upgrade().and_then(|instance| instance.parent());
					if let Some(parent) = parent
						&& parent.is_keep_alive()
						&& let Some(job) = parent.update_job()
					{
						queue_job(job);
					}
				}
				Err(err) => {
					report_load_error(&loader, err.clone(), owner.upgrade().as_ref(), has_error_component);
					error.set(Some(err));
				}
			}
		});
	}

	let loader = loader.clone();
	let placeholders = placeholders.clone();
	Box::new(move |instance| {
		if loaded.get()
			&& let Some(resolved) = loader.resolved()
		{
			return inner_vnode(&resolved, instance);
		}
		if let Some(err) = error.get()
			&& let Some(error_component) = &placeholders.error_component
		{
			return VNode::component(
				error_component,
				props([("error", Value::opaque("Error", err))]),
				Vec::new(),
			);
		}
		if let Some(loading_component) = &placeholders.loading_component
			&& !delayed.get()
		{
			return VNode::component(loading_component, Props::new(), Vec::new());
		}
		VNode::comment("")
	})
}
