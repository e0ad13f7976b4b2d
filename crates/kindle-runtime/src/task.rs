//! Local task execution
//!
//! Async component loads and their timers run as `!Send` futures on the
//! current thread. The default [`TokioExecutor`] spawns them onto the
//! enclosing `tokio::task::LocalSet`; hosts with their own event loop
//! install a different [`Executor`] with [`set_executor`].

use core::cell::RefCell;
use core::future::Future;
use core::time::Duration;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use futures::FutureExt;

/// Spawns local futures and provides timers
pub trait Executor {
	/// Run `future` to completion in the background
	fn spawn_local(&self, future: LocalBoxFuture<'static, ()>);

	/// A future that completes after `duration`
	fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;
}

/// Executor backed by `tokio::task::spawn_local` and `tokio::time::sleep`
///
/// # Panics
///
/// Spawning panics outside a running `LocalSet`, the same as
/// `tokio::task::spawn_local`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioExecutor;

impl Executor for TokioExecutor {
	fn spawn_local(&self, future: LocalBoxFuture<'static, ()>) {
		// Detached; completion is observed through reactive state.
		drop(tokio::task::spawn_local(future));
	}

	fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
		tokio::time::sleep(duration).boxed_local()
	}
}

thread_local! {
	static EXECUTOR: RefCell<Rc<dyn Executor>> = RefCell::new(Rc::new(TokioExecutor));
}

/// Install the executor used by this thread, returning the previous one
pub fn set_executor(executor: impl Executor + 'static) -> Rc<dyn Executor> {
	EXECUTOR.with(|current| core::mem::replace(&mut *current.borrow_mut(), Rc::new(executor)))
}

fn executor() -> Rc<dyn Executor> {
	EXECUTOR.with(|current| current.borrow().clone())
}

/// Spawn a local future on the installed executor
pub fn spawn_local(future: impl Future<Output = ()> + 'static) {
	executor().spawn_local(future.boxed_local());
}

/// Sleep on the installed executor's clock
pub fn sleep(duration: Duration) -> LocalBoxFuture<'static, ()> {
	executor().sleep(duration)
}
