//! Error reporting
//!
//! Errors raised by hooks, jobs and async loaders are reported against the
//! instance they belong to. Reporting walks the ancestor chain calling
//! error-captured hooks, then the app-level error handler, and finally logs.
//!
//! In development, an unhandled error reported with `throw_in_dev` is also
//! kept on a per-thread list that callers drain with
//! [`take_unhandled_errors`]:
//!
//! ```ignore
//! report_error(err, Some(&instance), ErrorCode::AsyncComponentLoader, true);
//! assert_eq!(take_unhandled_errors().len(), 1);
//! ```

use core::cell::RefCell;
use std::borrow::Cow;

use kindle_reactive::logging::dev_warnings_enabled;
use kindle_reactive::{dev_warn, untracked};

use crate::component::ComponentInstance;
use crate::error::RuntimeError;
use crate::lifecycle::HookType;

/// Where an error was raised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
	Setup,
	RenderFunction,
	WatchGetter,
	WatchCallback,
	Scheduler,
	AsyncComponentLoader,
	AppErrorHandler,
	Lifecycle(HookType),
}

impl ErrorCode {
	/// Human-readable origin, passed to handlers as `info`
	pub fn info(&self) -> Cow<'static, str> {
		match self {
			Self::Setup => "setup function".into(),
			Self::RenderFunction => "render function".into(),
			Self::WatchGetter => "watcher getter".into(),
			Self::WatchCallback => "watcher callback".into(),
			Self::Scheduler => "scheduler flush".into(),
			Self::AsyncComponentLoader => "async component loader".into(),
			Self::AppErrorHandler => "app errorHandler".into(),
			Self::Lifecycle(hook) => hook.to_string().into(),
		}
	}
}

thread_local! {
	static UNHANDLED: RefCell<Vec<RuntimeError>> = const { RefCell::new(Vec::new()) };
}

/// Report an error raised on behalf of `instance`
pub fn report_error(
	err: RuntimeError,
	instance: Option<&ComponentInstance>,
	code: ErrorCode,
	throw_in_dev: bool,
) {
	let info = code.info();
	if let Some(instance) = instance {
		let mut current = instance.parent();
		while let Some(ancestor) = current {
			for hook in ancestor.error_captured_hooks() {
				if !hook(&err, Some(instance), &info) {
					return;
				}
			}
			current = ancestor.parent();
		}

		if let Some(handler) = instance.app_context().error_handler() {
			untracked(|| handler(&err, Some(instance), &info));
			return;
		}
	}
	log_error(err, code, &info, throw_in_dev);
}

fn log_error(err: RuntimeError, code: ErrorCode, info: &str, throw_in_dev: bool) {
	tracing::error!(target: "kindle", ?code, "Unhandled error during execution of {info}: {err}");
	if dev_warnings_enabled() {
		dev_warn!("Unhandled error during execution of {}", info);
		if throw_in_dev {
			UNHANDLED.with(|list| list.borrow_mut().push(err));
		}
	}
}

/// Drain the errors that would have been re-thrown in development
pub fn take_unhandled_errors() -> Vec<RuntimeError> {
	UNHANDLED.with(|list| core::mem::take(&mut *list.borrow_mut()))
}
