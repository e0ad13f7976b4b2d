//! Lifecycle hooks
//!
//! Hooks are registered during setup against the current instance (or an
//! explicit target) and invoked by the renderer at the matching point of
//! the instance's life. Every registered hook runs untracked with its
//! owner as the current instance, and does nothing once the owner is
//! unmounted.
//!
//! Activation hooks live in [`keep_alive`](crate::keep_alive) because they
//! also register on keep-alive roots.

use core::cell::Cell;
use std::fmt;
use std::rc::Rc;

use kindle_reactive::{dev_warn, pause_tracking, reset_tracking};

use crate::component::{ComponentInstance, current_instance, with_current_instance};
use crate::error::RuntimeError;
use crate::error_handling::{ErrorCode, report_error};
use crate::scheduler::{SchedulerJob, queue_post_flush_cb};

/// Points in an instance's life at which hooks run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookType {
	BeforeMount,
	Mounted,
	BeforeUpdate,
	Updated,
	BeforeUnmount,
	Unmounted,
	Activated,
	Deactivated,
	ErrorCaptured,
}

impl HookType {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::BeforeMount => "beforeMount",
			Self::Mounted => "mounted",
			Self::BeforeUpdate => "beforeUpdate",
			Self::Updated => "updated",
			Self::BeforeUnmount => "beforeUnmount",
			Self::Unmounted => "unmounted",
			Self::Activated => "activated",
			Self::Deactivated => "deactivated",
			Self::ErrorCaptured => "errorCaptured",
		}
	}
}

impl fmt::Display for HookType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} hook", self.as_str())
	}
}

/// A lifecycle hook; an `Err` is reported against the owning instance
pub type LifecycleHook = Rc<dyn Fn() -> Result<(), RuntimeError>>;

/// Receives errors from descendants; returning `false` stops propagation
pub type ErrorCapturedHook = Rc<dyn Fn(&RuntimeError, Option<&ComponentInstance>, &str) -> bool>;

/// Identifies one registration, for removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

thread_local! {
	static NEXT_HOOK_ID: Cell<u64> = const { Cell::new(0) };
}

fn next_hook_id() -> HookId {
	NEXT_HOOK_ID.with(|next| {
		let id = next.get();
		next.set(id + 1);
		HookId(id)
	})
}

fn resolve_target(hook_type: HookType, target: Option<&ComponentInstance>) -> Option<ComponentInstance> {
	let target = target.cloned().or_else(current_instance);
	if target.is_none() {
		dev_warn!(
			"{} is called when there is no active component instance to be associated with. Lifecycle injection APIs can only be used during execution of setup().",
			hook_type
		);
	}
	target
}

/// Register `hook` on `target` (default: the current instance)
///
/// Returns `None` when there is no instance to register on.
pub fn inject_hook(
	hook_type: HookType,
	hook: LifecycleHook,
	target: Option<&ComponentInstance>,
	prepend: bool,
) -> Option<HookId> {
	if hook_type == HookType::ErrorCaptured {
		dev_warn!("errorCaptured hooks are registered with on_error_captured()");
		return None;
	}
	let target = resolve_target(hook_type, target)?;
	let owner = target.downgrade();
	let wrapped: Rc<dyn Fn()> = Rc::new(move || {
		let Some(owner) = owner.upgrade() else {
			return;
		};
		if owner.is_unmounted() {
			return;
		}
		pause_tracking();
		let result = with_current_instance(&owner, || hook());
		reset_tracking();
		if let Err(err) = result {
			report_error(err, Some(&owner), ErrorCode::Lifecycle(hook_type), true);
		}
	});
	Some(inject_wrapped(hook_type, wrapped, &target, prepend))
}

/// Register an already wrapped hook without further wrapping
pub(crate) fn inject_wrapped(
	hook_type: HookType,
	wrapped: Rc<dyn Fn()>,
	target: &ComponentInstance,
	prepend: bool,
) -> HookId {
	let id = next_hook_id();
	target.add_hook(hook_type, id, wrapped, prepend);
	id
}

/// Remove a registration; `false` if it was not present
pub fn remove_hook(hook_type: HookType, id: HookId, target: &ComponentInstance) -> bool {
	target.remove_hook(hook_type, id)
}

fn infallible(hook: impl Fn() + 'static) -> LifecycleHook {
	Rc::new(move || {
		hook();
		Ok(())
	})
}

pub fn on_before_mount(hook: impl Fn() + 'static) -> Option<HookId> {
	inject_hook(HookType::BeforeMount, infallible(hook), None, false)
}

pub fn on_mounted(hook: impl Fn() + 'static) -> Option<HookId> {
	inject_hook(HookType::Mounted, infallible(hook), None, false)
}

pub fn on_before_update(hook: impl Fn() + 'static) -> Option<HookId> {
	inject_hook(HookType::BeforeUpdate, infallible(hook), None, false)
}

pub fn on_updated(hook: impl Fn() + 'static) -> Option<HookId> {
	inject_hook(HookType::Updated, infallible(hook), None, false)
}

pub fn on_before_unmount(hook: impl Fn() + 'static) -> Option<HookId> {
	inject_hook(HookType::BeforeUnmount, infallible(hook), None, false)
}

pub fn on_unmounted(hook: impl Fn() + 'static) -> Option<HookId> {
	inject_hook(HookType::Unmounted, infallible(hook), None, false)
}

/// Register an error-captured hook on the current instance
pub fn on_error_captured<F>(hook: F) -> bool
where
	F: Fn(&RuntimeError, Option<&ComponentInstance>, &str) -> bool + 'static,
{
	match resolve_target(HookType::ErrorCaptured, None) {
		Some(target) => {
			target.add_error_captured(Rc::new(hook));
			true
		}
		None => false,
	}
}

/// Run the hooks of one type now
pub fn invoke_hooks(instance: &ComponentInstance, hook_type: HookType) {
	for hook in instance.hooks(hook_type) {
		hook();
	}
}

/// Run the hooks of one type after the current flush
pub fn queue_hooks(instance: &ComponentInstance, hook_type: HookType) {
	if instance.hook_count(hook_type) == 0 {
		return;
	}
	let instance = instance.clone();
	queue_post_flush_cb(SchedulerJob::new(move || invoke_hooks(&instance, hook_type)));
}
