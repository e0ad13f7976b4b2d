//! Renderer contract
//!
//! The runtime does not touch a host tree itself. A renderer implements
//! [`RendererInternals`] and binds itself to every instance it mounts with
//! [`ComponentInstance::bind_renderer`]; keep-alive uses the bound renderer
//! to move cached subtrees in and out of its storage container.
//!
//! Renderers are expected to:
//!
//! - call [`KeepAliveContext::activate`](crate::keep_alive::KeepAliveContext::activate)
//!   instead of mounting a vnode flagged `COMPONENT_KEPT_ALIVE`;
//! - call [`KeepAliveContext::deactivate`](crate::keep_alive::KeepAliveContext::deactivate)
//!   instead of unmounting a vnode flagged `COMPONENT_SHOULD_KEEP_ALIVE`;
//! - drive component updates through [`setup_render_effect`], so writes
//!   are batched by the scheduler.

use core::cell::RefCell;
use std::rc::Rc;

use kindle_reactive::{Effect, EffectOptions, WeakEffect};

use crate::component::ComponentInstance;
use crate::scheduler::{SchedulerJob, queue_job};
use crate::vnode::{HostNode, VNode};

/// Flags threaded through a patch
#[derive(Debug, Clone, Default)]
pub struct PatchContext {
	pub is_svg: bool,
	pub slot_scope_ids: Vec<Rc<str>>,
	pub optimized: bool,
}

/// Why a mounted node is being moved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveType {
	Enter,
	Leave,
	Reorder,
}

/// Host operations the runtime needs from a renderer
pub trait RendererInternals {
	/// Mount `new`, or patch `old` into `new`
	fn patch(
		&self,
		old: Option<&VNode>,
		new: &VNode,
		container: &HostNode,
		anchor: Option<&HostNode>,
		parent: Option<&ComponentInstance>,
		ctx: &PatchContext,
	);

	/// Move a mounted vnode before `anchor` in `container`
	fn move_node(
		&self,
		vnode: &VNode,
		container: &HostNode,
		anchor: Option<&HostNode>,
		move_type: MoveType,
	);

	/// Unmount a vnode; `do_remove` also detaches its host nodes
	fn unmount(&self, vnode: &VNode, parent: Option<&ComponentInstance>, do_remove: bool);

	/// Create a detached host element
	fn create_element(&self, tag: &str) -> HostNode;
}

/// Create the render effect and update job of a set-up instance, then run
/// the first render.
///
/// `update` mounts the instance on its first call and patches it on every
/// later one. Re-renders triggered by reactive writes are queued as a job
/// with the instance uid, so one flush renders each instance at most once,
/// parents first.
pub fn setup_render_effect<F>(instance: &ComponentInstance, update: F)
where
	F: Fn(&ComponentInstance) + 'static,
{
	let slot: Rc<RefCell<WeakEffect>> = Rc::default();
	let job_slot = slot.clone();
	let job = SchedulerJob::with_id(instance.uid(), move || {
		let effect = job_slot.borrow().upgrade();
		if let Some(effect) = effect.filter(Effect::is_active) {
			effect.run();
		}
	});

	let owner = instance.downgrade();
	let queued = job.clone();
	let effect = instance.scope().run(|| {
		Effect::with_options(
			move || {
				if let Some(instance) = owner.upgrade() {
					update(&instance);
				}
			},
			EffectOptions {
				lazy: true,
				scheduler: Some(Rc::new(move || queue_job(queued.clone()))),
				..EffectOptions::default()
			},
		)
	});
	let Some(effect) = effect else {
		tracing::debug!(target: "kindle", uid = instance.uid(), "render effect skipped: scope stopped");
		return;
	};

	*slot.borrow_mut() = effect.downgrade();
	instance.set_update_job(job);
	instance.set_effect(effect.clone());
	effect.run();
}
