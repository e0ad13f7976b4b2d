//! Keep-alive
//!
//! The [`keep_alive`] component caches the instance of its single child
//! component instead of unmounting it when the child is switched out. A
//! cached instance is moved into a detached storage container on
//! deactivation and moved back (then re-patched) on activation.
//!
//! Props:
//!
//! - `include` / `exclude`: names to cache or skip, as a comma-separated
//!   string, a list of strings, or a [`regex_pattern`]
//! - `max`: cache size; the least recently used entry is evicted first
//!
//! ## Example
//!
//! ```ignore
//! use kindle_runtime::keep_alive::{KeepAliveProps, keep_alive};
//!
//! let view = VNode::component(
//!     &keep_alive(),
//!     KeepAliveProps::new().include("Foo,Bar").max(10).into_props(),
//!     vec![VNode::component(&current_tab, Props::new(), Vec::new())],
//! );
//! ```

use core::cell::RefCell;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use kindle_reactive::{NodeId, Value, dev_warn, to_raw};
use regex::Regex;

use crate::component::{
	ComponentDef, ComponentInstance, ComponentMarker, RenderFn, SetupFn, WeakInstance,
	current_instance,
};
use crate::error::RuntimeError;
use crate::lifecycle::{HookId, HookType, LifecycleHook, inject_hook, invoke_hooks, remove_hook};
use crate::renderer::{MoveType, PatchContext, RendererInternals};
use crate::scheduler::{SchedulerJob, queue_post_flush_cb};
use crate::settings;
use crate::vnode::{HostNode, Props, ShapeFlags, VNode, clone_vnode, is_same_vnode_type};
use crate::watch::{FlushTiming, WatchOptions, WatchSource, watch};

pub const KEEP_ALIVE_NAME: &str = "KeepAlive";

thread_local! {
	static KEEP_ALIVE: ComponentDef = {
		let setup: SetupFn = Rc::new(setup_keep_alive);
		ComponentDef::with_marker(Some(KEEP_ALIVE_NAME.into()), setup, ComponentMarker::KeepAlive)
	};
}

/// The keep-alive component definition
pub fn keep_alive() -> ComponentDef {
	KEEP_ALIVE.with(Clone::clone)
}

/// Whether `vnode` renders a keep-alive
pub fn is_keep_alive(vnode: &VNode) -> bool {
	vnode.component_def().is_some_and(ComponentDef::is_keep_alive)
}

/// Builder for keep-alive props
#[derive(Debug, Clone, Default)]
pub struct KeepAliveProps {
	include: Option<Value>,
	exclude: Option<Value>,
	max: Option<usize>,
}

impl KeepAliveProps {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn include(mut self, pattern: impl Into<Value>) -> Self {
		self.include = Some(pattern.into());
		self
	}

	pub fn exclude(mut self, pattern: impl Into<Value>) -> Self {
		self.exclude = Some(pattern.into());
		self
	}

	/// Maximum cached instances; 0 is unlimited
	pub fn max(mut self, max: usize) -> Self {
		self.max = Some(max);
		self
	}

	pub fn into_props(self) -> Props {
		let mut props = Props::new();
		if let Some(include) = self.include {
			props.insert("include".into(), include);
		}
		if let Some(exclude) = self.exclude {
			props.insert("exclude".into(), exclude);
		}
		if let Some(max) = self.max {
			props.insert("max".into(), Value::from(max));
		}
		props
	}
}

/// Wrap a regex for use as an `include` / `exclude` pattern
pub fn regex_pattern(regex: Regex) -> Value {
	Value::opaque("RegExp", regex)
}

/// Whether `name` matches a keep-alive pattern
pub fn matches(pattern: &Value, name: &str) -> bool {
	let pattern = to_raw(pattern);
	if let Some(list) = pattern.as_str() {
		return list.split(',').any(|candidate| candidate == name);
	}
	let Some(target) = pattern.as_target() else {
		return false;
	};
	if target.is_array() {
		return (0..pattern.len()).any(|i| matches(&pattern.get(i), name));
	}
	target
		.payload::<Regex>()
		.is_some_and(|regex| regex.is_match(name))
}

fn is_pattern_set(pattern: &Value) -> bool {
	!pattern.is_nullish() && pattern.as_str() != Some("")
}

fn max_entries(max: &Value) -> Option<usize> {
	let max = match max {
		Value::Int(n) => usize::try_from(*n).ok(),
		Value::Float(_) => max.as_int().and_then(|n| usize::try_from(n).ok()),
		Value::Str(s) => s.trim().parse().ok(),
		Value::Undefined | Value::Null => settings::with_current(|s| s.keep_alive.default_max),
		_ => None,
	};
	max.filter(|&n| n > 0)
}

fn reset_shape_flag(vnode: &VNode) {
	vnode.clear_flag(ShapeFlags::COMPONENT_SHOULD_KEEP_ALIVE | ShapeFlags::COMPONENT_KEPT_ALIVE);
}

fn component_name(vnode: &VNode) -> Option<Rc<str>> {
	vnode.component_def().and_then(ComponentDef::display_name)
}

struct ContextInner {
	renderer: Rc<dyn RendererInternals>,
	storage: HostNode,
}

/// Moves cached instances between the tree and storage
///
/// Installed on every keep-alive instance; renderers reach it through the
/// parent instance of a kept-alive vnode.
#[derive(Clone)]
pub struct KeepAliveContext(Rc<ContextInner>);

impl KeepAliveContext {
	fn new(renderer: Rc<dyn RendererInternals>) -> Self {
		let storage = renderer.create_element("div");
		Self(Rc::new(ContextInner { renderer, storage }))
	}

	/// Move a cached vnode back into `container` and patch it
	pub fn activate(
		&self,
		vnode: &VNode,
		container: &HostNode,
		anchor: Option<&HostNode>,
		ctx: &PatchContext,
	) {
		let Some(instance) = vnode.component_instance() else {
			dev_warn!("cannot activate a vnode without a component instance");
			return;
		};
		let renderer = &self.0.renderer;
		renderer.move_node(vnode, container, anchor, MoveType::Enter);
		renderer.patch(Some(&instance.vnode()), vnode, container, anchor, Some(&instance), ctx);
		tracing::trace!(target: "kindle", uid = instance.uid(), "activated");
		queue_post_flush_cb(SchedulerJob::new(move || {
			instance.set_deactivated(false);
			invoke_hooks(&instance, HookType::Activated);
		}));
	}

	/// Move a vnode into storage instead of unmounting it
	pub fn deactivate(&self, vnode: &VNode) {
		let Some(instance) = vnode.component_instance() else {
			return;
		};
		self.0.renderer.move_node(vnode, &self.0.storage, None, MoveType::Leave);
		tracing::trace!(target: "kindle", uid = instance.uid(), "deactivated");
		queue_post_flush_cb(SchedulerJob::new(move || {
			invoke_hooks(&instance, HookType::Deactivated);
			instance.set_deactivated(true);
		}));
	}

	/// Detached container holding deactivated subtrees
	pub fn storage_container(&self) -> &HostNode {
		&self.0.storage
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CacheKey {
	Key(Value),
	Component(NodeId),
}

#[derive(Default)]
struct Cache {
	entries: IndexMap<CacheKey, VNode>,
	// Least recently used first.
	keys: IndexSet<CacheKey>,
	current: Option<VNode>,
	pending_key: Option<CacheKey>,
}

struct KeepAliveState {
	owner: WeakInstance,
	renderer: Rc<dyn RendererInternals>,
	cache: RefCell<Cache>,
}

impl KeepAliveState {
	fn unmount(&self, vnode: &VNode) {
		reset_shape_flag(vnode);
		let owner = self.owner.upgrade();
		self.renderer.unmount(vnode, owner.as_ref(), true);
	}

	fn prune(&self, keep: impl Fn(&str) -> bool) {
		let doomed: Vec<CacheKey> = self
			.cache
			.borrow()
			.entries
			.iter()
			.filter(|(_, vnode)| component_name(vnode).is_some_and(|name| !keep(&name)))
			.map(|(key, _)| key.clone())
			.collect();
		for key in doomed {
			self.prune_entry(&key);
		}
	}

	fn prune_entry(&self, key: &CacheKey) {
		let (cached, current) = {
			let mut cache = self.cache.borrow_mut();
			cache.keys.shift_remove(key);
			(cache.entries.shift_remove(key), cache.current.clone())
		};
		match (cached, current) {
			(Some(cached), current)
				if current
					.as_ref()
					.is_none_or(|current| !is_same_vnode_type(&cached, current)) =>
			{
				tracing::debug!(target: "kindle", ?key, "evicting cached instance");
				self.unmount(&cached);
			}
			(_, Some(current)) => reset_shape_flag(&current),
			_ => {}
		}
	}

	fn cache_subtree(&self) {
		let Some(subtree) = self.owner.upgrade().and_then(|owner| owner.subtree()) else {
			return;
		};
		let mut cache = self.cache.borrow_mut();
		if let Some(key) = cache.pending_key.clone()
			&& cache.keys.contains(&key)
		{
			cache.entries.insert(key, subtree);
		}
	}

	fn before_unmount(&self) {
		let current = self.owner.upgrade().and_then(|owner| owner.subtree());
		let cached: Vec<VNode> = self.cache.borrow().entries.values().cloned().collect();
		for vnode in cached {
			if let Some(current) = &current
				&& is_same_vnode_type(&vnode, current)
			{
				reset_shape_flag(current);
				if let Some(instance) = current.component_instance() {
					queue_post_flush_cb(SchedulerJob::new(move || {
						invoke_hooks(&instance, HookType::Deactivated)
					}));
				}
				continue;
			}
			self.unmount(&vnode);
		}
		let mut cache = self.cache.borrow_mut();
		cache.entries.clear();
		cache.keys.clear();
	}

	fn set_current(&self, vnode: Option<&VNode>) {
		self.cache.borrow_mut().current = vnode.cloned();
	}

	fn render(&self, instance: &ComponentInstance) -> VNode {
		self.cache.borrow_mut().pending_key = None;
		let mut children = instance.slots();
		if children.is_empty() {
			self.set_current(None);
			return VNode::comment("");
		}
		if children.len() > 1 {
			dev_warn!("KeepAlive should contain exactly one component child.");
			self.set_current(None);
			return VNode::fragment(children);
		}
		let raw = children.remove(0);
		let Some(def) = raw
			.component_def()
			.filter(|_| raw.has_flag(ShapeFlags::STATEFUL_COMPONENT))
			.cloned()
		else {
			self.set_current(None);
			return raw;
		};

		let name = def.display_name();
		let props = instance.props();
		let (include, exclude) = (props.get("include"), props.get("exclude"));
		let max = max_entries(&props.get("max"));
		let included = !is_pattern_set(&include)
			|| name.as_deref().is_some_and(|name| matches(&include, name));
		let excluded = is_pattern_set(&exclude)
			&& name.as_deref().is_some_and(|name| matches(&exclude, name));
		if !included || excluded {
			raw.clear_flag(ShapeFlags::COMPONENT_SHOULD_KEEP_ALIVE);
			self.set_current(Some(&raw));
			return raw;
		}

		let key = raw
			.key()
			.cloned()
			.map_or(CacheKey::Component(def.id()), CacheKey::Key);
		let vnode = if raw.el().is_some() { clone_vnode(&raw) } else { raw };
		let evict = {
			let mut cache = self.cache.borrow_mut();
			cache.pending_key = Some(key.clone());
			match cache.entries.get(&key).cloned() {
				Some(cached) => {
					vnode.set_el(cached.el());
					vnode.set_component(cached.component_instance());
					vnode.set_flag(ShapeFlags::COMPONENT_KEPT_ALIVE);
					cache.keys.shift_remove(&key);
					cache.keys.insert(key);
					None
				}
				None => {
					cache.keys.insert(key);
					max.filter(|&max| cache.keys.len() > max)
						.and_then(|_| cache.keys.first().cloned())
				}
			}
		};
		if let Some(oldest) = evict {
			self.prune_entry(&oldest);
		}

		vnode.set_flag(ShapeFlags::COMPONENT_SHOULD_KEEP_ALIVE);
		self.set_current(Some(&vnode));
		vnode
	}
}

fn render_unmanaged(instance: &ComponentInstance) -> VNode {
	let mut children = instance.slots();
	match children.len() {
		0 => VNode::comment(""),
		1 => children.remove(0),
		_ => VNode::fragment(children),
	}
}

fn setup_keep_alive(instance: &ComponentInstance) -> RenderFn {
	let Some(renderer) = instance.renderer() else {
		dev_warn!("KeepAlive has no renderer bound; its children are rendered without caching.");
		return Box::new(render_unmanaged);
	};
	instance.set_keep_alive_context(KeepAliveContext::new(renderer.clone()));
	let state = Rc::new(KeepAliveState {
		owner: instance.downgrade(),
		renderer,
		cache: RefCell::new(Cache::default()),
	});

	let props = instance.props().clone();
	let pruner = state.clone();
	let _ = watch(
		WatchSource::getter(move || Value::array([props.get("include"), props.get("exclude")])),
		move |patterns, _| {
			let (include, exclude) = (patterns.get(0), patterns.get(1));
			if is_pattern_set(&include) {
				pruner.prune(|name| matches(&include, name));
			}
			if is_pattern_set(&exclude) {
				pruner.prune(|name| !matches(&exclude, name));
			}
		},
		WatchOptions {
			flush: FlushTiming::Post,
			deep: true,
			..WatchOptions::default()
		},
	);

	for hook_type in [HookType::Mounted, HookType::Updated] {
		let state = state.clone();
		inject_hook(
			hook_type,
			Rc::new(move || {
				state.cache_subtree();
				Ok(())
			}),
			Some(instance),
			false,
		);
	}
	let unmounting = state.clone();
	inject_hook(
		HookType::BeforeUnmount,
		Rc::new(move || {
			unmounting.before_unmount();
			Ok(())
		}),
		Some(instance),
		false,
	);

	Box::new(move |instance| state.render(instance))
}

/// Register an activation hook on `target` (default: the current instance)
///
/// The hook does nothing while `target` or any of its ancestors is
/// deactivated. It is also prepended onto every keep-alive root above the
/// target, so activating an outer keep-alive reaches nested components;
/// those copies are removed when the target unmounts.
pub fn register_keep_alive_hook(
	hook_type: HookType,
	hook: LifecycleHook,
	target: Option<&ComponentInstance>,
) -> Option<HookId> {
	let target = target.cloned().or_else(current_instance)?;
	let owner = target.downgrade();
	let guarded: LifecycleHook = Rc::new(move || {
		let mut current = owner.upgrade();
		while let Some(instance) = current {
			if instance.is_deactivated() {
				return Ok(());
			}
			current = instance.parent();
		}
		hook()
	});
	let id = inject_hook(hook_type, guarded.clone(), Some(&target), false)?;

	let mut current = target.parent();
	while let Some(instance) = current {
		let parent = instance.parent();
		if parent.as_ref().is_some_and(ComponentInstance::is_keep_alive) {
			inject_to_keep_alive_root(hook_type, guarded.clone(), &target, &instance);
		}
		current = parent;
	}
	Some(id)
}

fn inject_to_keep_alive_root(
	hook_type: HookType,
	hook: LifecycleHook,
	target: &ComponentInstance,
	root: &ComponentInstance,
) {
	let Some(injected) = inject_hook(hook_type, hook, Some(root), true) else {
		return;
	};
	let root = root.downgrade();
	inject_hook(
		HookType::Unmounted,
		Rc::new(move || {
			if let Some(root) = root.upgrade() {
				remove_hook(hook_type, injected, &root);
			}
			Ok(())
		}),
		Some(target),
		false,
	);
}

fn infallible(hook: impl Fn() + 'static) -> LifecycleHook {
	Rc::new(move || -> Result<(), RuntimeError> {
		hook();
		Ok(())
	})
}

/// Run `hook` whenever the current instance is re-activated from a cache
pub fn on_activated(hook: impl Fn() + 'static) -> Option<HookId> {
	register_keep_alive_hook(HookType::Activated, infallible(hook), None)
}

/// Run `hook` whenever the current instance is moved into a cache
pub fn on_deactivated(hook: impl Fn() + 'static) -> Option<HookId> {
	register_keep_alive_hook(HookType::Deactivated, infallible(hook), None)
}
