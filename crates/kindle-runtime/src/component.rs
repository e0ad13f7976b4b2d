//! Components and component instances
//!
//! A [`ComponentDef`] is a named setup function. Setup runs once per
//! mounted instance and returns the render function the instance calls on
//! every update. Each [`ComponentInstance`] owns a detached
//! [`EffectScope`]: its render effect, watchers and scope-dispose callbacks
//! all stop when the instance unmounts.

use core::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use kindle_reactive::{
	Effect, EffectScope, NodeId, Value, dev_warn, shallow_reactive, untracked,
};

use crate::async_component::AsyncLoader;
use crate::error::RuntimeError;
use crate::keep_alive::KeepAliveContext;
use crate::lifecycle::{ErrorCapturedHook, HookId, HookType};
use crate::renderer::RendererInternals;
use crate::scheduler::SchedulerJob;
use crate::vnode::{Props, VNode};

/// Produces the root vnode of an instance
pub type RenderFn = Box<dyn FnMut(&ComponentInstance) -> VNode>;

/// Runs once per instance and returns its render function
pub type SetupFn = Rc<dyn Fn(&ComponentInstance) -> RenderFn>;

/// App-level error handler: `(error, instance, info)`
pub type AppErrorHandler = Rc<dyn Fn(&RuntimeError, Option<&ComponentInstance>, &str)>;

/// App-level warning handler
pub type AppWarnHandler = Rc<dyn Fn(&str)>;

pub(crate) enum ComponentMarker {
	Plain,
	KeepAlive,
	AsyncWrapper(AsyncLoader),
}

struct ComponentDefInner {
	id: NodeId,
	name: Option<Rc<str>>,
	setup: SetupFn,
	marker: ComponentMarker,
}

/// A component definition
///
/// Definitions compare by identity: two vnodes are the same component
/// only if they share the definition.
#[derive(Clone)]
pub struct ComponentDef(Rc<ComponentDefInner>);

impl ComponentDef {
	/// A named component from its setup function
	pub fn new<F>(name: &str, setup: F) -> Self
	where
		F: Fn(&ComponentInstance) -> RenderFn + 'static,
	{
		Self::with_marker(Some(name.into()), Rc::new(setup), ComponentMarker::Plain)
	}

	/// A component without setup state
	pub fn from_render<F>(name: &str, render: F) -> Self
	where
		F: Fn(&ComponentInstance) -> VNode + 'static,
	{
		let render = Rc::new(render);
		Self::new(name, move |_| {
			let render = render.clone();
			Box::new(move |instance| render(instance))
		})
	}

	pub(crate) fn with_marker(
		name: Option<Rc<str>>,
		setup: SetupFn,
		marker: ComponentMarker,
	) -> Self {
		Self(Rc::new(ComponentDefInner {
			id: NodeId::new(),
			name,
			setup,
			marker,
		}))
	}

	pub fn id(&self) -> NodeId {
		self.0.id
	}

	pub fn name(&self) -> Option<&str> {
		self.0.name.as_deref()
	}

	/// Name used for keep-alive matching; async wrappers report the
	/// component they resolved to
	pub fn display_name(&self) -> Option<Rc<str>> {
		match &self.0.marker {
			ComponentMarker::AsyncWrapper(loader) => loader
				.resolved()
				.and_then(|resolved| resolved.0.name.clone()),
			_ => self.0.name.clone(),
		}
	}

	pub fn is_keep_alive(&self) -> bool {
		matches!(self.0.marker, ComponentMarker::KeepAlive)
	}

	/// The loader of an async wrapper
	pub fn as_async(&self) -> Option<&AsyncLoader> {
		match &self.0.marker {
			ComponentMarker::AsyncWrapper(loader) => Some(loader),
			_ => None,
		}
	}

	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}

	fn setup_fn(&self) -> SetupFn {
		self.0.setup.clone()
	}
}

impl fmt::Debug for ComponentDef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ComponentDef")
			.field("id", &self.0.id)
			.field("name", &self.0.name)
			.finish()
	}
}

/// Application-wide configuration
#[derive(Clone, Default)]
pub struct AppConfig {
	pub error_handler: Option<AppErrorHandler>,
	pub warn_handler: Option<AppWarnHandler>,
}

/// Shared by every instance of one application
#[derive(Clone, Default)]
pub struct AppContext {
	config: Rc<RefCell<AppConfig>>,
}

impl AppContext {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn config(&self) -> AppConfig {
		self.config.borrow().clone()
	}

	pub fn set_error_handler<F>(&self, handler: F)
	where
		F: Fn(&RuntimeError, Option<&ComponentInstance>, &str) + 'static,
	{
		self.config.borrow_mut().error_handler = Some(Rc::new(handler));
	}

	/// Route development warnings of this thread to `handler`
	pub fn set_warn_handler<F>(&self, handler: F)
	where
		F: Fn(&str) + 'static,
	{
		let handler: AppWarnHandler = Rc::new(handler);
		self.config.borrow_mut().warn_handler = Some(handler.clone());
		kindle_reactive::logging::set_warn_handler(move |msg| handler(msg));
	}

	pub fn error_handler(&self) -> Option<AppErrorHandler> {
		self.config.borrow().error_handler.clone()
	}
}

type HookList = Vec<(HookId, Rc<dyn Fn()>)>;

struct InstanceInner {
	uid: u64,
	def: ComponentDef,
	vnode: RefCell<VNode>,
	next: RefCell<Option<VNode>>,
	parent: Option<WeakInstance>,
	app: AppContext,
	scope: EffectScope,
	props: Value,
	render: RefCell<Option<RenderFn>>,
	subtree: RefCell<Option<VNode>>,
	update: RefCell<Option<SchedulerJob>>,
	effect: RefCell<Option<Effect>>,
	hooks: RefCell<HashMap<HookType, HookList>>,
	error_captured: RefCell<Vec<ErrorCapturedHook>>,
	is_mounted: Cell<bool>,
	is_unmounted: Cell<bool>,
	is_deactivated: Cell<bool>,
	renderer: RefCell<Option<Rc<dyn RendererInternals>>>,
	keep_alive: RefCell<Option<KeepAliveContext>>,
}

thread_local! {
	static NEXT_UID: Cell<u64> = const { Cell::new(0) };
	static CURRENT_INSTANCE: RefCell<Option<ComponentInstance>> = const { RefCell::new(None) };
}

/// A mounted component
///
/// Uids grow with creation order, so a parent always has a smaller uid
/// than its children; the scheduler relies on this to update parents
/// first.
#[derive(Clone)]
pub struct ComponentInstance(Rc<InstanceInner>);

impl ComponentInstance {
	/// Create the instance for a component vnode
	///
	/// The app context is inherited from `parent`, else `app`, else fresh.
	pub fn new(vnode: &VNode, parent: Option<&ComponentInstance>, app: Option<AppContext>) -> Self {
		let def = match vnode.component_def() {
			Some(def) => def.clone(),
			None => {
				dev_warn!("Component instance created for a non-component vnode {:?}", vnode);
				ComponentDef::from_render("Invalid", |_| VNode::comment(""))
			}
		};
		let uid = NEXT_UID.with(|next| {
			let uid = next.get();
			next.set(uid + 1);
			uid
		});
		let app = parent
			.map(|p| p.app_context())
			.or(app)
			.unwrap_or_default();
		let props = shallow_reactive(Value::object(
			vnode.props().iter().map(|(k, v)| (k.clone(), v.clone())),
		));

		Self(Rc::new(InstanceInner {
			uid,
			def,
			vnode: RefCell::new(vnode.clone()),
			next: RefCell::new(None),
			parent: parent.map(ComponentInstance::downgrade),
			app,
			scope: EffectScope::detached(),
			props,
			render: RefCell::new(None),
			subtree: RefCell::new(None),
			update: RefCell::new(None),
			effect: RefCell::new(None),
			hooks: RefCell::new(HashMap::new()),
			error_captured: RefCell::new(Vec::new()),
			is_mounted: Cell::new(false),
			is_unmounted: Cell::new(false),
			is_deactivated: Cell::new(false),
			renderer: RefCell::new(None),
			keep_alive: RefCell::new(None),
		}))
	}

	pub fn uid(&self) -> u64 {
		self.0.uid
	}

	pub fn def(&self) -> &ComponentDef {
		&self.0.def
	}

	/// The vnode this instance is currently mounted for
	pub fn vnode(&self) -> VNode {
		self.0.vnode.borrow().clone()
	}

	pub fn set_vnode(&self, vnode: VNode) {
		*self.0.vnode.borrow_mut() = vnode;
	}

	/// Vnode handed down by a parent update, applied on the next render
	pub fn set_next(&self, vnode: Option<VNode>) {
		*self.0.next.borrow_mut() = vnode;
	}

	pub fn take_next(&self) -> Option<VNode> {
		self.0.next.borrow_mut().take()
	}

	pub fn parent(&self) -> Option<ComponentInstance> {
		self.0.parent.as_ref().and_then(WeakInstance::upgrade)
	}

	pub fn app_context(&self) -> AppContext {
		self.0.app.clone()
	}

	pub fn scope(&self) -> &EffectScope {
		&self.0.scope
	}

	/// Shallow-reactive props object
	pub fn props(&self) -> &Value {
		&self.0.props
	}

	/// Sync the props object with `next`, triggering only changed keys
	pub fn update_props(&self, next: &Props) {
		let Some(proxy) = self.0.props.as_proxy() else {
			return;
		};
		untracked(|| {
			for (key, value) in next {
				if let Err(err) = proxy.set(&Value::Str(key.clone()), value.clone()) {
					tracing::warn!(target: "kindle", uid = self.0.uid, "prop update failed: {err}");
				}
			}
			for key in proxy.own_keys() {
				let stale = matches!(&key, Value::Str(name) if !next.contains_key(name));
				if stale && let Err(err) = proxy.delete(&key) {
					tracing::debug!(target: "kindle", uid = self.0.uid, "stale prop removal failed: {err}");
				}
			}
		});
	}

	/// Default slot: the children of the component vnode
	pub fn slots(&self) -> Vec<VNode> {
		self.0.vnode.borrow().children().to_vec()
	}

	pub fn subtree(&self) -> Option<VNode> {
		self.0.subtree.borrow().clone()
	}

	pub fn set_subtree(&self, subtree: Option<VNode>) {
		*self.0.subtree.borrow_mut() = subtree;
	}

	/// Job that re-renders this instance
	pub fn update_job(&self) -> Option<SchedulerJob> {
		self.0.update.borrow().clone()
	}

	pub fn set_update_job(&self, job: SchedulerJob) {
		*self.0.update.borrow_mut() = Some(job);
	}

	pub fn effect(&self) -> Option<Effect> {
		self.0.effect.borrow().clone()
	}

	pub fn set_effect(&self, effect: Effect) {
		*self.0.effect.borrow_mut() = Some(effect);
	}

	pub fn is_mounted(&self) -> bool {
		self.0.is_mounted.get()
	}

	pub fn set_mounted(&self, mounted: bool) {
		self.0.is_mounted.set(mounted);
	}

	pub fn is_unmounted(&self) -> bool {
		self.0.is_unmounted.get()
	}

	pub fn set_unmounted(&self, unmounted: bool) {
		self.0.is_unmounted.set(unmounted);
	}

	pub fn is_deactivated(&self) -> bool {
		self.0.is_deactivated.get()
	}

	pub fn set_deactivated(&self, deactivated: bool) {
		self.0.is_deactivated.set(deactivated);
	}

	/// Give the instance access to the renderer that mounts it
	pub fn bind_renderer(&self, renderer: Rc<dyn RendererInternals>) {
		*self.0.renderer.borrow_mut() = Some(renderer);
	}

	pub fn renderer(&self) -> Option<Rc<dyn RendererInternals>> {
		self.0.renderer.borrow().clone()
	}

	/// Activation context, present on keep-alive instances
	pub fn keep_alive_context(&self) -> Option<KeepAliveContext> {
		self.0.keep_alive.borrow().clone()
	}

	pub(crate) fn set_keep_alive_context(&self, context: KeepAliveContext) {
		*self.0.keep_alive.borrow_mut() = Some(context);
	}

	pub fn is_keep_alive(&self) -> bool {
		self.0.def.is_keep_alive()
	}

	/// Drop the render state of an unmounted instance
	pub fn release(&self) {
		self.0.render.borrow_mut().take();
		self.0.subtree.borrow_mut().take();
		self.0.effect.borrow_mut().take();
		self.0.next.borrow_mut().take();
		self.0.hooks.borrow_mut().clear();
		self.0.error_captured.borrow_mut().clear();
	}

	pub(crate) fn add_hook(&self, hook_type: HookType, id: HookId, hook: Rc<dyn Fn()>, prepend: bool) {
		let mut hooks = self.0.hooks.borrow_mut();
		let list = hooks.entry(hook_type).or_default();
		if prepend {
			list.insert(0, (id, hook));
		} else {
			list.push((id, hook));
		}
	}

	pub(crate) fn remove_hook(&self, hook_type: HookType, id: HookId) -> bool {
		let mut hooks = self.0.hooks.borrow_mut();
		let Some(list) = hooks.get_mut(&hook_type) else {
			return false;
		};
		let before = list.len();
		list.retain(|(hook_id, _)| *hook_id != id);
		list.len() != before
	}

	pub(crate) fn hooks(&self, hook_type: HookType) -> Vec<Rc<dyn Fn()>> {
		self.0
			.hooks
			.borrow()
			.get(&hook_type)
			.map(|list| list.iter().map(|(_, hook)| hook.clone()).collect())
			.unwrap_or_default()
	}

	/// Number of hooks of one type registered on this instance
	pub fn hook_count(&self, hook_type: HookType) -> usize {
		match hook_type {
			HookType::ErrorCaptured => self.0.error_captured.borrow().len(),
			_ => self
				.0
				.hooks
				.borrow()
				.get(&hook_type)
				.map_or(0, Vec::len),
		}
	}

	pub(crate) fn add_error_captured(&self, hook: ErrorCapturedHook) {
		self.0.error_captured.borrow_mut().push(hook);
	}

	pub(crate) fn error_captured_hooks(&self) -> Vec<ErrorCapturedHook> {
		self.0.error_captured.borrow().clone()
	}

	pub fn downgrade(&self) -> WeakInstance {
		WeakInstance(Rc::downgrade(&self.0))
	}

	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

impl fmt::Debug for ComponentInstance {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ComponentInstance")
			.field("uid", &self.0.uid)
			.field("component", &self.0.def.name())
			.field("mounted", &self.0.is_mounted.get())
			.field("deactivated", &self.0.is_deactivated.get())
			.finish()
	}
}

/// Non-owning [`ComponentInstance`]
#[derive(Clone)]
pub struct WeakInstance(Weak<InstanceInner>);

impl WeakInstance {
	pub fn upgrade(&self) -> Option<ComponentInstance> {
		self.0.upgrade().map(ComponentInstance)
	}
}

/// The instance whose setup, render or hook is running
pub fn current_instance() -> Option<ComponentInstance> {
	CURRENT_INSTANCE.with(|current| current.borrow().clone())
}

/// Replace the current instance, returning the previous one
pub fn set_current_instance(instance: Option<ComponentInstance>) -> Option<ComponentInstance> {
	CURRENT_INSTANCE.with(|current| core::mem::replace(&mut *current.borrow_mut(), instance))
}

/// Run `f` with `instance` as the current instance
pub fn with_current_instance<R>(instance: &ComponentInstance, f: impl FnOnce() -> R) -> R {
	struct Restore(Option<ComponentInstance>);
	impl Drop for Restore {
		fn drop(&mut self) {
			let previous = self.0.take();
			let _ = CURRENT_INSTANCE.try_with(|current| *current.borrow_mut() = previous);
		}
	}

	let _restore = Restore(set_current_instance(Some(instance.clone())));
	f()
}

/// Run the component's setup inside the instance scope
pub fn setup_component(instance: &ComponentInstance) {
	let setup = instance.def().setup_fn();
	let render = instance
		.scope()
		.run(|| with_current_instance(instance, || untracked(|| setup(instance))));
	*instance.0.render.borrow_mut() = render;
}

/// Call the render function with the instance current
pub fn render_component_root(instance: &ComponentInstance) -> VNode {
	with_current_instance(instance, || {
		let Ok(mut render) = instance.0.render.try_borrow_mut() else {
			dev_warn!(
				"Component <{}> rendered itself recursively",
				instance.def().name().unwrap_or("Anonymous")
			);
			return VNode::comment("");
		};
		match render.as_mut() {
			Some(render) => render(instance),
			None => VNode::comment(""),
		}
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::vnode::props;
	use kindle_reactive::Effect;
	use serial_test::serial;

	fn instance_of(def: &ComponentDef, props: Props) -> ComponentInstance {
		let vnode = VNode::component(def, props, Vec::new());
		ComponentInstance::new(&vnode, None, None)
	}

	#[test]
	#[serial]
	fn test_children_get_larger_uids() {
		let def = ComponentDef::from_render("Leaf", |_| VNode::text("leaf"));
		let parent = instance_of(&def, Props::new());
		let child = ComponentInstance::new(
			&VNode::component(&def, Props::new(), Vec::new()),
			Some(&parent),
			None,
		);

		assert!(child.uid() > parent.uid());
		assert!(child.parent().is_some_and(|p| p.ptr_eq(&parent)));
	}

	#[test]
	#[serial]
	fn test_setup_runs_with_current_instance() {
		let seen: Rc<RefCell<Option<u64>>> = Rc::default();
		let sink = seen.clone();
		let def = ComponentDef::new("Current", move |_| {
			*sink.borrow_mut() = current_instance().map(|i| i.uid());
			Box::new(|_| VNode::text("mounted"))
		});
		let instance = instance_of(&def, Props::new());

		setup_component(&instance);

		assert_eq!(*seen.borrow(), Some(instance.uid()));
		assert!(current_instance().is_none());
		let root = render_component_root(&instance);
		assert_eq!(root.text_content(), Some("mounted"));
	}

	#[test]
	#[serial]
	fn test_update_props_triggers_changed_keys_only() {
		let def = ComponentDef::from_render("Label", |_| VNode::text(""));
		let instance = instance_of(&def, props([("msg", "hi"), ("id", "x")]));
		let reader = instance.props().clone();
		let runs = Rc::new(Cell::new(0));
		let counter = runs.clone();
		let _effect = Effect::new(move || {
			reader.get("msg");
			counter.set(counter.get() + 1);
		});

		instance.update_props(&props([("msg", "hi")]));
		assert_eq!(runs.get(), 1);
		assert!(!instance.props().has("id"));

		instance.update_props(&props([("msg", "bye")]));
		assert_eq!(runs.get(), 2);
	}

	#[test]
	#[serial]
	fn test_display_name_of_plain_component() {
		let def = ComponentDef::from_render("Foo", |_| VNode::text(""));

		assert_eq!(def.display_name().as_deref(), Some("Foo"));
		assert!(!def.is_keep_alive());
		assert!(def.as_async().is_none());
	}
}
