//! A host renderer over [`MemoryNode`] trees
//!
//! Children are patched by position; there is no keyed diff. Every host
//! operation is appended to an op log so tests can tell a remount from a
//! reuse.

use core::cell::RefCell;
use std::rc::{Rc, Weak};

use kindle_runtime::component::{
	AppContext, ComponentInstance, render_component_root, setup_component,
};
use kindle_runtime::lifecycle::{HookType, invoke_hooks, queue_hooks};
use kindle_runtime::renderer::{MoveType, PatchContext, RendererInternals, setup_render_effect};
use kindle_runtime::scheduler::{
	SchedulerJob, flush_post_flush_cbs, flush_pre_flush_cbs, invalidate_job, queue_post_flush_cb,
};
use kindle_runtime::vnode::{HostNode, ShapeFlags, VNode, VNodeType, is_same_vnode_type};

use crate::node::{self, MemoryNode, memory};

/// One host operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOp {
	/// An element (by tag), `#text` or `#comment` was created
	Create(String),
	Insert,
	Remove,
	SetText(String),
}

/// In-memory renderer
pub struct MemoryRenderer {
	this: Weak<MemoryRenderer>,
	app: AppContext,
	ops: RefCell<Vec<HostOp>>,
	roots: RefCell<Vec<(HostNode, VNode)>>,
}

impl MemoryRenderer {
	pub fn new() -> Rc<Self> {
		Self::with_app(AppContext::new())
	}

	/// A renderer whose root components use `app`
	pub fn with_app(app: AppContext) -> Rc<Self> {
		Rc::new_cyclic(|this| Self {
			this: this.clone(),
			app,
			ops: RefCell::new(Vec::new()),
			roots: RefCell::new(Vec::new()),
		})
	}

	/// A detached root container
	pub fn root(&self) -> HostNode {
		MemoryNode::element("root")
	}

	/// Render `vnode` into `container`, or unmount what is there when
	/// `vnode` is `None`, then run pre and post jobs.
	pub fn render(&self, vnode: Option<&VNode>, container: &HostNode) {
		let previous = self.root_vnode(container);
		match vnode {
			Some(vnode) => {
				self.patch(previous.as_ref(), vnode, container, None, None, &PatchContext::default());
				self.set_root_vnode(container, Some(vnode.clone()));
			}
			None => {
				if let Some(previous) = previous {
					self.unmount(&previous, None, true);
				}
				self.set_root_vnode(container, None);
			}
		}
		flush_pre_flush_cbs(None);
		flush_post_flush_cbs();
	}

	pub fn ops(&self) -> Vec<HostOp> {
		self.ops.borrow().clone()
	}

	pub fn clear_ops(&self) {
		self.ops.borrow_mut().clear();
	}

	/// How many `tag` elements were created since the log was cleared
	pub fn created(&self, tag: &str) -> usize {
		self.ops
			.borrow()
			.iter()
			.filter(|op| matches!(op, HostOp::Create(created) if created == tag))
			.count()
	}

	fn log(&self, op: HostOp) {
		self.ops.borrow_mut().push(op);
	}

	fn root_vnode(&self, container: &HostNode) -> Option<VNode> {
		self.roots
			.borrow()
			.iter()
			.find(|(root, _)| root.ptr_eq(container))
			.map(|(_, vnode)| vnode.clone())
	}

	fn set_root_vnode(&self, container: &HostNode, vnode: Option<VNode>) {
		let mut roots = self.roots.borrow_mut();
		roots.retain(|(root, _)| !root.ptr_eq(container));
		if let Some(vnode) = vnode {
			roots.push((container.clone(), vnode));
		}
	}

	fn insert(&self, node: &HostNode, container: &HostNode, anchor: Option<&HostNode>) {
		node::insert(node, container, anchor);
		self.log(HostOp::Insert);
	}

	fn remove(&self, node: &HostNode) {
		if node::remove(node) {
			self.log(HostOp::Remove);
		}
	}

	fn create_text(&self, text: &str) -> HostNode {
		self.log(HostOp::Create("#text".into()));
		MemoryNode::text(text.into())
	}

	/// First host node after everything `vnode` rendered
	fn next_host_node(&self, vnode: &VNode) -> Option<HostNode> {
		if let Some(instance) = vnode.component_instance() {
			return instance.subtree().and_then(|subtree| self.next_host_node(&subtree));
		}
		vnode.anchor().or_else(|| vnode.el()).and_then(|node| node::next_sibling(&node))
	}

	fn process_text(&self, old: Option<&VNode>, new: &VNode, container: &HostNode, anchor: Option<&HostNode>) {
		let text = new.text_content().unwrap_or_default();
		match old {
			None => {
				let el = match new.node_type() {
					VNodeType::Comment => {
						self.log(HostOp::Create("#comment".into()));
						MemoryNode::comment(text.into())
					}
					_ => self.create_text(text),
				};
				self.insert(&el, container, anchor);
				new.set_el(Some(el));
			}
			Some(old) => {
				let el = old.el();
				if let Some(el) = &el
					&& old.text_content() != new.text_content()
					&& matches!(new.node_type(), VNodeType::Text)
				{
					node::set_text(el, text.into());
					self.log(HostOp::SetText(text.into()));
				}
				new.set_el(el);
			}
		}
	}

	fn process_element(
		&self,
		old: Option<&VNode>,
		new: &VNode,
		container: &HostNode,
		anchor: Option<&HostNode>,
		parent: Option<&ComponentInstance>,
		ctx: &PatchContext,
	) {
		let VNodeType::Element(tag) = new.node_type() else {
			return;
		};
		match old {
			None => {
				let el = self.create_element(tag);
				node::set_attrs(&el, new.props());
				new.set_el(Some(el.clone()));
				for child in new.children() {
					self.patch(None, child, &el, None, parent, ctx);
				}
				self.insert(&el, container, anchor);
			}
			Some(old) => {
				let Some(el) = old.el() else {
					return;
				};
				if old.props() != new.props() {
					node::set_attrs(&el, new.props());
				}
				new.set_el(Some(el.clone()));
				self.patch_children(old, new, &el, None, parent, ctx);
			}
		}
	}

	fn process_fragment(
		&self,
		old: Option<&VNode>,
		new: &VNode,
		container: &HostNode,
		anchor: Option<&HostNode>,
		parent: Option<&ComponentInstance>,
		ctx: &PatchContext,
	) {
		match old {
			None => {
				let (start, end) = (self.create_text(""), self.create_text(""));
				self.insert(&start, container, anchor);
				self.insert(&end, container, anchor);
				new.set_el(Some(start));
				new.set_anchor(Some(end.clone()));
				for child in new.children() {
					self.patch(None, child, container, Some(&end), parent, ctx);
				}
			}
			Some(old) => {
				new.set_el(old.el());
				new.set_anchor(old.anchor());
				let end = old.anchor();
				self.patch_children(old, new, container, end.as_ref(), parent, ctx);
			}
		}
	}

	fn patch_children(
		&self,
		old: &VNode,
		new: &VNode,
		container: &HostNode,
		anchor: Option<&HostNode>,
		parent: Option<&ComponentInstance>,
		ctx: &PatchContext,
	) {
		let (old_children, new_children) = (old.children(), new.children());
		let common = old_children.len().min(new_children.len());
		for (old_child, new_child) in old_children.iter().zip(new_children) {
			self.patch(Some(old_child), new_child, container, anchor, parent, ctx);
		}
		for stale in &old_children[common..] {
			self.unmount(stale, parent, true);
		}
		for added in &new_children[common..] {
			self.patch(None, added, container, anchor, parent, ctx);
		}
	}

	fn process_component(
		&self,
		old: Option<&VNode>,
		new: &VNode,
		container: &HostNode,
		anchor: Option<&HostNode>,
		parent: Option<&ComponentInstance>,
		ctx: &PatchContext,
	) {
		match old {
			Some(old) => self.update_component(old, new),
			None if new.has_flag(ShapeFlags::COMPONENT_KEPT_ALIVE) => {
				match parent.and_then(ComponentInstance::keep_alive_context) {
					Some(keep_alive) => keep_alive.activate(new, container, anchor, ctx),
					None => tracing::warn!(target: "kindle::testkit", "kept-alive vnode outside a keep-alive"),
				}
			}
			None => self.mount_component(new, container, anchor, parent),
		}
	}

	fn mount_component(
		&self,
		vnode: &VNode,
		container: &HostNode,
		anchor: Option<&HostNode>,
		parent: Option<&ComponentInstance>,
	) {
		let app = parent.is_none().then(|| self.app.clone());
		let instance = ComponentInstance::new(vnode, parent, app);
		vnode.set_component(Some(instance.clone()));
		if let Some(this) = self.this.upgrade() {
			instance.bind_renderer(this);
		}
		setup_component(&instance);

		let renderer = self.this.clone();
		let (container, anchor) = (container.clone(), anchor.cloned());
		setup_render_effect(&instance, move |instance| {
			if let Some(renderer) = renderer.upgrade() {
				renderer.component_update(instance, &container, anchor.as_ref());
			}
		});
	}

	fn component_update(&self, instance: &ComponentInstance, container: &HostNode, anchor: Option<&HostNode>) {
		let ctx = PatchContext::default();
		if !instance.is_mounted() {
			invoke_hooks(instance, HookType::BeforeMount);
			let subtree = render_component_root(instance);
			self.patch(None, &subtree, container, anchor, Some(instance), &ctx);
			instance.vnode().set_el(subtree.el());
			instance.set_subtree(Some(subtree));
			queue_hooks(instance, HookType::Mounted);

			let kept_alive = |vnode: VNode| vnode.has_flag(ShapeFlags::COMPONENT_SHOULD_KEEP_ALIVE);
			let wrapped_kept_alive = instance
				.parent()
				.is_some_and(|parent| parent.def().as_async().is_some() && kept_alive(parent.vnode()));
			if kept_alive(instance.vnode()) || wrapped_kept_alive {
				queue_hooks(instance, HookType::Activated);
			}
			instance.set_mounted(true);
			return;
		}

		if let Some(next) = instance.take_next() {
			next.set_el(instance.vnode().el());
			instance.set_vnode(next.clone());
			instance.update_props(next.props());
			flush_pre_flush_cbs(Some(instance.uid()));
		}
		invoke_hooks(instance, HookType::BeforeUpdate);
		let previous = instance.subtree();
		let next_tree = render_component_root(instance);
		let container = previous
			.as_ref()
			.and_then(VNode::el)
			.and_then(|el| node::parent_of(&el))
			.unwrap_or_else(|| container.clone());
		let anchor = previous.as_ref().and_then(|previous| self.next_host_node(previous));
		self.patch(previous.as_ref(), &next_tree, &container, anchor.as_ref(), Some(instance), &ctx);
		instance.vnode().set_el(next_tree.el());
		instance.set_subtree(Some(next_tree));
		queue_hooks(instance, HookType::Updated);
	}

	fn update_component(&self, old: &VNode, new: &VNode) {
		let Some(instance) = old.component_instance() else {
			return;
		};
		new.set_component(Some(instance.clone()));
		let changed = old.props() != new.props()
			|| !old.children().is_empty()
			|| !new.children().is_empty();
		if !changed {
			new.set_el(old.el());
			instance.set_vnode(new.clone());
			return;
		}
		instance.set_next(Some(new.clone()));
		if let Some(job) = instance.update_job() {
			invalidate_job(&job);
			job.run();
		}
	}

	fn unmount_component(&self, instance: &ComponentInstance, do_remove: bool) {
		invoke_hooks(instance, HookType::BeforeUnmount);
		instance.scope().stop();
		if let Some(job) = instance.update_job() {
			job.set_active(false);
		}
		if let Some(subtree) = instance.subtree() {
			self.unmount(&subtree, Some(instance), do_remove);
		}
		queue_hooks(instance, HookType::Unmounted);
		let unmounted = instance.clone();
		queue_post_flush_cb(SchedulerJob::new(move || {
			unmounted.set_unmounted(true);
			unmounted.release();
		}));
	}
}

impl RendererInternals for MemoryRenderer {
	fn patch(
		&self,
		old: Option<&VNode>,
		new: &VNode,
		container: &HostNode,
		anchor: Option<&HostNode>,
		parent: Option<&ComponentInstance>,
		ctx: &PatchContext,
	) {
		if old.is_some_and(|old| old.ptr_eq(new)) {
			return;
		}
		let mut old = old;
		let mut next_anchor = anchor.cloned();
		if let Some(replaced) = old
			&& !is_same_vnode_type(replaced, new)
		{
			next_anchor = self.next_host_node(replaced);
			self.unmount(replaced, parent, true);
			old = None;
		}
		let anchor = next_anchor.as_ref();

		match new.node_type() {
			VNodeType::Text | VNodeType::Comment => self.process_text(old, new, container, anchor),
			VNodeType::Element(_) => self.process_element(old, new, container, anchor, parent, ctx),
			VNodeType::Fragment => self.process_fragment(old, new, container, anchor, parent, ctx),
			VNodeType::Component(_) => self.process_component(old, new, container, anchor, parent, ctx),
		}
	}

	fn move_node(&self, vnode: &VNode, container: &HostNode, anchor: Option<&HostNode>, move_type: MoveType) {
		if let Some(instance) = vnode.component_instance() {
			if let Some(subtree) = instance.subtree() {
				self.move_node(&subtree, container, anchor, move_type);
			}
			return;
		}
		if matches!(vnode.node_type(), VNodeType::Fragment) {
			if let Some(start) = vnode.el() {
				self.insert(&start, container, anchor);
			}
			for child in vnode.children() {
				self.move_node(child, container, anchor, move_type);
			}
			if let Some(end) = vnode.anchor() {
				self.insert(&end, container, anchor);
			}
			return;
		}
		if let Some(el) = vnode.el() {
			self.insert(&el, container, anchor);
		}
	}

	fn unmount(&self, vnode: &VNode, parent: Option<&ComponentInstance>, do_remove: bool) {
		if vnode.has_flag(ShapeFlags::COMPONENT_SHOULD_KEEP_ALIVE)
			&& let Some(keep_alive) = parent.and_then(ComponentInstance::keep_alive_context)
		{
			keep_alive.deactivate(vnode);
			return;
		}
		match vnode.node_type() {
			VNodeType::Component(_) => {
				if let Some(instance) = vnode.component_instance() {
					self.unmount_component(&instance, do_remove);
				}
			}
			VNodeType::Fragment => {
				for child in vnode.children() {
					self.unmount(child, parent, do_remove);
				}
				if do_remove {
					for edge in [vnode.el(), vnode.anchor()].into_iter().flatten() {
						self.remove(&edge);
					}
				}
			}
			VNodeType::Element(_) => {
				for child in vnode.children() {
					self.unmount(child, parent, false);
				}
				if do_remove && let Some(el) = vnode.el() {
					self.remove(&el);
				}
			}
			VNodeType::Text | VNodeType::Comment => {
				if do_remove && let Some(el) = vnode.el() {
					self.remove(&el);
				}
			}
		}
	}

	fn create_element(&self, tag: &str) -> HostNode {
		self.log(HostOp::Create(tag.into()));
		MemoryNode::element(tag)
	}
}

/// Text content of a host subtree, for assertions
pub fn text_of(node: &HostNode) -> String {
	let Some(data) = memory(node) else {
		return String::new();
	};
	match data.kind() {
		crate::node::NodeKind::Element(_) => data.children().iter().map(text_of).collect(),
		_ => data.text_content().to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::node::inner_html;
	use kindle_reactive::{Signal, Value};
	use kindle_runtime::component::ComponentDef;
	use kindle_runtime::lifecycle::{on_mounted, on_unmounted};
	use kindle_runtime::scheduler::flush_jobs;
	use kindle_runtime::vnode::{Props, props};
	use serial_test::serial;

	fn el(tag: &str, children: Vec<VNode>) -> VNode {
		VNode::element(tag, Props::new(), children)
	}

	#[test]
	#[serial]
	fn test_mount_and_patch_elements() {
		let renderer = MemoryRenderer::new();
		let root = renderer.root();

		renderer.render(Some(&el("div", vec![VNode::text("a"), VNode::text("b")])), &root);
		assert_eq!(inner_html(&root), "<div>ab</div>");

		renderer.clear_ops();
		renderer.render(Some(&el("div", vec![VNode::text("c")])), &root);
		assert_eq!(inner_html(&root), "<div>c</div>");
		assert_eq!(renderer.created("div"), 0);
	}

	#[test]
	#[serial]
	fn test_component_updates_through_scheduler() {
		let count = Signal::new(0);
		let reader = count.clone();
		let def = ComponentDef::from_render("Counter", move |_| {
			VNode::element("span", props([("n", Value::from(reader.get()))]), vec![VNode::text(reader.get().to_string())])
		});
		let renderer = MemoryRenderer::new();
		let root = renderer.root();
		renderer.render(Some(&VNode::component(&def, Props::new(), Vec::new())), &root);
		assert_eq!(inner_html(&root), "<span n=\"0\">0</span>");

		count.set(1);
		count.set(2);
		flush_jobs();

		assert_eq!(inner_html(&root), "<span n=\"2\">2</span>");
		assert_eq!(renderer.created("span"), 1);
	}

	#[test]
	#[serial]
	fn test_unmount_runs_hooks_and_removes_nodes() {
		let log = Rc::new(RefCell::new(Vec::new()));
		let sink = log.clone();
		let def = ComponentDef::new("Tracked", move |_| {
			let (a, b) = (sink.clone(), sink.clone());
			on_mounted(move || a.borrow_mut().push("mounted"));
			on_unmounted(move || b.borrow_mut().push("unmounted"));
			Box::new(|_| VNode::fragment(vec![VNode::text("x"), VNode::text("y")]))
		});
		let renderer = MemoryRenderer::new();
		let root = renderer.root();

		renderer.render(Some(&VNode::component(&def, Props::new(), Vec::new())), &root);
		assert_eq!(text_of(&root), "xy");
		renderer.render(None, &root);

		assert_eq!(inner_html(&root), "");
		assert_eq!(*log.borrow(), vec!["mounted", "unmounted"]);
	}
}
