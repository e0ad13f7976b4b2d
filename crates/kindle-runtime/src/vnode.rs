//! Virtual nodes
//!
//! A [`VNode`] describes one node of a rendered tree: an element, text,
//! comment, fragment or component. Renderers record the host element,
//! fragment anchor and component instance on the vnode while mounting it;
//! those slots are interior-mutable because keep-alive moves them between
//! vnodes.

use core::cell::{Cell, RefCell};
use std::any::Any;
use std::fmt;
use std::rc::{Rc, Weak};

use bitflags::bitflags;
use indexmap::IndexMap;
use kindle_reactive::Value;

use crate::component::{ComponentDef, ComponentInstance};

/// Component and element properties
pub type Props = IndexMap<Rc<str>, Value>;

/// Build [`Props`] from key/value pairs
pub fn props<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Props
where
	K: Into<Rc<str>>,
	V: Into<Value>,
{
	pairs
		.into_iter()
		.map(|(k, v)| (k.into(), v.into()))
		.collect()
}

bitflags! {
	/// What a vnode is and how the renderer must treat it
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
	pub struct ShapeFlags: u16 {
		const ELEMENT = 1;
		const STATEFUL_COMPONENT = 1 << 2;
		const TEXT_CHILDREN = 1 << 3;
		const ARRAY_CHILDREN = 1 << 4;
		/// Unmounting deactivates instead (owned by a keep-alive)
		const COMPONENT_SHOULD_KEEP_ALIVE = 1 << 8;
		/// Mounting activates a cached instance instead
		const COMPONENT_KEPT_ALIVE = 1 << 9;
	}
}

/// Opaque handle to a node of the host tree
#[derive(Clone)]
pub struct HostNode(Rc<dyn Any>);

impl HostNode {
	pub fn new<T: Any>(node: T) -> Self {
		Self(Rc::new(node))
	}

	pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
		(*self.0).downcast_ref()
	}

	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}

	pub fn downgrade(&self) -> WeakHostNode {
		WeakHostNode(Rc::downgrade(&self.0))
	}
}

impl fmt::Debug for HostNode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "HostNode({:p})", Rc::as_ptr(&self.0))
	}
}

/// Non-owning [`HostNode`]
#[derive(Clone)]
pub struct WeakHostNode(Weak<dyn Any>);

impl WeakHostNode {
	pub fn upgrade(&self) -> Option<HostNode> {
		self.0.upgrade().map(HostNode)
	}
}

impl fmt::Debug for WeakHostNode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("WeakHostNode")
	}
}

/// The kind of a vnode
#[derive(Clone)]
pub enum VNodeType {
	Element(Rc<str>),
	Text,
	Comment,
	Fragment,
	Component(ComponentDef),
}

impl VNodeType {
	fn same(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Element(a), Self::Element(b)) => a == b,
			(Self::Text, Self::Text) | (Self::Comment, Self::Comment) => true,
			(Self::Fragment, Self::Fragment) => true,
			(Self::Component(a), Self::Component(b)) => a.ptr_eq(b),
			_ => false,
		}
	}
}

impl fmt::Debug for VNodeType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Element(tag) => write!(f, "<{tag}>"),
			Self::Text => f.write_str("Text"),
			Self::Comment => f.write_str("Comment"),
			Self::Fragment => f.write_str("Fragment"),
			Self::Component(def) => write!(f, "Component({})", def.name().unwrap_or("Anonymous")),
		}
	}
}

struct VNodeInner {
	node_type: VNodeType,
	key: Option<Value>,
	props: Props,
	children: Vec<VNode>,
	text: Option<Rc<str>>,
	shape_flag: Cell<ShapeFlags>,
	el: RefCell<Option<HostNode>>,
	anchor: RefCell<Option<HostNode>>,
	component: RefCell<Option<ComponentInstance>>,
}

impl VNodeInner {
	fn new(node_type: VNodeType, shape_flag: ShapeFlags) -> Self {
		Self {
			node_type,
			key: None,
			props: Props::new(),
			children: Vec::new(),
			text: None,
			shape_flag: Cell::new(shape_flag),
			el: RefCell::new(None),
			anchor: RefCell::new(None),
			component: RefCell::new(None),
		}
	}
}

/// A node of a rendered tree
#[derive(Clone)]
pub struct VNode(Rc<VNodeInner>);

impl VNode {
	pub fn element(tag: impl Into<Rc<str>>, props: Props, children: Vec<VNode>) -> Self {
		let mut flags = ShapeFlags::ELEMENT;
		if !children.is_empty() {
			flags |= ShapeFlags::ARRAY_CHILDREN;
		}
		let mut inner = VNodeInner::new(VNodeType::Element(tag.into()), flags);
		inner.props = props;
		inner.children = children;
		Self(Rc::new(inner))
	}

	pub fn text(text: impl Into<Rc<str>>) -> Self {
		let mut inner = VNodeInner::new(VNodeType::Text, ShapeFlags::empty());
		inner.text = Some(text.into());
		Self(Rc::new(inner))
	}

	pub fn comment(text: impl Into<Rc<str>>) -> Self {
		let mut inner = VNodeInner::new(VNodeType::Comment, ShapeFlags::empty());
		inner.text = Some(text.into());
		Self(Rc::new(inner))
	}

	pub fn fragment(children: Vec<VNode>) -> Self {
		let mut inner = VNodeInner::new(VNodeType::Fragment, ShapeFlags::ARRAY_CHILDREN);
		inner.children = children;
		Self(Rc::new(inner))
	}

	/// A component vnode; `children` become its default slot
	pub fn component(def: &ComponentDef, props: Props, children: Vec<VNode>) -> Self {
		let mut inner = VNodeInner::new(
			VNodeType::Component(def.clone()),
			ShapeFlags::STATEFUL_COMPONENT,
		);
		inner.props = props;
		inner.children = children;
		Self(Rc::new(inner))
	}

	/// The same vnode with an explicit key
	pub fn with_key(self, key: impl Into<Value>) -> Self {
		let mut inner = self.copy_inner();
		inner.key = Some(key.into());
		Self(Rc::new(inner))
	}

	fn copy_inner(&self) -> VNodeInner {
		let inner = &self.0;
		VNodeInner {
			node_type: inner.node_type.clone(),
			key: inner.key.clone(),
			props: inner.props.clone(),
			children: inner.children.clone(),
			text: inner.text.clone(),
			shape_flag: Cell::new(inner.shape_flag.get()),
			el: RefCell::new(inner.el.borrow().clone()),
			anchor: RefCell::new(inner.anchor.borrow().clone()),
			component: RefCell::new(inner.component.borrow().clone()),
		}
	}

	pub fn node_type(&self) -> &VNodeType {
		&self.0.node_type
	}

	pub fn key(&self) -> Option<&Value> {
		self.0.key.as_ref()
	}

	pub fn props(&self) -> &Props {
		&self.0.props
	}

	pub fn children(&self) -> &[VNode] {
		&self.0.children
	}

	pub fn text_content(&self) -> Option<&str> {
		self.0.text.as_deref()
	}

	/// The component definition of a component vnode
	pub fn component_def(&self) -> Option<&ComponentDef> {
		match &self.0.node_type {
			VNodeType::Component(def) => Some(def),
			_ => None,
		}
	}

	pub fn is_component(&self) -> bool {
		self.has_flag(ShapeFlags::STATEFUL_COMPONENT)
	}

	pub fn shape_flag(&self) -> ShapeFlags {
		self.0.shape_flag.get()
	}

	pub fn has_flag(&self, flag: ShapeFlags) -> bool {
		self.0.shape_flag.get().contains(flag)
	}

	pub fn set_flag(&self, flag: ShapeFlags) {
		self.0.shape_flag.set(self.0.shape_flag.get() | flag);
	}

	pub fn clear_flag(&self, flag: ShapeFlags) {
		self.0.shape_flag.set(self.0.shape_flag.get() - flag);
	}

	/// The mounted host node (for components, the root of the subtree)
	pub fn el(&self) -> Option<HostNode> {
		self.0.el.borrow().clone()
	}

	pub fn set_el(&self, el: Option<HostNode>) {
		*self.0.el.borrow_mut() = el;
	}

	/// End anchor of a mounted fragment
	pub fn anchor(&self) -> Option<HostNode> {
		self.0.anchor.borrow().clone()
	}

	pub fn set_anchor(&self, anchor: Option<HostNode>) {
		*self.0.anchor.borrow_mut() = anchor;
	}

	/// The instance mounted for a component vnode
	pub fn component_instance(&self) -> Option<ComponentInstance> {
		self.0.component.borrow().clone()
	}

	pub fn set_component(&self, instance: Option<ComponentInstance>) {
		*self.0.component.borrow_mut() = instance;
	}

	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

impl fmt::Debug for VNode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut out = f.debug_struct("VNode");
		out.field("type", &self.0.node_type);
		if let Some(key) = &self.0.key {
			out.field("key", key);
		}
		out.field("shape_flag", &self.0.shape_flag.get()).finish()
	}
}

/// Same type and same key: the renderer patches instead of replacing
pub fn is_same_vnode_type(a: &VNode, b: &VNode) -> bool {
	a.node_type().same(b.node_type()) && a.key() == b.key()
}

/// Shallow copy carrying the mounted state (element, anchor, instance, flags)
pub fn clone_vnode(vnode: &VNode) -> VNode {
	VNode(Rc::new(vnode.copy_inner()))
}
