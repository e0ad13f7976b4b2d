//! In-memory host nodes

use core::cell::RefCell;
use std::fmt::Write as _;
use std::rc::Rc;

use kindle_runtime::vnode::{HostNode, Props, WeakHostNode};

/// What a [`MemoryNode`] represents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
	Element(Rc<str>),
	Text,
	Comment,
}

/// A node of the in-memory host tree
#[derive(Debug)]
pub struct MemoryNode {
	kind: NodeKind,
	text: RefCell<Rc<str>>,
	attrs: RefCell<Props>,
	children: RefCell<Vec<HostNode>>,
	parent: RefCell<Option<WeakHostNode>>,
}

impl MemoryNode {
	fn new(kind: NodeKind, text: Rc<str>) -> HostNode {
		HostNode::new(Self {
			kind,
			text: RefCell::new(text),
			attrs: RefCell::new(Props::new()),
			children: RefCell::new(Vec::new()),
			parent: RefCell::new(None),
		})
	}

	pub fn element(tag: &str) -> HostNode {
		Self::new(NodeKind::Element(tag.into()), "".into())
	}

	pub fn text(text: Rc<str>) -> HostNode {
		Self::new(NodeKind::Text, text)
	}

	pub fn comment(text: Rc<str>) -> HostNode {
		Self::new(NodeKind::Comment, text)
	}

	pub fn kind(&self) -> &NodeKind {
		&self.kind
	}

	pub fn text_content(&self) -> Rc<str> {
		self.text.borrow().clone()
	}

	pub fn children(&self) -> Vec<HostNode> {
		self.children.borrow().clone()
	}

	pub fn parent(&self) -> Option<HostNode> {
		self.parent.borrow().as_ref().and_then(WeakHostNode::upgrade)
	}
}

/// The [`MemoryNode`] behind a host node
pub fn memory(node: &HostNode) -> Option<&MemoryNode> {
	node.downcast_ref::<MemoryNode>()
}

pub(crate) fn set_text(node: &HostNode, text: Rc<str>) {
	if let Some(node) = memory(node) {
		*node.text.borrow_mut() = text;
	}
}

pub(crate) fn set_attrs(node: &HostNode, attrs: &Props) {
	if let Some(node) = memory(node) {
		*node.attrs.borrow_mut() = attrs.clone();
	}
}

pub(crate) fn parent_of(node: &HostNode) -> Option<HostNode> {
	memory(node)?.parent()
}

pub(crate) fn next_sibling(node: &HostNode) -> Option<HostNode> {
	let parent = parent_of(node)?;
	let siblings = memory(&parent)?.children.borrow();
	let index = siblings.iter().position(|sibling| sibling.ptr_eq(node))?;
	siblings.get(index + 1).cloned()
}

/// Detach `node` from its parent; `false` if it had none
pub(crate) fn remove(node: &HostNode) -> bool {
	let Some(parent) = parent_of(node) else {
		return false;
	};
	if let Some(parent) = memory(&parent) {
		parent.children.borrow_mut().retain(|child| !child.ptr_eq(node));
	}
	if let Some(node) = memory(node) {
		node.parent.borrow_mut().take();
	}
	true
}

/// Insert `node` into `parent` before `anchor`, or last
pub(crate) fn insert(node: &HostNode, parent: &HostNode, anchor: Option<&HostNode>) {
	remove(node);
	let Some(container) = memory(parent) else {
		return;
	};
	{
		let mut children = container.children.borrow_mut();
		let index = anchor
			.and_then(|anchor| children.iter().position(|child| child.ptr_eq(anchor)))
			.unwrap_or(children.len());
		children.insert(index, node.clone());
	}
	if let Some(node) = memory(node) {
		*node.parent.borrow_mut() = Some(parent.downgrade());
	}
}

/// Markup of `node` and its descendants
pub fn serialize(node: &HostNode) -> String {
	let mut out = String::new();
	write_node(node, &mut out);
	out
}

/// Markup of the children of `node`
pub fn inner_html(node: &HostNode) -> String {
	let mut out = String::new();
	if let Some(node) = memory(node) {
		for child in node.children.borrow().iter() {
			write_node(child, &mut out);
		}
	}
	out
}

fn write_node(node: &HostNode, out: &mut String) {
	let Some(data) = memory(node) else {
		return;
	};
	match &data.kind {
		NodeKind::Text => out.push_str(&data.text.borrow()),
		NodeKind::Comment => {
			let _ = write!(out, "<!--{}-->", data.text.borrow());
		}
		NodeKind::Element(tag) => {
			out.push('<');
			out.push_str(tag);
			for (name, value) in data.attrs.borrow().iter() {
				let _ = write!(out, " {name}=\"{value}\"");
			}
			out.push('>');
			for child in data.children.borrow().iter() {
				write_node(child, out);
			}
			let _ = write!(out, "</{tag}>");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use kindle_reactive::Value;
	use kindle_runtime::vnode::props;

	#[test]
	fn test_insert_before_anchor_and_move() {
		let root = MemoryNode::element("div");
		let (a, b) = (MemoryNode::text("a".into()), MemoryNode::text("b".into()));
		insert(&b, &root, None);
		insert(&a, &root, Some(&b));
		assert_eq!(inner_html(&root), "ab");

		insert(&a, &root, None);
		assert_eq!(inner_html(&root), "ba");
		assert!(next_sibling(&b).is_some_and(|next| next.ptr_eq(&a)));

		assert!(remove(&b));
		assert!(!remove(&b));
		assert_eq!(inner_html(&root), "a");
	}

	#[test]
	fn test_serialize_element() {
		let el = MemoryNode::element("p");
		set_attrs(&el, &props([("id", Value::from("x"))]));
		insert(&MemoryNode::comment("c".into()), &el, None);

		assert_eq!(serialize(&el), "<p id=\"x\"><!--c--></p>");
	}
}
