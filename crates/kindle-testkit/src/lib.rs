//! # Kindle Testkit
//!
//! Test support for Kindle components: an in-memory host tree and a
//! [`MemoryRenderer`] implementing the runtime's renderer contract, so the
//! scheduler, lifecycle hooks, async components and keep-alive can be
//! exercised end to end without a platform.
//!
//! ## Example
//!
//! ```ignore
//! use kindle_testkit::{MemoryRenderer, inner_html};
//!
//! let renderer = MemoryRenderer::new();
//! let root = renderer.root();
//! renderer.render(Some(&VNode::component(&app, Props::new(), Vec::new())), &root);
//! assert_eq!(inner_html(&root), "<p>hello</p>");
//! ```

pub mod node;
pub mod renderer;

pub use node::{MemoryNode, NodeKind, inner_html, memory, serialize};
pub use renderer::{HostOp, MemoryRenderer, text_of};
