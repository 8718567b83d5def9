//! Document - Headless element tree
//!
//! Nodes live in an arena and are addressed by `NodeId`. A node is never
//! freed; removing it only detaches it, so an id stays valid (if orphaned)
//! for the document's lifetime. Every operation takes `&self` and borrows
//! the tree only for its own duration, so callers never hold a borrow
//! across a listener or module call.
//!
//! # API
//!
//! - `create_element(tag)` - New detached element
//! - `append_child` / `insert_before` / `remove_child` - Tree edits
//! - `attribute` / `set_attribute` / `remove_attribute` - Attribute access
//! - `descendants(node)` - Document-order walk (like `getElementsByTagName("*")`)
//! - `offset` / `set_offset` / `offset_parent` - Geometry for the viewport

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use taffy::Style;

use super::element::Element;
use super::event::ListenerEntry;
use super::selector::Selector;

// =============================================================================
// TYPES
// =============================================================================

/// Arena index of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Offset box of a node relative to its offset parent.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OffsetRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl OffsetRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self { left, top, width, height }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) tag: String,
    pub(crate) attributes: IndexMap<String, String>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) offset: OffsetRect,
    pub(crate) style: Style,
}

impl Node {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: IndexMap::new(),
            parent: None,
            children: Vec::new(),
            offset: OffsetRect::default(),
            style: Style::default(),
        }
    }
}

pub(crate) struct Tree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: NodeId,
    pub(crate) body: NodeId,
    pub(crate) focused: Option<NodeId>,
    pub(crate) listeners: Vec<ListenerEntry>,
    pub(crate) next_listener_id: u64,
}

impl Tree {
    pub(crate) fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    fn detach(&mut self, child: NodeId) {
        let Some(parent) = self.node(child).and_then(|n| n.parent) else {
            return;
        };
        if let Some(p) = self.node_mut(parent) {
            p.children.retain(|&c| c != child);
        }
        if let Some(c) = self.node_mut(child) {
            c.parent = None;
        }
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.node(node).and_then(|n| n.parent) {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    fn collect_descendants(&self, node: NodeId, out: &mut Vec<NodeId>) {
        if let Some(n) = self.node(node) {
            for &child in &n.children {
                out.push(child);
                self.collect_descendants(child, out);
            }
        }
    }
}

// =============================================================================
// DOCUMENT HANDLE
// =============================================================================

/// Shared handle to a document tree. Clones refer to the same tree.
#[derive(Clone)]
pub struct Document {
    pub(crate) tree: Rc<RefCell<Tree>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.tree.borrow().nodes.len())
            .finish()
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.tree, &other.tree)
    }
}

/// Non-owning document handle, for listeners stored inside the tree.
#[derive(Clone)]
pub struct WeakDocument {
    tree: Weak<RefCell<Tree>>,
}

impl WeakDocument {
    pub fn upgrade(&self) -> Option<Document> {
        self.tree.upgrade().map(|tree| Document { tree })
    }
}

impl Document {
    pub fn downgrade(&self) -> WeakDocument {
        WeakDocument { tree: Rc::downgrade(&self.tree) }
    }

    /// Create a document with an `html` root and a `body` child.
    pub fn new() -> Self {
        let mut html = Node::new("html");
        let mut body = Node::new("body");
        body.parent = Some(NodeId(0));
        html.children.push(NodeId(1));

        let tree = Tree {
            nodes: vec![html, body],
            root: NodeId(0),
            body: NodeId(1),
            focused: None,
            listeners: Vec::new(),
            next_listener_id: 0,
        };

        Self { tree: Rc::new(RefCell::new(tree)) }
    }

    /// The `html` element.
    pub fn document_element(&self) -> NodeId {
        self.tree.borrow().root
    }

    pub fn body(&self) -> NodeId {
        self.tree.borrow().body
    }

    /// Wrap a node id in an element handle.
    pub fn element(&self, node: NodeId) -> Element {
        Element::new(self.clone(), node)
    }

    // =========================================================================
    // TREE EDITS
    // =========================================================================

    pub fn create_element(&self, tag: &str) -> NodeId {
        let mut tree = self.tree.borrow_mut();
        let id = NodeId(tree.nodes.len());
        tree.nodes.push(Node::new(tag));
        id
    }

    /// Append `child` to `parent`, detaching it from any previous parent.
    ///
    /// Appending a node under itself or one of its descendants is ignored.
    pub fn append_child(&self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    /// Insert `child` into `parent` before `reference` (or last when `None`
    /// or when `reference` is not a child of `parent`).
    pub fn insert_before(&self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        let mut tree = self.tree.borrow_mut();
        if tree.node(parent).is_none() || tree.node(child).is_none() {
            return;
        }
        if tree.is_inclusive_ancestor(child, parent) {
            return;
        }

        tree.detach(child);

        if let Some(p) = tree.node_mut(parent) {
            let position = reference.and_then(|r| p.children.iter().position(|&c| c == r));
            match position {
                Some(index) => p.children.insert(index, child),
                None => p.children.push(child),
            }
        }
        if let Some(c) = tree.node_mut(child) {
            c.parent = Some(parent);
        }
    }

    /// Detach `child` from `parent`. Returns false if it was not a child.
    pub fn remove_child(&self, parent: NodeId, child: NodeId) -> bool {
        let mut tree = self.tree.borrow_mut();
        let is_child = tree.node(child).and_then(|n| n.parent) == Some(parent);
        if is_child {
            tree.detach(child);
        }
        is_child
    }

    /// Detach `node` from whatever parent it has.
    pub fn remove(&self, node: NodeId) {
        self.tree.borrow_mut().detach(node);
    }

    // =========================================================================
    // TRAVERSAL
    // =========================================================================

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.tree.borrow().node(node).and_then(|n| n.parent)
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.tree
            .borrow()
            .node(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.tree.borrow().node(node).and_then(|n| n.children.first().copied())
    }

    /// All descendants of `node` in document order, excluding `node`.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let tree = self.tree.borrow();
        let mut out = Vec::new();
        tree.collect_descendants(node, &mut out);
        out
    }

    /// `node` followed by its ancestors up to the root.
    pub fn ancestors_inclusive(&self, node: NodeId) -> Vec<NodeId> {
        let tree = self.tree.borrow();
        let mut path = Vec::new();
        let mut current = tree.node(node).map(|_| node);
        while let Some(id) = current {
            path.push(id);
            current = tree.node(id).and_then(|n| n.parent);
        }
        path
    }

    /// True if `node` is `ancestor` or lies beneath it.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.tree.borrow().is_inclusive_ancestor(ancestor, node)
    }

    /// True if `node` is attached under the document element.
    pub fn is_connected(&self, node: NodeId) -> bool {
        let root = self.document_element();
        self.contains(root, node)
    }

    /// Descendants of `root` matching `selector`, in document order.
    pub fn query_selector_all(&self, root: NodeId, selector: &Selector) -> Vec<NodeId> {
        let tree = self.tree.borrow();
        let mut all = Vec::new();
        tree.collect_descendants(root, &mut all);
        all.into_iter()
            .filter(|&id| tree.node(id).is_some_and(|n| selector.matches(n)))
            .collect()
    }

    // =========================================================================
    // ATTRIBUTES
    // =========================================================================

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.tree
            .borrow()
            .node(node)
            .and_then(|n| n.attributes.get(name).cloned())
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.tree
            .borrow()
            .node(node)
            .is_some_and(|n| n.attributes.contains_key(name))
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        if let Some(n) = self.tree.borrow_mut().node_mut(node) {
            n.attributes.insert(name.to_string(), value.to_string());
        }
    }

    pub fn remove_attribute(&self, node: NodeId, name: &str) {
        if let Some(n) = self.tree.borrow_mut().node_mut(node) {
            n.attributes.shift_remove(name);
        }
    }

    /// Upper-case tag name, like `nodeName`.
    pub fn tag_name(&self, node: NodeId) -> String {
        self.tree
            .borrow()
            .node(node)
            .map(|n| n.tag.to_ascii_uppercase())
            .unwrap_or_default()
    }

    /// The `id` attribute, or an empty string.
    pub fn id(&self, node: NodeId) -> String {
        self.attribute(node, "id").unwrap_or_default()
    }

    /// The `class` attribute, or an empty string.
    pub fn class_name(&self, node: NodeId) -> String {
        self.attribute(node, "class").unwrap_or_default()
    }

    pub fn set_class_name(&self, node: NodeId, class_name: &str) {
        self.set_attribute(node, "class", class_name);
    }

    /// Append class text to the existing class list, space separated.
    pub fn add_class(&self, node: NodeId, class_name: &str) {
        let current = self.class_name(node);
        if current.is_empty() {
            self.set_class_name(node, class_name);
        } else {
            self.set_class_name(node, &format!("{current} {class_name}"));
        }
    }

    pub fn has_class(&self, node: NodeId, class_name: &str) -> bool {
        self.class_name(node).split_whitespace().any(|c| c == class_name)
    }

    /// `TAG.class.list#id`, used in error messages.
    pub fn describe(&self, node: NodeId) -> String {
        let classes: Vec<String> = self
            .class_name(node)
            .split_whitespace()
            .map(str::to_string)
            .collect();
        format!("{}.{}#{}", self.tag_name(node), classes.join("."), self.id(node))
    }

    // =========================================================================
    // FOCUS
    // =========================================================================

    pub fn focus(&self, node: NodeId) {
        let mut tree = self.tree.borrow_mut();
        if tree.node(node).is_some() {
            tree.focused = Some(node);
        }
    }

    pub fn blur(&self) {
        self.tree.borrow_mut().focused = None;
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.tree.borrow().focused
    }

    // =========================================================================
    // GEOMETRY
    // =========================================================================

    pub fn offset(&self, node: NodeId) -> OffsetRect {
        self.tree
            .borrow()
            .node(node)
            .map(|n| n.offset)
            .unwrap_or_default()
    }

    pub fn set_offset(&self, node: NodeId, rect: OffsetRect) {
        if let Some(n) = self.tree.borrow_mut().node_mut(node) {
            n.offset = rect;
        }
    }

    /// The node offsets are measured from. Here that is the parent.
    pub fn offset_parent(&self, node: NodeId) -> Option<NodeId> {
        self.parent(node)
    }

    pub fn style(&self, node: NodeId) -> Style {
        self.tree
            .borrow()
            .node(node)
            .map(|n| n.style.clone())
            .unwrap_or_default()
    }

    /// Layout style consumed by [`crate::dom::compute_offsets`].
    pub fn set_style(&self, node: NodeId, style: Style) {
        if let Some(n) = self.tree.borrow_mut().node_mut(node) {
            n.style = style;
        }
    }
}
