//! Element - A node id bound to its document
//!
//! The counterpart of a DOM element reference. Holding an `Element` does
//! not keep the node attached; it only names it.

use std::fmt;

use super::document::{Document, NodeId, OffsetRect};
use super::selector::Selector;
use crate::error::Result;

#[derive(Clone)]
pub struct Element {
    document: Document,
    node: NodeId,
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node && self.document == other.document
    }
}

impl Eq for Element {}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Element({:?} {})", self.node, self.describe())
    }
}

impl Element {
    pub fn new(document: Document, node: NodeId) -> Self {
        Self { document, node }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.document.attribute(self.node, name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.document.has_attribute(self.node, name)
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        self.document.set_attribute(self.node, name, value);
    }

    pub fn remove_attribute(&self, name: &str) {
        self.document.remove_attribute(self.node, name);
    }

    pub fn tag_name(&self) -> String {
        self.document.tag_name(self.node)
    }

    pub fn id(&self) -> String {
        self.document.id(self.node)
    }

    pub fn class_name(&self) -> String {
        self.document.class_name(self.node)
    }

    pub fn add_class(&self, class_name: &str) {
        self.document.add_class(self.node, class_name);
    }

    pub fn has_class(&self, class_name: &str) -> bool {
        self.document.has_class(self.node, class_name)
    }

    pub fn describe(&self) -> String {
        self.document.describe(self.node)
    }

    pub fn parent(&self) -> Option<Element> {
        self.document.parent(self.node).map(|p| self.document.element(p))
    }

    pub fn children(&self) -> Vec<Element> {
        self.document
            .children(self.node)
            .into_iter()
            .map(|c| self.document.element(c))
            .collect()
    }

    pub fn descendants(&self) -> Vec<Element> {
        self.document
            .descendants(self.node)
            .into_iter()
            .map(|c| self.document.element(c))
            .collect()
    }

    pub fn append_child(&self, child: &Element) {
        self.document.append_child(self.node, child.node);
    }

    /// Detach this element from its parent.
    pub fn remove(&self) {
        self.document.remove(self.node);
    }

    pub fn contains(&self, other: &Element) -> bool {
        self.document.contains(self.node, other.node)
    }

    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<Element>> {
        let selector: Selector = selector.parse()?;
        Ok(self
            .document
            .query_selector_all(self.node, &selector)
            .into_iter()
            .map(|n| self.document.element(n))
            .collect())
    }

    pub fn query_selector(&self, selector: &str) -> Result<Option<Element>> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    pub fn focus(&self) {
        self.document.focus(self.node);
    }

    pub fn is_focused(&self) -> bool {
        self.document.focused() == Some(self.node)
    }

    pub fn offset(&self) -> OffsetRect {
        self.document.offset(self.node)
    }

    pub fn set_offset(&self, rect: OffsetRect) {
        self.document.set_offset(self.node, rect);
    }

    pub fn offset_parent(&self) -> Option<Element> {
        self.document.offset_parent(self.node).map(|p| self.document.element(p))
    }
}

/// Focus the first form field inside `element`, or with `anything` the
/// first link or button as well. Hidden inputs are skipped.
pub fn focus_first_field(element: &Element, anything: bool) -> Option<Element> {
    let target = element.descendants().into_iter().find(|el| match el.tag_name().as_str() {
        "A" | "BUTTON" => anything,
        "TEXTAREA" | "SELECT" => true,
        "INPUT" => el.attribute("type").as_deref() != Some("hidden"),
        _ => false,
    })?;
    target.focus();
    Some(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_identity() {
        let doc = Document::new();
        let node = doc.create_element("div");
        assert_eq!(doc.element(node), doc.element(node));

        let other = Document::new();
        assert_ne!(doc.element(node), other.element(node));
    }

    #[test]
    fn test_focus_first_field() {
        let doc = Document::new();
        let root = doc.element(doc.create_element("form"));
        let link = doc.element(doc.create_element("a"));
        let hidden = doc.element(doc.create_element("input"));
        let text = doc.element(doc.create_element("input"));
        hidden.set_attribute("type", "hidden");
        for child in [&link, &hidden, &text] {
            root.append_child(child);
        }

        assert_eq!(focus_first_field(&root, false), Some(text.clone()));
        assert!(text.is_focused());

        assert_eq!(focus_first_field(&root, true), Some(link.clone()));
        assert!(link.is_focused());
    }

    #[test]
    fn test_query_selector() {
        let doc = Document::new();
        let body = doc.element(doc.body());
        let child = doc.element(doc.create_element("div"));
        child.set_attribute("data-modules", "Foo");
        body.append_child(&child);

        assert_eq!(body.query_selector("[data-modules]").unwrap(), Some(child));
        assert!(body.query_selector("div p").is_err());
    }
}
