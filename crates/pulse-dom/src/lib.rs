#![warn(missing_docs)]
//! # pulse-dom
//!
//! ## Purpose
//! Provides a minimal document model that collectors can label events
//! against, independent of any concrete browser binding.
//!
//! ## Responsibilities
//! - Store element/text nodes in an arena with parent/child navigation.
//! - Resolve short, stable CSS-like selectors for elements.
//! - Serialize HTML snapshots and journal mutations like a mutation observer.
//!
//! ## Data flow
//! The host mirrors page structure into [`Document`] -> collectors resolve
//! selectors with [`resolve_selector`] -> observed [`MutationRecord`] batches
//! feed the recorder's mutation coalescer.
//!
//! ## Ownership and lifetimes
//! Nodes are addressed by copyable [`NodeId`] handles into the arena, so
//! events and mutation records never borrow the document.
//!
//! ## Error model
//! Structural misuse (unknown node, appending into a text node, cycles)
//! returns [`DomError`].
//!
//! ## Example
//! ```rust
//! use pulse_dom::{Document, SelectorStyle, resolve_selector};
//!
//! let mut document = Document::new();
//! let body = document.body();
//! let button = document.append_element(body, "button", &[("id", "buy")]).unwrap();
//! assert_eq!(resolve_selector(&document, button, SelectorStyle::Heatmap), "#buy");
//! ```

mod selector;

pub use selector::{SelectorStyle, resolve_selector};

use pulse_core::{MutationKind, truncate_chars};
use thiserror::Error;

/// Elements serialized without a closing tag.
const VOID_ELEMENTS: [&str; 8] = ["area", "br", "col", "hr", "img", "input", "link", "meta"];

/// Handle of one node in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Arena index of the node.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Element tag and attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    /// Lowercase tag name.
    pub tag: String,
    /// Attributes in insertion order.
    pub attributes: Vec<(String, String)>,
}

impl ElementData {
    /// Returns an attribute value.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Non-blank `id` attribute.
    pub fn id(&self) -> Option<&str> {
        self.attribute("id")
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Class names in document order.
    pub fn classes(&self) -> Vec<&str> {
        self.attribute("class")
            .map(|classes| classes.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Returns `true` for fields whose typed content must never be captured.
    pub fn is_sensitive_field(&self) -> bool {
        if self.attribute("data-pulse-mask").is_some() {
            return true;
        }
        let input_type = self.attribute("type").unwrap_or_default();
        let autocomplete = self.attribute("autocomplete").unwrap_or_default();
        (self.tag == "input" && input_type.eq_ignore_ascii_case("password"))
            || autocomplete.starts_with("cc-")
    }
}

/// Node content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    /// Element node.
    Element(ElementData),
    /// Text node.
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// One observed DOM mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    /// Mutation kind.
    pub kind: MutationKind,
    /// Node the mutation applies to.
    pub target: NodeId,
    /// Added child count.
    pub added_nodes: usize,
    /// Removed child count.
    pub removed_nodes: usize,
    /// Changed attribute name.
    pub attribute_name: Option<String>,
    /// Value before the change.
    pub old_value: Option<String>,
}

impl MutationRecord {
    /// Child-list mutation on `target`.
    pub fn child_list(target: NodeId, added_nodes: usize, removed_nodes: usize) -> Self {
        Self {
            kind: MutationKind::ChildList,
            target,
            added_nodes,
            removed_nodes,
            attribute_name: None,
            old_value: None,
        }
    }

    /// Attribute mutation on `target`.
    pub fn attributes(target: NodeId, name: impl Into<String>, old_value: Option<String>) -> Self {
        Self {
            kind: MutationKind::Attributes,
            target,
            added_nodes: 0,
            removed_nodes: 0,
            attribute_name: Some(name.into()),
            old_value,
        }
    }

    /// Text data mutation on `target`.
    pub fn character_data(target: NodeId, old_value: Option<String>) -> Self {
        Self {
            kind: MutationKind::CharacterData,
            target,
            added_nodes: 0,
            removed_nodes: 0,
            attribute_name: None,
            old_value,
        }
    }
}

/// Arena document rooted at `<html>` with `<head>` and `<body>`.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
    journal: Option<Vec<MutationRecord>>,
}

impl Document {
    /// Creates `<html><head></head><body></body></html>`.
    pub fn new() -> Self {
        let mut document = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            head: NodeId(0),
            body: NodeId(0),
            journal: None,
        };
        let root = document.create_element("html");
        let head = document.create_element("head");
        let body = document.create_element("body");
        document.link(root, head);
        document.link(root, body);
        document.root = root;
        document.head = head;
        document.body = body;
        document
    }

    /// `<html>` element.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// `<head>` element.
    pub fn head(&self) -> NodeId {
        self.head
    }

    /// `<body>` element.
    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Creates a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push_node(NodeData::Element(ElementData {
            tag: tag.trim().to_ascii_lowercase(),
            attributes: Vec::new(),
        }))
    }

    /// Creates a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push_node(NodeData::Text(text.to_string()))
    }

    /// Creates an element with attributes and appends it to `parent`.
    ///
    /// # Errors
    /// Propagates [`Document::append_child`] failures.
    pub fn append_element(
        &mut self,
        parent: NodeId,
        tag: &str,
        attributes: &[(&str, &str)],
    ) -> Result<NodeId, DomError> {
        let node = self.create_element(tag);
        if let Some(NodeData::Element(element)) = self.nodes.get_mut(node.0).map(|n| &mut n.data) {
            element.attributes = attributes
                .iter()
                .map(|(key, value)| (key.to_ascii_lowercase(), value.to_string()))
                .collect();
        }
        self.append_child(parent, node)?;
        Ok(node)
    }

    /// Creates a text node and appends it to `parent`.
    ///
    /// # Errors
    /// Propagates [`Document::append_child`] failures.
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> Result<NodeId, DomError> {
        let node = self.create_text(text);
        self.append_child(parent, node)?;
        Ok(node)
    }

    /// Moves `child` under `parent` as its last child.
    ///
    /// # Errors
    /// Returns [`DomError`] for unknown nodes, non-element parents, moving
    /// the root, or creating a cycle.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.node(child)?;
        if self.element(parent).is_none() {
            return Err(DomError::NotAnElement(parent.0));
        }
        if child == self.root || self.is_ancestor_or_self(child, parent) {
            return Err(DomError::HierarchyViolation(child.0));
        }

        if let Some(previous) = self.nodes[child.0].parent {
            self.unlink(previous, child);
            self.record_if_connected(previous, MutationRecord::child_list(previous, 0, 1));
        }
        self.link(parent, child);
        self.record_if_connected(parent, MutationRecord::child_list(parent, 1, 0));
        Ok(())
    }

    /// Detaches `child` from `parent`.
    ///
    /// # Errors
    /// Returns [`DomError::NotAChild`] when `child` is not under `parent`.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.node(parent)?;
        if self.node(child)?.parent != Some(parent) {
            return Err(DomError::NotAChild(child.0));
        }
        self.record_if_connected(parent, MutationRecord::child_list(parent, 0, 1));
        self.unlink(parent, child);
        Ok(())
    }

    /// Sets an attribute value.
    ///
    /// # Errors
    /// Returns [`DomError::NotAnElement`] for text nodes or unknown nodes.
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let name = name.to_ascii_lowercase();
        let element = match self.nodes.get_mut(node.0).map(|n| &mut n.data) {
            Some(NodeData::Element(element)) => element,
            _ => return Err(DomError::NotAnElement(node.0)),
        };

        let old_value = match element.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => Some(std::mem::replace(existing, value.to_string())),
            None => {
                element.attributes.push((name.clone(), value.to_string()));
                None
            }
        };
        self.record_if_connected(node, MutationRecord::attributes(node, name, old_value));
        Ok(())
    }

    /// Replaces the data of a text node.
    ///
    /// # Errors
    /// Returns [`DomError::NotAText`] for elements or unknown nodes.
    pub fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), DomError> {
        let old_value = match self.nodes.get_mut(node.0).map(|n| &mut n.data) {
            Some(NodeData::Text(existing)) => std::mem::replace(existing, text.to_string()),
            _ => return Err(DomError::NotAText(node.0)),
        };
        self.record_if_connected(node, MutationRecord::character_data(node, Some(old_value)));
        Ok(())
    }

    /// Starts journaling mutations of connected nodes.
    pub fn observe(&mut self) {
        if self.journal.is_none() {
            self.journal = Some(Vec::new());
        }
    }

    /// Drains journaled mutation records.
    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        self.journal.as_mut().map(std::mem::take).unwrap_or_default()
    }

    /// Element data of `node`, if it is an element.
    pub fn element(&self, node: NodeId) -> Option<&ElementData> {
        match self.nodes.get(node.0).map(|n| &n.data) {
            Some(NodeData::Element(element)) => Some(element),
            _ => None,
        }
    }

    /// Lowercase tag of `node`, if it is an element.
    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|element| element.tag.as_str())
    }

    /// Parent of `node`.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0).and_then(|n| n.parent)
    }

    /// Children of `node`; empty for unknown nodes.
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node.0)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
    }

    /// Returns `true` when `node` is reachable from the root.
    pub fn is_connected(&self, node: NodeId) -> bool {
        if node.0 >= self.nodes.len() {
            return false;
        }
        self.is_ancestor_or_self(self.root, node)
    }

    /// `node` itself when it is an element, otherwise its closest element
    /// ancestor.
    pub fn nearest_element(&self, node: NodeId) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(candidate) = current {
            if self.element(candidate).is_some() {
                return Some(candidate);
            }
            current = self.parent(candidate);
        }
        None
    }

    /// 1-based position of `node` among its same-tag element siblings.
    ///
    /// Text nodes and differently tagged siblings are not counted.
    pub fn same_tag_position(&self, node: NodeId) -> usize {
        let (Some(tag), Some(parent)) = (self.tag(node), self.parent(node)) else {
            return 1;
        };
        let preceding = self
            .children(parent)
            .iter()
            .take_while(|sibling| **sibling != node)
            .filter(|sibling| self.tag(**sibling) == Some(tag))
            .count();
        preceding + 1
    }

    /// Concatenated text of `node` and its descendants.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    /// First connected element with the given `id` attribute.
    pub fn find_by_id(&self, id: &str) -> Option<NodeId> {
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            if self.element(node).and_then(ElementData::id) == Some(id) {
                return Some(node);
            }
            stack.extend(self.children(node).iter().rev().copied());
        }
        None
    }

    /// HTML serialization of `node` and its subtree.
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    /// Whole-document HTML truncated to `max_chars` characters.
    pub fn snapshot_html(&self, max_chars: usize) -> String {
        truncate_chars(&self.outer_html(self.root), max_chars)
    }

    fn push_node(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn node(&self, node: NodeId) -> Result<&Node, DomError> {
        self.nodes.get(node.0).ok_or(DomError::UnknownNode(node.0))
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    fn unlink(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.0].children.retain(|existing| *existing != child);
        self.nodes[child.0].parent = None;
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(candidate) = current {
            if candidate == ancestor {
                return true;
            }
            current = self.parent(candidate);
        }
        false
    }

    fn record_if_connected(&mut self, target: NodeId, record: MutationRecord) {
        if self.journal.is_none() || !self.is_connected(target) {
            return;
        }
        if let Some(journal) = self.journal.as_mut() {
            journal.push(record);
        }
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        match self.nodes.get(node.0).map(|n| &n.data) {
            Some(NodeData::Text(text)) => out.push_str(text),
            Some(NodeData::Element(_)) => {
                for child in self.children(node) {
                    self.collect_text(*child, out);
                }
            }
            None => {}
        }
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        match self.nodes.get(node.0).map(|n| &n.data) {
            Some(NodeData::Text(text)) => out.push_str(&escape_text(text)),
            Some(NodeData::Element(element)) => {
                out.push('<');
                out.push_str(&element.tag);
                for (key, value) in &element.attributes {
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    out.push_str(&escape_attribute(value));
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&element.tag.as_str()) {
                    return;
                }
                for child in self.children(node) {
                    self.write_html(*child, out);
                }
                out.push_str("</");
                out.push_str(&element.tag);
                out.push('>');
            }
            None => {}
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

/// Errors for structural document misuse.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomError {
    /// Node handle does not exist in this document.
    #[error("unknown node {0}")]
    UnknownNode(usize),
    /// Operation requires an element node.
    #[error("node {0} is not an element")]
    NotAnElement(usize),
    /// Operation requires a text node.
    #[error("node {0} is not a text node")]
    NotAText(usize),
    /// Node is not a child of the given parent.
    #[error("node {0} is not a child of the given parent")]
    NotAChild(usize),
    /// Move would detach the root or create a cycle.
    #[error("moving node {0} would break the tree")]
    HierarchyViolation(usize),
}

#[cfg(test)]
mod tests {
    //! Unit tests for document structure and serialization.

    use super::*;

    #[test]
    fn serializes_escaped_html_with_void_elements() {
        let mut document = Document::new();
        let body = document.body();
        let paragraph = document
            .append_element(body, "p", &[("title", "a \"b\"")])
            .expect("append p");
        document.append_text(paragraph, "1 < 2").expect("append text");
        document
            .append_element(body, "input", &[("type", "text")])
            .expect("append input");

        assert_eq!(
            document.outer_html(body),
            "<body><p title=\"a &quot;b&quot;\">1 &lt; 2</p><input type=\"text\"></body>"
        );
    }

    #[test]
    fn journals_only_connected_mutations() {
        let mut document = Document::new();
        document.observe();
        let detached = document.create_element("div");
        document.set_attribute(detached, "class", "x").expect("attr");
        assert!(document.take_records().is_empty());

        document.append_child(document.body(), detached).expect("attach");
        document.set_attribute(detached, "class", "y").expect("attr");
        let records = document.take_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind, MutationKind::ChildList);
        assert_eq!(records[1].old_value.as_deref(), Some("x"));
    }

    #[test]
    fn rejects_cycles() {
        let mut document = Document::new();
        let outer = document.append_element(document.body(), "div", &[]).expect("outer");
        let inner = document.append_element(outer, "div", &[]).expect("inner");
        assert_eq!(
            document.append_child(inner, outer),
            Err(DomError::HierarchyViolation(outer.0))
        );
    }

    #[test]
    fn same_tag_position_ignores_text_and_other_tags() {
        let mut document = Document::new();
        let list = document.append_element(document.body(), "ul", &[]).expect("ul");
        document.append_text(list, "\n").expect("text");
        document.append_element(list, "li", &[]).expect("li 1");
        document.append_element(list, "span", &[]).expect("span");
        let second = document.append_element(list, "li", &[]).expect("li 2");
        assert_eq!(document.same_tag_position(second), 2);
    }

    #[test]
    fn password_inputs_are_sensitive() {
        let element = ElementData {
            tag: "input".to_string(),
            attributes: vec![("type".to_string(), "password".to_string())],
        };
        assert!(element.is_sensitive_field());
    }
}
